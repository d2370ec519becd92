use std::path::Path;
use ndarray::{s, Array2};
use tokenizers::{Tokenizer, TruncationParams};
use log::error;

use super::error::TaggerError;

/// Maximum number of tokens (special tokens included) the tagging model accepts.
pub const MAX_SEQUENCE_LENGTH: usize = 512;

/// Tokenized model input for a single sequence.
///
/// All three arrays have shape `[1, sequence_length]` and hold `i64` values,
/// which is the only integer width the exported model accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedInput {
    pub input_ids: Array2<i64>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Array2<i64>,
    /// All zero for single-segment input
    pub token_type_ids: Array2<i64>,
}

impl EncodedInput {
    /// Builds an encoded input from the parallel `u32` sequences a tokenizer produces.
    ///
    /// # Errors
    /// - `PreprocessError` if the three sequences differ in length
    pub fn from_parts(ids: &[u32], attention_mask: &[u32], type_ids: &[u32]) -> Result<Self, TaggerError> {
        if ids.len() != attention_mask.len() || ids.len() != type_ids.len() {
            return Err(TaggerError::PreprocessError(format!(
                "Misaligned encoding: {} ids, {} mask values, {} type ids",
                ids.len(), attention_mask.len(), type_ids.len()
            )));
        }
        Ok(Self {
            input_ids: to_row(ids)?,
            attention_mask: to_row(attention_mask)?,
            token_type_ids: to_row(type_ids)?,
        })
    }

    /// Number of token positions in the sequence
    pub fn len(&self) -> usize {
        self.input_ids.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token ids of the single sequence, in order
    pub fn token_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.input_ids.row(0).into_iter().copied()
    }

    /// Keeps only the first `max_length` positions.
    pub fn truncate(&mut self, max_length: usize) {
        if self.len() <= max_length {
            return;
        }
        self.input_ids = self.input_ids.slice(s![.., ..max_length]).to_owned();
        self.attention_mask = self.attention_mask.slice(s![.., ..max_length]).to_owned();
        self.token_type_ids = self.token_type_ids.slice(s![.., ..max_length]).to_owned();
    }
}

fn to_row(values: &[u32]) -> Result<Array2<i64>, TaggerError> {
    Array2::from_shape_vec((1, values.len()), values.iter().map(|&v| i64::from(v)).collect())
        .map_err(|e| TaggerError::PreprocessError(format!("Failed to shape encoding: {}", e)))
}

/// Converts text to model input and token ids back to text.
///
/// The pipeline only depends on this contract, so tests and alternative
/// vocabularies can stand in for the pretrained tokenizer.
pub trait TextTokenizer: Send + Sync {
    /// Encodes `text` as a single sequence with special tokens added.
    fn encode(&self, text: &str) -> Result<EncodedInput, TaggerError>;

    /// Decodes one token id, returning an empty string for special tokens.
    fn decode(&self, token_id: i64) -> Result<String, TaggerError>;
}

/// A pretrained subword tokenizer loaded from a `tokenizer.json` artifact.
///
/// Truncation is configured once at load time; padding is disabled since
/// every request is a single sequence.
#[derive(Debug)]
pub struct PretrainedTokenizer {
    inner: Tokenizer,
    max_length: usize,
}

impl PretrainedTokenizer {
    /// Loads the tokenizer from a local `tokenizer.json` file.
    ///
    /// # Errors
    /// - `BuildError` if the file cannot be read or parsed
    /// - `BuildError` if truncation cannot be configured for `max_length`
    pub fn from_file(path: impl AsRef<Path>, max_length: usize) -> Result<Self, TaggerError> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| {
                error!("Failed to load tokenizer from {}: {}", path.display(), e);
                TaggerError::BuildError(format!("Failed to load tokenizer: {}", e))
            })?;
        Self::new(tokenizer, max_length)
    }

    /// Wraps an already constructed tokenizer, enforcing `max_length` truncation.
    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self, TaggerError> {
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| TaggerError::BuildError(format!("Failed to configure truncation: {}", e)))?;
        Ok(Self { inner: tokenizer, max_length })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl TextTokenizer for PretrainedTokenizer {
    fn encode(&self, text: &str) -> Result<EncodedInput, TaggerError> {
        let encoding = self.inner.encode(text, true)
            .map_err(|e| TaggerError::PreprocessError(e.to_string()))?;
        EncodedInput::from_parts(
            encoding.get_ids(),
            encoding.get_attention_mask(),
            encoding.get_type_ids(),
        )
    }

    fn decode(&self, token_id: i64) -> Result<String, TaggerError> {
        let id = u32::try_from(token_id)
            .map_err(|_| TaggerError::InferenceError(format!("Invalid token id {}", token_id)))?;
        self.inner.decode(&[id], true)
            .map_err(|e| TaggerError::InferenceError(format!("Failed to decode token {}: {}", id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;
    use tokenizers::pre_tokenizers::PreTokenizerWrapper;
    use tokenizers::processors::bert::BertProcessing;
    use tokenizers::processors::PostProcessorWrapper;
    use tokenizers::AddedToken;

    const WORDS: [&str; 6] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "Hello", "World"];

    fn word_level_tokenizer(max_length: usize) -> PretrainedTokenizer {
        let vocab: HashMap<String, u32> = WORDS.iter()
            .enumerate()
            .map(|(i, w)| (w.to_string(), i as u32))
            .collect();
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .expect("valid word-level vocabulary");

        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(PreTokenizerWrapper::from(Whitespace::default()));
        tokenizer.with_post_processor(PostProcessorWrapper::from(BertProcessing::new(
            ("[SEP]".to_string(), 3),
            ("[CLS]".to_string(), 2),
        )));
        tokenizer.add_special_tokens(&[
            AddedToken::from("[PAD]", true),
            AddedToken::from("[CLS]", true),
            AddedToken::from("[SEP]", true),
        ]);
        PretrainedTokenizer::new(tokenizer, max_length).expect("truncation config")
    }

    #[test]
    fn test_encode_adds_special_tokens() {
        let tokenizer = word_level_tokenizer(MAX_SEQUENCE_LENGTH);
        let encoded = tokenizer.encode("Hello World").unwrap();

        assert_eq!(encoded.token_ids().collect::<Vec<_>>(), vec![2, 4, 5, 3]);
        assert!(encoded.attention_mask.iter().all(|&m| m == 1));
        assert!(encoded.token_type_ids.iter().all(|&t| t == 0));
        assert_eq!(encoded.input_ids.shape(), &[1, 4]);
    }

    #[test]
    fn test_encode_truncates_to_max_length() {
        let tokenizer = word_level_tokenizer(MAX_SEQUENCE_LENGTH);
        let long_text = "Hello World ".repeat(400);
        let encoded = tokenizer.encode(&long_text).unwrap();

        assert_eq!(encoded.len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(encoded.attention_mask.len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(encoded.token_type_ids.len(), MAX_SEQUENCE_LENGTH);
    }

    #[test]
    fn test_decode_skips_special_tokens() {
        let tokenizer = word_level_tokenizer(MAX_SEQUENCE_LENGTH);
        assert_eq!(tokenizer.decode(4).unwrap(), "Hello");
        assert_eq!(tokenizer.decode(2).unwrap(), "");
        assert!(matches!(tokenizer.decode(-1), Err(TaggerError::InferenceError(_))));
    }

    #[test]
    fn test_from_parts_rejects_misaligned_sequences() {
        let result = EncodedInput::from_parts(&[1, 2, 3], &[1, 1], &[0, 0, 0]);
        assert!(matches!(result, Err(TaggerError::PreprocessError(_))));
    }

    #[test]
    fn test_truncate_keeps_leading_positions() {
        let mut encoded = EncodedInput::from_parts(&[7, 8, 9, 10], &[1, 1, 1, 1], &[0, 0, 0, 0]).unwrap();
        encoded.truncate(2);
        assert_eq!(encoded.token_ids().collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(encoded.attention_mask.shape(), &[1, 2]);

        encoded.truncate(10);
        assert_eq!(encoded.len(), 2);
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let result = PretrainedTokenizer::from_file("/nonexistent/tokenizer.json", MAX_SEQUENCE_LENGTH);
        assert!(matches!(result, Err(TaggerError::BuildError(_))));
    }
}
