#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use env_logger::{Builder, Env};
use ndarray::Array3;
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{AddedToken, Tokenizer};

use keytag::{
    EncodedInput, InferenceEngine, PretrainedTokenizer, TaggerError, TaggingPipeline,
};

pub const VOCAB: [&str; 15] = [
    "[PAD]", "[UNK]", "[CLS]", "[SEP]",
    "Hello", "World", "Cats", "are", "popular", "pets", ".", "Dogs", "too", "a", "42",
];

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn token_id(word: &str) -> i64 {
    VOCAB.iter()
        .position(|w| *w == word)
        .map(|i| i as i64)
        .unwrap_or_else(|| panic!("{} is not in the test vocabulary", word))
}

/// A BERT-style word-level tokenizer over [`VOCAB`].
pub fn word_tokenizer(max_length: usize) -> PretrainedTokenizer {
    let vocab: HashMap<String, u32> = VOCAB.iter()
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

/// Scores each token by id: listed words get their configured positive-class
/// probability, everything else gets a confidently negative logit.
#[derive(Default)]
pub struct ScriptedEngine {
    probabilities: HashMap<i64, f32>,
    seen_lengths: Mutex<Vec<usize>>,
}

impl ScriptedEngine {
    pub fn tagging(words: &[&str]) -> Self {
        words.iter().fold(Self::default(), |engine, w| engine.with_probability(w, 0.99))
    }

    pub fn with_probability(mut self, word: &str, probability: f32) -> Self {
        self.probabilities.insert(token_id(word), probability);
        self
    }

    /// Sequence lengths of every input this engine has been run on
    pub fn seen_lengths(&self) -> Vec<usize> {
        self.seen_lengths.lock().unwrap().clone()
    }
}

impl InferenceEngine for ScriptedEngine {
    fn run(&self, input: &EncodedInput) -> Result<Array3<f32>, TaggerError> {
        self.seen_lengths.lock().unwrap().push(input.len());

        let mut logits = Array3::zeros((1, input.len(), 2));
        for (i, id) in input.token_ids().enumerate() {
            // softmax([0, ln(p / (1 - p))]) puts p on the positive class
            let logit = match self.probabilities.get(&id) {
                Some(&p) => (p / (1.0 - p)).ln(),
                None => -8.0,
            };
            logits[[0, i, 1]] = logit;
        }
        Ok(logits)
    }
}

pub struct FailingEngine;

impl InferenceEngine for FailingEngine {
    fn run(&self, _input: &EncodedInput) -> Result<Array3<f32>, TaggerError> {
        Err(TaggerError::InferenceError("model session unavailable".into()))
    }
}

/// Rejects every input with a preprocessing error.
pub struct BrokenTokenizer;

impl keytag::TextTokenizer for BrokenTokenizer {
    fn encode(&self, _text: &str) -> Result<EncodedInput, TaggerError> {
        Err(TaggerError::PreprocessError("vocabulary not loaded".into()))
    }

    fn decode(&self, _token_id: i64) -> Result<String, TaggerError> {
        Ok(String::new())
    }
}

pub fn pipeline_with(engine: Arc<dyn InferenceEngine>) -> TaggingPipeline {
    TaggingPipeline::builder()
        .with_tokenizer(Arc::new(word_tokenizer(keytag::tagger::MAX_SEQUENCE_LENGTH)))
        .with_engine(engine)
        .build()
        .expect("stub pipeline")
}
