use std::sync::OnceLock;
use ndarray::{Array1, ArrayView2};
use regex::Regex;

/// Index of the "is tag" class in the model's output.
pub const POSITIVE_CLASS: usize = 1;

/// Applies a softmax to each token's logits and returns the probability of `class`.
///
/// `logits` is `[sequence_length, num_classes]`.
pub fn class_probabilities(logits: ArrayView2<f32>, class: usize) -> Array1<f32> {
    logits.outer_iter()
        .map(|row| {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            let denom: f32 = row.iter().map(|&x| (x - max).exp()).sum();
            (row[class] - max).exp() / denom
        })
        .collect()
}

/// Most likely class per token. Only used for diagnostics.
pub fn argmax_classes(logits: ArrayView2<f32>) -> Vec<usize> {
    logits.outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(class, _)| class)
                .unwrap_or(0)
        })
        .collect()
}

/// Positions whose probability is strictly greater than `threshold`.
pub fn positions_above(probabilities: &Array1<f32>, threshold: f32) -> Vec<usize> {
    probabilities.iter()
        .enumerate()
        .filter(|(_, p)| **p > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Letters only: general categories Lu, Ll, Lt, Lm and Lo. Combining marks
/// and letter-like numerals are excluded.
static LETTERS: OnceLock<Regex> = OnceLock::new();

fn letters() -> &'static Regex {
    LETTERS.get_or_init(|| Regex::new(r"^\p{L}+$").expect("letter regex must compile"))
}

/// A decoded token is kept as a tag when it has more than one character
/// and every character is a letter.
pub fn is_keyword(tag: &str) -> bool {
    tag.chars().count() > 1 && letters().is_match(tag)
}
