//! Lexical overlap metrics: ROUGE-L and sentence BLEU.
//!
//! ROUGE-L runs on stemmed tokens from Tantivy's analyzer pipeline
//! (simple tokenizer, lowercasing, English Snowball stemmer). BLEU follows the
//! usual sentence-level definition on whitespace tokens with uniform 1..4-gram
//! weights, a brevity penalty, and no smoothing.

use std::collections::HashMap;
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream};

/// Highest n-gram order used by BLEU.
pub const BLEU_MAX_ORDER: usize = 4;

fn stemming_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build()
}

/// Lowercased, stemmed word tokens. Punctuation is dropped.
pub fn stemmed_tokens(text: &str) -> Vec<String> {
    let mut analyzer = stemming_analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}

/// Longest common subsequence length (dynamic programming, two rows).
fn lcs_length<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F-measure of `candidate` against `reference`.
///
/// Both sides empty (after tokenization) scores 1.0; one side empty scores 0.0.
pub fn rouge_l(candidate: &str, reference: &str) -> f64 {
    let cand = stemmed_tokens(candidate);
    let refr = stemmed_tokens(reference);

    match (cand.is_empty(), refr.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let lcs = lcs_length(&cand, &refr) as f64;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / cand.len() as f64;
    let recall = lcs / refr.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

fn ngram_counts<'a>(tokens: &'a [&'a str], n: usize) -> HashMap<&'a [&'a str], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

/// Clipped n-gram precision as (matches, total candidate n-grams).
fn modified_precision(candidate: &[&str], reference: &[&str], n: usize) -> (usize, usize) {
    let cand_counts = ngram_counts(candidate, n);
    let ref_counts = ngram_counts(reference, n);

    let matches = cand_counts
        .iter()
        .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    let total = candidate.len().saturating_sub(n - 1);
    (matches, total)
}

/// Sentence BLEU of `candidate` against a single `reference`.
///
/// Returns 0.0 when any n-gram order has no match, including candidates
/// shorter than four tokens.
pub fn sentence_bleu(candidate: &str, reference: &str) -> f64 {
    let cand: Vec<&str> = candidate.split_whitespace().collect();
    let refr: Vec<&str> = reference.split_whitespace().collect();
    if cand.is_empty() {
        return 0.0;
    }

    let mut log_sum = 0.0;
    for n in 1..=BLEU_MAX_ORDER {
        let (matches, total) = modified_precision(&cand, &refr, n);
        if matches == 0 {
            return 0.0;
        }
        log_sum += (matches as f64 / total.max(1) as f64).ln();
    }
    let geo_mean = (log_sum / BLEU_MAX_ORDER as f64).exp();

    let c = cand.len() as f64;
    let r = refr.len() as f64;
    let brevity_penalty = if c > r { 1.0 } else { (1.0 - r / c).exp() };

    (brevity_penalty * geo_mean).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLD: &str = "Dehydration reduces fluid levels in the body, leading to decreased urine output as the kidneys try to conserve water.";

    #[test]
    fn test_stemmed_tokens() {
        assert_eq!(
            stemmed_tokens("Kidneys are Conserving water!"),
            vec!["kidney", "are", "conserv", "water"]
        );
        assert!(stemmed_tokens("  ...  ").is_empty());
    }

    #[test]
    fn test_lcs_length() {
        let a = ["a", "b", "c", "d"];
        let b = ["a", "c", "d", "e"];
        assert_eq!(lcs_length(&a, &b), 3);
        assert_eq!(lcs_length::<&str>(&[], &b), 0);
    }

    #[test]
    fn test_rouge_l_identical() {
        assert!((rouge_l(GOLD, GOLD) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rouge_l_stemming_matches_inflections() {
        let score = rouge_l("the kidneys conserved water", "the kidney conserves water");
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rouge_l_partial_overlap() {
        let score = rouge_l(
            "Dehydration can lead to decreased urine output due to insufficient fluid intake.",
            GOLD,
        );
        assert!(score > 0.2 && score < 0.8, "score = {score}");
    }

    #[test]
    fn test_rouge_l_known_value() {
        // LCS = 2 of 3 and 4 tokens: P = 2/3, R = 1/2, F = 4/7
        let score = rouge_l("a b c", "a x b y");
        assert!((score - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_rouge_l_empty_inputs() {
        assert_eq!(rouge_l("", ""), 1.0);
        assert_eq!(rouge_l("", "something"), 0.0);
        assert_eq!(rouge_l("something", ""), 0.0);
        assert_eq!(rouge_l("alpha", "beta"), 0.0);
    }

    #[test]
    fn test_bleu_identical_is_one() {
        assert!((sentence_bleu(GOLD, GOLD) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bleu_no_four_gram_overlap_is_zero() {
        let shuffled = sentence_bleu(
            "reduces fluid the body levels in",
            "Dehydration reduces fluid levels in the body",
        );
        assert_eq!(shuffled, 0.0);
        assert_eq!(sentence_bleu("too short", "too short"), 0.0);
        assert_eq!(sentence_bleu("", GOLD), 0.0);
    }

    #[test]
    fn test_bleu_brevity_penalty() {
        let reference = "a b c d e f g h";
        let candidate = "a b c d";
        // All n-gram precisions are 1; BP = exp(1 - 8/4)
        let expected = (1.0f64 - 2.0).exp();
        assert!((sentence_bleu(candidate, reference) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_bleu_clipping() {
        // Repeated unigram is clipped to its reference count
        let (matches, total) = modified_precision(&["the", "the", "the"], &["the", "cat"], 1);
        assert_eq!((matches, total), (1, 3));
    }
}
