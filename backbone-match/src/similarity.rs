//! Edit distances and name similarity scores in the range 0 to 100

use crate::normalize::normalize;
use tracing::trace;

/// Leading letters of an epithet that may differ by one edit at most
const MUST_MATCH: usize = 4;

/// A similarity measure between two strings, 0 (unrelated) to 100 (equal)
pub trait StringSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Turn an edit distance into a percentage of the longer string
pub fn distance_to_similarity(distance: usize, a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100.0;
    }
    (100.0 * (1.0 - distance as f64 / longest as f64)).max(0.0)
}

/// Optimal string alignment: adjacent transpositions count as one edit
pub fn osa_distance(a: &str, b: &str) -> usize {
    strsim::osa_distance(a, b)
}

/// Damerau-Levenshtein distance where a substitution costs
/// `substitution` and insertions, deletions and adjacent transpositions
/// cost one. With a cost of 2 a replaced letter weighs as much as a
/// deletion plus an insertion.
pub fn weighted_damerau_levenshtein(a: &str, b: &str, substitution: usize) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len());
    }

    let width = b.len() + 1;
    let mut matrix = vec![0usize; (a.len() + 1) * width];
    for i in 0..=a.len() {
        matrix[i * width] = i;
    }
    for (j, cell) in matrix.iter_mut().enumerate().take(width) {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { substitution };
            let mut best = (matrix[(i - 1) * width + j] + 1)
                .min(matrix[i * width + j - 1] + 1)
                .min(matrix[(i - 1) * width + j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(matrix[(i - 2) * width + j - 2] + 1);
            }
            matrix[i * width + j] = best;
        }
    }
    matrix[a.len() * width + b.len()]
}

/// Plain Damerau-Levenshtein similarity
#[derive(Debug, Clone, Copy, Default)]
pub struct DamerauLevenshtein;

impl StringSimilarity for DamerauLevenshtein {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        distance_to_similarity(strsim::damerau_levenshtein(a, b), a, b)
    }
}

/// Weighted Damerau-Levenshtein similarity
#[derive(Debug, Clone, Copy)]
pub struct WeightedDamerauLevenshtein {
    pub substitution: usize,
}

impl Default for WeightedDamerauLevenshtein {
    fn default() -> Self {
        Self { substitution: 2 }
    }
}

impl StringSimilarity for WeightedDamerauLevenshtein {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        distance_to_similarity(weighted_damerau_levenshtein(a, b, self.substitution), a, b)
    }
}

/// Epithet-wise similarity of two scientific names.
///
/// Both names are normalized first. Names with the same number of words are
/// compared word by word: the first letter must agree, words shorter than
/// four letters must be equal, the first four letters may differ by one
/// edit and the whole word by two. The genus score is rescaled so that a
/// half-similar genus counts as nothing, and a single unrelated word caps
/// the whole name at 5.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScientificNameSimilarity {
    fallback: WeightedDamerauLevenshtein,
}

impl ScientificNameSimilarity {
    pub fn new() -> Self {
        Self::default()
    }

    fn word_similarity(a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.first() != b.first() {
            return 0.0;
        }

        if a.len() < MUST_MATCH || b.len() < MUST_MATCH {
            return if a == b { 100.0 } else { 0.0 };
        }

        let head_a: String = a[..MUST_MATCH].iter().collect();
        let head_b: String = b[..MUST_MATCH].iter().collect();
        if osa_distance(&head_a, &head_b) > 1 {
            return 0.0;
        }

        let whole_a: String = a.iter().collect();
        let whole_b: String = b.iter().collect();
        match osa_distance(&whole_a, &whole_b) {
            0 => 100.0,
            1 => 90.0,
            2 => 80.0,
            _ => 0.0,
        }
    }
}

impl StringSimilarity for ScientificNameSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 100.0;
        }

        let a = normalize(a);
        let b = normalize(b);
        let words_a: Vec<&str> = a.split(' ').collect();
        let words_b: Vec<&str> = b.split(' ').collect();

        if words_a.len() != words_b.len() {
            let sim = self.fallback.similarity(&a, &b);
            trace!("'{}' is {}% like '{}', word counts differ", a, sim, b);
            return sim;
        }

        let mut bad = false;
        let mut total = 0.0;
        for (i, (wa, wb)) in words_a.iter().zip(&words_b).enumerate() {
            let mut sim = Self::word_similarity(wa, wb);
            if i == 0 {
                sim = (2.0 * sim - 100.0).max(0.0);
            }
            if sim == 0.0 {
                bad = true;
            }
            total += sim;
        }
        let mut overall = total / words_a.len() as f64;
        if bad && overall > 5.0 {
            overall = 5.0;
        }
        trace!("'{}' is {}% like '{}'", a, overall, b);
        overall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_distance_to_similarity() {
        assert_eq!(distance_to_similarity(0, "abc", "abc"), 100.0);
        assert_eq!(distance_to_similarity(1, "abcd", "abc"), 75.0);
        assert_eq!(distance_to_similarity(0, "", ""), 100.0);
        assert_eq!(distance_to_similarity(9, "ab", "cd"), 0.0);
    }

    #[test]
    fn test_weighted_distance() {
        assert_eq!(weighted_damerau_levenshtein("abc", "abc", 2), 0);
        // One substitution costs two, the same as delete plus insert
        assert_eq!(weighted_damerau_levenshtein("abc", "abd", 2), 2);
        assert_eq!(weighted_damerau_levenshtein("abc", "abd", 1), 1);
        assert_eq!(weighted_damerau_levenshtein("abc", "acb", 2), 1);
        assert_eq!(weighted_damerau_levenshtein("abc", "abcd", 2), 1);
        assert_eq!(weighted_damerau_levenshtein("", "abcd", 2), 4);
    }

    #[test]
    fn test_osa_distance() {
        assert_eq!(osa_distance("merula", "meurla"), 1);
        assert_eq!(osa_distance("merula", "merla"), 1);
        assert_eq!(osa_distance("merula", "pilaris"), 7);
    }

    #[rstest]
    #[case("Abies alba", "Abies alba", 100.0)]
    #[case("Abies alba", "Abies albus", 100.0)]
    #[case("Turdus merula", "Turdus merulla", 100.0)]
    #[case("Turdus merula", "Turdus meruda", 95.0)]
    #[case("Turdus merula", "Turdus pilaris", 5.0)]
    #[case("Turdus merula", "Merula merula", 5.0)]
    #[case("Oenanthe", "Oenante", 80.0)]
    #[case("Abies", "Picea", 0.0)]
    fn test_scientific_name_similarity(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        let sim = ScientificNameSimilarity::new();
        assert_eq!(sim.similarity(a, b), expected, "{} vs {}", a, b);
    }

    #[test]
    fn test_different_word_counts_use_whole_name() {
        let sim = ScientificNameSimilarity::new();
        let score = sim.similarity("Abies alba", "Abies alba alba");
        assert!(score > 0.0 && score < 100.0, "{}", score);
    }

    proptest! {
        #[test]
        fn prop_similarity_is_bounded_and_reflexive(a in "[A-Z][a-z]{2,9}( [a-z]{3,9})?", b in "[A-Z][a-z]{2,9}( [a-z]{3,9})?") {
            let sim = ScientificNameSimilarity::new();
            let s = sim.similarity(&a, &b);
            prop_assert!((0.0..=100.0).contains(&s));
            prop_assert_eq!(sim.similarity(&a, &a), 100.0);
        }

        #[test]
        fn prop_weighted_distance_is_symmetric(a in "[a-e]{0,8}", b in "[a-e]{0,8}") {
            prop_assert_eq!(
                weighted_damerau_levenshtein(&a, &b, 2),
                weighted_damerau_levenshtein(&b, &a, 2)
            );
        }
    }
}
