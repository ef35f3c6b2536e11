//! BM25F relevance over a [`FieldStats`] buffer.
//!
//! Per phrase and column an IDF and a length-normalised term frequency are
//! computed. IDF is averaged over the five columns, term frequency is
//! combined through the field weights, and phrases are summed with
//! saturation:
//!
//! ```text
//! score = Σ_phrases (tf / (tf + K)) * idf
//! ```

use serde::{Deserialize, Serialize};

use crate::stats::FieldStats;
use crate::types::WEIGHTED_FIELD_COUNT;

/// Length normalisation strength.
pub const LENGTH_NORMALIZATION_B: f64 = 0.4;
/// Term frequency saturation.
pub const SATURATION_K: f64 = 1.7;

/// Static per-column weights, shared by every document of an index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldWeights(pub [f64; WEIGHTED_FIELD_COUNT]);

impl Default for FieldWeights {
    fn default() -> Self {
        Self([2.0, 1.5, 1.0, 0.75, 0.5])
    }
}

impl FieldWeights {
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|w| w.is_finite() && *w >= 0.0)
    }
}

pub fn inverse_document_frequency(total_rows: u32, rows_with_hit: u32) -> f64 {
    if total_rows < 1 {
        return 0.0;
    }
    let total = f64::from(total_rows);
    let hit = f64::from(rows_with_hit);
    ((total - hit + 0.5) / (hit + 0.5)).ln()
}

pub fn normalized_term_frequency(hits: u32, field_len: u32, avg_field_len: u32, b: f64) -> f64 {
    if field_len == 0 {
        return 0.0;
    }
    let avg = f64::from(avg_field_len.max(1));
    f64::from(hits) / (1.0 + b * (f64::from(field_len) / avg - 1.0))
}

pub fn document_term_frequency(
    weights: &FieldWeights,
    field_tfs: &[f64; WEIGHTED_FIELD_COUNT],
) -> f64 {
    weights.0.iter().zip(field_tfs).map(|(w, tf)| w * tf).sum()
}

pub fn bm25f(term_frequencies: &[f64], idfs: &[f64], saturation: f64) -> f64 {
    term_frequencies
        .iter()
        .zip(idfs)
        .map(|(tf, idf)| tf / (tf + saturation) * idf)
        .sum()
}

/// BM25F score of one row. Pure: identical inputs give identical output.
pub fn score(stats: &FieldStats<'_>, weights: &FieldWeights) -> f64 {
    let phrases = stats.phrase_count();
    let mut tfs = Vec::with_capacity(phrases);
    let mut idfs = Vec::with_capacity(phrases);
    for phrase in (0..phrases).filter_map(|p| stats.phrase(p)) {
        let mut field_tfs = [0.0; WEIGHTED_FIELD_COUNT];
        let mut idf_sum = 0.0;
        for (column, cell) in phrase.iter().enumerate() {
            idf_sum += inverse_document_frequency(stats.row_count(), cell.rows_with_hit);
            field_tfs[column] = normalized_term_frequency(
                cell.hits_in_row,
                stats.row_words(column),
                stats.average_words(column),
                LENGTH_NORMALIZATION_B,
            );
        }
        idfs.push(idf_sum / WEIGHTED_FIELD_COUNT as f64);
        tfs.push(document_term_frequency(weights, &field_tfs));
    }
    bm25f(&tfs, &idfs, SATURATION_K)
}

/// Final relevance of a row: the BM25F score scaled by the document boost.
pub fn rank(stats: &FieldStats<'_>, boost: f64, weights: &FieldWeights) -> f64 {
    score(stats, weights) * boost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{FieldStatsBuilder, PhraseColumnStats};

    fn single_phrase(row_count: u32, avg: [u32; 5], words: [u32; 5], cells: [PhraseColumnStats; 5]) -> Vec<u32> {
        let mut builder = FieldStatsBuilder::new(row_count, avg, words);
        builder.push_phrase(&cells);
        builder.finish()
    }

    fn hit(hits_in_row: u32, rows_with_hit: u32) -> PhraseColumnStats {
        PhraseColumnStats { hits_in_row, hits_in_all_rows: hits_in_row, rows_with_hit }
    }

    #[test]
    fn idf_is_zero_for_an_empty_index() {
        assert_eq!(inverse_document_frequency(0, 0), 0.0);
        assert_eq!(inverse_document_frequency(0, 5), 0.0);
    }

    #[test]
    fn idf_matches_closed_form() {
        let idf = inverse_document_frequency(10, 2);
        assert!((idf - (8.5f64 / 2.5).ln()).abs() < 1e-12);
    }

    #[test]
    fn term_frequency_boundaries() {
        assert_eq!(normalized_term_frequency(3, 0, 10, 0.4), 0.0);
        // A zero average is treated as one word.
        let tf = normalized_term_frequency(1, 2, 0, 0.4);
        assert!((tf - 1.0 / 1.4).abs() < 1e-12);
        // Average-length fields are not penalised.
        assert!((normalized_term_frequency(2, 5, 5, 0.4) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_query_scores_zero() {
        let buf = FieldStatsBuilder::new(3, [1; 5], [1; 5]).finish();
        let stats = FieldStats::parse(&buf).expect("valid");
        assert_eq!(score(&stats, &FieldWeights::default()), 0.0);
    }

    #[test]
    fn shorter_field_scores_higher_for_same_hit() {
        let empty = PhraseColumnStats::default();
        let long = single_phrase(4, [2; 5], [6, 0, 0, 0, 0], [hit(1, 1), empty, empty, empty, empty]);
        let short = single_phrase(4, [2; 5], [1, 0, 0, 0, 0], [hit(1, 1), empty, empty, empty, empty]);
        let weights = FieldWeights::default();
        let long = score(&FieldStats::parse(&long).expect("valid"), &weights);
        let short = score(&FieldStats::parse(&short).expect("valid"), &weights);
        assert!(short > long, "short={short} long={long}");
    }

    #[test]
    fn boost_multiplies_final_score() {
        let empty = PhraseColumnStats::default();
        let buf = single_phrase(10, [3; 5], [3, 0, 0, 0, 0], [hit(2, 1), empty, empty, empty, empty]);
        let stats = FieldStats::parse(&buf).expect("valid");
        let weights = FieldWeights::default();
        let base = rank(&stats, 1.0, &weights);
        assert!(base > 0.0);
        assert!((rank(&stats, 2.5, &weights) - 2.5 * base).abs() < 1e-12);
        assert_eq!(rank(&stats, 0.0, &weights), 0.0);
    }

    #[test]
    fn zero_weights_and_zero_hits_do_not_divide_by_zero() {
        let empty = PhraseColumnStats::default();
        let buf = single_phrase(5, [0; 5], [0; 5], [empty; 5]);
        let stats = FieldStats::parse(&buf).expect("valid");
        let s = score(&stats, &FieldWeights([0.0; 5]));
        assert_eq!(s, 0.0);
    }
}
