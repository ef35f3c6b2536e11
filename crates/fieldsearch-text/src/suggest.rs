//! Near-miss suggestions from the term dictionaries of the weighted columns.
//!
//! Best-effort: a bounded edit-distance scan, nothing phonetic.
use std::collections::HashMap;

use tantivy::schema::Field;
use tantivy::Searcher;

use fieldsearch_core::types::WEIGHTED_FIELD_COUNT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCandidate {
	pub term: String,
	pub distance: u32,
	pub doc_freq: u32,
}

/// Edit distance between `a` and `b` when it is at most `max`.
///
/// Length difference is a lower bound on the distance, and once every cell
/// of a DP row exceeds `max` the rest cannot come back under it.
pub fn levenshtein_within(a: &str, b: &str, max: usize) -> Option<usize> {
	let b_chars: Vec<char> = b.chars().collect();
	let a_len = a.chars().count();
	if a_len.abs_diff(b_chars.len()) > max {
		return None;
	}
	let mut row: Vec<usize> = (0..=b_chars.len()).collect();
	for (i, ac) in a.chars().enumerate() {
		let mut diagonal = row[0];
		row[0] = i + 1;
		let mut row_min = row[0];
		for (j, bc) in b_chars.iter().enumerate() {
			let above = row[j + 1];
			let cost = usize::from(ac != *bc);
			row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
			diagonal = above;
			row_min = row_min.min(row[j + 1]);
		}
		if row_min > max {
			return None;
		}
	}
	let distance = row[b_chars.len()];
	(distance <= max).then_some(distance)
}

/// Dictionary terms within `max_distance` edits of `word`, excluding `word` itself,
/// ordered by distance, then document frequency (descending), then term.
pub fn dictionary_candidates(
	searcher: &Searcher,
	columns: &[Field; WEIGHTED_FIELD_COUNT],
	word: &str,
	max_distance: usize,
) -> tantivy::Result<Vec<TermCandidate>> {
	let mut found: HashMap<String, (u32, u32)> = HashMap::new();
	for segment_reader in searcher.segment_readers() {
		for field in columns {
			let inverted_index = segment_reader.inverted_index(*field)?;
			let mut stream = inverted_index.terms().stream()?;
			while stream.advance() {
				let Ok(term) = std::str::from_utf8(stream.key()) else {
					continue;
				};
				if term == word {
					continue;
				}
				if let Some(distance) = levenshtein_within(word, term, max_distance) {
					let entry = found.entry(term.to_string()).or_insert((distance as u32, 0));
					entry.1 = entry.1.saturating_add(stream.value().doc_freq);
				}
			}
		}
	}
	let mut candidates: Vec<TermCandidate> = found
		.into_iter()
		.map(|(term, (distance, doc_freq))| TermCandidate { term, distance, doc_freq })
		.collect();
	candidates.sort_by(|a, b| {
		a.distance
			.cmp(&b.distance)
			.then_with(|| b.doc_freq.cmp(&a.doc_freq))
			.then_with(|| a.term.cmp(&b.term))
	});
	Ok(candidates)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_and_single_edits() {
		assert_eq!(levenshtein_within("hello", "hello", 0), Some(0));
		assert_eq!(levenshtein_within("hello", "hallo", 1), Some(1));
		assert_eq!(levenshtein_within("hello", "hell", 1), Some(1));
		assert_eq!(levenshtein_within("hello", "helloo", 1), Some(1));
	}

	#[test]
	fn transposition_costs_two() {
		assert_eq!(levenshtein_within("jumsp", "jumps", 2), Some(2));
		assert_eq!(levenshtein_within("jumsp", "jumps", 1), None);
	}

	#[test]
	fn length_gap_exits_early() {
		assert_eq!(levenshtein_within("a", "abcdef", 2), None);
	}

	#[test]
	fn counts_chars_not_bytes() {
		assert_eq!(levenshtein_within("cafe", "café", 1), Some(1));
	}
}
