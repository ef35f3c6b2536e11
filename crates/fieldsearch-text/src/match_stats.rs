//! Per-phrase, per-column statistics read from the inverted index.
//!
//! Hits come from the postings of the phrase terms. A multi-term phrase
//! hits at every start position where each following term sits at the
//! same relative offset it had in the query. Deleted documents are
//! skipped everywhere so counts describe live rows only.
use std::collections::BTreeMap;

use tantivy::fieldnorm::FieldNormReader;
use tantivy::postings::{Postings, SegmentPostings};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::{DocId, DocSet, Searcher, SegmentReader, Term, TERMINATED};

use fieldsearch_core::stats::PhraseColumnStats;
use fieldsearch_core::types::WEIGHTED_FIELD_COUNT;

use crate::query::AnalyzedPhrase;

/// Address of a row: segment ordinal and segment-local doc id.
pub type RowAddress = (u32, DocId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnTotals {
	pub hits_in_all_rows: u64,
	pub rows_with_hit: u32,
}

/// Hits of every phrase in every weighted column across the live index.
#[derive(Debug, Default)]
pub struct PhraseScan {
	pub rows: BTreeMap<RowAddress, Vec<[u32; WEIGHTED_FIELD_COUNT]>>,
	pub totals: Vec<[ColumnTotals; WEIGHTED_FIELD_COUNT]>,
}

impl PhraseScan {
	pub fn collect(searcher: &Searcher, columns: &[Field; WEIGHTED_FIELD_COUNT], phrases: &[AnalyzedPhrase]) -> tantivy::Result<Self> {
		let mut scan = PhraseScan { rows: BTreeMap::new(), totals: vec![[ColumnTotals::default(); WEIGHTED_FIELD_COUNT]; phrases.len()] };
		for (segment_ord, segment_reader) in searcher.segment_readers().iter().enumerate() {
			let segment_ord = segment_ord as u32;
			for (phrase_idx, phrase) in phrases.iter().enumerate() {
				for (column, field) in columns.iter().enumerate() {
					for (doc, hits) in phrase_hits(segment_reader, *field, &phrase.terms)? {
						let row = scan
							.rows
							.entry((segment_ord, doc))
							.or_insert_with(|| vec![[0; WEIGHTED_FIELD_COUNT]; phrases.len()]);
						row[phrase_idx][column] = hits;
						let totals = &mut scan.totals[phrase_idx][column];
						totals.hits_in_all_rows += u64::from(hits);
						totals.rows_with_hit += 1;
					}
				}
			}
		}
		Ok(scan)
	}

	/// Rows where every phrase hits at least one column.
	pub fn candidates(&self) -> impl Iterator<Item = (&RowAddress, &Vec<[u32; WEIGHTED_FIELD_COUNT]>)> {
		self.rows
			.iter()
			.filter(|(_, phrases)| phrases.iter().all(|columns| columns.iter().any(|&hits| hits > 0)))
	}

	/// Whether phrase `phrase_idx` hit any live row at all.
	pub fn phrase_matched(&self, phrase_idx: usize) -> bool {
		self.totals
			.get(phrase_idx)
			.is_some_and(|columns| columns.iter().any(|c| c.rows_with_hit > 0))
	}

	pub fn cells(&self, row: &[[u32; WEIGHTED_FIELD_COUNT]], phrase_idx: usize) -> [PhraseColumnStats; WEIGHTED_FIELD_COUNT] {
		std::array::from_fn(|column| {
			let totals = self.totals[phrase_idx][column];
			PhraseColumnStats {
				hits_in_row: row[phrase_idx][column],
				hits_in_all_rows: u32::try_from(totals.hits_in_all_rows).unwrap_or(u32::MAX),
				rows_with_hit: totals.rows_with_hit,
			}
		})
	}
}

/// Live hit counts of one phrase in one column of one segment.
pub fn phrase_hits(segment_reader: &SegmentReader, field: Field, terms: &[(u32, String)]) -> tantivy::Result<Vec<(DocId, u32)>> {
	let inverted_index = segment_reader.inverted_index(field)?;
	let mut postings: Vec<SegmentPostings> = Vec::with_capacity(terms.len());
	for (_, text) in terms {
		let term = Term::from_field_text(field, text);
		match inverted_index.read_postings(&term, IndexRecordOption::WithFreqsAndPositions)? {
			Some(p) => postings.push(p),
			None => return Ok(Vec::new()),
		}
	}
	let Some((lead, rest)) = postings.split_first_mut() else {
		return Ok(Vec::new());
	};
	let lead_offset = terms.first().map_or(0, |(offset, _)| *offset);
	let offsets: Vec<u32> = terms.iter().skip(1).map(|(offset, _)| offset.saturating_sub(lead_offset)).collect();
	let mut lead_positions = Vec::new();
	let mut other_positions = Vec::new();
	let mut hits = Vec::new();
	let mut doc = lead.doc();
	while doc != TERMINATED {
		if !segment_reader.is_deleted(doc) {
			let count = if rest.is_empty() {
				lead.term_freq()
			} else {
				aligned_hits(doc, lead, rest, &offsets, &mut lead_positions, &mut other_positions)
			};
			if count > 0 {
				hits.push((doc, count));
			}
		}
		doc = lead.advance();
	}
	Ok(hits)
}

fn aligned_hits(
	doc: DocId,
	lead: &mut SegmentPostings,
	rest: &mut [SegmentPostings],
	offsets: &[u32],
	starts: &mut Vec<u32>,
	positions: &mut Vec<u32>,
) -> u32 {
	for postings in rest.iter_mut() {
		// seek may only move forward
		if postings.doc() < doc {
			postings.seek(doc);
		}
		if postings.doc() != doc {
			return 0;
		}
	}
	starts.clear();
	lead.positions(starts);
	for (postings, offset) in rest.iter_mut().zip(offsets) {
		positions.clear();
		postings.positions(positions);
		starts.retain(|start| positions.binary_search(&(start + offset)).is_ok());
		if starts.is_empty() {
			return 0;
		}
	}
	starts.len() as u32
}

/// Word counts per weighted column, from the field norms.
pub struct ColumnNorms {
	readers: Vec<[FieldNormReader; WEIGHTED_FIELD_COUNT]>,
	pub averages: [u32; WEIGHTED_FIELD_COUNT],
	pub live_rows: u32,
}

impl ColumnNorms {
	pub fn collect(searcher: &Searcher, columns: &[Field; WEIGHTED_FIELD_COUNT]) -> tantivy::Result<Self> {
		let mut readers = Vec::with_capacity(searcher.segment_readers().len());
		let mut sums = [0u64; WEIGHTED_FIELD_COUNT];
		let mut live_rows = 0u64;
		for segment_reader in searcher.segment_readers() {
			let mut segment_norms = Vec::with_capacity(WEIGHTED_FIELD_COUNT);
			for field in columns {
				segment_norms.push(segment_reader.get_fieldnorms_reader(*field)?);
			}
			for doc in 0..segment_reader.max_doc() {
				if segment_reader.is_deleted(doc) {
					continue;
				}
				live_rows += 1;
				for (sum, norms) in sums.iter_mut().zip(&segment_norms) {
					*sum += u64::from(norms.fieldnorm(doc));
				}
			}
			let segment_norms: [FieldNormReader; WEIGHTED_FIELD_COUNT] = segment_norms
				.try_into()
				.map_err(|_| tantivy::TantivyError::InternalError("field norm reader count mismatch".into()))?;
			readers.push(segment_norms);
		}
		let averages = sums.map(|sum| if live_rows == 0 { 0 } else { u32::try_from(sum / live_rows).unwrap_or(u32::MAX) });
		Ok(Self { readers, averages, live_rows: u32::try_from(live_rows).unwrap_or(u32::MAX) })
	}

	pub fn row_words(&self, (segment_ord, doc): RowAddress) -> [u32; WEIGHTED_FIELD_COUNT] {
		match self.readers.get(segment_ord as usize) {
			Some(norms) => std::array::from_fn(|column| norms[column].fieldnorm(doc)),
			None => [0; WEIGHTED_FIELD_COUNT],
		}
	}
}
