use std::cmp::Ordering;

use tantivy::{DocAddress, TantivyDocument};
use tracing::debug;

use fieldsearch_core::rank::rank;
use fieldsearch_core::stats::{FieldStats, FieldStatsBuilder};
use fieldsearch_core::types::{ScoredDocument, SearchPage, Suggestion};
use fieldsearch_core::QueryError;

use crate::index::IndexStore;
use crate::match_stats::{ColumnNorms, PhraseScan, RowAddress};
use crate::query::{analyze_phrases, parse_query, rewrite_query, AnalyzedPhrase};
use crate::suggest::dictionary_candidates;

struct RankedRow {
	address: RowAddress,
	score: f64,
	seq: u64,
}

impl IndexStore {
	/// Ranked window `[offset, offset + limit)` of the documents matching `text`.
	///
	/// Every candidate gets a field statistics buffer and is scored by the
	/// ranking engine; ties keep insertion order. Suggestions are attached
	/// when fewer than `suggestion_threshold` documents match.
	pub fn search_page(&self, text: &str, limit: usize, offset: usize) -> Result<SearchPage, QueryError> {
		let mut analyzer = self.analyzer.clone();
		let phrases = analyze_phrases(&mut analyzer, parse_query(text)?)?;
		let searcher = self.searcher();
		let scan = PhraseScan::collect(&searcher, &self.fields.weighted, &phrases).map_err(QueryError::storage)?;
		let norms = ColumnNorms::collect(&searcher, &self.fields.weighted).map_err(QueryError::storage)?;

		let segment_readers = searcher.segment_readers();
		let mut boosts = Vec::with_capacity(segment_readers.len());
		let mut seqs = Vec::with_capacity(segment_readers.len());
		for segment_reader in segment_readers {
			let fast_fields = segment_reader.fast_fields();
			boosts.push(fast_fields.f64("boost").map_err(QueryError::storage)?);
			seqs.push(fast_fields.u64("seq").map_err(QueryError::storage)?);
		}

		let mut ranked = Vec::new();
		for (&address, row) in scan.candidates() {
			let (segment_ord, doc) = address;
			let mut builder = FieldStatsBuilder::new(norms.live_rows, norms.averages, norms.row_words(address));
			for phrase_idx in 0..phrases.len() {
				builder.push_phrase(&scan.cells(row, phrase_idx));
			}
			let buffer = builder.finish();
			let stats = FieldStats::parse(&buffer)?;
			let boost = boosts[segment_ord as usize].first(doc).unwrap_or(1.0);
			let seq = seqs[segment_ord as usize].first(doc).unwrap_or(u64::MAX);
			ranked.push(RankedRow { address, score: rank(&stats, boost, &self.options.weights), seq });
		}
		ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then(a.seq.cmp(&b.seq)));

		let total_hits = ranked.len();
		let mut hits = Vec::with_capacity(limit.min(total_hits.saturating_sub(offset)));
		for row in ranked.iter().skip(offset).take(limit) {
			let (segment_ord, doc) = row.address;
			let stored: TantivyDocument = searcher.doc(DocAddress::new(segment_ord, doc)).map_err(QueryError::storage)?;
			let (key, language) = self.read_key(&stored);
			hits.push(ScoredDocument { key, score: row.score, language, metadata: self.read_metadata(&stored) });
		}

		let suggestions = if total_hits < self.options.suggestion_threshold {
			self.suggest(&searcher, &scan, &phrases)?
		} else {
			Vec::new()
		};
		debug!(index = %self.name(), query = text, total_hits, returned = hits.len(), suggestions = suggestions.len(), "Search finished");
		Ok(SearchPage { hits, suggestions, total_hits })
	}

	/// Rewrites of the query where one unmatched word is swapped for a close dictionary term.
	fn suggest(&self, searcher: &tantivy::Searcher, scan: &PhraseScan, phrases: &[AnalyzedPhrase]) -> Result<Vec<Suggestion>, QueryError> {
		if self.options.max_suggestions == 0 {
			return Ok(Vec::new());
		}
		let mut proposals: Vec<(u32, u32, String)> = Vec::new();
		for (phrase_idx, phrase) in phrases.iter().enumerate() {
			if scan.phrase_matched(phrase_idx) {
				continue;
			}
			let Some(word) = phrase.single_term() else {
				continue;
			};
			let candidates = dictionary_candidates(searcher, &self.fields.weighted, word, self.options.suggestion_max_distance)
				.map_err(QueryError::storage)?;
			for candidate in candidates.into_iter().take(self.options.max_suggestions) {
				proposals.push((candidate.distance, candidate.doc_freq, rewrite_query(phrases, phrase_idx, &candidate.term)));
			}
		}
		proposals.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then_with(|| a.2.cmp(&b.2)));
		proposals.dedup_by(|a, b| a.2 == b.2);
		Ok(proposals
			.into_iter()
			.take(self.options.max_suggestions)
			.map(|(distance, _, text)| Suggestion { text, distance })
			.collect())
	}
}
