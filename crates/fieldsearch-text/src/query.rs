//! Query text to phrases.
//!
//! Bare words are single-word phrases, `"double quoted"` spans are
//! multi-word phrases. Every phrase must match somewhere in the weighted
//! columns of a document for it to be a candidate.
use fieldsearch_core::normalize::normalize;
use fieldsearch_core::QueryError;
use tantivy::tokenizer::TextAnalyzer;

use crate::tantivy_utils::analyze;

/// A normalized query phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
	pub text: String,
	pub quoted: bool,
}

/// A phrase after analysis: terms with their offset from the first term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedPhrase {
	pub phrase: Phrase,
	pub terms: Vec<(u32, String)>,
}

impl AnalyzedPhrase {
	pub fn single_term(&self) -> Option<&str> {
		match self.terms.as_slice() {
			[(_, term)] => Some(term.as_str()),
			_ => None,
		}
	}
}

pub fn parse_query(text: &str) -> Result<Vec<Phrase>, QueryError> {
	let mut phrases = Vec::new();
	let mut rest = text;
	let mut consumed = 0;
	while let Some(open) = rest.find('"') {
		push_bare_words(&rest[..open], &mut phrases);
		let after = &rest[open + 1..];
		let Some(close) = after.find('"') else {
			return Err(QueryError::UnbalancedQuote { position: consumed + open });
		};
		let normalized = normalize(&after[..close]);
		if !normalized.is_empty() {
			phrases.push(Phrase { text: normalized, quoted: true });
		}
		consumed += open + 1 + close + 1;
		rest = &after[close + 1..];
	}
	push_bare_words(rest, &mut phrases);
	if phrases.is_empty() {
		return Err(QueryError::Empty);
	}
	Ok(phrases)
}

fn push_bare_words(segment: &str, phrases: &mut Vec<Phrase>) {
	for word in segment.split_whitespace() {
		let normalized = normalize(word);
		if !normalized.is_empty() {
			phrases.push(Phrase { text: normalized, quoted: false });
		}
	}
}

/// Analyzes every phrase, dropping the ones that produce no index terms.
pub fn analyze_phrases(analyzer: &mut TextAnalyzer, phrases: Vec<Phrase>) -> Result<Vec<AnalyzedPhrase>, QueryError> {
	let analyzed: Vec<AnalyzedPhrase> = phrases
		.into_iter()
		.filter_map(|phrase| {
			let tokens = analyze(analyzer, &phrase.text);
			let base = tokens.first()?.0;
			let terms = tokens.into_iter().map(|(pos, term)| (pos - base, term)).collect();
			Some(AnalyzedPhrase { phrase, terms })
		})
		.collect();
	if analyzed.is_empty() {
		return Err(QueryError::Empty);
	}
	Ok(analyzed)
}

/// Renders phrases back to query syntax, replacing phrase `index` with `replacement`.
pub fn rewrite_query(phrases: &[AnalyzedPhrase], index: usize, replacement: &str) -> String {
	phrases
		.iter()
		.enumerate()
		.map(|(i, analyzed)| {
			let text = if i == index { replacement } else { analyzed.phrase.text.as_str() };
			if text.contains(' ') { format!("\"{text}\"") } else { text.to_string() }
		})
		.collect::<Vec<_>>()
		.join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tantivy_utils::build_analyzer;

	#[test]
	fn bare_words_and_quoted_phrases() {
		let phrases = parse_query(r#"Alpha "Quick  Brown" beta"#).expect("parse");
		let texts: Vec<_> = phrases.iter().map(|p| (p.text.as_str(), p.quoted)).collect();
		assert_eq!(texts, vec![("alpha", false), ("quick brown", true), ("beta", false)]);
	}

	#[test]
	fn unbalanced_quote_reports_its_position() {
		assert_eq!(parse_query(r#"ok "fine" "open"#), Err(QueryError::UnbalancedQuote { position: 10 }));
	}

	#[test]
	fn punctuation_only_is_empty() {
		assert_eq!(parse_query("  ?! \"\" "), Err(QueryError::Empty));
		assert_eq!(parse_query(""), Err(QueryError::Empty));
	}

	#[test]
	fn analysis_keeps_relative_offsets() {
		let mut analyzer = build_analyzer(None);
		let phrases = parse_query("\"one two three\"").expect("parse");
		let analyzed = analyze_phrases(&mut analyzer, phrases).expect("analyze");
		assert_eq!(analyzed[0].terms, vec![(0, "one".into()), (1, "two".into()), (2, "three".into())]);
	}

	#[test]
	fn rewrite_quotes_multi_word_phrases() {
		let mut analyzer = build_analyzer(None);
		let analyzed = analyze_phrases(&mut analyzer, parse_query("\"red fox\" jumsp").expect("parse")).expect("analyze");
		assert_eq!(rewrite_query(&analyzed, 1, "jumps"), "\"red fox\" jumps");
	}
}
