//! Schema and analyzer shared by every named index.
//!
//! Five weighted text columns carry positions and field norms so that
//! phrase statistics can be read straight from the postings. Display
//! metadata lives in stored-only fields of the same document.
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED, STRING};
use tantivy::tokenizer::{AsciiFoldingFilter, Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream};
use tantivy::Index;

use fieldsearch_core::types::{WeightSlot, WEIGHTED_FIELD_COUNT};
use fieldsearch_core::IndexError;

pub const ANALYZER_NAME: &str = "fieldsearch";
const MAX_TOKEN_LEN: usize = 40;

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("key", STRING);
	schema_builder.add_text_field("module_id", STRING | STORED);
	schema_builder.add_text_field("entity_id", STRING | STORED);
	schema_builder.add_text_field("language", STRING | STORED);
	schema_builder.add_f64_field("boost", FAST | STORED);
	schema_builder.add_u64_field("seq", FAST);
	schema_builder.add_u64_field("epoch", INDEXED | FAST);
	let weighted_indexing = TextFieldIndexing::default()
		.set_tokenizer(ANALYZER_NAME)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions)
		.set_fieldnorms(true);
	let weighted_options = TextOptions::default().set_indexing_options(weighted_indexing);
	for slot in WeightSlot::ALL {
		schema_builder.add_text_field(slot.column_name(), weighted_options.clone());
	}
	for name in ["title", "subtitle", "parent_title", "uri", "file_type", "image_uri"] {
		schema_builder.add_text_field(name, STORED);
	}
	schema_builder.build()
}

/// Field handles resolved once per opened index.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
	pub key: Field,
	pub module_id: Field,
	pub entity_id: Field,
	pub language: Field,
	pub boost: Field,
	pub seq: Field,
	pub epoch: Field,
	pub weighted: [Field; WEIGHTED_FIELD_COUNT],
	pub title: Field,
	pub subtitle: Field,
	pub parent_title: Field,
	pub uri: Field,
	pub file_type: Field,
	pub image_uri: Field,
}

impl SchemaFields {
	pub fn resolve(schema: &Schema) -> Result<Self, IndexError> {
		let field = |name: &str| schema.get_field(name).map_err(|e| IndexError::schema(format!("missing field '{name}': {e}")));
		let mut weighted = Vec::with_capacity(WEIGHTED_FIELD_COUNT);
		for slot in WeightSlot::ALL {
			weighted.push(field(slot.column_name())?);
		}
		let weighted: [Field; WEIGHTED_FIELD_COUNT] = weighted
			.try_into()
			.map_err(|_| IndexError::schema("weighted column count mismatch"))?;
		Ok(Self {
			key: field("key")?,
			module_id: field("module_id")?,
			entity_id: field("entity_id")?,
			language: field("language")?,
			boost: field("boost")?,
			seq: field("seq")?,
			epoch: field("epoch")?,
			weighted,
			title: field("title")?,
			subtitle: field("subtitle")?,
			parent_title: field("parent_title")?,
			uri: field("uri")?,
			file_type: field("file_type")?,
			image_uri: field("image_uri")?,
		})
	}
}

pub fn build_analyzer(stemmer: Option<Language>) -> TextAnalyzer {
	match stemmer {
		Some(language) => TextAnalyzer::builder(SimpleTokenizer::default())
			.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
			.filter(LowerCaser)
			.filter(AsciiFoldingFilter)
			.filter(Stemmer::new(language))
			.build(),
		None => TextAnalyzer::builder(SimpleTokenizer::default())
			.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
			.filter(LowerCaser)
			.filter(AsciiFoldingFilter)
			.build(),
	}
}

pub fn register_tokenizer(index: &Index, stemmer: Option<Language>) {
	index.tokenizers().register(ANALYZER_NAME, build_analyzer(stemmer));
}

/// Maps a configured stemmer name (case-insensitive, English names) to a tantivy language.
pub fn stemmer_language(name: &str) -> Option<Language> {
	let language = match name.trim().to_ascii_lowercase().as_str() {
		"arabic" => Language::Arabic,
		"danish" => Language::Danish,
		"dutch" => Language::Dutch,
		"english" => Language::English,
		"finnish" => Language::Finnish,
		"french" => Language::French,
		"german" => Language::German,
		"greek" => Language::Greek,
		"hungarian" => Language::Hungarian,
		"italian" => Language::Italian,
		"norwegian" => Language::Norwegian,
		"portuguese" => Language::Portuguese,
		"romanian" => Language::Romanian,
		"russian" => Language::Russian,
		"spanish" => Language::Spanish,
		"swedish" => Language::Swedish,
		"tamil" => Language::Tamil,
		"turkish" => Language::Turkish,
		_ => return None,
	};
	Some(language)
}

/// Runs `text` through the analyzer, returning `(position, token)` pairs.
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str) -> Vec<(u32, String)> {
	let mut tokens = Vec::new();
	let mut stream = analyzer.token_stream(text);
	while stream.advance() {
		let token = stream.token();
		tokens.push((token.position as u32, token.text.clone()));
	}
	tokens
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_resolves_every_field() {
		let schema = build_schema();
		let fields = SchemaFields::resolve(&schema).expect("fields");
		assert_eq!(schema.get_field_name(fields.weighted[4]), "weight4");
	}

	#[test]
	fn analyzer_folds_and_drops_long_tokens() {
		let mut analyzer = build_analyzer(None);
		let long = "x".repeat(60);
		let tokens = analyze(&mut analyzer, &format!("Café {long} Résumé"));
		let words: Vec<_> = tokens.iter().map(|(_, t)| t.as_str()).collect();
		assert_eq!(words, vec!["cafe", "resume"]);
	}

	#[test]
	fn stemmer_names_are_case_insensitive() {
		assert_eq!(stemmer_language("English"), Some(Language::English));
		assert_eq!(stemmer_language("klingon"), None);
	}
}
