use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::TermQuery;
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::{Language, TextAnalyzer};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::{debug, info, warn};

use fieldsearch_core::config::SearchSettings;
use fieldsearch_core::normalize::normalize;
use fieldsearch_core::traits::{IndexOpener, SearchIndex};
use fieldsearch_core::types::{DocKey, Document, Epoch, FileMetadata, SearchPage, WeightSlot};
use fieldsearch_core::{Error, FieldWeights, IndexError, QueryError};

use crate::tantivy_utils::{build_analyzer, build_schema, register_tokenizer, stemmer_language, SchemaFields};

/// Knobs of one store; usually derived from [`SearchSettings`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
	pub weights: FieldWeights,
	pub writer_heap_bytes: usize,
	pub stemmer: Option<Language>,
	pub suggestion_threshold: usize,
	pub max_suggestions: usize,
	pub suggestion_max_distance: usize,
}

impl Default for StoreOptions {
	fn default() -> Self {
		let settings = SearchSettings::default();
		Self {
			weights: settings.field_weights,
			writer_heap_bytes: settings.writer_heap_bytes,
			stemmer: None,
			suggestion_threshold: settings.suggestion_threshold,
			max_suggestions: settings.max_suggestions,
			suggestion_max_distance: usize::from(settings.suggestion_max_distance),
		}
	}
}

impl StoreOptions {
	pub fn from_settings(settings: &SearchSettings) -> Result<Self, Error> {
		let stemmer = match settings.stemmer_language.as_deref() {
			None => None,
			Some(name) => Some(
				stemmer_language(name).ok_or_else(|| Error::InvalidConfig(format!("unknown stemmer language '{name}'")))?,
			),
		};
		Ok(Self {
			weights: settings.field_weights,
			writer_heap_bytes: settings.writer_heap_bytes,
			stemmer,
			suggestion_threshold: settings.suggestion_threshold,
			max_suggestions: settings.max_suggestions,
			suggestion_max_distance: usize::from(settings.suggestion_max_distance),
		})
	}
}

/// One named full-text index backed by tantivy.
///
/// Every mutation is a single commit: the weighted columns and the display
/// metadata of a key become visible together or not at all.
pub struct IndexStore {
	name: String,
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	writer: Mutex<IndexWriter>,
	pub(crate) fields: SchemaFields,
	pub(crate) analyzer: TextAnalyzer,
	pub(crate) options: StoreOptions,
	next_seq: AtomicU64,
}

impl IndexStore {
	/// Opens (or creates) `<root>/<name>`, or an in-memory index when `root` is `None`.
	pub fn open(name: &str, root: Option<&Path>, options: StoreOptions) -> Result<Self, IndexError> {
		validate_index_name(name)?;
		let schema = build_schema();
		let index = match root {
			Some(root) => {
				let dir = root.join(name);
				std::fs::create_dir_all(&dir).map_err(IndexError::storage)?;
				let directory = MmapDirectory::open(&dir).map_err(IndexError::storage)?;
				Index::open_or_create(directory, schema.clone()).map_err(IndexError::storage)?
			}
			None => Index::create_in_ram(schema.clone()),
		};
		register_tokenizer(&index, options.stemmer);
		let fields = SchemaFields::resolve(&index.schema())?;
		let reader: IndexReader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.map_err(IndexError::storage)?;
		let writer: IndexWriter = index.writer(options.writer_heap_bytes).map_err(IndexError::storage)?;
		let store = Self {
			name: name.to_string(),
			analyzer: build_analyzer(options.stemmer),
			index,
			reader,
			writer: Mutex::new(writer),
			fields,
			options,
			next_seq: AtomicU64::new(0),
		};
		let next_seq = store.fast_u64_bounds("seq")?.map_or(0, |(_, max)| max + 1);
		store.next_seq.store(next_seq, Ordering::SeqCst);
		info!(index = %store.name, persistent = root.is_some(), documents = store.reader.searcher().num_docs(), "Opened index");
		Ok(store)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// The canonical searchable form of `text`.
	pub fn searchable_string(text: &str) -> String {
		normalize(text)
	}

	pub(crate) fn searcher(&self) -> Searcher {
		self.reader.searcher()
	}

	pub fn index_document(&self, document: &Document, epoch: Epoch) -> Result<(), IndexError> {
		document.validate()?;
		let key = document.key.composite();
		self.apply("index", |writer, fields, seq| {
			let metadata = &document.metadata;
			let mut row = doc!(
				fields.key => key.clone(),
				fields.module_id => document.key.module_id.clone(),
				fields.entity_id => document.key.entity_id.clone(),
				fields.language => document.language.clone(),
				fields.boost => document.boost,
				fields.seq => seq,
				fields.epoch => epoch.0,
				fields.title => metadata.title.clone(),
				fields.subtitle => metadata.subtitle.clone(),
				fields.parent_title => metadata.parent_title.clone(),
				fields.uri => metadata.uri.clone(),
				fields.file_type => metadata.file_type.clone(),
				fields.image_uri => metadata.image_uri.clone(),
			);
			for slot in WeightSlot::ALL {
				row.add_text(fields.weighted[slot.index()], normalize(document.text(slot)));
			}
			writer.delete_term(Term::from_field_text(fields.key, &key));
			writer.add_document(row)?;
			Ok(())
		})?;
		debug!(index = %self.name, key = %document.key, epoch = epoch.0, "Indexed document");
		Ok(())
	}

	pub fn remove_document(&self, key: &DocKey) -> Result<(), IndexError> {
		key.validate()?;
		let composite = key.composite();
		self.apply("remove", |writer, fields, _| {
			writer.delete_term(Term::from_field_text(fields.key, &composite));
			Ok(())
		})?;
		debug!(index = %self.name, key = %key, "Removed document");
		Ok(())
	}

	pub fn clear(&self) -> Result<(), IndexError> {
		self.apply("reset", |writer, _, _| {
			writer.delete_all_documents()?;
			Ok(())
		})?;
		info!(index = %self.name, "Reset index");
		Ok(())
	}

	/// Deletes every row stamped with an epoch below `epoch`.
	pub fn clear_before(&self, epoch: Epoch) -> Result<(), IndexError> {
		let Some((floor, _)) = self.fast_u64_bounds("epoch")? else {
			debug!(index = %self.name, epoch = epoch.0, "Reset on empty index");
			return Ok(());
		};
		self.apply("reset", |writer, fields, _| {
			for stale in floor..epoch.0 {
				writer.delete_term(Term::from_field_u64(fields.epoch, stale));
			}
			Ok(())
		})?;
		info!(index = %self.name, epoch = epoch.0, "Reset index");
		Ok(())
	}

	pub fn lookup_metadata(&self, key: &DocKey) -> Result<Option<FileMetadata>, IndexError> {
		let searcher = self.searcher();
		let query = TermQuery::new(Term::from_field_text(self.fields.key, &key.composite()), IndexRecordOption::Basic);
		let top_docs = searcher.search(&query, &TopDocs::with_limit(1)).map_err(IndexError::storage)?;
		let Some((_, address)) = top_docs.first() else {
			return Ok(None);
		};
		let stored: TantivyDocument = searcher.doc(*address).map_err(IndexError::storage)?;
		Ok(Some(self.read_metadata(&stored)))
	}

	pub(crate) fn read_metadata(&self, stored: &TantivyDocument) -> FileMetadata {
		let text = |field: Field| stored.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		FileMetadata {
			title: text(self.fields.title),
			subtitle: text(self.fields.subtitle),
			parent_title: text(self.fields.parent_title),
			uri: text(self.fields.uri),
			file_type: text(self.fields.file_type),
			image_uri: text(self.fields.image_uri),
		}
	}

	pub(crate) fn read_key(&self, stored: &TantivyDocument) -> (DocKey, String) {
		let text = |field: Field| stored.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
		(DocKey::new(text(self.fields.module_id), text(self.fields.entity_id)), text(self.fields.language))
	}

	/// Runs one mutation under the writer lock and commits it, rolling back on failure.
	fn apply<F>(&self, op: &'static str, mutate: F) -> Result<(), IndexError>
	where
		F: FnOnce(&mut IndexWriter, &SchemaFields, u64) -> tantivy::Result<()>,
	{
		let mut writer = self.writer.lock();
		let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
		let outcome = mutate(&mut *writer, &self.fields, seq).and_then(|()| writer.commit().map(|_| ()));
		if let Err(err) = outcome {
			warn!(index = %self.name, op, error = %err, "Mutation failed, rolling back");
			if let Err(rollback) = writer.rollback() {
				warn!(index = %self.name, op, error = %rollback, "Rollback failed");
			}
			return Err(IndexError::storage(err));
		}
		self.reader.reload().map_err(IndexError::storage)
	}

	/// `(min, max)` of a u64 fast column over segments holding live rows.
	fn fast_u64_bounds(&self, column: &str) -> Result<Option<(u64, u64)>, IndexError> {
		let mut bounds: Option<(u64, u64)> = None;
		for segment_reader in self.searcher().segment_readers() {
			if segment_reader.num_docs() == 0 {
				continue;
			}
			let values = segment_reader.fast_fields().u64(column).map_err(IndexError::storage)?;
			let (lo, hi) = (values.min_value(), values.max_value());
			bounds = Some(bounds.map_or((lo, hi), |(min, max)| (min.min(lo), max.max(hi))));
		}
		Ok(bounds)
	}
}

impl SearchIndex for IndexStore {
	fn name(&self) -> &str {
		&self.name
	}

	fn index(&self, document: &Document) -> Result<(), IndexError> {
		self.index_document(document, Epoch::default())
	}

	fn index_at(&self, document: &Document, epoch: Epoch) -> Result<(), IndexError> {
		self.index_document(document, epoch)
	}

	fn remove(&self, key: &DocKey) -> Result<(), IndexError> {
		self.remove_document(key)
	}

	fn reset(&self) -> Result<(), IndexError> {
		self.clear()
	}

	fn reset_before(&self, epoch: Epoch) -> Result<(), IndexError> {
		self.clear_before(epoch)
	}

	fn search(&self, text: &str, limit: usize, offset: usize) -> Result<SearchPage, QueryError> {
		self.search_page(text, limit, offset)
	}

	fn metadata(&self, key: &DocKey) -> Result<Option<FileMetadata>, IndexError> {
		self.lookup_metadata(key)
	}

	fn document_count(&self) -> Result<u64, IndexError> {
		Ok(self.searcher().num_docs())
	}

	fn max_epoch(&self) -> Result<Option<Epoch>, IndexError> {
		Ok(self.fast_u64_bounds("epoch")?.map(|(_, max)| Epoch(max)))
	}
}

fn validate_index_name(name: &str) -> Result<(), IndexError> {
	if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
		return Err(IndexError::schema(format!("invalid index name '{name}'")));
	}
	Ok(())
}

/// Opens named stores under one root directory (or in memory).
#[derive(Debug, Clone)]
pub struct StoreOpener {
	root: Option<PathBuf>,
	options: StoreOptions,
}

impl StoreOpener {
	pub fn new(root: Option<PathBuf>, options: StoreOptions) -> Self {
		Self { root, options }
	}

	pub fn in_memory(options: StoreOptions) -> Self {
		Self { root: None, options }
	}

	pub fn from_settings(settings: &SearchSettings) -> Result<Self, Error> {
		Ok(Self::new(settings.index_root_path(), StoreOptions::from_settings(settings)?))
	}
}

impl IndexOpener for StoreOpener {
	fn open(&self, name: &str) -> Result<Arc<dyn SearchIndex>, IndexError> {
		let store = IndexStore::open(name, self.root.as_deref(), self.options.clone())?;
		Ok(Arc::new(store))
	}
}
