use fieldsearch_core::traits::SearchIndex;
use fieldsearch_core::types::{DocKey, Document, Epoch, FileMetadata, WeightSlot};
use fieldsearch_core::{IndexError, QueryError};
use fieldsearch_text::{IndexStore, StoreOptions};

fn memory_store() -> IndexStore {
	IndexStore::open("test", None, StoreOptions::default()).expect("open in-memory store")
}

fn doc(entity: &str, weight0: &str) -> Document {
	Document::new("notes", entity)
		.with_text(WeightSlot::Weight0, weight0)
		.with_metadata(FileMetadata { title: format!("Title {entity}"), uri: format!("app://notes/{entity}"), ..FileMetadata::default() })
}

fn entities(store: &IndexStore, query: &str) -> Vec<String> {
	store.search(query, 50, 0).expect("search").hits.into_iter().map(|h| h.key.entity_id).collect()
}

#[test]
fn index_then_search_returns_metadata() {
	let store = memory_store();
	let document = doc("1", "Quarterly budget review").with_text(WeightSlot::Weight2, "finance planning").with_language("en");
	store.index(&document).expect("index");

	let page = store.search("budget", 10, 0).expect("search");
	assert_eq!(page.total_hits, 1);
	let hit = &page.hits[0];
	assert_eq!(hit.key, DocKey::new("notes", "1"));
	assert_eq!(hit.language, "en");
	assert_eq!(hit.metadata.title, "Title 1");
	assert!(hit.score > 0.0);
	assert_eq!(store.document_count().expect("count"), 1);

	// lower-weight column is searchable too
	assert_eq!(entities(&store, "planning"), vec!["1"]);
}

#[test]
fn reindexing_a_key_replaces_the_document() {
	let store = memory_store();
	store.index(&doc("1", "old words")).expect("index");
	store.index(&doc("1", "new words")).expect("reindex");

	assert!(entities(&store, "old").is_empty());
	assert_eq!(entities(&store, "new"), vec!["1"]);
	assert_eq!(store.document_count().expect("count"), 1);
}

#[test]
fn remove_is_idempotent_and_drops_metadata() {
	let store = memory_store();
	store.remove(&DocKey::new("notes", "never")).expect("removing an unknown key succeeds");

	store.index(&doc("1", "alpha")).expect("index");
	let key = DocKey::new("notes", "1");
	assert!(store.metadata(&key).expect("metadata").is_some());
	store.remove(&key).expect("remove");
	assert!(store.metadata(&key).expect("metadata").is_none());
	assert!(entities(&store, "alpha").is_empty());
}

#[test]
fn reset_destroys_everything() {
	let store = memory_store();
	store.index(&doc("1", "alpha")).expect("index");
	store.index(&doc("2", "beta")).expect("index");
	store.reset().expect("reset");
	assert_eq!(store.document_count().expect("count"), 0);
	assert!(entities(&store, "alpha").is_empty());
	assert!(store.metadata(&DocKey::new("notes", "2")).expect("metadata").is_none());
}

#[test]
fn reset_before_keeps_newer_epochs() {
	let store = memory_store();
	store.index_at(&doc("old", "shared"), Epoch(0)).expect("index");
	store.index_at(&doc("new", "shared"), Epoch(1)).expect("index");
	store.reset_before(Epoch(1)).expect("reset");
	assert_eq!(entities(&store, "shared"), vec!["new"]);
}

#[test]
fn max_epoch_reports_the_newest_stored_stamp() {
	let tmp = tempfile::tempdir().expect("tempdir");
	{
		let store = IndexStore::open("epochs", Some(tmp.path()), StoreOptions::default()).expect("open");
		assert_eq!(store.max_epoch().expect("empty"), None);
		store.index_at(&doc("1", "kept"), Epoch(3)).expect("index");
		store.index_at(&doc("2", "kept"), Epoch(1)).expect("index");
	}
	let store = IndexStore::open("epochs", Some(tmp.path()), StoreOptions::default()).expect("reopen");
	assert_eq!(store.max_epoch().expect("max"), Some(Epoch(3)));
}

#[test]
fn shorter_document_wins_without_boost() {
	let store = memory_store();
	store.index(&doc("a", "alpha beta")).expect("index");
	store.index(&doc("b", "alpha")).expect("index");

	let page = store.search("alpha", 10, 0).expect("search");
	assert_eq!(page.total_hits, 2);
	assert_eq!(page.hits[0].key.entity_id, "b");
	assert!(page.hits[0].score >= page.hits[1].score);
}

#[test]
fn boost_scales_the_final_score() {
	let store = memory_store();
	store.index(&doc("a", "alpha beta").with_boost(2.0)).expect("index");
	store.index(&doc("b", "alpha")).expect("index");
	assert_eq!(entities(&store, "alpha"), vec!["a", "b"]);
}

#[test]
fn higher_weighted_column_ranks_first() {
	let store = memory_store();
	store.index(&Document::new("notes", "low").with_text(WeightSlot::Weight4, "gamma")).expect("index");
	store.index(&Document::new("notes", "high").with_text(WeightSlot::Weight0, "gamma")).expect("index");
	assert_eq!(entities(&store, "gamma"), vec!["high", "low"]);
}

#[test]
fn equal_scores_keep_insertion_order() {
	let store = memory_store();
	for entity in ["first", "second", "third"] {
		store.index(&doc(entity, "same text")).expect("index");
	}
	assert_eq!(entities(&store, "same"), vec!["first", "second", "third"]);
}

#[test]
fn quoted_phrase_requires_adjacency() {
	let store = memory_store();
	store.index(&doc("in-order", "the quick brown fox")).expect("index");
	store.index(&doc("swapped", "the brown quick fox")).expect("index");
	assert_eq!(entities(&store, "\"quick brown\""), vec!["in-order"]);
	assert_eq!(entities(&store, "quick brown").len(), 2);
}

#[test]
fn every_phrase_must_match() {
	let store = memory_store();
	store.index(&doc("both", "alpha gamma")).expect("index");
	store.index(&doc("one", "alpha delta")).expect("index");
	assert_eq!(entities(&store, "alpha gamma"), vec!["both"]);
}

#[test]
fn window_applies_after_ranking() {
	let store = memory_store();
	for i in 0..5 {
		store.index(&doc(&i.to_string(), "paged result")).expect("index");
	}
	let page = store.search("paged", 2, 2).expect("search");
	assert_eq!(page.total_hits, 5);
	let ids: Vec<_> = page.hits.iter().map(|h| h.key.entity_id.as_str()).collect();
	assert_eq!(ids, vec!["2", "3"]);
	assert!(store.search("paged", 10, 10).expect("search").hits.is_empty());
}

#[test]
fn diacritics_and_case_are_folded() {
	let store = memory_store();
	store.index(&doc("1", "Crème Brûlée")).expect("index");
	assert_eq!(entities(&store, "creme BRULEE"), vec!["1"]);
}

#[test]
fn near_miss_yields_suggestions() {
	let store = memory_store();
	store.index(&doc("1", "the fox jumps")).expect("index");
	let page = store.search("jumsp", 10, 0).expect("search");
	assert_eq!(page.total_hits, 0);
	assert!(page.suggestions.iter().any(|s| s.text == "jumps"), "{:?}", page.suggestions);

	let rewritten = store.search("fox jumsp", 10, 0).expect("search");
	assert!(rewritten.suggestions.iter().any(|s| s.text == "fox jumps"));
}

#[test]
fn malformed_queries_are_errors() {
	let store = memory_store();
	assert_eq!(store.search("   ", 10, 0).unwrap_err(), QueryError::Empty);
	assert!(matches!(store.search("\"open", 10, 0), Err(QueryError::UnbalancedQuote { position: 0 })));
}

#[test]
fn invalid_documents_are_rejected() {
	let store = memory_store();
	assert!(matches!(store.index(&doc("", "text")), Err(IndexError::Schema(_))));
	assert!(matches!(store.index(&doc("1", "text").with_boost(-1.0)), Err(IndexError::Schema(_))));
	assert!(matches!(store.index(&doc("1", "text").with_boost(f64::NAN)), Err(IndexError::Schema(_))));
	assert_eq!(store.document_count().expect("count"), 0);
}

#[test]
fn index_names_cannot_escape_the_root() {
	let tmp = tempfile::tempdir().expect("tempdir");
	for name in ["", "../up", "a/b", ".."] {
		assert!(IndexStore::open(name, Some(tmp.path()), StoreOptions::default()).is_err(), "{name}");
	}
}

#[test]
fn persistent_index_survives_reopen() {
	let tmp = tempfile::tempdir().expect("tempdir");
	{
		let store = IndexStore::open("docs", Some(tmp.path()), StoreOptions::default()).expect("open");
		store.index(&doc("1", "durable words")).expect("index");
	}
	let store = IndexStore::open("docs", Some(tmp.path()), StoreOptions::default()).expect("reopen");
	assert_eq!(entities(&store, "durable"), vec!["1"]);
	// rows written after reopening still sort after the older ones on ties
	store.index(&doc("2", "durable words")).expect("index");
	assert_eq!(entities(&store, "durable"), vec!["1", "2"]);
}
