use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use fieldsearch_core::config::SearchSettings;
use fieldsearch_core::traits::{
    AuxiliarySurface, BackupSearch, FavoriteLookup, IndexListener, IndexOpener, RemoteSearch, SearchIndex,
};
use fieldsearch_core::types::{
    DocKey, Document, FileMetadata, ResultSource, SearchRequest, SearchResponse, SearchResult,
};
use fieldsearch_core::{Error, RemoteSearchError, Result};
use fieldsearch_text::StoreOpener;

use crate::executor::TaskExecutor;
use crate::ledger::{Applied, MutationLedger, MutationStamp};
use crate::spool;
use crate::task::{completion, Task, TaskCompleter, TaskDescriptor, TaskHandle, TaskId, TaskKind, TaskOutcome};

pub type RemoteCompletion =
    Box<dyn FnOnce(std::result::Result<Vec<SearchResult>, RemoteSearchError>) + Send + 'static>;
type SearchCompletion = Box<dyn FnOnce(Result<SearchResponse>) + Send + 'static>;

/// One element of a bulk index request.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSource {
    /// Path, relative to the spool directory, of a file written by
    /// [`spool::save_index_file_info`].
    Spooled(PathBuf),
    Inline(Document),
}

struct IndexSlot {
    index: Arc<dyn SearchIndex>,
    ledger: MutationLedger,
}

#[derive(Clone, Default)]
struct Collaborators {
    favorites: Option<Arc<dyn FavoriteLookup>>,
    remote: Option<Arc<dyn RemoteSearch>>,
    backup: Option<Arc<dyn BackupSearch>>,
    auxiliary: Option<Arc<dyn AuxiliarySurface>>,
    listener: Option<Arc<dyn IndexListener>>,
}

impl Collaborators {
    fn auxiliary_identifier(&self, key: &DocKey, metadata: &FileMetadata) -> Option<String> {
        self.auxiliary
            .as_ref()
            .map(|auxiliary| auxiliary.identifier(&key.entity_id, &key.module_id, metadata))
    }

    /// Each result is looked up exactly once.
    fn decorate(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        results
            .into_iter()
            .map(|mut result| {
                result.is_favorited = self.favorites.as_ref().is_some_and(|f| f.is_favorited(&result));
                result
            })
            .collect()
    }
}

struct Inner {
    executor: Arc<dyn TaskExecutor>,
    opener: Arc<dyn IndexOpener>,
    indexes: DashMap<String, Arc<IndexSlot>>,
    collaborators: Collaborators,
    settings: SearchSettings,
    runtime: Handle,
}

/// Entry point for indexing and searching named indexes.
///
/// Mutations and searches are shaped into prioritised tasks and handed to
/// the configured [`TaskExecutor`]. Remote fusion and timeouts run on the
/// tokio runtime the orchestrator was built in.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

pub struct OrchestratorBuilder {
    executor: Arc<dyn TaskExecutor>,
    opener: Option<Arc<dyn IndexOpener>>,
    collaborators: Collaborators,
    settings: SearchSettings,
    runtime: Option<Handle>,
}

impl OrchestratorBuilder {
    pub fn settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Overrides the default tantivy-backed opener derived from the settings.
    pub fn opener(mut self, opener: Arc<dyn IndexOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn favorites(mut self, favorites: Arc<dyn FavoriteLookup>) -> Self {
        self.collaborators.favorites = Some(favorites);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteSearch>) -> Self {
        self.collaborators.remote = Some(remote);
        self
    }

    pub fn backup(mut self, backup: Arc<dyn BackupSearch>) -> Self {
        self.collaborators.backup = Some(backup);
        self
    }

    pub fn auxiliary(mut self, auxiliary: Arc<dyn AuxiliarySurface>) -> Self {
        self.collaborators.auxiliary = Some(auxiliary);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn IndexListener>) -> Self {
        self.collaborators.listener = Some(listener);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<SearchOrchestrator> {
        self.settings.validate()?;
        let opener = match self.opener {
            Some(opener) => opener,
            None => Arc::new(StoreOpener::from_settings(&self.settings)?),
        };
        let runtime = self
            .runtime
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| Error::InvalidConfig("orchestrator needs a tokio runtime".into()))?;
        Ok(SearchOrchestrator {
            inner: Arc::new(Inner {
                executor: self.executor,
                opener,
                indexes: DashMap::new(),
                collaborators: self.collaborators,
                settings: self.settings,
                runtime,
            }),
        })
    }
}

impl SearchOrchestrator {
    pub fn builder(executor: Arc<dyn TaskExecutor>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            executor,
            opener: None,
            collaborators: Collaborators::default(),
            settings: SearchSettings::default(),
            runtime: None,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.inner.settings
    }

    /// Opens `name` now instead of on first use.
    pub fn setup_index(&self, name: &str) -> Result<()> {
        self.slot(name)?;
        info!(index = name, "Index ready");
        Ok(())
    }

    /// The already opened index called `name`.
    pub fn index_for_name(&self, name: &str) -> Result<Arc<dyn SearchIndex>> {
        self.inner
            .indexes
            .get(name)
            .map(|slot| Arc::clone(&slot.index))
            .ok_or_else(|| Error::NotFound(format!("index '{name}' has not been set up")))
    }

    pub fn scope(&self, name: impl Into<String>) -> IndexScope<'_> {
        IndexScope { orchestrator: self, name: name.into() }
    }

    pub fn default_scope(&self) -> IndexScope<'_> {
        self.scope(self.inner.settings.default_index_name.clone())
    }

    pub fn enqueue_index(&self, document: Document, index_on_auxiliary: bool) -> Result<TaskHandle> {
        self.default_scope().enqueue_index(document, index_on_auxiliary)
    }

    pub fn enqueue_index_batch(&self, sources: Vec<IndexSource>) -> Result<TaskHandle> {
        self.default_scope().enqueue_index_batch(sources)
    }

    pub fn enqueue_remove(&self, module_id: &str, entity_id: &str, metadata: FileMetadata) -> Result<TaskHandle> {
        self.default_scope().enqueue_remove(module_id, entity_id, metadata)
    }

    pub fn enqueue_reset(&self) -> Result<TaskHandle> {
        self.default_scope().enqueue_reset()
    }

    pub fn search<F>(
        &self,
        request: SearchRequest,
        on_complete: F,
        on_remote_complete: Option<RemoteCompletion>,
    ) -> Result<TaskHandle>
    where
        F: FnOnce(Result<SearchResponse>) + Send + 'static,
    {
        self.default_scope().search(request, on_complete, on_remote_complete)
    }

    fn slot(&self, name: &str) -> Result<Arc<IndexSlot>> {
        if let Some(slot) = self.inner.indexes.get(name) {
            return Ok(Arc::clone(slot.value()));
        }
        let slot = self.inner.indexes.entry(name.to_string()).or_try_insert_with(|| {
            let index = self.inner.opener.open(name)?;
            // Stored rows keep their epochs across processes; resets must keep counting past them.
            let ledger = match index.max_epoch()? {
                Some(epoch) => MutationLedger::starting_at(epoch),
                None => MutationLedger::new(),
            };
            debug!(index = name, epoch = ledger.current_epoch().0, "Opened mutation ledger");
            Ok::<_, Error>(Arc::new(IndexSlot { index, ledger }))
        })?;
        Ok(Arc::clone(slot.value()))
    }

    fn submit(&self, descriptor: TaskDescriptor, job: impl FnOnce() + Send + 'static) -> Result<()> {
        debug!(task = %descriptor.id, kind = ?descriptor.kind, index = %descriptor.index_name, "Submitting task");
        self.inner.executor.submit(Task::new(descriptor, job)).map_err(|err| {
            warn!(error = %err, "Task submission failed");
            Error::Submit(err)
        })
    }

    /// Like `submit`, giving the stamp back to the ledger when the task never made it in.
    fn submit_stamped(
        &self,
        slot: &IndexSlot,
        stamp: MutationStamp,
        descriptor: TaskDescriptor,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<()> {
        self.submit(descriptor, job).inspect_err(|_| slot.ledger.release(stamp))
    }
}

/// Operations bound to one named index.
pub struct IndexScope<'a> {
    orchestrator: &'a SearchOrchestrator,
    name: String,
}

impl IndexScope<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues an insert-or-replace. Malformed documents are rejected here, before any task exists.
    pub fn enqueue_index(&self, document: Document, index_on_auxiliary: bool) -> Result<TaskHandle> {
        document.validate()?;
        let slot = self.orchestrator.slot(&self.name)?;
        let stamp = slot.ledger.stamp_mutation();
        let id = TaskId::new();
        let descriptor = TaskDescriptor::new(
            id.clone(),
            TaskKind::Index,
            &self.name,
            json!({
                "module_id": document.key.module_id,
                "entity_id": document.key.entity_id,
                "generation": stamp.generation,
                "epoch": stamp.epoch.0,
                "auxiliary": index_on_auxiliary,
            }),
        );
        let (completer, handle) = completion(id);
        let collaborators = self.orchestrator.inner.collaborators.clone();
        let name = self.name.clone();
        let job_slot = Arc::clone(&slot);
        self.orchestrator.submit_stamped(&slot, stamp, descriptor, move || {
            let slot = job_slot;
            let outcome = index_document(&slot, &collaborators, &document, stamp, index_on_auxiliary);
            if let (Ok(TaskOutcome::Indexed { key, .. }), Some(listener)) = (&outcome, &collaborators.listener) {
                listener.files_indexed(&name, std::slice::from_ref(key));
            }
            completer.complete(outcome);
        })?;
        Ok(handle)
    }

    /// One index task per source. The returned handle resolves, and the
    /// listener hears about the indexed keys, once every member has finished.
    pub fn enqueue_index_batch(&self, sources: Vec<IndexSource>) -> Result<TaskHandle> {
        let inner = &self.orchestrator.inner;
        let spool_dir = if sources.iter().any(|s| matches!(s, IndexSource::Spooled(_))) {
            Some(inner.settings.spool_path().ok_or_else(|| {
                Error::InvalidConfig("search.spool_dir is required for spooled index sources".into())
            })?)
        } else {
            None
        };
        for source in &sources {
            if let IndexSource::Inline(document) = source {
                document.validate()?;
            }
        }
        let slot = self.orchestrator.slot(&self.name)?;
        let batch_id = TaskId::new();
        let (completer, handle) = completion(batch_id.clone());
        if sources.is_empty() {
            completer.complete(Ok(TaskOutcome::Batch { indexed: 0, superseded: 0, failed: 0 }));
            return Ok(handle);
        }

        let members = sources.len();
        let tracker = Arc::new(BatchTracker::new(
            members,
            self.name.clone(),
            inner.collaborators.listener.clone(),
            completer,
        ));
        for (submitted, source) in sources.into_iter().enumerate() {
            let stamp = slot.ledger.stamp_mutation();
            let payload = match &source {
                IndexSource::Spooled(relative) => json!({
                    "batch": batch_id.0,
                    "spooled": relative.display().to_string(),
                    "generation": stamp.generation,
                    "epoch": stamp.epoch.0,
                }),
                IndexSource::Inline(document) => json!({
                    "batch": batch_id.0,
                    "module_id": document.key.module_id,
                    "entity_id": document.key.entity_id,
                    "generation": stamp.generation,
                    "epoch": stamp.epoch.0,
                }),
            };
            let descriptor = TaskDescriptor::new(TaskId::new(), TaskKind::Index, &self.name, payload);
            let member = BatchMember { tracker: Arc::clone(&tracker), done: false };
            let job_slot = Arc::clone(&slot);
            let collaborators = inner.collaborators.clone();
            let spool_dir = spool_dir.clone();
            let submission = self.orchestrator.submit_stamped(&slot, stamp, descriptor, move || {
                let outcome = index_source(&job_slot, &collaborators, spool_dir.as_deref(), source, stamp);
                member.finish(outcome);
            });
            if let Err(err) = submission {
                // The rejected member already counted itself as failed when its job was dropped.
                tracker.abandon(members - submitted - 1);
                return Err(err);
            }
        }
        Ok(handle)
    }

    /// Queues a removal. Removing a key that was never indexed succeeds.
    pub fn enqueue_remove(&self, module_id: &str, entity_id: &str, metadata: FileMetadata) -> Result<TaskHandle> {
        let key = DocKey::new(module_id, entity_id);
        key.validate()?;
        let slot = self.orchestrator.slot(&self.name)?;
        let stamp = slot.ledger.stamp_mutation();
        let id = TaskId::new();
        let descriptor = TaskDescriptor::new(
            id.clone(),
            TaskKind::Remove,
            &self.name,
            json!({
                "module_id": module_id,
                "entity_id": entity_id,
                "generation": stamp.generation,
                "epoch": stamp.epoch.0,
            }),
        );
        let (completer, handle) = completion(id);
        let collaborators = self.orchestrator.inner.collaborators.clone();
        let job_slot = Arc::clone(&slot);
        self.orchestrator.submit_stamped(&slot, stamp, descriptor, move || {
            let slot = job_slot;
            let outcome = slot
                .ledger
                .apply_keyed(&key, stamp, || slot.index.remove(&key))
                .map_err(Error::from)
                .map(|applied| match applied {
                    Applied::Done(()) => {
                        let auxiliary_id = collaborators.auxiliary_identifier(&key, &metadata);
                        TaskOutcome::Removed { key: key.clone(), auxiliary_id }
                    }
                    Applied::Superseded => {
                        debug!(key = %key, generation = stamp.generation, "Skipping superseded remove");
                        TaskOutcome::Superseded
                    }
                });
            completer.complete(outcome);
        })?;
        Ok(handle)
    }

    /// Queues a reset. It removes everything submitted before it and nothing submitted after it.
    pub fn enqueue_reset(&self) -> Result<TaskHandle> {
        let slot = self.orchestrator.slot(&self.name)?;
        let stamp = slot.ledger.stamp_reset();
        let id = TaskId::new();
        let descriptor = TaskDescriptor::new(
            id.clone(),
            TaskKind::Reset,
            &self.name,
            json!({ "generation": stamp.generation, "epoch": stamp.epoch.0 }),
        );
        let (completer, handle) = completion(id);
        let job_slot = Arc::clone(&slot);
        self.orchestrator.submit_stamped(&slot, stamp, descriptor, move || {
            let slot = job_slot;
            let outcome = slot
                .ledger
                .apply_reset(stamp, || slot.index.reset_before(stamp.epoch))
                .map_err(Error::from)
                .map(|applied| match applied {
                    Applied::Done(()) => TaskOutcome::Reset,
                    Applied::Superseded => TaskOutcome::Superseded,
                });
            completer.complete(outcome);
        })?;
        Ok(handle)
    }

    /// Queues a local search and, when both a remote collaborator and
    /// `on_remote_complete` are present, issues the remote request too.
    ///
    /// `on_complete` runs once with the local results, or with the backup
    /// results when neither local nor remote found anything.
    /// `on_remote_complete` runs once with the remote results, the remote
    /// error, or a timeout. Neither runs when this returns an error.
    pub fn search<F>(
        &self,
        request: SearchRequest,
        on_complete: F,
        on_remote_complete: Option<RemoteCompletion>,
    ) -> Result<TaskHandle>
    where
        F: FnOnce(Result<SearchResponse>) + Send + 'static,
    {
        let inner = &self.orchestrator.inner;
        let slot = self.orchestrator.slot(&self.name)?;
        let collaborators = inner.collaborators.clone();
        let (remote, unused_remote_callback) = match (collaborators.remote.clone(), on_remote_complete) {
            (Some(remote), Some(callback)) => (Some((remote, callback)), None),
            (None, callback) => (None, callback),
            (Some(_), None) => (None, None),
        };
        let (remote_found_tx, remote_found_rx) = if remote.is_some() {
            let (tx, rx) = oneshot::channel::<bool>();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let id = TaskId::new();
        let descriptor = TaskDescriptor::new(
            id.clone(),
            TaskKind::Search,
            &self.name,
            json!({
                "text": request.text,
                "limit": request.limit,
                "offset": request.offset,
                "remote": remote.is_some(),
            }),
        );
        let (completer, handle) = completion(id);
        let local = LocalSearch {
            slot,
            collaborators: collaborators.clone(),
            runtime: inner.runtime.clone(),
            request: request.clone(),
            remote_found: remote_found_rx,
        };
        self.orchestrator.submit(descriptor, move || local.run(Box::new(on_complete), completer))?;

        if let Some((remote, callback)) = remote {
            let timeout = Duration::from_millis(inner.settings.remote_timeout_ms);
            issue_remote(&inner.runtime, remote.as_ref(), &request, callback, collaborators, timeout, remote_found_tx);
        } else if let Some(callback) = unused_remote_callback {
            debug!("No remote collaborator configured");
            callback(Ok(Vec::new()));
        }
        Ok(handle)
    }
}

fn index_document(
    slot: &IndexSlot,
    collaborators: &Collaborators,
    document: &Document,
    stamp: MutationStamp,
    index_on_auxiliary: bool,
) -> Result<TaskOutcome> {
    match slot.ledger.apply_keyed(&document.key, stamp, || slot.index.index_at(document, stamp.epoch))? {
        Applied::Done(()) => {
            let auxiliary_id = if index_on_auxiliary {
                collaborators.auxiliary_identifier(&document.key, &document.metadata)
            } else {
                None
            };
            Ok(TaskOutcome::Indexed { key: document.key.clone(), auxiliary_id })
        }
        Applied::Superseded => {
            debug!(key = %document.key, generation = stamp.generation, "Skipping superseded index");
            Ok(TaskOutcome::Superseded)
        }
    }
}

fn index_source(
    slot: &IndexSlot,
    collaborators: &Collaborators,
    spool_dir: Option<&Path>,
    source: IndexSource,
    stamp: MutationStamp,
) -> Result<TaskOutcome> {
    match source {
        IndexSource::Inline(document) => index_document(slot, collaborators, &document, stamp, false),
        IndexSource::Spooled(relative) => {
            let spool_dir = spool_dir.ok_or_else(|| Error::InvalidConfig("search.spool_dir is not set".into()))?;
            let document = spool::load_index_file_info(spool_dir, &relative)?;
            let outcome = index_document(slot, collaborators, &document, stamp, false)?;
            if let Err(err) = spool::discard_index_file_info(spool_dir, &relative) {
                warn!(path = %relative.display(), error = %err, "Could not delete spooled index file");
            }
            Ok(outcome)
        }
    }
}

#[derive(Default)]
struct BatchProgress {
    indexed: Vec<DocKey>,
    superseded: usize,
    failed: usize,
}

struct BatchTracker {
    index_name: String,
    listener: Option<Arc<dyn IndexListener>>,
    remaining: AtomicUsize,
    progress: Mutex<BatchProgress>,
    completer: Mutex<Option<TaskCompleter>>,
}

impl BatchTracker {
    fn new(
        members: usize,
        index_name: String,
        listener: Option<Arc<dyn IndexListener>>,
        completer: TaskCompleter,
    ) -> Self {
        Self {
            index_name,
            listener,
            remaining: AtomicUsize::new(members),
            progress: Mutex::new(BatchProgress::default()),
            completer: Mutex::new(Some(completer)),
        }
    }

    /// `None` means the member was dropped without running.
    fn record(&self, outcome: Option<Result<TaskOutcome>>) {
        {
            let mut progress = self.progress.lock();
            match outcome {
                Some(Ok(TaskOutcome::Indexed { key, .. })) => progress.indexed.push(key),
                Some(Ok(_)) => progress.superseded += 1,
                Some(Err(err)) => {
                    warn!(index = %self.index_name, error = %err, "Batch member failed");
                    progress.failed += 1;
                }
                None => progress.failed += 1,
            }
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    /// Members that were never submitted. They count as failed.
    fn abandon(&self, members: usize) {
        if members == 0 {
            return;
        }
        self.progress.lock().failed += members;
        if self.remaining.fetch_sub(members, Ordering::AcqRel) == members {
            self.finish();
        }
    }

    fn finish(&self) {
        let progress = std::mem::take(&mut *self.progress.lock());
        if let (Some(listener), false) = (&self.listener, progress.indexed.is_empty()) {
            listener.files_indexed(&self.index_name, &progress.indexed);
        }
        info!(
            index = %self.index_name,
            indexed = progress.indexed.len(),
            superseded = progress.superseded,
            failed = progress.failed,
            "Batch finished"
        );
        if let Some(completer) = self.completer.lock().take() {
            completer.complete(Ok(TaskOutcome::Batch {
                indexed: progress.indexed.len(),
                superseded: progress.superseded,
                failed: progress.failed,
            }));
        }
    }
}

struct BatchMember {
    tracker: Arc<BatchTracker>,
    done: bool,
}

impl BatchMember {
    fn finish(mut self, outcome: Result<TaskOutcome>) {
        self.done = true;
        self.tracker.record(Some(outcome));
    }
}

impl Drop for BatchMember {
    fn drop(&mut self) {
        if !self.done {
            self.tracker.record(None);
        }
    }
}

struct LocalSearch {
    slot: Arc<IndexSlot>,
    collaborators: Collaborators,
    runtime: Handle,
    request: SearchRequest,
    /// Resolves once the remote path has reported; `true` when it found results.
    remote_found: Option<oneshot::Receiver<bool>>,
}

impl LocalSearch {
    fn run(self, on_complete: SearchCompletion, completer: TaskCompleter) {
        let request = &self.request;
        let page = match self.slot.index.search(&request.text, request.limit, request.offset) {
            Ok(page) => page,
            Err(err) => {
                debug!(index = %self.slot.index.name(), error = %err, "Local search failed");
                on_complete(Err(Error::Query(err.clone())));
                completer.complete(Err(Error::Query(err)));
                return;
            }
        };
        if page.total_hits > 0 {
            let results = self.collaborators.decorate(page.hits.into_iter().map(SearchResult::from).collect());
            let response = SearchResponse {
                results,
                suggestions: page.suggestions,
                total_hits: page.total_hits,
                source: ResultSource::Local,
            };
            deliver(on_complete, completer, response);
            return;
        }

        let empty = SearchResponse {
            results: Vec::new(),
            suggestions: page.suggestions,
            total_hits: 0,
            source: ResultSource::Local,
        };
        let Self { collaborators, runtime, request, remote_found, .. } = self;
        if collaborators.backup.is_none() {
            deliver(on_complete, completer, empty);
            return;
        }
        let Some(remote_found) = remote_found else {
            let response = consult_backup(&collaborators, &request, empty);
            deliver(on_complete, completer, response);
            return;
        };
        // Only the backup fallback needs to know whether the remote found anything.
        runtime.spawn(async move {
            // Bounded: the remote side always reports, at the latest on timeout.
            let found = remote_found.await.unwrap_or(false);
            let response = if found {
                empty
            } else {
                let fallback = empty.clone();
                match tokio::task::spawn_blocking(move || consult_backup(&collaborators, &request, empty)).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(error = %err, "Backup search task failed");
                        fallback
                    }
                }
            };
            deliver(on_complete, completer, response);
        });
    }
}

fn consult_backup(collaborators: &Collaborators, request: &SearchRequest, empty: SearchResponse) -> SearchResponse {
    let Some(backup) = &collaborators.backup else {
        return empty;
    };
    match backup.search(request) {
        Ok(results) => {
            info!(results = results.len(), "Using backup search results");
            let total_hits = results.len();
            SearchResponse {
                results: collaborators.decorate(results),
                suggestions: empty.suggestions,
                total_hits,
                source: ResultSource::Backup,
            }
        }
        Err(err) => {
            warn!(error = %err, "Backup search failed");
            empty
        }
    }
}

fn deliver(on_complete: SearchCompletion, completer: TaskCompleter, response: SearchResponse) {
    let hits = response.results.len();
    on_complete(Ok(response));
    completer.complete(Ok(TaskOutcome::Searched { hits }));
}

fn issue_remote(
    runtime: &Handle,
    remote: &dyn RemoteSearch,
    request: &SearchRequest,
    on_remote_complete: RemoteCompletion,
    collaborators: Collaborators,
    timeout: Duration,
    remote_found: Option<oneshot::Sender<bool>>,
) {
    let (reply_tx, reply_rx) = oneshot::channel();
    remote.search(
        request,
        Box::new(move |outcome| {
            // Late replies land after the timeout and are dropped.
            let _ = reply_tx.send(outcome);
        }),
    );
    runtime.spawn(async move {
        let outcome = match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(Ok(results))) => Ok(collaborators.decorate(results)),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_)) => Err(RemoteSearchError::Dropped),
            Err(_) => Err(RemoteSearchError::TimedOut(timeout)),
        };
        if let Err(err) = &outcome {
            warn!(error = %err, "Remote search yielded no results");
        }
        let found = outcome.as_ref().is_ok_and(|results| !results.is_empty());
        on_remote_complete(outcome);
        if let Some(tx) = remote_found {
            let _ = tx.send(found);
        }
    });
}
