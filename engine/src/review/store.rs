//! The Review State Store: single owner of the review document for the
//! active comparison.
//!
//! All mutations go through this service. Each one updates the in-memory
//! document under the store lock, stamps `updatedAt`, and signals a
//! background writer task. The writer debounces bursts of edits into one
//! persisted write and resolves version conflicts with a single bounded
//! retry, so there are never two concurrent writes racing on the same
//! document from this process.

use super::state::{Annotation, GuideArtifacts, HunkGroup, ReviewProgress, ReviewState, ReviewStatus};
use super::storage::{StateBackend, StorageError};
use crate::classify::{ClassificationResult, ClassifiedVia};
use crate::diff::moves::{link_move_pairs, MovePair};
use crate::diff::parser::Hunk;
use crate::sources::traits::{Comparison, DiffProducer, FileStatus};
use crate::time::now_iso8601;
use crate::trust::matching::evaluate_trust;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Tuning for the store's persistence behavior.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Quiet period after the last edit before the document is persisted.
    pub save_debounce: Duration,
    /// Window after our own save during which external-change notifications
    /// are treated as echoes of that write and ignored.
    pub reload_grace: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_debounce: Duration::from_millis(750),
            reload_grace: Duration::from_secs(2),
        }
    }
}

struct Inner {
    state: ReviewState,
    hunks: Vec<Hunk>,
    /// Bumped on every comparison switch; async results captured under an
    /// older epoch are discarded instead of applied.
    epoch: u64,
}

pub struct ReviewStore {
    backend: Arc<dyn StateBackend>,
    config: StoreConfig,
    inner: Mutex<Inner>,
    dirty: Arc<Notify>,
    writer: Mutex<Option<JoinHandle<()>>>,
    last_save_error: Mutex<Option<String>>,
    last_local_save: Mutex<Option<Instant>>,
}

impl ReviewStore {
    /// Create a store for `comparison` and spawn its writer task.
    /// Must be called from within a tokio runtime.
    pub fn new(
        backend: Arc<dyn StateBackend>,
        comparison: Comparison,
        config: StoreConfig,
    ) -> Arc<Self> {
        let store = Arc::new(Self {
            backend,
            config: config.clone(),
            inner: Mutex::new(Inner {
                state: ReviewState::new(comparison),
                hunks: Vec::new(),
                epoch: 0,
            }),
            dirty: Arc::new(Notify::new()),
            writer: Mutex::new(None),
            last_save_error: Mutex::new(None),
            last_local_save: Mutex::new(None),
        });

        let handle = tokio::spawn(writer_loop(
            Arc::clone(&store.dirty),
            Arc::downgrade(&store),
            config.save_debounce,
        ));
        *lock(&store.writer) = Some(handle);

        store
    }

    // --- Snapshots ---

    pub fn comparison(&self) -> Comparison {
        self.lock_inner().state.comparison.clone()
    }

    pub fn state(&self) -> ReviewState {
        self.lock_inner().state.clone()
    }

    pub fn hunks(&self) -> Vec<Hunk> {
        self.lock_inner().hunks.clone()
    }

    pub fn hunk_ids(&self) -> Vec<String> {
        self.lock_inner().hunks.iter().map(|h| h.id.clone()).collect()
    }

    pub fn version(&self) -> u64 {
        self.lock_inner().state.version
    }

    pub fn progress(&self) -> ReviewProgress {
        let inner = self.lock_inner();
        let ids: Vec<String> = inner.hunks.iter().map(|h| h.id.clone()).collect();
        inner.state.progress(&ids)
    }

    /// Current hunks with no labels and no reasoning yet.
    pub fn unclassified_hunks(&self) -> Vec<Hunk> {
        let inner = self.lock_inner();
        inner
            .hunks
            .iter()
            .filter(|h| inner.state.hunk(&h.id).map_or(true, |s| !s.is_classified()))
            .cloned()
            .collect()
    }

    /// Error from the most recent failed persist, if any.
    pub fn last_save_error(&self) -> Option<String> {
        lock(&self.last_save_error).clone()
    }

    // --- Hunk refresh ---

    /// Install a freshly produced hunk list: link move pairs, cache the
    /// list, and update the document's hunk count. Runs once per diff
    /// refresh.
    pub fn refresh_hunks(&self, mut hunks: Vec<Hunk>) -> Vec<MovePair> {
        let pairs = link_move_pairs(&mut hunks);
        let total = hunks.len() as u32;
        let changed = {
            let mut inner = self.lock_inner();
            inner.hunks = hunks;
            if inner.state.total_diff_hunks == total {
                false
            } else {
                inner.state.total_diff_hunks = total;
                inner.state.updated_at = now_iso8601();
                true
            }
        };
        if changed {
            self.dirty.notify_one();
        }
        pairs
    }

    /// Pull the file list and per-file hunks from a diff producer for the
    /// active comparison, then install them via [`Self::refresh_hunks`].
    pub fn refresh_from_source<P: DiffProducer>(
        &self,
        producer: &P,
    ) -> Result<Vec<MovePair>, P::Error> {
        let comparison = self.comparison();
        let mut hunks = Vec::new();
        for file in producer.list_files(&comparison)? {
            if file.status == FileStatus::Deleted {
                continue;
            }
            hunks.extend(producer.file_hunks(&file.path, &comparison)?);
        }
        Ok(self.refresh_hunks(hunks))
    }

    // --- Review decisions ---

    pub fn approve(&self, hunk_id: &str) -> bool {
        self.set_status_bulk(&[hunk_id.to_owned()], Some(ReviewStatus::Approved)) > 0
    }

    pub fn reject(&self, hunk_id: &str) -> bool {
        self.set_status_bulk(&[hunk_id.to_owned()], Some(ReviewStatus::Rejected)) > 0
    }

    pub fn save_for_later(&self, hunk_id: &str) -> bool {
        self.set_status_bulk(&[hunk_id.to_owned()], Some(ReviewStatus::SavedForLater)) > 0
    }

    /// Clear an approval. Does not touch other statuses, and never cascades
    /// to a move partner — only explicit bulk calls do that.
    pub fn unapprove(&self, hunk_id: &str) -> bool {
        self.clear_status_if(hunk_id, ReviewStatus::Approved)
    }

    pub fn unreject(&self, hunk_id: &str) -> bool {
        self.clear_status_if(hunk_id, ReviewStatus::Rejected)
    }

    pub fn unsave_for_later(&self, hunk_id: &str) -> bool {
        self.clear_status_if(hunk_id, ReviewStatus::SavedForLater)
    }

    fn clear_status_if(&self, hunk_id: &str, expected: ReviewStatus) -> bool {
        self.mutate(|state| {
            let Some(hunk) = state.hunks.get_mut(hunk_id) else {
                return false;
            };
            if hunk.status == Some(expected) {
                hunk.status = None;
                true
            } else {
                false
            }
        })
    }

    /// Set (or clear, with `None`) the status of several hunks in one atomic
    /// document mutation. Callers reviewing a move pair pass both member ids
    /// here so an observer never sees one approved and the other not.
    pub fn set_status_bulk(&self, hunk_ids: &[String], status: Option<ReviewStatus>) -> usize {
        let mut changed = 0;
        self.mutate(|state| {
            for id in hunk_ids {
                let hunk = state.hunk_mut(id);
                if hunk.status != status {
                    hunk.status = status;
                    changed += 1;
                }
            }
            changed > 0
        });
        changed
    }

    /// Apply a status to every current hunk under a file or directory prefix.
    pub fn set_status_for_prefix(&self, prefix: &str, status: Option<ReviewStatus>) -> usize {
        let ids: Vec<String> = {
            let inner = self.lock_inner();
            inner
                .hunks
                .iter()
                .filter(|h| path_matches_prefix(&h.file_path, prefix))
                .map(|h| h.id.clone())
                .collect()
        };
        self.set_status_bulk(&ids, status)
    }

    // --- Classification ---

    pub fn set_label(
        &self,
        hunk_id: &str,
        labels: Vec<String>,
        reasoning: Option<String>,
        via: Option<ClassifiedVia>,
    ) -> bool {
        self.mutate(|state| {
            let hunk = state.hunk_mut(hunk_id);
            hunk.label = labels;
            hunk.reasoning = reasoning;
            hunk.classified_via = via;
            true
        })
    }

    /// Merge a batch of classification results. Statuses are never touched.
    pub fn apply_classifications(
        &self,
        results: &HashMap<String, ClassificationResult>,
        via: ClassifiedVia,
    ) -> usize {
        if results.is_empty() {
            return 0;
        }
        let mut applied = 0;
        self.mutate(|state| {
            for (id, result) in results {
                let hunk = state.hunk_mut(id);
                hunk.label.clone_from(&result.label);
                hunk.reasoning = Some(result.reasoning.clone());
                hunk.classified_via = Some(via);
                applied += 1;
            }
            applied > 0
        });
        applied
    }

    /// Drop labels and reasoning for the given hunks so they become
    /// candidates again (reclassification).
    pub fn clear_classifications(&self, hunk_ids: &[String]) -> usize {
        let mut cleared = 0;
        self.mutate(|state| {
            for id in hunk_ids {
                if let Some(hunk) = state.hunks.get_mut(id) {
                    if hunk.is_classified() {
                        hunk.label.clear();
                        hunk.reasoning = None;
                        hunk.classified_via = None;
                        cleared += 1;
                    }
                }
            }
            cleared > 0
        });
        cleared
    }

    // --- Trust list ---

    pub fn trust_add(&self, pattern: &str) -> bool {
        self.mutate(|state| {
            if state.trust_list.iter().any(|p| p == pattern) {
                false
            } else {
                state.trust_list.push(pattern.to_owned());
                true
            }
        })
    }

    pub fn trust_remove(&self, pattern: &str) -> bool {
        self.mutate(|state| {
            let before = state.trust_list.len();
            state.trust_list.retain(|p| p != pattern);
            state.trust_list.len() != before
        })
    }

    pub fn trust_replace(&self, patterns: Vec<String>) {
        self.mutate(|state| {
            if state.trust_list == patterns {
                false
            } else {
                state.trust_list = patterns;
                true
            }
        });
    }

    pub fn set_auto_approve_staged(&self, staged: bool) {
        self.mutate(|state| {
            if state.auto_approve_staged == staged {
                false
            } else {
                state.auto_approve_staged = staged;
                true
            }
        });
    }

    /// Persist an approved status for every current hunk whose labels are
    /// fully trusted and which has no status yet. Returns how many were
    /// approved.
    pub fn apply_trusted(&self) -> usize {
        let mut approved = 0;
        self.mutate_inner(|inner| {
            let trust_list = inner.state.trust_list.clone();
            for hunk in &inner.hunks {
                let Some(hunk_state) = inner.state.hunks.get_mut(&hunk.id) else {
                    continue;
                };
                if hunk_state.status.is_none()
                    && evaluate_trust(&hunk_state.label, &trust_list).all_trusted
                {
                    hunk_state.status = Some(ReviewStatus::Approved);
                    approved += 1;
                }
            }
            approved > 0
        });
        approved
    }

    // --- Notes and annotations ---

    pub fn set_notes(&self, notes: &str) {
        self.mutate(|state| {
            if state.notes == notes {
                false
            } else {
                state.notes = notes.to_owned();
                true
            }
        });
    }

    pub fn add_annotation(
        &self,
        file_path: &str,
        start_line: u32,
        end_line: Option<u32>,
        text: &str,
    ) -> Annotation {
        let annotation = Annotation::new(file_path, start_line, end_line, text);
        let created = annotation.clone();
        self.mutate(move |state| {
            state.annotations.push(annotation);
            true
        });
        created
    }

    pub fn update_annotation(&self, annotation_id: &str, text: &str) -> bool {
        self.mutate(|state| {
            match state.annotations.iter_mut().find(|a| a.id == annotation_id) {
                Some(a) if a.text != text => {
                    a.text = text.to_owned();
                    true
                }
                _ => false,
            }
        })
    }

    pub fn delete_annotation(&self, annotation_id: &str) -> bool {
        self.mutate(|state| {
            let before = state.annotations.len();
            state.annotations.retain(|a| a.id != annotation_id);
            state.annotations.len() != before
        })
    }

    // --- Guide artifacts ---

    pub fn set_grouping(&self, groups: Vec<HunkGroup>, hunk_ids: Vec<String>) {
        self.mutate(|state| {
            let guide = state.guide.get_or_insert_with(GuideArtifacts::default);
            guide.groups = Some(groups);
            guide.groups_hunk_ids = Some(hunk_ids);
            guide.groups_generated_at = Some(now_iso8601());
            true
        });
    }

    pub fn set_summary(&self, title: String, summary: String, hunk_ids: Vec<String>) {
        self.mutate(|state| {
            let guide = state.guide.get_or_insert_with(GuideArtifacts::default);
            guide.title = Some(title);
            guide.summary = Some(summary);
            guide.summary_hunk_ids = Some(hunk_ids);
            guide.summary_generated_at = Some(now_iso8601());
            true
        });
    }

    // --- Comparison lifecycle ---

    /// Switch to a new comparison: install a fresh empty document, then load
    /// whatever is persisted for it. A load result is discarded if the
    /// comparison changed again while the load was in flight, or if local
    /// edits landed in the meantime (the in-memory document is newer).
    pub async fn switch_comparison(&self, comparison: Comparison) -> Result<(), StorageError> {
        let (epoch, placeholder_stamp) = {
            let mut inner = self.lock_inner();
            inner.epoch += 1;
            inner.state = ReviewState::new(comparison.clone());
            inner.hunks.clear();
            (inner.epoch, inner.state.updated_at.clone())
        };

        let loaded = self.load_in_background(comparison).await;

        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            log::debug!("[store] Comparison changed during load; discarding result");
            return Ok(());
        }
        match loaded? {
            Some(loaded) => {
                if inner.state.updated_at > placeholder_stamp {
                    log::warn!(
                        "[store] Load raced with local edits for {}; keeping in-memory state",
                        inner.state.comparison.key
                    );
                } else {
                    inner.state = loaded;
                }
            }
            None => {
                // First access: the fresh empty document stands.
            }
        }
        Ok(())
    }

    /// Re-read the persisted document after an external change (companion
    /// CLI, file watcher). A read older than the in-memory document is
    /// discarded; reloads inside the post-save grace window are treated as
    /// echoes of our own write.
    pub async fn reload(&self) -> Result<bool, StorageError> {
        if self.recently_saved() {
            log::debug!("[store] Ignoring reload inside own-write grace window");
            return Ok(false);
        }

        let (epoch, comparison) = {
            let inner = self.lock_inner();
            (inner.epoch, inner.state.comparison.clone())
        };

        let loaded = self.load_in_background(comparison).await;

        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            return Ok(false);
        }
        let Some(loaded) = loaded? else {
            return Ok(false);
        };
        if loaded.updated_at > inner.state.updated_at {
            inner.state = loaded;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Whether our own last save is recent enough that an external-change
    /// notification is probably an echo of it.
    pub fn recently_saved(&self) -> bool {
        lock(&self.last_local_save)
            .is_some_and(|at| at.elapsed() < self.config.reload_grace)
    }

    async fn load_in_background(
        &self,
        comparison: Comparison,
    ) -> Result<Option<ReviewState>, StorageError> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.load(&comparison))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?
    }

    // --- Persistence ---

    /// Persist immediately, bypassing the debounce. The same conflict
    /// handling applies. Used on shutdown and by tests.
    pub async fn flush_now(&self) -> Result<u64, StorageError> {
        self.flush().await
    }

    async fn flush(&self) -> Result<u64, StorageError> {
        let (snapshot, epoch) = {
            let inner = self.lock_inner();
            (inner.state.clone(), inner.epoch)
        };

        let result = self.save_with_retry(snapshot).await;
        match &result {
            Ok(new_version) => {
                let mut inner = self.lock_inner();
                if inner.epoch == epoch {
                    inner.state.version = *new_version;
                }
                *lock(&self.last_local_save) = Some(Instant::now());
                *lock(&self.last_save_error) = None;
            }
            Err(e) => {
                log::error!("[store] Persist failed: {e}");
                *lock(&self.last_save_error) = Some(e.to_string());
            }
        }
        result
    }

    /// Save, resolving a version conflict by adopting the on-disk version
    /// and retrying exactly once. In-memory edits always survive a failed
    /// save; they ride along on the next debounce cycle.
    async fn save_with_retry(&self, snapshot: ReviewState) -> Result<u64, StorageError> {
        let backend = Arc::clone(&self.backend);
        let first = {
            let snapshot = snapshot.clone();
            tokio::task::spawn_blocking(move || backend.save(&snapshot))
                .await
                .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?
        };

        let found = match first {
            Ok(version) => return Ok(version),
            Err(StorageError::VersionConflict { found, .. }) => found,
            Err(other) => return Err(other),
        };

        log::warn!(
            "[store] Version conflict on {} (disk at {found}); retrying once",
            snapshot.comparison.key
        );
        {
            let mut inner = self.lock_inner();
            if inner.state.comparison.key == snapshot.comparison.key {
                inner.state.version = found;
            }
        }
        let mut retry = snapshot;
        retry.version = found;

        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.save(&retry))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e.to_string())))?
    }

    // --- Internals ---

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    fn mutate(&self, f: impl FnOnce(&mut ReviewState) -> bool) -> bool {
        self.mutate_inner(|inner| f(&mut inner.state))
    }

    fn mutate_inner(&self, f: impl FnOnce(&mut Inner) -> bool) -> bool {
        let changed = {
            let mut inner = self.lock_inner();
            let changed = f(&mut inner);
            if changed {
                inner.state.updated_at = now_iso8601();
            }
            changed
        };
        if changed {
            self.dirty.notify_one();
        }
        changed
    }
}

impl Drop for ReviewStore {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.writer).take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The single-writer queue: wait for the first dirty signal, absorb further
/// signals until the debounce window stays quiet, then flush once.
async fn writer_loop(dirty: Arc<Notify>, store: Weak<ReviewStore>, debounce: Duration) {
    loop {
        dirty.notified().await;
        loop {
            match tokio::time::timeout(debounce, dirty.notified()).await {
                Ok(()) => {}
                Err(_) => break,
            }
        }
        let Some(store) = store.upgrade() else {
            return;
        };
        let _ = store.flush().await;
    }
}

fn path_matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parser::parse_file_diff;
    use std::collections::HashMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory backend with the same version handshake as CentralStore.
    #[derive(Default)]
    struct MemoryBackend {
        docs: Mutex<Map<String, ReviewState>>,
        saves: AtomicUsize,
    }

    impl MemoryBackend {
        fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl StateBackend for MemoryBackend {
        fn load(&self, comparison: &Comparison) -> Result<Option<ReviewState>, StorageError> {
            Ok(lock(&self.docs).get(&comparison.key).cloned())
        }

        fn save(&self, state: &ReviewState) -> Result<u64, StorageError> {
            let mut docs = lock(&self.docs);
            if let Some(existing) = docs.get(&state.comparison.key) {
                if existing.version != state.version {
                    return Err(StorageError::VersionConflict {
                        expected: state.version,
                        found: existing.version,
                    });
                }
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            let mut stamped = state.clone();
            stamped.version = state.version + 1;
            let version = stamped.version;
            docs.insert(state.comparison.key.clone(), stamped);
            Ok(version)
        }
    }

    fn fast_config() -> StoreConfig {
        StoreConfig {
            save_debounce: Duration::from_millis(50),
            reload_grace: Duration::from_millis(200),
        }
    }

    fn two_hunks() -> Vec<Hunk> {
        let mut hunks = parse_file_diff("@@ -1,1 +1,2 @@\n ctx\n+use std::io;", "src/a.rs");
        hunks.extend(parse_file_diff(
            "@@ -10,1 +11,2 @@\n ctx\n+let x = compute();",
            "src/a.rs",
        ));
        hunks
    }

    fn new_store(backend: &Arc<MemoryBackend>) -> Arc<ReviewStore> {
        ReviewStore::new(
            Arc::clone(backend) as Arc<dyn StateBackend>,
            Comparison::new("main", "HEAD"),
            fast_config(),
        )
    }

    #[tokio::test]
    async fn test_mutations_mark_document() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        let hunks = two_hunks();
        let id = hunks[0].id.clone();
        store.refresh_hunks(hunks);

        assert!(store.approve(&id));
        // Idempotent: approving again changes nothing.
        assert!(!store.approve(&id));
        assert_eq!(store.progress().approved, 1);

        assert!(store.unapprove(&id));
        assert!(!store.unapprove(&id));
        assert_eq!(store.progress().approved, 0);
    }

    #[tokio::test]
    async fn test_debounce_coalesces_edits_into_one_save() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        store.refresh_hunks(two_hunks());

        store.set_notes("one");
        store.set_notes("two");
        store.trust_add("imports:*");
        assert_eq!(backend.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(backend.save_count(), 1);
        assert_eq!(store.version(), 1);

        let persisted = backend.load(&store.comparison()).unwrap().unwrap();
        assert_eq!(persisted.notes, "two");
        assert_eq!(persisted.trust_list, vec!["imports:*".to_owned()]);
    }

    #[tokio::test]
    async fn test_conflict_retries_once_and_wins() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        store.set_notes("ours");

        // An external writer (companion CLI) lands a version first.
        let mut external = ReviewState::new(Comparison::new("main", "HEAD"));
        external.notes = "external".to_owned();
        backend.save(&external).unwrap();

        let version = store.flush_now().await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(store.version(), 2);
        let persisted = backend.load(&store.comparison()).unwrap().unwrap();
        assert_eq!(persisted.notes, "ours");
    }

    #[tokio::test]
    async fn test_failed_save_preserves_edits_and_surfaces_error() {
        struct RejectingBackend;
        impl StateBackend for RejectingBackend {
            fn load(&self, _: &Comparison) -> Result<Option<ReviewState>, StorageError> {
                Ok(None)
            }
            fn save(&self, _: &ReviewState) -> Result<u64, StorageError> {
                Err(StorageError::Io(std::io::Error::other("disk full")))
            }
        }

        let store = ReviewStore::new(
            Arc::new(RejectingBackend),
            Comparison::new("main", "HEAD"),
            fast_config(),
        );
        store.set_notes("precious");
        assert!(store.flush_now().await.is_err());
        assert!(store.last_save_error().unwrap().contains("disk full"));
        assert_eq!(store.state().notes, "precious");
    }

    #[tokio::test]
    async fn test_switch_comparison_loads_persisted_state() {
        let backend = Arc::new(MemoryBackend::default());
        let mut saved = ReviewState::new(Comparison::new("main", "feature"));
        saved.notes = "from disk".to_owned();
        backend.save(&saved).unwrap();

        let store = new_store(&backend);
        store
            .switch_comparison(Comparison::new("main", "feature"))
            .await
            .unwrap();
        assert_eq!(store.state().notes, "from disk");
        assert_eq!(store.version(), 1);
    }

    #[tokio::test]
    async fn test_reload_discards_stale_read() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        store.flush_now().await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;

        // Local edit is newer than anything on disk; reload must not
        // clobber it.
        store.set_notes("newer local");
        let adopted = store.reload().await.unwrap();
        assert!(!adopted);
        assert_eq!(store.state().notes, "newer local");
    }

    #[tokio::test]
    async fn test_reload_ignored_inside_grace_window() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        store.flush_now().await.unwrap();
        assert!(store.recently_saved());
        assert!(!store.reload().await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_status_is_atomic_for_move_pairs() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);

        let mut deletion = parse_file_diff("@@ -1,2 +1,0 @@\n-fn f() {\n-}", "src/old.rs");
        let mut addition = parse_file_diff("@@ -5,0 +5,2 @@\n+fn f() {\n+}", "src/new.rs");
        let mut hunks = Vec::new();
        hunks.append(&mut deletion);
        hunks.append(&mut addition);
        let pairs = store.refresh_hunks(hunks);
        assert_eq!(pairs.len(), 1);

        let ids = vec![
            pairs[0].source_hunk_id.clone(),
            pairs[0].dest_hunk_id.clone(),
        ];
        assert_eq!(store.set_status_bulk(&ids, Some(ReviewStatus::Approved)), 2);

        let state = store.state();
        assert_eq!(
            state.hunks[&ids[0]].status,
            Some(ReviewStatus::Approved)
        );
        assert_eq!(
            state.hunks[&ids[1]].status,
            Some(ReviewStatus::Approved)
        );
    }

    #[tokio::test]
    async fn test_prefix_status() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        let mut hunks = parse_file_diff("@@ -1,1 +1,1 @@\n-a\n+b", "src/mod_a/file.rs");
        hunks.extend(parse_file_diff("@@ -1,1 +1,1 @@\n-c\n+d", "src/mod_b/file.rs"));
        store.refresh_hunks(hunks);

        assert_eq!(
            store.set_status_for_prefix("src/mod_a", Some(ReviewStatus::Approved)),
            1
        );
        // "src/mod" must not match "src/mod_b" (directory boundary).
        assert_eq!(
            store.set_status_for_prefix("src/mod", Some(ReviewStatus::Approved)),
            0
        );
    }

    #[tokio::test]
    async fn test_apply_trusted_persists_approvals() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);
        let hunks = two_hunks();
        let (id_a, id_b) = (hunks[0].id.clone(), hunks[1].id.clone());
        store.refresh_hunks(hunks);

        store.trust_add("imports:*");
        store.set_label(
            &id_a,
            vec!["imports:added".to_owned()],
            Some("import only".to_owned()),
            Some(ClassifiedVia::Static),
        );

        assert_eq!(store.apply_trusted(), 1);
        let state = store.state();
        assert_eq!(state.hunks[&id_a].status, Some(ReviewStatus::Approved));
        assert!(state.hunks.get(&id_b).and_then(|h| h.status).is_none());
    }

    #[tokio::test]
    async fn test_annotations() {
        let backend = Arc::new(MemoryBackend::default());
        let store = new_store(&backend);

        let a = store.add_annotation("src/a.rs", 10, Some(12), "why this?");
        assert!(store.update_annotation(&a.id, "why this, though?"));
        assert_eq!(store.state().annotations[0].text, "why this, though?");
        assert!(store.delete_annotation(&a.id));
        assert!(store.state().annotations.is_empty());
        assert!(!store.delete_annotation(&a.id));
    }
}
