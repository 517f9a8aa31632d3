//! The two-phase classification pipeline: static rules first, then the
//! external AI classifier over whatever remains.
//!
//! Every invocation captures a generation number from a process-wide
//! counter. Results arriving for an older generation are discarded — a newer
//! request supersedes an older one without double-labeling or racing writes.
//! Cancellation is cooperative: in-flight classifier calls are not aborted,
//! their results are simply dropped on arrival.

use super::static_rules::classify_hunks_static;
use super::{
    AiClassifier, BatchCallback, ClassificationResult, ClassifiedVia, ClassifyOptions, HunkInput,
};
use crate::diff::parser::Hunk;
use crate::review::store::ReviewStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Reasoning recorded for hunks the classifier returned no result for, so
/// they are never silently retried.
const NO_RESULT_REASONING: &str = "Classifier returned no result for this hunk";

/// Completed/total counters for the most recent invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationProgress {
    pub completed: usize,
    pub total: usize,
}

pub struct ClassificationOrchestrator {
    store: Arc<ReviewStore>,
    classifier: Arc<dyn AiClassifier>,
    options: ClassifyOptions,
    debounce_delay: Duration,
    generation: AtomicU64,
    in_flight: Arc<Mutex<HashSet<String>>>,
    progress: Arc<Mutex<ClassificationProgress>>,
    last_error: Mutex<Option<String>>,
    pending_trigger: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl ClassificationOrchestrator {
    pub fn new(
        store: Arc<ReviewStore>,
        classifier: Arc<dyn AiClassifier>,
        options: ClassifyOptions,
        debounce_delay: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            store,
            classifier,
            options,
            debounce_delay,
            generation: AtomicU64::new(0),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            progress: Arc::new(Mutex::new(ClassificationProgress::default())),
            last_error: Mutex::new(None),
            pending_trigger: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    pub fn progress(&self) -> ClassificationProgress {
        *lock(&self.progress)
    }

    /// Error from the most recent failed AI phase, if any. Cleared by the
    /// next successful invocation.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Ids currently awaiting AI results.
    pub fn in_flight_ids(&self) -> Vec<String> {
        lock(&self.in_flight).iter().cloned().collect()
    }

    /// Debounced trigger: rapid successive calls (file-list refreshes)
    /// coalesce into one invocation after the burst settles.
    pub fn schedule_classify(&self) {
        let mut pending = lock(&self.pending_trigger);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let weak = self.weak_self.clone();
        let delay = self.debounce_delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.classify_unlabeled(None).await;
            }
        }));
    }

    /// Classify every unlabeled hunk (or only `targets` when given).
    ///
    /// Static rules run first and their labels persist immediately; the
    /// remainder goes to the AI classifier in batches. Failures never
    /// propagate: they land in [`Self::last_error`].
    pub async fn classify_unlabeled(&self, targets: Option<Vec<Hunk>>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let candidates = {
            let pool = targets.unwrap_or_else(|| self.store.unclassified_hunks());
            let in_flight = lock(&self.in_flight);
            let state = self.store.state();
            pool.into_iter()
                .filter(|h| !in_flight.contains(&h.id))
                .filter(|h| state.hunk(&h.id).map_or(true, |s| !s.is_classified()))
                .collect::<Vec<_>>()
        };
        if candidates.is_empty() {
            return;
        }

        // Phase 1: static rules, applied and persisted immediately.
        let static_response = classify_hunks_static(&candidates);
        let resolved: HashSet<String> = static_response
            .classifications
            .keys()
            .cloned()
            .chain(static_response.skipped_hunk_ids.iter().cloned())
            .collect();
        if !static_response.classifications.is_empty() {
            self.store
                .apply_classifications(&static_response.classifications, ClassifiedVia::Static);
        }

        let remaining: Vec<Hunk> = candidates
            .into_iter()
            .filter(|h| !resolved.contains(&h.id))
            .collect();
        if remaining.is_empty() {
            return;
        }

        // Phase 2: AI, batched and concurrency-limited by the classifier.
        let sent_ids: Vec<String> = remaining.iter().map(|h| h.id.clone()).collect();
        lock(&self.in_flight).extend(sent_ids.iter().cloned());
        *lock(&self.progress) = ClassificationProgress {
            completed: 0,
            total: sent_ids.len(),
        };

        let inputs: Vec<HunkInput> = remaining
            .iter()
            .map(|h| HunkInput {
                id: h.id.clone(),
                file_path: h.file_path.clone(),
                content: h.content.clone(),
            })
            .collect();

        let on_batch: BatchCallback = {
            let in_flight = Arc::clone(&self.in_flight);
            let progress = Arc::clone(&self.progress);
            Arc::new(move |batch_ids, _results| {
                let mut in_flight = lock(&in_flight);
                for id in &batch_ids {
                    in_flight.remove(id);
                }
                lock(&progress).completed += batch_ids.len();
            })
        };

        let result = self
            .classifier
            .classify(inputs, self.options.clone(), on_batch)
            .await;

        let current = self.generation.load(Ordering::SeqCst);
        let stale = current != generation;

        // Whatever happened, this invocation's ids must not stay marked
        // in-flight; other concurrent invocations own their own ids.
        {
            let mut in_flight = lock(&self.in_flight);
            for id in &sent_ids {
                in_flight.remove(id);
            }
        }

        match result {
            Ok(response) => {
                if stale {
                    log::info!(
                        "[classify] Generation {generation} superseded by {current}; discarding {} results",
                        response.classifications.len()
                    );
                    return;
                }
                // Label every hunk that was sent — including the ones the
                // classifier stayed silent about.
                let mut merged = response.classifications;
                for id in &sent_ids {
                    merged.entry(id.clone()).or_insert_with(|| ClassificationResult {
                        label: Vec::new(),
                        reasoning: NO_RESULT_REASONING.to_owned(),
                    });
                }
                self.store.apply_classifications(&merged, ClassifiedVia::Ai);
                *lock(&self.last_error) = None;
            }
            Err(e) => {
                if stale {
                    log::debug!("[classify] Stale generation {generation} failed: {e}");
                    return;
                }
                log::error!("[classify] AI classification failed: {e}");
                *lock(&self.last_error) = Some(e.to_string());
            }
        }
    }

    /// Re-run classification for specific hunks, discarding their existing
    /// labels first.
    pub async fn reclassify(&self, hunk_ids: &[String]) {
        self.store.clear_classifications(hunk_ids);
        let targets: Vec<Hunk> = {
            let wanted: HashSet<&String> = hunk_ids.iter().collect();
            self.store
                .hunks()
                .into_iter()
                .filter(|h| wanted.contains(&h.id))
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        self.classify_unlabeled(Some(targets)).await;
    }
}

impl Drop for ClassificationOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.pending_trigger).take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
