//! The guide: derived grouping and narrative summary over the current hunk
//! set.
//!
//! Both artifacts are cached in the review document together with the
//! sorted hunk-id set they were computed over; any change to that set marks
//! them stale. `start_guide` composes classification, grouping, and summary
//! as three independently tracked tasks that run concurrently and never
//! block each other.

use crate::classify::orchestrator::ClassificationOrchestrator;
use crate::review::state::HunkGroup;
use crate::review::store::ReviewStore;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuideError {
    #[error("Guide generation already running for this comparison")]
    Busy,
    #[error("Guide service failed: {0}")]
    Service(String),
}

/// Lifecycle of one guide task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Loading,
    Done,
    Error,
}

/// Observable states of the three guide tasks.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GuideTasks {
    pub classification: TaskState,
    pub grouping: TaskState,
    pub summary: TaskState,
}

impl Default for GuideTasks {
    fn default() -> Self {
        Self {
            classification: TaskState::Idle,
            grouping: TaskState::Idle,
            summary: TaskState::Idle,
        }
    }
}

/// Input to the grouping service — one per hunk.
#[derive(Debug, Clone, Serialize)]
pub struct GroupingInput {
    pub id: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub label: Vec<String>,
}

/// Input to the summary service — one per hunk.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryInput {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub title: String,
    pub summary: String,
}

/// External grouping generation service.
#[async_trait]
pub trait GroupingService: Send + Sync {
    async fn generate_grouping(
        &self,
        inputs: &[GroupingInput],
    ) -> Result<Vec<HunkGroup>, GuideError>;
}

/// External summary generation service.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn generate_summary(&self, inputs: &[SummaryInput]) -> Result<SummaryResult, GuideError>;
}

pub struct GuideOrchestrator {
    store: Arc<ReviewStore>,
    classifier: Arc<ClassificationOrchestrator>,
    grouping: Arc<dyn GroupingService>,
    summary: Arc<dyn SummaryService>,
    tasks: Mutex<GuideTasks>,
    grouping_running: AtomicBool,
    summary_running: AtomicBool,
}

impl GuideOrchestrator {
    pub fn new(
        store: Arc<ReviewStore>,
        classifier: Arc<ClassificationOrchestrator>,
        grouping: Arc<dyn GroupingService>,
        summary: Arc<dyn SummaryService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            classifier,
            grouping,
            summary,
            tasks: Mutex::new(GuideTasks::default()),
            grouping_running: AtomicBool::new(false),
            summary_running: AtomicBool::new(false),
        })
    }

    pub fn tasks(&self) -> GuideTasks {
        *lock(&self.tasks)
    }

    /// The staleness fingerprint: the sorted current hunk-id set.
    fn fingerprint(&self) -> Vec<String> {
        let mut ids = self.store.hunk_ids();
        ids.sort();
        ids
    }

    /// An artifact is fresh iff it exists and was computed over exactly the
    /// current hunk-id set.
    fn is_fresh(recorded: Option<&Vec<String>>, current: &[String]) -> bool {
        recorded.is_some_and(|ids| {
            let mut sorted = ids.clone();
            sorted.sort();
            sorted == current
        })
    }

    pub fn grouping_is_fresh(&self) -> bool {
        let state = self.store.state();
        let guide = state.guide.as_ref();
        guide.is_some_and(|g| g.groups.is_some())
            && Self::is_fresh(
                state.guide.as_ref().and_then(|g| g.groups_hunk_ids.as_ref()),
                &self.fingerprint(),
            )
    }

    pub fn summary_is_fresh(&self) -> bool {
        let state = self.store.state();
        let guide = state.guide.as_ref();
        guide.is_some_and(|g| g.summary.is_some())
            && Self::is_fresh(
                state.guide.as_ref().and_then(|g| g.summary_hunk_ids.as_ref()),
                &self.fingerprint(),
            )
    }

    /// Generate (or regenerate) the grouping artifact. Guarded against
    /// concurrent re-entry; a comparison switch mid-run discards the result.
    pub async fn generate_grouping(&self) -> Result<(), GuideError> {
        if self
            .grouping_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GuideError::Busy);
        }
        let result = self.generate_grouping_inner().await;
        self.grouping_running.store(false, Ordering::SeqCst);

        lock(&self.tasks).grouping = if result.is_ok() {
            TaskState::Done
        } else {
            TaskState::Error
        };
        result
    }

    async fn generate_grouping_inner(&self) -> Result<(), GuideError> {
        lock(&self.tasks).grouping = TaskState::Loading;
        let captured_key = self.store.comparison().key;
        let fingerprint = self.fingerprint();

        let state = self.store.state();
        let inputs: Vec<GroupingInput> = self
            .store
            .hunks()
            .into_iter()
            .map(|h| GroupingInput {
                label: state.hunk(&h.id).map(|s| s.label.clone()).unwrap_or_default(),
                id: h.id,
                file_path: h.file_path,
                content: h.content,
            })
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }

        let mut groups = self.grouping.generate_grouping(&inputs).await?;

        // Every input hunk must land in exactly one group; anything the
        // service forgot goes into a fallback bucket.
        let seen: HashSet<&String> = groups.iter().flat_map(|g| g.hunk_ids.iter()).collect();
        let missing: Vec<String> = inputs
            .iter()
            .map(|i| i.id.clone())
            .filter(|id| !seen.contains(id))
            .collect();
        if !missing.is_empty() {
            groups.push(HunkGroup {
                title: "Other changes".to_owned(),
                description: "Changes not covered by the groups above.".to_owned(),
                hunk_ids: missing,
            });
        }

        if self.store.comparison().key != captured_key {
            log::info!("[guide] Comparison changed during grouping; discarding result");
            return Ok(());
        }
        self.store.set_grouping(groups, fingerprint);
        Ok(())
    }

    /// Generate (or regenerate) the summary artifact. Same guard and
    /// discard rules as grouping.
    pub async fn generate_summary(&self) -> Result<(), GuideError> {
        if self
            .summary_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GuideError::Busy);
        }
        let result = self.generate_summary_inner().await;
        self.summary_running.store(false, Ordering::SeqCst);

        lock(&self.tasks).summary = if result.is_ok() {
            TaskState::Done
        } else {
            TaskState::Error
        };
        result
    }

    async fn generate_summary_inner(&self) -> Result<(), GuideError> {
        lock(&self.tasks).summary = TaskState::Loading;
        let captured_key = self.store.comparison().key;
        let fingerprint = self.fingerprint();

        let inputs: Vec<SummaryInput> = self
            .store
            .hunks()
            .into_iter()
            .map(|h| SummaryInput {
                file_path: h.file_path,
                content: h.content,
            })
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }

        let result = self.summary.generate_summary(&inputs).await?;

        if self.store.comparison().key != captured_key {
            log::info!("[guide] Comparison changed during summary; discarding result");
            return Ok(());
        }
        self.store.set_summary(result.title, result.summary, fingerprint);
        Ok(())
    }

    /// Run classification, grouping, and summary concurrently, skipping any
    /// task whose artifact is already fresh. Individual failures never block
    /// the sibling tasks; the call settles when all three have.
    pub async fn start_guide(&self) {
        let classification_needed = !self.store.unclassified_hunks().is_empty();
        let grouping_needed = !self.grouping_is_fresh();
        let summary_needed = !self.summary_is_fresh();

        {
            let mut tasks = lock(&self.tasks);
            tasks.classification = if classification_needed {
                TaskState::Loading
            } else {
                TaskState::Done
            };
            if !grouping_needed {
                tasks.grouping = TaskState::Done;
            }
            if !summary_needed {
                tasks.summary = TaskState::Done;
            }
        }

        let classify_task = async {
            if classification_needed {
                self.classifier.classify_unlabeled(None).await;
                lock(&self.tasks).classification = if self.classifier.last_error().is_some() {
                    TaskState::Error
                } else {
                    TaskState::Done
                };
            }
        };
        let grouping_task = async {
            if grouping_needed {
                if let Err(e) = self.generate_grouping().await {
                    log::error!("[guide] Grouping failed: {e}");
                }
            }
        };
        let summary_task = async {
            if summary_needed {
                if let Err(e) = self.generate_summary().await {
                    log::error!("[guide] Summary failed: {e}");
                }
            }
        };

        tokio::join!(classify_task, grouping_task, summary_task);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
