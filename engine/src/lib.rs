//! Review state synchronization and classification orchestration for
//! hunk-level code review.
//!
//! The engine gives every diff hunk a content-stable identity, classifies
//! hunks into trust categories (deterministic rules first, an external AI
//! classifier for the rest), persists review decisions in a versioned
//! document with optimistic concurrency, and derives progress and guide
//! summaries. UI front-ends, git plumbing, and AI transports sit behind the
//! traits in [`sources`], [`classify`], [`review::storage`], and [`guide`];
//! the [`ai`] module ships a Claude CLI adapter for the AI-backed traits.

pub mod ai;
pub mod classify;
pub mod diff;
pub mod error;
pub mod guide;
pub mod review;
pub mod sources;
pub mod time;
pub mod trust;

#[cfg(feature = "cli")]
pub mod cli;

pub use classify::{ClassificationOrchestrator, ClassifyOptions};
pub use diff::{Hunk, MovePair};
pub use error::EngineError;
pub use guide::GuideOrchestrator;
pub use review::{ReviewState, ReviewStatus, ReviewStore, StoreConfig};
pub use sources::Comparison;
