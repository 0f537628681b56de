//! Reconciliation engine
//!
//! Drives one resource from its current remote state to a desired state:
//!
//! 1. validate the desired resource
//! 2. read the initial state (absent means "create")
//! 3. canonicalize desired against initial
//! 4. diff and plan, honoring lifecycle directives
//! 5. execute the plan, waiting on each long-running operation
//! 6. re-read and verify convergence
//!
//! The whole sequence is retried from step 2 on optimistic-concurrency
//! conflicts.
//!
//! # Module Structure
//!
//! - [`apply`] - The [`Reconciler`] facade: apply, plan, get, delete
//! - [`canonicalize`] - Desired/new-state merges
//! - [`diff`] - Field-level differ
//! - [`executor`] - Create/update/delete against the API
//! - [`list`] - Paginated listing and bulk delete
//! - [`plan`] - Grouping diffs into operations
//! - [`retry`] - Conflict retry with backoff
//! - [`verify`] - Post-apply convergence check

pub mod apply;
pub mod canonicalize;
pub mod diff;
pub mod executor;
pub mod list;
pub mod plan;
pub mod retry;
pub mod verify;

pub use apply::{DryRun, Reconciler};
pub use diff::FieldDiff;
pub use list::ResourceList;
pub use plan::{Lifecycle, Operation, Plan, PlannedChange};
pub use retry::RetryConfig;

use std::time::Duration;

/// Timing and pagination knobs for a [`Reconciler`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    /// Deadline for one whole apply or delete call
    pub timeout: Duration,
    /// Interval between long-running operation polls
    pub poll_interval: Duration,
    /// Existence checks after a delete before giving up
    pub delete_confirm_attempts: u32,
    pub delete_confirm_interval: Duration,
    pub conflict_retry: RetryConfig,
    /// Page size for list calls; `None` lets the server choose
    pub page_size: Option<u32>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_millis(2000),
            delete_confirm_attempts: 10,
            delete_confirm_interval: Duration::from_millis(1000),
            conflict_retry: RetryConfig::default(),
            page_size: None,
        }
    }
}
