//! gkemc - declarative reconciliation for GKE Multi-Cloud resources
//!
//! Given a desired state for a resource, the [`reconcile::Reconciler`] reads
//! what exists, works out the smallest set of operations that brings the
//! remote side in line, runs them, and checks the result converged.
//!
//! # Module Structure
//!
//! - [`config`] - Persistent user configuration
//! - [`error`] - Error taxonomy
//! - [`gcp`] - Authentication, HTTP transport and long-running operations
//! - [`reconcile`] - Canonicalize, diff, plan, execute, verify
//! - [`resource`] - Resource kinds, identities and manifests
//! - [`schema`] - Field policies, values and the wire codec

pub mod config;
pub mod error;
pub mod gcp;
pub mod reconcile;
pub mod resource;
pub mod schema;

pub use error::{Error, Result};
