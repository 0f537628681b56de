//! Long-running operation polling
//!
//! Mutating calls return a `google.longrunning.Operation`. The operation is
//! re-read every poll interval until it reports `done`, bounded by the call
//! deadline.

use super::transport::{call, Method, Transport};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Error status of a finished operation
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Subset of `google.longrunning.Operation` the reconciler needs
#[derive(Debug, Clone, Deserialize)]
pub struct OperationHandle {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationStatus>,
    #[serde(default)]
    pub response: Option<Value>,
}

impl OperationHandle {
    /// Parse a mutating call's response. Bodies without an operation name
    /// (empty, or the resource itself) are treated as already complete.
    pub fn from_response(body: &Value) -> Option<Self> {
        let name = body.get("name").and_then(Value::as_str)?;
        if !name.contains("/operations/") && !name.starts_with("operations/") {
            return None;
        }
        serde_json::from_value(body.clone()).ok()
    }
}

/// Outcome of waiting on an operation
#[derive(Debug, Clone, Default)]
pub struct CompletedOperation {
    /// Operation name, empty when the call completed synchronously
    pub name: String,
    /// The operation's `response` payload, kept for merging into the new state
    pub first_response: Option<Value>,
    /// Number of GETs issued against the operation
    pub polls: u32,
}

/// Wait for a mutating call's operation to finish.
///
/// Returns immediately if the initial handle is already done. Otherwise polls
/// `{base_path}/{operation name}` every `poll_interval` until done. Sleeps
/// are clamped to the time left before `deadline`; reaching it is a
/// [`Error::Timeout`].
pub async fn wait_for_operation(
    transport: &dyn Transport,
    base_path: &str,
    initial: Value,
    poll_interval: Duration,
    deadline: Instant,
) -> Result<CompletedOperation> {
    let Some(mut handle) = OperationHandle::from_response(&initial) else {
        return Ok(CompletedOperation {
            first_response: (!initial.is_null()).then_some(initial),
            ..Default::default()
        });
    };

    let url = format!("{}/{}", base_path.trim_end_matches('/'), handle.name);
    let mut polls = 0u32;

    while !handle.done {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!("Operation {} still running at deadline after {} polls", handle.name, polls);
            return Err(Error::Timeout {
                waiting_for: format!("operation {}", handle.name),
            });
        }
        tokio::time::sleep(poll_interval.min(remaining)).await;

        polls += 1;
        let body = call(transport, Method::Get, &url, None, &handle.name).await?;
        handle = serde_json::from_value(body).map_err(|e| {
            Error::codec("operation", format!("invalid operation response: {}", e))
        })?;
        tracing::debug!("Polled operation {} ({}): done={}", handle.name, polls, handle.done);
    }

    tracing::info!("Operation {} finished after {} polls", handle.name, polls);

    if let Some(status) = handle.error.as_ref().filter(|s| s.code != 0) {
        return Err(Error::from_operation(&handle.name, status.code, &status.message));
    }

    Ok(CompletedOperation {
        name: handle.name,
        first_response: handle.response,
        polls,
    })
}
