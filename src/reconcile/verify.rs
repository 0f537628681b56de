//! Convergence check after an apply.

use super::canonicalize::{canonicalize_desired, canonicalize_new_state};
use super::diff::diff;
use super::executor::Executor;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKind};
use crate::schema::{Object, Schema};

/// Compare a post-apply state against the caller's raw desired state.
///
/// Returns the canonicalized new state when only output-only fields still
/// differ; otherwise [`Error::DiffAfterApply`] listing the rest.
pub fn check_convergence<U: Copy + Eq + std::fmt::Display>(
    schema: &Schema<U>,
    raw_desired: &Object,
    new_state: &Object,
) -> Result<Object> {
    let new_state = canonicalize_new_state(schema, new_state, raw_desired);
    let desired = canonicalize_desired(schema, raw_desired, Some(&new_state));

    let remaining: Vec<String> = diff(schema, Some(&desired), Some(&new_state))?
        .iter()
        .filter(|d| !d.output_only)
        .map(ToString::to_string)
        .collect();

    if !remaining.is_empty() {
        return Err(Error::DiffAfterApply { diffs: remaining });
    }
    Ok(new_state)
}

/// Re-read the resource and check it converged on `raw_desired`.
/// `first_response` carries the create operation's payload, if any, for
/// fields the read does not return.
pub async fn verify<K: ResourceKind>(
    executor: &Executor<'_, K>,
    raw_desired: &Resource<K>,
    first_response: Option<&Object>,
) -> Result<Resource<K>> {
    let mut new_state = executor.get(&raw_desired.name).await?.spec;
    if let Some(first) = first_response {
        new_state.fill_missing_from(first);
    }

    let converged = check_convergence(K::schema(), &raw_desired.spec, &new_state)?;
    tracing::info!("No diffs found. Apply was successful.");
    Ok(raw_desired.with_spec(converged))
}
