//! The reconciler facade.

use super::canonicalize::{canonicalize_desired, canonicalize_new_state};
use super::diff::{diff, FieldDiff};
use super::executor::Executor;
use super::plan::{self, group, Lifecycle, Plan, PlannedChange};
use super::retry::retry_on_conflict;
use super::verify::verify;
use super::ReconcilerSettings;
use crate::error::{Error, Result};
use crate::gcp::transport::Transport;
use crate::resource::{Resource, ResourceKind, ResourceName};
use crate::schema::validate::validate;
use crate::schema::Object;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Result of a dry-run plan
#[derive(Debug)]
pub struct DryRun<U> {
    /// Whether the resource currently exists
    pub exists: bool,
    pub diffs: Vec<FieldDiff<U>>,
    pub changes: Vec<PlannedChange<U>>,
    /// The plan, or why it is infeasible under the given lifecycle
    pub plan: Result<Plan<U>>,
}

/// Reconciles resources against one API endpoint
#[derive(Clone)]
pub struct Reconciler {
    transport: Arc<dyn Transport>,
    base_path: String,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_path: impl Into<String>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            transport,
            base_path: base_path.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn base_path(&self) -> &str {
        &self.base_path
    }

    pub(crate) fn executor<K: ResourceKind>(&self, deadline: Instant) -> Executor<'_, K> {
        Executor::new(self.transport.as_ref(), &self.base_path, &self.settings, deadline)
    }

    /// Bound `fut` by the configured timeout
    async fn with_deadline<T>(
        &self,
        what: &str,
        deadline: Instant,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                waiting_for: what.to_string(),
            }),
        }
    }

    /// Read the current state of `name`
    pub async fn get<K: ResourceKind>(&self, name: &ResourceName) -> Result<Resource<K>> {
        let span = tracing::info_span!(
            "get",
            kind = K::KIND,
            resource = %name.path::<K>(),
            request_id = %Uuid::new_v4(),
        );

        async {
            name.validate::<K>()?;
            let deadline = Instant::now() + self.settings.timeout;
            let what = format!("read of {} {}", K::KIND, name.path::<K>());
            let executor = self.executor::<K>(deadline);
            self.with_deadline(&what, deadline, executor.get(name)).await
        }
        .instrument(span)
        .await
    }

    /// Read the current state and fold `desired` into it, so fields the
    /// caller spelled differently but equivalently keep the caller's form
    pub async fn get_canonical<K: ResourceKind>(&self, desired: &Resource<K>) -> Result<Resource<K>> {
        let current = self.get::<K>(&desired.name).await?;
        Ok(current.with_spec(canonicalize_new_state(K::schema(), &current.spec, &desired.spec)))
    }

    async fn fetch_initial<K: ResourceKind>(
        &self,
        executor: &Executor<'_, K>,
        name: &ResourceName,
    ) -> Result<Option<Object>> {
        tracing::info!("Fetching initial state");
        match executor.get(name).await {
            Ok(resource) => Ok(Some(resource.spec)),
            Err(e) if e.is_not_found() => {
                tracing::info!("{} {} does not exist", K::KIND, name.path::<K>());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Plan what [`apply`](Self::apply) would do, without mutating anything
    pub async fn plan<K: ResourceKind>(
        &self,
        desired: &Resource<K>,
        lifecycle: &Lifecycle,
    ) -> Result<DryRun<K::Update>> {
        desired.name.validate::<K>()?;
        validate(K::schema(), &desired.spec)?;

        let deadline = Instant::now() + self.settings.timeout;
        let executor = self.executor::<K>(deadline);
        let initial = self.fetch_initial(&executor, &desired.name).await?;

        let canonical = canonicalize_desired(K::schema(), &desired.spec, initial.as_ref());
        let diffs = match &initial {
            Some(initial) => diff(K::schema(), Some(&canonical), Some(initial))?,
            None => Vec::new(),
        };
        let changes = group(&diffs);
        let plan = plan::plan(K::KIND, initial.is_some(), diffs.clone(), lifecycle);

        Ok(DryRun {
            exists: initial.is_some(),
            diffs,
            changes,
            plan,
        })
    }

    /// Drive `desired` to convergence and return the resulting state.
    ///
    /// `state_hint`, when given, stands in for the initial read on the first
    /// attempt. Conflict retries always re-read.
    pub async fn apply<K: ResourceKind>(
        &self,
        desired: &Resource<K>,
        lifecycle: &Lifecycle,
        state_hint: Option<&Resource<K>>,
    ) -> Result<Resource<K>> {
        let span = tracing::info_span!(
            "apply",
            kind = K::KIND,
            resource = %desired.path(),
            request_id = %Uuid::new_v4(),
        );

        async {
            desired.name.validate::<K>()?;
            validate(K::schema(), &desired.spec)?;

            let deadline = Instant::now() + self.settings.timeout;
            let what = format!("apply of {}", desired.describe());
            let attempts = retry_on_conflict(&self.settings.conflict_retry, &what, move |attempt| {
                let hint = state_hint.filter(|_| attempt == 1).map(|h| &h.spec);
                self.apply_once(desired, lifecycle, hint, deadline)
            });
            self.with_deadline(&what, deadline, attempts).await
        }
        .instrument(span)
        .await
    }

    async fn apply_once<K: ResourceKind>(
        &self,
        desired: &Resource<K>,
        lifecycle: &Lifecycle,
        state_hint: Option<&Object>,
        deadline: Instant,
    ) -> Result<Resource<K>> {
        let schema = K::schema();
        let executor = self.executor::<K>(deadline);

        let initial = match state_hint {
            Some(hint) => {
                tracing::info!("Using state hint as initial state");
                Some(hint.clone())
            }
            None => self.fetch_initial(&executor, &desired.name).await?,
        };

        let canonical = canonicalize_desired(schema, &desired.spec, initial.as_ref());
        let diffs = match &initial {
            Some(initial) => diff(schema, Some(&canonical), Some(initial))?,
            None => Vec::new(),
        };
        for d in &diffs {
            tracing::debug!("Found diff: {}", d);
        }

        let plan = plan::plan(K::KIND, initial.is_some(), diffs, lifecycle)?;
        tracing::info!("Created plan: {} operation(s)", plan.operations.len());

        if plan.is_empty() {
            tracing::info!("No diffs found. Apply was successful.");
            let current = initial.unwrap_or_default();
            let state = canonicalize_new_state(schema, &current, &desired.spec);
            return Ok(desired.with_spec(state));
        }

        let canonical = desired.with_spec(canonical);
        let mut first_response = None;
        for operation in &plan.operations {
            tracing::info!("Performing operation {}", operation);
            if let Some(response) = executor.execute(operation, &canonical).await? {
                first_response = Some(response);
            }
        }

        verify(&executor, desired, first_response.as_ref()).await
    }

    /// Delete the resource named by `name`; an absent resource is a success
    pub async fn delete<K: ResourceKind>(&self, name: &ResourceName) -> Result<()> {
        let span = tracing::info_span!(
            "delete",
            kind = K::KIND,
            resource = %name.path::<K>(),
            request_id = %Uuid::new_v4(),
        );

        async {
            name.validate::<K>()?;
            let deadline = Instant::now() + self.settings.timeout;
            let what = format!("delete of {} {}", K::KIND, name.path::<K>());
            let attempts = retry_on_conflict(&self.settings.conflict_retry, &what, move |_| {
                let executor = self.executor::<K>(deadline);
                async move { executor.delete(name).await }
            });
            self.with_deadline(&what, deadline, attempts).await
        }
        .instrument(span)
        .await
    }
}
