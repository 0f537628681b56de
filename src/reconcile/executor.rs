//! Operation executor
//!
//! Performs planned operations against the remote API: builds URLs and
//! request bodies from the resource kind, issues the call, and waits for the
//! returned long-running operation.

use super::plan::Operation;
use super::ReconcilerSettings;
use crate::error::{Error, Result};
use crate::gcp::client::{resource_url, with_query};
use crate::gcp::operation::wait_for_operation;
use crate::gcp::transport::{call, Method, Transport};
use crate::reconcile::diff::FieldDiff;
use crate::resource::{Resource, ResourceKind, ResourceName};
use crate::schema::codec::{self, Direction};
use crate::schema::Object;
use serde_json::Value as Json;
use std::marker::PhantomData;
use tokio::time::Instant;

/// Runs operations for resources of kind `K` within one call's deadline
pub struct Executor<'a, K: ResourceKind> {
    transport: &'a dyn Transport,
    base_path: &'a str,
    settings: &'a ReconcilerSettings,
    deadline: Instant,
    kind: PhantomData<K>,
}

impl<'a, K: ResourceKind> Executor<'a, K> {
    pub fn new(
        transport: &'a dyn Transport,
        base_path: &'a str,
        settings: &'a ReconcilerSettings,
        deadline: Instant,
    ) -> Self {
        Self {
            transport,
            base_path,
            settings,
            deadline,
            kind: PhantomData,
        }
    }

    fn url(&self, name: &ResourceName) -> String {
        resource_url(self.base_path, &name.path::<K>())
    }

    async fn wait(&self, response: Json) -> Result<Option<Object>> {
        let done = wait_for_operation(
            self.transport,
            self.base_path,
            response,
            self.settings.poll_interval,
            self.deadline,
        )
        .await?;

        done.first_response
            .as_ref()
            .map(|body| codec::decode(K::schema(), body, Direction::FromWire))
            .transpose()
    }

    /// Raw JSON of the current remote state
    pub async fn get_raw(&self, name: &ResourceName) -> Result<Json> {
        call(self.transport, Method::Get, &self.url(name), None, &name.path::<K>()).await
    }

    /// Current remote state, decoded
    pub async fn get(&self, name: &ResourceName) -> Result<Resource<K>> {
        let body = self.get_raw(name).await?;
        Resource::from_wire(&body, Some(name))
    }

    /// Run one planned operation. Create returns the operation's response
    /// payload, for merging into the post-apply state.
    pub async fn execute(
        &self,
        operation: &Operation<K::Update>,
        desired: &Resource<K>,
    ) -> Result<Option<Object>> {
        match operation {
            Operation::Create => self.create(desired).await.map(Some),
            Operation::Update { kind, diffs } => {
                self.update(desired, *kind, diffs).await?;
                Ok(None)
            }
            Operation::Delete => {
                self.delete(&desired.name).await?;
                Ok(None)
            }
        }
    }

    /// POST the resource, wait for the operation, then confirm with a read.
    ///
    /// Returns the confirmed state with the operation's response merged in.
    pub async fn create(&self, desired: &Resource<K>) -> Result<Object> {
        let collection = resource_url(self.base_path, &desired.name.parent.collection_path::<K>());
        let url = with_query(&collection, &[(K::ID_PARAM, desired.name.name.as_str())]);
        let body = desired.to_wire(Direction::ToWire);

        tracing::info!("Creating {}", desired.describe());
        let response = call(self.transport, Method::Post, &url, Some(&body), &desired.path()).await?;
        let first_response = self.wait(response).await?;

        let mut created = self.get(&desired.name).await?.spec;
        if let Some(first) = &first_response {
            created.fill_missing_from(first);
        }
        tracing::info!("Created {}", desired.describe());
        Ok(created)
    }

    /// Apply one update operation. The version token is read fresh from the
    /// server immediately before the write.
    pub async fn update(
        &self,
        desired: &Resource<K>,
        op: K::Update,
        diffs: &[FieldDiff<K::Update>],
    ) -> Result<()> {
        let current = self.get_raw(&desired.name).await?;
        let etag = current.get("etag").and_then(Json::as_str);
        if etag.is_none() {
            tracing::warn!("No etag on {}, sending update without version token", desired.path());
        }

        let endpoint = K::update_endpoint(op);
        let mut url = self.url(&desired.name);
        if let Some(verb) = endpoint.verb {
            url = format!("{}:{}", url, verb);
        }
        let mask = codec::update_mask(diffs.iter().map(|d| &d.path));
        let url = with_query(&url, &[("updateMask", mask.as_str())]);
        let body = codec::update_body(K::schema(), &desired.spec, op, etag);

        tracing::info!("Performing {} on {} (updateMask={})", op, desired.path(), mask);
        let response = call(self.transport, endpoint.method, &url, Some(&body), &desired.path()).await?;
        self.wait(response).await?;
        Ok(())
    }

    /// Delete the resource and confirm it is gone.
    ///
    /// An already-absent resource is a success. After the delete operation
    /// finishes, existence is re-checked up to the configured number of
    /// times before giving up with [`Error::NotDeleted`].
    pub async fn delete(&self, name: &ResourceName) -> Result<()> {
        let path = name.path::<K>();
        match self.get_raw(name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("{} {} not found, nothing to delete", K::KIND, path);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        tracing::info!("Deleting {} {}", K::KIND, path);
        match call(self.transport, Method::Delete, &self.url(name), None, &path).await {
            Ok(response) => {
                self.wait(response).await?;
            }
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        // At least one read, whatever the configured budget
        let attempts = self.settings.delete_confirm_attempts.max(1);
        for attempt in 1..=attempts {
            match self.get_raw(name).await {
                Err(e) if e.is_not_found() => {
                    tracing::info!("Deleted {} {} (confirmed after {} check(s))", K::KIND, path, attempt);
                    return Ok(());
                }
                Err(e) => return Err(e),
                Ok(_) => {
                    tracing::debug!("{} still present after delete ({}/{})", path, attempt, attempts);
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.delete_confirm_interval).await;
                    }
                }
            }
        }

        Err(Error::NotDeleted {
            resource: path,
            attempts,
        })
    }
}
