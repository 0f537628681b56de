//! Resource kinds and identities
//!
//! A resource kind supplies the static facts the reconciler needs about one
//! API collection: its schema, its REST path layout and the update
//! operations it supports. Identities ([`ResourceName`]) are kept apart from
//! the body ([`Object`]) so the body can be canonicalized and diffed without
//! special-casing path parameters.
//!
//! # Module Structure
//!
//! - [`aws_cluster`] - `AwsCluster` kind and schema
//! - [`aws_node_pool`] - `AwsNodePool` kind and schema
//! - [`manifest`] - YAML manifests accepted by the CLI
//! - [`registry`] - Lookup from CLI names to kinds

pub mod aws_cluster;
pub mod aws_node_pool;
pub mod manifest;
pub mod registry;

pub use aws_cluster::{AwsCluster, ClusterUpdate};
pub use aws_node_pool::{AwsNodePool, NodePoolUpdate};
pub use manifest::Manifest;
pub use registry::{get_all_resource_keys, get_resource_key, ResourceKey};

use crate::error::{Error, Result};
use crate::gcp::transport::Method;
use crate::schema::codec::{self, Direction};
use crate::schema::{Object, Schema};
use serde_json::Value as Json;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;

/// How an update operation is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEndpoint {
    pub method: Method,
    /// Custom verb appended as `:{verb}`
    pub verb: Option<&'static str>,
}

impl UpdateEndpoint {
    pub const PATCH: Self = Self {
        method: Method::Patch,
        verb: None,
    };
}

/// Static description of one API collection
pub trait ResourceKind: Send + Sync + 'static {
    /// Closed set of update operations this kind supports
    type Update: Copy + Ord + Eq + Hash + Debug + Display + Send + Sync + 'static;

    /// Display label, e.g. `AwsCluster`
    const KIND: &'static str;
    /// Path segment of the collection, e.g. `awsClusters`
    const COLLECTION: &'static str;
    /// Query parameter carrying the user-assigned id on create
    const ID_PARAM: &'static str;
    /// Collection of the parent resource, for nested kinds
    const PARENT_COLLECTION: Option<&'static str> = None;
    /// JSON key holding items in a list response
    const LIST_KEY: &'static str = Self::COLLECTION;

    fn schema() -> &'static Schema<Self::Update>;

    fn update_endpoint(_op: Self::Update) -> UpdateEndpoint {
        UpdateEndpoint::PATCH
    }
}

/// Identifies the collection a resource lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parent {
    pub project: String,
    pub location: String,
    /// Name of the parent resource, for nested kinds
    pub parent: Option<String>,
}

impl Parent {
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Check that every identity parameter `K` needs is set
    pub fn validate<K: ResourceKind>(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::validation("project", "required identity parameter is not set"));
        }
        if self.location.trim().is_empty() {
            return Err(Error::validation("location", "required identity parameter is not set"));
        }
        if let Some(collection) = K::PARENT_COLLECTION {
            if self.parent.as_deref().map_or(true, |p| p.trim().is_empty()) {
                return Err(Error::validation(
                    collection,
                    format!("{} requires a parent resource name", K::KIND),
                ));
            }
        }
        Ok(())
    }

    /// `projects/{project}/locations/{location}[/{parent collection}/{parent}]/{collection}`
    pub fn collection_path<K: ResourceKind>(&self) -> String {
        let mut path = format!(
            "projects/{}/locations/{}",
            urlencoding::encode(&self.project),
            urlencoding::encode(&self.location)
        );
        if let (Some(collection), Some(parent)) = (K::PARENT_COLLECTION, &self.parent) {
            path.push_str(&format!("/{}/{}", collection, urlencoding::encode(short_name(parent))));
        }
        path.push('/');
        path.push_str(K::COLLECTION);
        path
    }
}

/// Stable identity of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    pub parent: Parent,
    pub name: String,
}

impl ResourceName {
    pub fn new(parent: Parent, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            parent,
            name: short_name(&name).to_string(),
        }
    }

    pub fn validate<K: ResourceKind>(&self) -> Result<()> {
        self.parent.validate::<K>()?;
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "required identity parameter is not set"));
        }
        Ok(())
    }

    /// Full relative path of the resource
    pub fn path<K: ResourceKind>(&self) -> String {
        format!(
            "{}/{}",
            self.parent.collection_path::<K>(),
            urlencoding::encode(&self.name)
        )
    }

    /// Parse a full resource path as returned by the API.
    ///
    /// Accepts `projects/{p}/locations/{l}[/{parent collection}/{parent}]/{collection}/{name}`,
    /// optionally prefixed by a URL or `//service` host.
    pub fn parse<K: ResourceKind>(path: &str) -> Result<Self> {
        let start = path.find("projects/").ok_or_else(|| invalid_path(path))?;
        let segments: Vec<&str> = path[start..].trim_end_matches('/').split('/').collect();

        let expected = if K::PARENT_COLLECTION.is_some() { 8 } else { 6 };
        if segments.len() != expected
            || segments[0] != "projects"
            || segments[2] != "locations"
            || segments[expected - 2] != K::COLLECTION
        {
            return Err(invalid_path(path));
        }

        let mut parent = Parent::new(segments[1], segments[3]);
        if let Some(collection) = K::PARENT_COLLECTION {
            if segments[4] != collection {
                return Err(invalid_path(path));
            }
            parent = parent.with_parent(segments[5]);
        }
        Ok(Self::new(parent, segments[expected - 1]))
    }
}

fn invalid_path(path: &str) -> Error {
    Error::codec("name", format!("unrecognized resource path {:?}", path))
}

/// Reduce a self link or relative path to its final segment
pub fn short_name(s: &str) -> &str {
    s.trim_end_matches('/').rsplit('/').next().unwrap_or(s)
}

/// A resource of kind `K`: identity plus body
pub struct Resource<K: ResourceKind> {
    pub name: ResourceName,
    pub spec: Object,
    kind: PhantomData<K>,
}

impl<K: ResourceKind> Clone for Resource<K> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone(), self.spec.clone())
    }
}

impl<K: ResourceKind> PartialEq for Resource<K> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.spec == other.spec
    }
}

impl<K: ResourceKind> Debug for Resource<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(K::KIND)
            .field("name", &self.name)
            .field("spec", &self.spec)
            .finish()
    }
}

impl<K: ResourceKind> Resource<K> {
    pub fn new(name: ResourceName, spec: Object) -> Self {
        Self {
            name,
            spec,
            kind: PhantomData,
        }
    }

    pub fn path(&self) -> String {
        self.name.path::<K>()
    }

    /// Short description for logs and errors, e.g. `AwsCluster c1`
    pub fn describe(&self) -> String {
        format!("{} {}", K::KIND, self.path())
    }

    /// Same identity, different body
    pub fn with_spec(&self, spec: Object) -> Self {
        Self::new(self.name.clone(), spec)
    }

    /// Encode with the full `name` path added
    pub fn to_wire(&self, direction: Direction) -> Json {
        let mut body = codec::encode(K::schema(), &self.spec, direction);
        if let Json::Object(map) = &mut body {
            map.insert("name".to_string(), Json::String(self.path()));
        }
        body
    }

    /// Decode an API response; the identity comes from its `name` field,
    /// falling back to `fallback` when absent
    pub fn from_wire(json: &Json, fallback: Option<&ResourceName>) -> Result<Self> {
        let spec = codec::decode(K::schema(), json, Direction::FromWire)?;
        let name = match (json.get("name").and_then(Json::as_str), fallback) {
            (Some(path), _) if path.contains('/') => ResourceName::parse::<K>(path)?,
            (_, Some(fallback)) => fallback.clone(),
            (Some(short), None) => {
                return Err(invalid_path(short));
            }
            (None, None) => return Err(Error::codec("name", "response has no resource name")),
        };
        Ok(Self::new(name, spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_path() {
        let name = ResourceName::new(Parent::new("my-project", "us-west1"), "c1");
        assert_eq!(
            name.path::<AwsCluster>(),
            "projects/my-project/locations/us-west1/awsClusters/c1"
        );
    }

    #[test]
    fn test_node_pool_path_includes_cluster() {
        let name = ResourceName::new(
            Parent::new("my-project", "us-west1").with_parent("c1"),
            "np1",
        );
        assert_eq!(
            name.path::<AwsNodePool>(),
            "projects/my-project/locations/us-west1/awsClusters/c1/awsNodePools/np1"
        );
    }

    #[test]
    fn test_self_link_is_normalized() {
        let name = ResourceName::new(
            Parent::new("p", "l"),
            "projects/p/locations/l/awsClusters/c1",
        );
        assert_eq!(name.name, "c1");
    }

    #[test]
    fn test_parse_round_trips_path() {
        let path = "projects/my-project/locations/us-west1/awsClusters/c1/awsNodePools/np1";
        let name = ResourceName::parse::<AwsNodePool>(path).unwrap();
        assert_eq!(name.parent.parent.as_deref(), Some("c1"));
        assert_eq!(name.path::<AwsNodePool>(), path);

        let url = format!("https://us-west1-gkemulticloud.googleapis.com/v1/{}", path);
        assert_eq!(ResourceName::parse::<AwsNodePool>(&url).unwrap(), name);
    }

    #[test]
    fn test_parse_rejects_wrong_collection() {
        let err = ResourceName::parse::<AwsCluster>("projects/p/locations/l/awsNodePools/np1");
        assert!(err.is_err());
    }

    #[test]
    fn test_node_pool_requires_parent() {
        let name = ResourceName::new(Parent::new("my-project", "us-west1"), "np1");
        assert!(name.validate::<AwsCluster>().is_ok());
        let err = name.validate::<AwsNodePool>().unwrap_err();
        assert!(err.to_string().contains("awsClusters"));
    }

    #[test]
    fn test_missing_project_fails_validation() {
        let name = ResourceName::new(Parent::new("", "us-west1"), "c1");
        assert!(matches!(
            name.validate::<AwsCluster>(),
            Err(Error::Validation { ref field, .. }) if field == "project"
        ));
    }
}
