//! YAML manifests
//!
//! ```yaml
//! kind: AwsNodePool
//! project: my-project
//! location: us-west1
//! cluster: prod
//! name: pool-1
//! spec:
//!   version: 1.29.4-gke.200
//!   subnetId: subnet-0a1b2c
//! ```

use super::{get_resource_key, Parent, Resource, ResourceKey, ResourceKind, ResourceName};
use crate::error::{Error, Result};
use crate::schema::codec::{self, Direction};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Desired state document for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Parent cluster, for node pools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    pub name: String,
    #[serde(default)]
    pub spec: Json,
}

impl Manifest {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::codec("manifest", e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::codec("manifest", e.to_string()))
    }

    pub fn key(&self) -> Result<ResourceKey> {
        get_resource_key(&self.kind)
            .ok_or_else(|| Error::validation("kind", format!("unknown resource kind {:?}", self.kind)))
    }

    /// Build the desired resource, filling project/location from defaults
    /// when the manifest leaves them out. Output-only fields in `spec` are
    /// dropped.
    pub fn resource<K: ResourceKind>(
        &self,
        default_project: Option<&str>,
        default_location: Option<&str>,
    ) -> Result<Resource<K>> {
        let project = self
            .project
            .as_deref()
            .or(default_project)
            .unwrap_or_default();
        let location = self
            .location
            .as_deref()
            .or(default_location)
            .unwrap_or_default();

        let mut parent = Parent::new(project, location);
        if let Some(cluster) = &self.cluster {
            parent = parent.with_parent(cluster.as_str());
        }

        let spec = codec::decode(K::schema(), &self.spec, Direction::ToWire)?;
        Ok(Resource::new(ResourceName::new(parent, self.name.as_str()), spec))
    }

    /// Render a resource, including output-only fields, as a manifest
    pub fn from_resource<K: ResourceKind>(resource: &Resource<K>) -> Self {
        let parent = &resource.name.parent;
        Self {
            kind: K::KIND.to_string(),
            project: Some(parent.project.clone()),
            location: Some(parent.location.clone()),
            cluster: parent.parent.clone(),
            name: resource.name.name.clone(),
            spec: codec::encode(K::schema(), &resource.spec, Direction::FromWire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AwsNodePool, ResourceKey};
    use crate::schema::Value;

    const NODE_POOL: &str = "\
kind: AwsNodePool
location: us-west1
cluster: prod
name: pool-1
spec:
  version: 1.29.4-gke.200
  subnetId: subnet-0a1b2c
  uid: should-be-dropped
  autoscaling:
    minNodeCount: 1
    maxNodeCount: 3
";

    #[test]
    fn test_parse_node_pool_manifest() {
        let manifest = Manifest::from_yaml(NODE_POOL).unwrap();
        assert_eq!(manifest.key().unwrap(), ResourceKey::AwsNodePool);

        let resource: Resource<AwsNodePool> =
            manifest.resource(Some("my-project"), None).unwrap();
        assert_eq!(
            resource.path(),
            "projects/my-project/locations/us-west1/awsClusters/prod/awsNodePools/pool-1"
        );
        assert_eq!(resource.spec.get_str("subnetId"), Some("subnet-0a1b2c"));
        assert!(!resource.spec.contains("uid"));

        let autoscaling = resource.spec.get_object("autoscaling").unwrap();
        assert_eq!(autoscaling.get("maxNodeCount"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let manifest = Manifest::from_yaml("kind: GceInstance\nname: vm-1\n").unwrap();
        assert!(manifest.key().is_err());
    }

    #[test]
    fn test_render_keeps_identity() {
        let manifest = Manifest::from_yaml(NODE_POOL).unwrap();
        let resource: Resource<AwsNodePool> =
            manifest.resource(Some("my-project"), None).unwrap();
        let rendered = Manifest::from_resource(&resource);
        assert_eq!(rendered.cluster.as_deref(), Some("prod"));
        assert_eq!(rendered.project.as_deref(), Some("my-project"));
        assert_eq!(rendered.spec["subnetId"], "subnet-0a1b2c");
    }
}
