//! Resource Registry
//!
//! Maps the names users type (CLI arguments, manifest `kind`) to the
//! built-in resource kinds.

use super::{AwsCluster, AwsNodePool, ResourceKind};

/// Built-in resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    AwsCluster,
    AwsNodePool,
}

const ALL_KEYS: &[ResourceKey] = &[ResourceKey::AwsCluster, ResourceKey::AwsNodePool];

impl ResourceKey {
    /// Name used on the command line
    pub fn cli_name(self) -> &'static str {
        match self {
            ResourceKey::AwsCluster => "aws-cluster",
            ResourceKey::AwsNodePool => "aws-node-pool",
        }
    }

    /// Kind label as written in manifests
    pub fn kind(self) -> &'static str {
        match self {
            ResourceKey::AwsCluster => AwsCluster::KIND,
            ResourceKey::AwsNodePool => AwsNodePool::KIND,
        }
    }

    /// Whether resources of this kind live under a parent resource
    pub fn has_parent(self) -> bool {
        match self {
            ResourceKey::AwsCluster => AwsCluster::PARENT_COLLECTION.is_some(),
            ResourceKey::AwsNodePool => AwsNodePool::PARENT_COLLECTION.is_some(),
        }
    }
}

/// Get all registered resource keys
pub fn get_all_resource_keys() -> &'static [ResourceKey] {
    ALL_KEYS
}

/// Look up a kind by CLI name or kind label, case-insensitively
pub fn get_resource_key(name: &str) -> Option<ResourceKey> {
    let wanted = name.trim();
    ALL_KEYS.iter().copied().find(|key| {
        key.cli_name().eq_ignore_ascii_case(wanted) || key.kind().eq_ignore_ascii_case(wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_cli_name_and_kind() {
        assert_eq!(get_resource_key("aws-cluster"), Some(ResourceKey::AwsCluster));
        assert_eq!(get_resource_key("AwsNodePool"), Some(ResourceKey::AwsNodePool));
        assert_eq!(get_resource_key("awsnodepool"), Some(ResourceKey::AwsNodePool));
        assert_eq!(get_resource_key("gce-instance"), None);
    }

    #[test]
    fn test_only_node_pools_have_parents() {
        assert!(!ResourceKey::AwsCluster.has_parent());
        assert!(ResourceKey::AwsNodePool.has_parent());
    }

    #[test]
    fn test_all_keys_are_unique() {
        let keys = get_all_resource_keys();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a.cli_name(), b.cli_name());
            }
        }
    }
}
