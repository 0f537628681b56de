//! GKE Multi-Cloud `AwsNodePool`
//!
//! Node pools live under an `AwsCluster`. Only `annotations` can change in
//! place.

use super::aws_cluster::{arn, security_group_ids, volume_fields};
use super::ResourceKind;
use crate::schema::{FieldSpec, ListKind, Schema};
use std::fmt;
use std::sync::OnceLock;

/// Valid taint `effect` values
pub const TAINT_EFFECTS: &[&str] = &[
    "EFFECT_UNSPECIFIED",
    "NO_SCHEDULE",
    "PREFER_NO_SCHEDULE",
    "NO_EXECUTE",
];

/// Valid `state` values
pub const NODE_POOL_STATES: &[&str] = &[
    "STATE_UNSPECIFIED",
    "PROVISIONING",
    "RUNNING",
    "RECONCILING",
    "STOPPING",
    "ERROR",
    "DEGRADED",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodePoolUpdate {
    UpdateAwsNodePool,
}

impl fmt::Display for NodePoolUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePoolUpdate::UpdateAwsNodePool => write!(f, "UpdateAwsNodePool"),
        }
    }
}

/// Node pool of an Anthos cluster on AWS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwsNodePool;

impl ResourceKind for AwsNodePool {
    type Update = NodePoolUpdate;

    const KIND: &'static str = "AwsNodePool";
    const COLLECTION: &'static str = "awsNodePools";
    const ID_PARAM: &'static str = "awsNodePoolId";
    const PARENT_COLLECTION: Option<&'static str> = Some("awsClusters");

    fn schema() -> &'static Schema<NodePoolUpdate> {
        static SCHEMA: OnceLock<Schema<NodePoolUpdate>> = OnceLock::new();
        SCHEMA.get_or_init(build_schema)
    }
}

fn build_schema() -> Schema<NodePoolUpdate> {
    Schema::new(vec![
        FieldSpec::string("version").required(),
        FieldSpec::object(
            "config",
            vec![
                FieldSpec::string("instanceType").server_default(),
                FieldSpec::object("rootVolume", volume_fields()).server_default(),
                FieldSpec::list(
                    "taints",
                    ListKind::Set,
                    vec![
                        FieldSpec::string("key").required(),
                        FieldSpec::string("value").required(),
                        FieldSpec::enumeration("effect", TAINT_EFFECTS).required(),
                    ],
                ),
                FieldSpec::string_map("labels"),
                FieldSpec::string_map("tags"),
                FieldSpec::string("iamInstanceProfile").required(),
                FieldSpec::object(
                    "configEncryption",
                    vec![arn("kmsKeyArn").required()],
                )
                .required(),
                FieldSpec::object("sshConfig", vec![FieldSpec::string("ec2KeyPair").required()]),
                security_group_ids(),
            ],
        )
        .required(),
        FieldSpec::object(
            "autoscaling",
            vec![
                FieldSpec::integer("minNodeCount").required(),
                FieldSpec::integer("maxNodeCount").required(),
            ],
        )
        .required(),
        FieldSpec::string("subnetId").required(),
        FieldSpec::enumeration("state", NODE_POOL_STATES).output_only(),
        FieldSpec::string("uid").output_only(),
        FieldSpec::boolean("reconciling").output_only(),
        FieldSpec::string("createTime").output_only(),
        FieldSpec::string("updateTime").output_only(),
        FieldSpec::string("etag").output_only(),
        FieldSpec::string_map("annotations").updatable(NodePoolUpdate::UpdateAwsNodePool),
        FieldSpec::object(
            "maxPodsConstraint",
            vec![FieldSpec::integer("maxPodsPerNode").required()],
        )
        .required(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::canonicalize::canonicalize_desired;
    use crate::reconcile::diff::diff;
    use crate::schema::{FieldType, Object, Selector, Value};

    #[test]
    fn test_everything_but_annotations_recreates() {
        let schema = AwsNodePool::schema();
        for field in schema.fields() {
            let expected = match field.name {
                "annotations" => Selector::Update(NodePoolUpdate::UpdateAwsNodePool),
                _ if field.is_output_only() => Selector::None,
                _ => Selector::Recreate,
            };
            assert_eq!(field.selector(), expected, "field {}", field.name);
        }
    }

    #[test]
    fn test_reordered_security_groups_and_padded_arn_are_not_changes() {
        let config = |groups: &[&str], kms: &str| {
            Object::new()
                .with(
                    "securityGroupIds",
                    Value::StringArray(groups.iter().map(|g| g.to_string()).collect()),
                )
                .with("configEncryption", Object::new().with("kmsKeyArn", kms))
        };
        let desired = Object::new().with("config", config(&["sg-2", "sg-1"], "arn:aws:kms:k1 "));
        let actual = Object::new().with("config", config(&["sg-1", "sg-2"], "arn:aws:kms:k1"));

        let canonical = canonicalize_desired(AwsNodePool::schema(), &desired, Some(&actual));
        let diffs = diff(AwsNodePool::schema(), Some(&canonical), Some(&actual)).unwrap();
        assert!(diffs.is_empty(), "unexpected diffs: {:?}", diffs);

        let moved = Object::new().with("config", config(&["sg-1", "sg-3"], "arn:aws:kms:k1"));
        let diffs = diff(AwsNodePool::schema(), Some(&desired), Some(&moved)).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].path.to_string(), "config.securityGroupIds");
    }

    #[test]
    fn test_taints_are_a_set() {
        let config = AwsNodePool::schema().field("config").unwrap();
        let taints = config.ty.nested().unwrap().field("taints").unwrap();
        assert!(matches!(taints.ty, FieldType::ObjectList(_, ListKind::Set)));
    }
}
