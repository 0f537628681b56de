//! GKE Multi-Cloud `AwsCluster`
//!
//! Only `description`, `annotations` and `controlPlane.version` can change in
//! place, all through `UpdateAwsCluster`. Everything else is fixed at
//! creation.

use super::ResourceKind;
use crate::schema::{Equivalence, FieldSpec, ListKind, Schema};
use std::fmt;
use std::sync::OnceLock;

/// Valid `volumeType` values for control plane and node volumes
pub const VOLUME_TYPES: &[&str] = &["VOLUME_TYPE_UNSPECIFIED", "GP2", "GP3"];

/// Valid `state` values
pub const CLUSTER_STATES: &[&str] = &[
    "STATE_UNSPECIFIED",
    "PROVISIONING",
    "RUNNING",
    "RECONCILING",
    "STOPPING",
    "ERROR",
    "DEGRADED",
];

/// Update operations on an AWS cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClusterUpdate {
    UpdateAwsCluster,
}

impl fmt::Display for ClusterUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterUpdate::UpdateAwsCluster => write!(f, "UpdateAwsCluster"),
        }
    }
}

/// Anthos cluster running on AWS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwsCluster;

impl ResourceKind for AwsCluster {
    type Update = ClusterUpdate;

    const KIND: &'static str = "AwsCluster";
    const COLLECTION: &'static str = "awsClusters";
    const ID_PARAM: &'static str = "awsClusterId";

    fn schema() -> &'static Schema<ClusterUpdate> {
        static SCHEMA: OnceLock<Schema<ClusterUpdate>> = OnceLock::new();
        SCHEMA.get_or_init(build_schema)
    }
}

/// `rootVolume` / `mainVolume` layout, shared with node pools
pub(crate) fn volume_fields<U: Copy + Eq>() -> Vec<FieldSpec<U>> {
    vec![
        FieldSpec::integer("sizeGib").server_default(),
        FieldSpec::enumeration("volumeType", VOLUME_TYPES).server_default(),
        FieldSpec::integer("iops").server_default(),
        arn("kmsKeyArn"),
    ]
}

/// ARNs are pasted by hand; stray whitespace is not a change
pub(crate) fn arn<U: Copy + Eq>(name: &'static str) -> FieldSpec<U> {
    FieldSpec::string(name).equivalence(Equivalence::Trimmed)
}

/// AWS treats security groups as a set
pub(crate) fn security_group_ids<U: Copy + Eq>() -> FieldSpec<U> {
    FieldSpec::string_array("securityGroupIds").equivalence(Equivalence::Unordered)
}

fn build_schema() -> Schema<ClusterUpdate> {
    use ClusterUpdate::UpdateAwsCluster;

    Schema::new(vec![
        FieldSpec::string("description").updatable(UpdateAwsCluster),
        FieldSpec::object(
            "networking",
            vec![
                FieldSpec::string("vpcId").required(),
                FieldSpec::string_array("podAddressCidrBlocks").required(),
                FieldSpec::string_array("serviceAddressCidrBlocks").required(),
            ],
        )
        .required(),
        FieldSpec::string("awsRegion").required(),
        FieldSpec::object(
            "controlPlane",
            vec![
                FieldSpec::string("version").required().updatable(UpdateAwsCluster),
                FieldSpec::string("instanceType").server_default(),
                FieldSpec::object("sshConfig", vec![FieldSpec::string("ec2KeyPair").required()]),
                FieldSpec::string_array("subnetIds").required(),
                FieldSpec::object(
                    "configEncryption",
                    vec![arn("kmsKeyArn").required()],
                )
                .required(),
                security_group_ids(),
                FieldSpec::string("iamInstanceProfile").required(),
                FieldSpec::object("rootVolume", volume_fields()).server_default(),
                FieldSpec::object("mainVolume", volume_fields()).server_default(),
                FieldSpec::object(
                    "databaseEncryption",
                    vec![arn("kmsKeyArn").required()],
                )
                .required(),
                FieldSpec::string_map("tags"),
                FieldSpec::object(
                    "awsServicesAuthentication",
                    vec![
                        arn("roleArn").required(),
                        FieldSpec::string("roleSessionName").server_default(),
                    ],
                )
                .required(),
                FieldSpec::object(
                    "proxyConfig",
                    vec![
                        arn("secretArn").required(),
                        FieldSpec::string("secretVersion").required(),
                    ],
                ),
            ],
        )
        .required(),
        FieldSpec::object(
            "authorization",
            vec![FieldSpec::list(
                "adminUsers",
                ListKind::Slice,
                vec![FieldSpec::string("username").required()],
            )
            .required()],
        )
        .required(),
        FieldSpec::enumeration("state", CLUSTER_STATES).output_only(),
        FieldSpec::string("endpoint").output_only(),
        FieldSpec::string("uid").output_only(),
        FieldSpec::boolean("reconciling").output_only(),
        FieldSpec::string("createTime").output_only(),
        FieldSpec::string("updateTime").output_only(),
        FieldSpec::string("etag").output_only(),
        FieldSpec::string_map("annotations").updatable(UpdateAwsCluster),
        FieldSpec::object(
            "workloadIdentityConfig",
            vec![
                FieldSpec::string("issuerUri"),
                FieldSpec::string("workloadPool"),
                FieldSpec::string("identityProvider"),
            ],
        )
        .output_only(),
        FieldSpec::object(
            "fleet",
            vec![
                FieldSpec::string("project")
                    .required()
                    .equivalence(Equivalence::SelfLink),
                FieldSpec::string("membership").output_only(),
            ],
        )
        .required(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Mutability, Selector};

    #[test]
    fn test_only_documented_fields_are_updatable() {
        let schema = AwsCluster::schema();
        let updatable: Vec<&str> = schema
            .fields()
            .iter()
            .filter(|f| matches!(f.mutability, Mutability::Updatable(_)))
            .map(|f| f.name)
            .collect();
        assert_eq!(updatable, vec!["description", "annotations"]);

        let control_plane = schema.field("controlPlane").unwrap();
        assert_eq!(control_plane.selector(), Selector::Recreate);
        let nested = control_plane.ty.nested().unwrap();
        assert_eq!(
            nested.field("version").unwrap().selector(),
            Selector::Update(ClusterUpdate::UpdateAwsCluster)
        );
        assert_eq!(nested.field("subnetIds").unwrap().selector(), Selector::Recreate);
    }

    #[test]
    fn test_update_touches_control_plane() {
        let schema = AwsCluster::schema();
        assert!(schema.field("controlPlane").unwrap().touches(ClusterUpdate::UpdateAwsCluster));
        assert!(!schema.field("networking").unwrap().touches(ClusterUpdate::UpdateAwsCluster));
    }

    #[test]
    fn test_output_only_fields() {
        let schema = AwsCluster::schema();
        for name in ["state", "endpoint", "uid", "etag", "workloadIdentityConfig"] {
            assert!(schema.field(name).unwrap().is_output_only(), "{} should be output-only", name);
        }
    }
}
