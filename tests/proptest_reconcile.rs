//! Property-based tests using proptest
//!
//! These tests check the algebraic properties the reconciler relies on:
//! canonicalization is idempotent and never invents values, diffing a state
//! against itself finds nothing, and set-like lists ignore order.

use gkemc::reconcile::canonicalize::canonicalize_desired;
use gkemc::reconcile::diff::diff;
use gkemc::reconcile::verify::check_convergence;
use gkemc::schema::{FieldSpec, ListKind, Object, Schema, Value};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Op {
    UpdateThing,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpdateThing")
    }
}

fn schema() -> &'static Schema<Op> {
    static SCHEMA: OnceLock<Schema<Op>> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new(vec![
            FieldSpec::string("description").updatable(Op::UpdateThing),
            FieldSpec::string("instanceType").server_default(),
            FieldSpec::integer("iops").server_default(),
            FieldSpec::string_array("subnetIds"),
            FieldSpec::string_map("annotations").updatable(Op::UpdateThing),
            FieldSpec::object(
                "rootVolume",
                vec![FieldSpec::integer("sizeGib"), FieldSpec::string("kmsKeyArn")],
            ),
            FieldSpec::list(
                "taints",
                ListKind::Set,
                vec![FieldSpec::string("key"), FieldSpec::string("value")],
            ),
            FieldSpec::string("state").output_only(),
        ])
    })
}

const FIELDS: &[&str] = &[
    "description",
    "instanceType",
    "iops",
    "subnetIds",
    "annotations",
    "rootVolume",
    "taints",
    "state",
];

fn arb_string() -> impl Strategy<Value = String> {
    // Empty strings are the unspecified value and must be handled too
    prop_oneof!["", "[a-z]{1,6}"]
}

fn arb_root_volume() -> impl Strategy<Value = Object> {
    (
        proptest::option::of(0i64..500),
        proptest::option::of(arb_string()),
    )
        .prop_map(|(size, kms)| {
            let mut obj = Object::new();
            obj.set("sizeGib", size.map(Value::Integer));
            obj.set("kmsKeyArn", kms.map(Value::String));
            obj
        })
}

/// Taints keyed uniquely, so each item has at most one counterpart
fn arb_taints() -> impl Strategy<Value = Vec<Object>> {
    prop::collection::btree_map("[a-c]", "[x-z]", 0..4).prop_map(|taints| {
        taints
            .into_iter()
            .map(|(key, value)| Object::new().with("key", key).with("value", value))
            .collect()
    })
}

fn arb_state() -> impl Strategy<Value = Object> {
    (
        proptest::option::of(arb_string()),
        proptest::option::of(prop_oneof![Just(""), Just("t3.medium"), Just("t3.large")]),
        proptest::option::of(prop_oneof![Just(0i64), Just(3000i64), Just(6000i64)]),
        proptest::option::of(prop::collection::vec("s[0-3]", 0..3)),
        proptest::option::of(prop::collection::btree_map("[a-c]", "[a-z]{0,3}", 0..3)),
        proptest::option::of(arb_root_volume()),
        proptest::option::of(arb_taints()),
        proptest::option::of(prop_oneof![Just("RUNNING"), Just("PROVISIONING")]),
    )
        .prop_map(
            |(description, instance_type, iops, subnets, annotations, root, taints, state)| {
                let mut obj = Object::new();
                obj.set("description", description.map(Value::String));
                obj.set("instanceType", instance_type.map(|s| Value::String(s.to_string())));
                obj.set("iops", iops.map(Value::Integer));
                obj.set("subnetIds", subnets.map(Value::StringArray));
                obj.set(
                    "annotations",
                    annotations.map(|m: BTreeMap<String, String>| Value::StringMap(m)),
                );
                obj.set("rootVolume", root.map(Value::Object));
                obj.set("taints", taints.map(Value::ObjectList));
                obj.set("state", state.map(|s| Value::String(s.to_string())));
                obj
            },
        )
}

proptest! {
    /// Canonicalizing an already canonical state changes nothing
    #[test]
    fn canonicalize_desired_is_idempotent(desired in arb_state(), initial in arb_state()) {
        let once = canonicalize_desired(schema(), &desired, Some(&initial));
        let twice = canonicalize_desired(schema(), &once, Some(&initial));
        prop_assert_eq!(once, twice);
    }

    /// Without an initial state, canonicalization is also idempotent
    #[test]
    fn canonicalize_without_initial_is_idempotent(desired in arb_state()) {
        let once = canonicalize_desired(schema(), &desired, None);
        let twice = canonicalize_desired(schema(), &once, None);
        prop_assert!(!once.contains("state"));
        prop_assert_eq!(once, twice);
    }

    /// Every field of the result comes from one of the inputs
    #[test]
    fn canonicalize_never_invents_fields(desired in arb_state(), initial in arb_state()) {
        let canonical = canonicalize_desired(schema(), &desired, Some(&initial));
        for field in FIELDS {
            if let Some(value) = canonical.get(field) {
                let from_desired = desired.get(field) == Some(value);
                let from_initial = initial.get(field) == Some(value);
                let merged = desired.contains(field) && initial.contains(field);
                prop_assert!(
                    from_desired || from_initial || merged,
                    "{} = {} came from neither input",
                    field,
                    value
                );
            }
        }
    }

    /// A state never differs from itself
    #[test]
    fn diff_is_reflexive(state in arb_state()) {
        let diffs = diff(schema(), Some(&state), Some(&state)).unwrap();
        prop_assert!(diffs.is_empty(), "unexpected diffs: {:?}", diffs);
    }

    /// After canonicalizing against the initial state, fields the caller
    /// left unspecified never show up as diffs
    #[test]
    fn canonical_desired_only_diffs_on_specified_fields(
        desired in arb_state(),
        initial in arb_state(),
    ) {
        let canonical = canonicalize_desired(schema(), &desired, Some(&initial));
        for d in diff(schema(), Some(&canonical), Some(&initial)).unwrap() {
            let top = d.path.head().unwrap_or_default();
            prop_assert!(desired.contains(top), "diff on unspecified field {}", d.path);
        }
    }

    /// Set-like lists compare equal in any order
    #[test]
    fn set_lists_ignore_order(taints in arb_taints()) {
        let mut reversed = taints.clone();
        reversed.reverse();

        let desired = Object::new().with("taints", Value::ObjectList(taints));
        let actual = Object::new().with("taints", Value::ObjectList(reversed));
        prop_assert!(diff(schema(), Some(&desired), Some(&actual)).unwrap().is_empty());
    }

    /// A remote side that stores what it was sent, and fills in defaults for
    /// the rest, always passes the convergence check
    #[test]
    fn faithful_apply_converges(desired in arb_state(), defaults in arb_state()) {
        let mut observed = desired.clone();
        observed.fill_missing_from(&defaults);
        prop_assert!(check_convergence(schema(), &desired, &observed).is_ok());
    }
}

/// Tests for input validation
mod input_validation_tests {
    use super::*;
    use gkemc::gcp::auth::validate_project_id;
    use gkemc::gcp::http::sanitize_for_log;

    proptest! {
        /// Well-formed project IDs pass validation
        #[test]
        fn valid_project_ids_accepted(
            prefix in "[a-z]",
            middle in "[a-z0-9-]{4,27}",
            last in "[a-z0-9]",
        ) {
            let project_id = format!("{}{}{}", prefix, middle, last);
            prop_assert!(validate_project_id(&project_id));
        }

        /// Project IDs starting with a digit are rejected
        #[test]
        fn numeric_start_rejected(num in "[0-9]", rest in "[a-z0-9-]{5,28}") {
            let project_id = format!("{}{}", num, rest);
            prop_assert!(!validate_project_id(&project_id));
        }

        /// Project IDs ending with a hyphen are rejected
        #[test]
        fn trailing_hyphen_rejected(prefix in "[a-z][a-z0-9]{5,20}") {
            let project_id = format!("{}-", prefix);
            prop_assert!(!validate_project_id(&project_id));
        }

        /// Sanitized log output is bounded and printable, whatever the input
        #[test]
        fn sanitize_is_bounded_and_printable(body in "\\PC{0,400}") {
            let sanitized = sanitize_for_log(&body);
            prop_assert!(sanitized.chars().all(|c| c.is_ascii_graphic() || c == ' '));
            prop_assert!(sanitized.len() <= 200 + 64);
        }
    }
}
