//! Planner
//!
//! Groups field diffs by the operation they select and turns the groups into
//! an ordered operation list, after checking the caller's lifecycle
//! directives. Nothing here touches the network.

use super::diff::FieldDiff;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Caller-supplied constraints checked before any mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    /// Fail instead of creating a missing resource
    pub block_creation: bool,
    /// Fail if the resource already exists
    pub block_acquire: bool,
    /// Fail instead of updating an existing resource
    pub block_modification: bool,
}

/// Diffs grouped under one remedial action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange<U> {
    pub requires_recreate: bool,
    /// `None` when `requires_recreate` is set
    pub operation: Option<U>,
    /// Dotted paths of the fields responsible
    pub fields: Vec<String>,
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<U> {
    Create,
    Update { kind: U, diffs: Vec<FieldDiff<U>> },
    Delete,
}

impl<U: fmt::Display> fmt::Display for Operation<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "Create"),
            Operation::Update { kind, diffs } => write!(f, "{} ({} field(s))", kind, diffs.len()),
            Operation::Delete => write!(f, "Delete"),
        }
    }
}

/// Ordered operations plus the diffs they were derived from
#[derive(Debug, Clone, PartialEq)]
pub struct Plan<U> {
    pub operations: Vec<Operation<U>>,
    pub diffs: Vec<FieldDiff<U>>,
}

impl<U> Plan<U> {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn creates(&self) -> bool {
        self.operations.iter().any(|op| matches!(op, Operation::Create))
    }
}

/// Group diffs by remedial action. Output-only diffs are skipped. The
/// recreate group, if any, comes first; update groups follow in the
/// operation enum's order.
pub fn group<U: Copy + Ord>(diffs: &[FieldDiff<U>]) -> Vec<PlannedChange<U>> {
    let mut recreate = Vec::new();
    let mut updates: BTreeMap<U, Vec<String>> = BTreeMap::new();

    for diff in diffs {
        if diff.requires_recreate() {
            recreate.push(diff.path.to_string());
        } else if let Some(op) = diff.update_operation() {
            updates.entry(op).or_default().push(diff.path.to_string());
        }
    }

    let mut changes = Vec::with_capacity(updates.len() + 1);
    if !recreate.is_empty() {
        changes.push(PlannedChange {
            requires_recreate: true,
            operation: None,
            fields: recreate,
        });
    }
    changes.extend(updates.into_iter().map(|(op, fields)| PlannedChange {
        requires_recreate: false,
        operation: Some(op),
        fields,
    }));
    changes
}

/// Build the plan for one resource.
///
/// A missing resource is planned as a single create. For an existing one,
/// any recreate requirement is infeasible, and every update group becomes
/// one update operation carrying the diffs it is responsible for.
pub fn plan<U: Copy + Ord + fmt::Display>(
    kind: &str,
    initial_exists: bool,
    diffs: Vec<FieldDiff<U>>,
    lifecycle: &Lifecycle,
) -> Result<Plan<U>> {
    if !initial_exists {
        if lifecycle.block_creation {
            return Err(Error::infeasible(format!(
                "creation blocked, but no {} exists",
                kind
            )));
        }
        return Ok(Plan {
            operations: vec![Operation::Create],
            diffs,
        });
    }

    if lifecycle.block_acquire {
        return Err(Error::infeasible(format!(
            "acquiring the existing {} is blocked",
            kind
        )));
    }

    let mut operations = Vec::new();
    for change in group(&diffs) {
        if change.requires_recreate {
            return Err(Error::infeasible(format!(
                "infeasible update: ({}) would require recreation",
                change.fields.join(", ")
            )));
        }
        if lifecycle.block_modification {
            return Err(Error::infeasible(format!(
                "modification blocked, diff ({}) unresolvable",
                change.fields.join(", ")
            )));
        }
        let Some(op) = change.operation else {
            continue;
        };
        let op_diffs = diffs
            .iter()
            .filter(|d| d.update_operation() == Some(op))
            .cloned()
            .collect();
        operations.push(Operation::Update {
            kind: op,
            diffs: op_diffs,
        });
    }

    Ok(Plan { operations, diffs })
}
