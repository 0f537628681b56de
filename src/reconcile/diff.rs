//! Differ
//!
//! Walks canonical-desired and actual state side by side and reports every
//! leaf that differs, tagged with the operation its field policy selects.
//! A desired field that is unspecified never produces a diff: the caller
//! does not care about it.

use crate::error::{Error, Result};
use crate::schema::{FieldPath, FieldSpec, FieldType, ListKind, Object, Schema, Selector, Value};
use std::fmt;

/// One differing field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff<U> {
    pub path: FieldPath,
    pub desired: Option<Value>,
    pub actual: Option<Value>,
    /// Remedial action, derived from the field's mutability
    pub operation: Selector<U>,
    /// Recorded for visibility; never planned
    pub output_only: bool,
}

impl<U: Copy> FieldDiff<U> {
    pub fn requires_recreate(&self) -> bool {
        !self.output_only && matches!(self.operation, Selector::Recreate)
    }

    /// Update operation this diff needs, if any
    pub fn update_operation(&self) -> Option<U> {
        match self.operation {
            Selector::Update(op) if !self.output_only => Some(op),
            _ => None,
        }
    }
}

impl<U: fmt::Display> fmt::Display for FieldDiff<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "<unset>".to_string(),
        };
        write!(
            f,
            "{}: desired {} actual {}",
            self.path,
            render(&self.desired),
            render(&self.actual)
        )?;
        if self.output_only {
            write!(f, " (output only)")
        } else {
            write!(f, " ({})", self.operation)
        }
    }
}

/// Compare `desired` against `actual`.
///
/// An absent side is compared as an empty object; both absent is a caller
/// error.
pub fn diff<U: Copy + Eq>(
    schema: &Schema<U>,
    desired: Option<&Object>,
    actual: Option<&Object>,
) -> Result<Vec<FieldDiff<U>>> {
    if desired.is_none() && actual.is_none() {
        return Err(Error::Structural(
            "nil resource passed to diff: both desired and actual are absent".to_string(),
        ));
    }

    let empty = Object::new();
    let mut diffs = Vec::new();
    diff_object(
        schema,
        desired.unwrap_or(&empty),
        actual.unwrap_or(&empty),
        &FieldPath::root(),
        false,
        &mut diffs,
    );
    Ok(diffs)
}

/// True when `desired` has no diffs against `actual`
pub fn objects_equivalent<U: Copy + Eq>(schema: &Schema<U>, desired: &Object, actual: &Object) -> bool {
    let mut diffs = Vec::new();
    diff_object(schema, desired, actual, &FieldPath::root(), false, &mut diffs);
    diffs.is_empty()
}

fn diff_object<U: Copy + Eq>(
    schema: &Schema<U>,
    desired: &Object,
    actual: &Object,
    path: &FieldPath,
    output_only: bool,
    diffs: &mut Vec<FieldDiff<U>>,
) {
    for field in schema.fields() {
        diff_field(
            field,
            desired.get(field.name),
            actual.get(field.name),
            &path.field(field.name),
            output_only || field.is_output_only(),
            diffs,
        );
    }
}

fn diff_field<U: Copy + Eq>(
    field: &FieldSpec<U>,
    desired: Option<&Value>,
    actual: Option<&Value>,
    path: &FieldPath,
    output_only: bool,
    diffs: &mut Vec<FieldDiff<U>>,
) {
    let Some(desired) = desired.filter(|d| !field.is_unspecified(d)) else {
        return;
    };

    let emit = |diffs: &mut Vec<FieldDiff<U>>, actual: Option<&Value>| {
        diffs.push(FieldDiff {
            path: path.clone(),
            desired: Some(desired.clone()),
            actual: actual.cloned(),
            operation: if output_only { Selector::None } else { field.selector() },
            output_only,
        });
    };

    match (&field.ty, desired, actual) {
        (FieldType::Object(schema), Value::Object(d), Some(Value::Object(a))) => {
            diff_object(schema, d, a, path, output_only, diffs);
        }
        (FieldType::Object(_), Value::Object(d), None) => {
            // Nothing asked for inside an explicitly empty object
            if !d.is_empty() {
                emit(diffs, None);
            }
        }
        (FieldType::ObjectList(schema, kind), Value::ObjectList(d), Some(Value::ObjectList(a)))
            if d.len() == a.len() =>
        {
            match kind {
                ListKind::Slice => {
                    for (i, (d_item, a_item)) in d.iter().zip(a).enumerate() {
                        diff_object(schema, d_item, a_item, &path.index(i), output_only, diffs);
                    }
                }
                ListKind::Set => {
                    if !sets_match(schema, d, a) {
                        emit(diffs, actual);
                    }
                }
            }
        }
        _ => {
            let equal = actual.is_some_and(|a| field.equivalent(desired, a));
            if !equal {
                emit(diffs, actual);
            }
        }
    }
}

/// Every desired item pairs with a distinct equivalent actual item
fn sets_match<U: Copy + Eq>(schema: &Schema<U>, desired: &[Object], actual: &[Object]) -> bool {
    match_items(desired.len(), actual.len(), |d, a| {
        objects_equivalent(schema, &desired[d], &actual[a])
    })
    .iter()
    .all(Option::is_some)
}

/// Largest one-to-one pairing of `left` items with `right` items, where
/// `pairs(l, r)` says whether two items may be paired. Returns each left
/// item's partner.
///
/// A partially specified item can pair with several candidates, so a
/// first-fit pass may strand a sibling; augmenting paths reassign earlier
/// pairs to make room.
pub(crate) fn match_items(
    left: usize,
    right: usize,
    pairs: impl Fn(usize, usize) -> bool,
) -> Vec<Option<usize>> {
    let candidates: Vec<Vec<usize>> = (0..left)
        .map(|l| (0..right).filter(|&r| pairs(l, r)).collect())
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; right];
    for l in 0..left {
        let mut seen = vec![false; right];
        augment(l, &candidates, &mut owner, &mut seen);
    }

    let mut partner = vec![None; left];
    for (r, l) in owner.iter().enumerate() {
        if let Some(l) = *l {
            partner[l] = Some(r);
        }
    }
    partner
}

fn augment(l: usize, candidates: &[Vec<usize>], owner: &mut [Option<usize>], seen: &mut [bool]) -> bool {
    for &r in &candidates[l] {
        if seen[r] {
            continue;
        }
        seen[r] = true;
        let free = match owner[r] {
            None => true,
            Some(other) => augment(other, candidates, owner, seen),
        };
        if free {
            owner[r] = Some(l);
            return true;
        }
    }
    false
}
