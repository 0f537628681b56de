//! Canonicalization
//!
//! Two merges, both driven by the schema:
//!
//! - [`canonicalize_desired`] folds a previously observed state into the
//!   caller's desired state, so unspecified or equivalent fields adopt the
//!   observed value and do not show up as diffs.
//! - [`canonicalize_new_state`] folds the caller's desired state into a
//!   freshly read state, keeping the caller's spelling for equivalent values
//!   and reordering set-like lists to match.
//!
//! Neither ever invents a value that is not present in one of its inputs.

use super::diff::{match_items, objects_equivalent};
use crate::schema::{FieldSpec, FieldType, ListKind, Object, Schema, Value};

/// Merge `initial` into `desired`.
///
/// With no `initial` (first creation) the result is `desired` with
/// output-only fields dropped. Otherwise each field takes the initial value
/// when the desired one is unspecified or equivalent to it, and keeps the
/// desired value when they differ. Output-only fields always take the
/// initial value.
pub fn canonicalize_desired<U: Copy + Eq>(
    schema: &Schema<U>,
    desired: &Object,
    initial: Option<&Object>,
) -> Object {
    let mut out = Object::new();
    for field in schema.fields() {
        let d = desired.get(field.name);
        let i = initial.and_then(|obj| obj.get(field.name));
        out.set(field.name, canonicalize_desired_field(field, d, i));
    }
    out
}

fn canonicalize_desired_field<U: Copy + Eq>(
    field: &FieldSpec<U>,
    desired: Option<&Value>,
    initial: Option<&Value>,
) -> Option<Value> {
    if field.is_output_only() {
        return initial.cloned();
    }

    let desired = match desired {
        Some(d) if !field.is_unspecified(d) => d,
        _ => return initial.or(desired).cloned(),
    };

    let Some(initial) = initial else {
        return Some(desired_without_initial(field, desired));
    };

    let merged = match (&field.ty, desired, initial) {
        // Explicitly empty stays empty
        (FieldType::Object(_), Value::Object(d), _) if d.is_empty() => desired.clone(),
        (FieldType::Object(schema), Value::Object(d), Value::Object(i)) => {
            Value::Object(canonicalize_desired(schema, d, Some(i)))
        }
        (FieldType::ObjectList(schema, kind), Value::ObjectList(d), Value::ObjectList(i)) => {
            Value::ObjectList(canonicalize_desired_list(schema, *kind, d, i))
        }
        _ if field.equivalent(desired, initial) => initial.clone(),
        _ => desired.clone(),
    };
    Some(merged)
}

/// Nested values canonicalized against an absent initial state
fn desired_without_initial<U: Copy + Eq>(field: &FieldSpec<U>, desired: &Value) -> Value {
    match (&field.ty, desired) {
        (FieldType::Object(schema), Value::Object(d)) => {
            Value::Object(canonicalize_desired(schema, d, None))
        }
        (FieldType::ObjectList(schema, _), Value::ObjectList(items)) => Value::ObjectList(
            items
                .iter()
                .map(|item| canonicalize_desired(schema, item, None))
                .collect(),
        ),
        _ => desired.clone(),
    }
}

fn canonicalize_desired_list<U: Copy + Eq>(
    schema: &Schema<U>,
    kind: ListKind,
    desired: &[Object],
    initial: &[Object],
) -> Vec<Object> {
    match kind {
        ListKind::Slice if desired.len() != initial.len() => desired
            .iter()
            .map(|item| canonicalize_desired(schema, item, None))
            .collect(),
        ListKind::Slice => desired
            .iter()
            .zip(initial)
            .map(|(d, i)| canonicalize_desired(schema, d, Some(i)))
            .collect(),
        ListKind::Set => {
            let partners = match_items(desired.len(), initial.len(), |d, i| {
                let candidate = canonicalize_desired(schema, &desired[d], Some(&initial[i]));
                objects_equivalent(schema, &candidate, &initial[i])
            });

            let mut matched = Vec::with_capacity(desired.len());
            let mut unmatched = Vec::new();
            for (d, partner) in desired.iter().zip(&partners) {
                match partner {
                    Some(i) => matched.push(canonicalize_desired(schema, d, Some(&initial[*i]))),
                    None => unmatched.push(canonicalize_desired(schema, d, None)),
                }
            }

            matched.extend(unmatched);
            matched
        }
    }
}

/// Merge `desired` into a freshly read `new_state`.
///
/// Equivalent scalars keep the desired spelling, set-like lists are
/// reordered to the desired order, and fields the server left out adopt
/// the desired value when that value is empty.
pub fn canonicalize_new_state<U: Copy + Eq>(
    schema: &Schema<U>,
    new_state: &Object,
    desired: &Object,
) -> Object {
    let mut out = Object::new();
    for field in schema.fields() {
        let n = new_state.get(field.name);
        let d = desired.get(field.name);
        out.set(field.name, canonicalize_new_field(field, n, d));
    }
    out
}

fn canonicalize_new_field<U: Copy + Eq>(
    field: &FieldSpec<U>,
    new: Option<&Value>,
    desired: Option<&Value>,
) -> Option<Value> {
    if field.is_output_only() {
        return new.cloned();
    }

    let (new, desired) = match (new, desired) {
        (None, Some(d)) if d.is_empty() => return Some(d.clone()),
        (Some(n), Some(d)) => (n, d),
        (n, _) => return n.cloned(),
    };

    let merged = match (&field.ty, new, desired) {
        (FieldType::Object(schema), Value::Object(n), Value::Object(d)) => {
            Value::Object(canonicalize_new_state(schema, n, d))
        }
        (FieldType::ObjectList(schema, kind), Value::ObjectList(n), Value::ObjectList(d)) => {
            Value::ObjectList(canonicalize_new_list(schema, *kind, n, d))
        }
        _ if field.equivalent(new, desired) => desired.clone(),
        _ => new.clone(),
    };
    Some(merged)
}

fn canonicalize_new_list<U: Copy + Eq>(
    schema: &Schema<U>,
    kind: ListKind,
    new: &[Object],
    desired: &[Object],
) -> Vec<Object> {
    match kind {
        ListKind::Slice if new.len() != desired.len() => new.to_vec(),
        ListKind::Slice => new
            .iter()
            .zip(desired)
            .map(|(n, d)| canonicalize_new_state(schema, n, d))
            .collect(),
        ListKind::Set => {
            let partners = match_items(desired.len(), new.len(), |d, n| {
                let candidate = canonicalize_new_state(schema, &new[n], &desired[d]);
                objects_equivalent(schema, &desired[d], &candidate)
            });

            let mut used = vec![false; new.len()];
            let mut ordered = Vec::with_capacity(new.len());
            for (d, partner) in desired.iter().zip(&partners) {
                if let Some(n) = *partner {
                    used[n] = true;
                    ordered.push(canonicalize_new_state(schema, &new[n], d));
                }
            }

            ordered.extend(
                new.iter()
                    .zip(&used)
                    .filter(|(_, used)| !**used)
                    .map(|(n, _)| n.clone()),
            );
            ordered
        }
    }
}
