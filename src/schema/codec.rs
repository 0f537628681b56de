//! Schema-driven JSON codec
//!
//! One recursive walk converts between [`Object`]s and JSON for every
//! resource shape. [`Direction`] decides which fields take part: requests
//! never carry output-only fields, responses carry everything.

use super::{FieldPath, FieldSpec, FieldType, Object, Schema, Value};
use crate::error::{Error, Result};
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, BTreeSet};

/// Which side of the wire a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Outgoing request bodies and user manifests; output-only fields dropped
    ToWire,
    /// Incoming API responses; every field kept
    FromWire,
}

impl Direction {
    fn includes<U: Copy + Eq>(self, field: &FieldSpec<U>) -> bool {
        match self {
            Direction::ToWire => !field.is_output_only(),
            Direction::FromWire => true,
        }
    }
}

/// Encode an object as a JSON object, omitting unspecified values
pub fn encode<U: Copy + Eq>(schema: &Schema<U>, object: &Object, direction: Direction) -> Json {
    let mut map = Map::new();
    for field in schema.fields() {
        if !direction.includes(field) {
            continue;
        }
        let Some(value) = object.get(field.name) else {
            continue;
        };
        if value.is_unspecified() {
            continue;
        }
        // Server-defaulted zeros are left for the remote side to fill in
        if direction == Direction::ToWire && field.is_unspecified(value) {
            continue;
        }
        map.insert(field.name.to_string(), encode_value(field, value, direction));
    }
    Json::Object(map)
}

fn encode_value<U: Copy + Eq>(field: &FieldSpec<U>, value: &Value, direction: Direction) -> Json {
    match (value, &field.ty) {
        (Value::Object(obj), FieldType::Object(schema)) => encode(schema, obj, direction),
        (Value::ObjectList(items), FieldType::ObjectList(schema, _)) => Json::Array(
            items
                .iter()
                .map(|item| encode(schema, item, direction))
                .collect(),
        ),
        (Value::String(s), _) | (Value::Enum(s), _) => Json::String(s.clone()),
        (Value::Integer(n), _) => Json::from(*n),
        (Value::Boolean(b), _) => Json::Bool(*b),
        (Value::StringArray(items), _) => {
            Json::Array(items.iter().cloned().map(Json::String).collect())
        }
        (Value::StringMap(map), _) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                .collect(),
        ),
        // Object values under a non-object field cannot be built through the schema
        (Value::Object(obj), _) => Json::String(obj.to_string()),
        (Value::ObjectList(_), _) => Json::Null,
    }
}

/// Decode a JSON object into an [`Object`]. Unknown keys are ignored and
/// JSON null is treated as absent.
pub fn decode<U: Copy + Eq>(schema: &Schema<U>, json: &Json, direction: Direction) -> Result<Object> {
    decode_at(schema, json, direction, &FieldPath::root())
}

fn decode_at<U: Copy + Eq>(
    schema: &Schema<U>,
    json: &Json,
    direction: Direction,
    path: &FieldPath,
) -> Result<Object> {
    let map = match json {
        Json::Object(map) => map,
        Json::Null => return Ok(Object::new()),
        other => {
            return Err(Error::codec(
                display_path(path),
                format!("expected object, got {}", json_type(other)),
            ))
        }
    };

    let mut object = Object::new();
    for field in schema.fields() {
        let Some(raw) = map.get(field.name) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        let field_path = path.field(field.name);
        if !direction.includes(field) {
            tracing::warn!("Ignoring output-only field {} in outgoing document", field_path);
            continue;
        }
        let value = decode_value(field, raw, direction, &field_path)?;
        object.insert(field.name, value);
    }
    Ok(object)
}

fn decode_value<U: Copy + Eq>(
    field: &FieldSpec<U>,
    raw: &Json,
    direction: Direction,
    path: &FieldPath,
) -> Result<Value> {
    let mismatch = |expected: &str| {
        Error::codec(
            path.to_string(),
            format!("expected {}, got {}", expected, json_type(raw)),
        )
    };

    match &field.ty {
        FieldType::String => raw
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| mismatch("string")),
        FieldType::Enum(_) => raw
            .as_str()
            .map(|s| Value::Enum(s.to_string()))
            .ok_or_else(|| mismatch("enum string")),
        FieldType::Boolean => raw.as_bool().map(Value::Boolean).ok_or_else(|| mismatch("boolean")),
        FieldType::Integer => decode_integer(raw)
            .map(Value::Integer)
            .ok_or_else(|| mismatch("integer")),
        FieldType::StringArray => {
            let items = raw.as_array().ok_or_else(|| mismatch("array"))?;
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Value::StringArray)
                .ok_or_else(|| mismatch("array of strings"))
        }
        FieldType::StringMap => {
            let map = raw.as_object().ok_or_else(|| mismatch("map"))?;
            map.iter()
                .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Value::StringMap)
                .ok_or_else(|| mismatch("map of strings"))
        }
        FieldType::Object(schema) => {
            if !raw.is_object() {
                return Err(mismatch("object"));
            }
            decode_at(schema, raw, direction, path).map(Value::Object)
        }
        FieldType::ObjectList(schema, _) => {
            let items = raw.as_array().ok_or_else(|| mismatch("array"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| decode_at(schema, item, direction, &path.index(i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::ObjectList)
        }
    }
}

/// int64 values arrive either as JSON numbers or as decimal strings
fn decode_integer(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_type(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn display_path(path: &FieldPath) -> String {
    if path.segments().is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

/// Request body for an update: the top-level fields touched by `op`, plus
/// the version token so the remote system can reject stale writes.
pub fn update_body<U: Copy + Eq>(
    schema: &Schema<U>,
    object: &Object,
    op: U,
    etag: Option<&str>,
) -> Json {
    let mut projected = Object::new();
    for field in schema.fields() {
        if !field.touches(op) {
            continue;
        }
        if let Some(value) = object.get(field.name) {
            projected.insert(field.name, value.clone());
        }
    }

    let mut body = encode(schema, &projected, Direction::ToWire);
    if let (Some(etag), Json::Object(map)) = (etag, &mut body) {
        if !etag.is_empty() {
            map.insert("etag".to_string(), Json::String(etag.to_string()));
        }
    }
    body
}

/// `updateMask` value: snake_case dotted paths, deduplicated and sorted
pub fn update_mask<'a>(paths: impl IntoIterator<Item = &'a FieldPath>) -> String {
    paths
        .into_iter()
        .map(FieldPath::to_mask)
        .filter(|mask| !mask.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ListKind;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Update,
    }

    fn schema() -> Schema<Op> {
        Schema::new(vec![
            FieldSpec::string("description").updatable(Op::Update),
            FieldSpec::string("uid").output_only(),
            FieldSpec::integer("maxPodsPerNode"),
            FieldSpec::integer("iops").server_default(),
            FieldSpec::boolean("autoRepair").server_default(),
            FieldSpec::enumeration("volumeType", &["GP2", "GP3"]),
            FieldSpec::string_map("tags"),
            FieldSpec::object(
                "controlPlane",
                vec![
                    FieldSpec::string("version").updatable(Op::Update),
                    FieldSpec::string("instanceType"),
                ],
            ),
            FieldSpec::list(
                "taints",
                ListKind::Set,
                vec![FieldSpec::string("key"), FieldSpec::string("value")],
            ),
        ])
    }

    #[test]
    fn test_decode_response_keeps_output_only() {
        let obj = decode(
            &schema(),
            &json!({"description": "d", "uid": "123", "unknown": true}),
            Direction::FromWire,
        )
        .unwrap();
        assert_eq!(obj.get_str("uid"), Some("123"));
        assert!(!obj.contains("unknown"));
    }

    #[test]
    fn test_to_wire_drops_output_only() {
        let obj = decode(&schema(), &json!({"uid": "123", "description": "d"}), Direction::ToWire)
            .unwrap();
        assert!(!obj.contains("uid"));

        let full = Object::new().with("uid", "123").with("description", "d");
        let wire = encode(&schema(), &full, Direction::ToWire);
        assert_eq!(wire, json!({"description": "d"}));
    }

    #[test]
    fn test_integer_accepts_string_form() {
        let obj = decode(&schema(), &json!({"maxPodsPerNode": "110"}), Direction::FromWire).unwrap();
        assert_eq!(obj.get("maxPodsPerNode"), Some(&Value::Integer(110)));
    }

    #[test]
    fn test_type_mismatch_names_the_field() {
        let err = decode(
            &schema(),
            &json!({"controlPlane": {"version": 7}}),
            Direction::FromWire,
        )
        .unwrap_err();
        assert!(err.to_string().contains("controlPlane.version"));
    }

    #[test]
    fn test_list_item_error_has_index() {
        let err = decode(&schema(), &json!({"taints": [{"key": "a"}, 5]}), Direction::FromWire)
            .unwrap_err();
        assert!(err.to_string().contains("taints[1]"));
    }

    #[test]
    fn test_encode_skips_unspecified() {
        let obj = Object::new()
            .with("description", "")
            .with("maxPodsPerNode", 0i64);
        assert_eq!(encode(&schema(), &obj, Direction::ToWire), json!({"maxPodsPerNode": 0}));
    }

    #[test]
    fn test_server_default_zeros_stay_off_the_wire() {
        let obj = Object::new()
            .with("iops", 0i64)
            .with("autoRepair", false)
            .with("maxPodsPerNode", 0i64);
        assert_eq!(encode(&schema(), &obj, Direction::ToWire), json!({"maxPodsPerNode": 0}));
        assert_eq!(
            encode(&schema(), &obj, Direction::FromWire),
            json!({"iops": 0, "autoRepair": false, "maxPodsPerNode": 0})
        );

        let set = Object::new().with("iops", 3000i64).with("autoRepair", true);
        assert_eq!(
            encode(&schema(), &set, Direction::ToWire),
            json!({"iops": 3000, "autoRepair": true})
        );
    }

    #[test]
    fn test_update_body_projects_touched_fields() {
        let obj = Object::new()
            .with("description", "new")
            .with("maxPodsPerNode", 110i64)
            .with(
                "controlPlane",
                Object::new().with("version", "1.29").with("instanceType", "m5.large"),
            );
        let body = update_body(&schema(), &obj, Op::Update, Some("etag-1"));
        assert_eq!(
            body,
            json!({
                "description": "new",
                "controlPlane": {"version": "1.29", "instanceType": "m5.large"},
                "etag": "etag-1"
            })
        );
    }

    #[test]
    fn test_update_mask_dedups_and_sorts() {
        let a = FieldPath::root().field("controlPlane").field("version");
        let b = FieldPath::root().field("annotations");
        let c = FieldPath::root().field("controlPlane").field("version");
        assert_eq!(update_mask([&a, &b, &c]), "annotations,control_plane.version");
    }
}
