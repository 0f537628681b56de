//! Pre-flight validation
//!
//! Runs before any network call: required fields must be set (recursively,
//! for nested objects and list items that are present) and enum values must
//! belong to their declared set.

use super::{FieldPath, FieldType, Object, Schema, Value};
use crate::error::{Error, Result};

/// Validate a desired object against its schema.
///
/// Output-only fields are never required from the caller, and fields the
/// remote system defaults may be left unset.
pub fn validate<U: Copy + Eq>(schema: &Schema<U>, object: &Object) -> Result<()> {
    validate_at(schema, object, &FieldPath::root())
}

fn validate_at<U: Copy + Eq>(schema: &Schema<U>, object: &Object, path: &FieldPath) -> Result<()> {
    for field in schema.fields() {
        let field_path = path.field(field.name);
        let value = object.get(field.name);

        let missing = value.map_or(true, Value::is_unspecified);
        if missing {
            if field.required && !field.server_default && !field.is_output_only() {
                return Err(Error::validation(field_path.to_string(), "required field is not set"));
            }
            continue;
        }

        match (&field.ty, value) {
            (FieldType::Enum(valid), Some(Value::Enum(s))) => {
                if !valid.contains(&s.as_str()) {
                    return Err(Error::validation(
                        field_path.to_string(),
                        format!("invalid value {:?}, expected one of: {}", s, valid.join(", ")),
                    ));
                }
            }
            (FieldType::Object(nested), Some(Value::Object(obj))) => {
                if !field.is_output_only() {
                    validate_at(nested, obj, &field_path)?;
                }
            }
            (FieldType::ObjectList(nested, _), Some(Value::ObjectList(items))) => {
                if !field.is_output_only() {
                    for (i, item) in items.iter().enumerate() {
                        validate_at(nested, item, &field_path.index(i))?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, ListKind};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {}

    fn schema() -> Schema<Op> {
        Schema::new(vec![
            FieldSpec::string("awsRegion").required(),
            FieldSpec::enumeration("state", &["RUNNING", "ERROR"]).output_only(),
            FieldSpec::object(
                "rootVolume",
                vec![
                    FieldSpec::integer("sizeGib").server_default(),
                    FieldSpec::enumeration("volumeType", &["GP2", "GP3"]),
                ],
            ),
            FieldSpec::list(
                "adminUsers",
                ListKind::Slice,
                vec![FieldSpec::string("username").required()],
            ),
        ])
    }

    #[test]
    fn test_missing_required_field() {
        let err = validate(&schema(), &Object::new()).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "awsRegion"));
    }

    #[test]
    fn test_empty_string_counts_as_missing() {
        let obj = Object::new().with("awsRegion", "");
        assert!(validate(&schema(), &obj).is_err());
    }

    #[test]
    fn test_invalid_enum_in_nested_object() {
        let obj = Object::new().with("awsRegion", "us-east-1").with(
            "rootVolume",
            Object::new().with("volumeType", Value::Enum("GP9".into())),
        );
        let err = validate(&schema(), &obj).unwrap_err();
        assert!(err.to_string().contains("rootVolume.volumeType"));
        assert!(err.to_string().contains("GP2, GP3"));
    }

    #[test]
    fn test_required_inside_list_item() {
        let obj = Object::new().with("awsRegion", "us-east-1").with(
            "adminUsers",
            Value::ObjectList(vec![Object::new().with("username", "alice"), Object::new()]),
        );
        let err = validate(&schema(), &obj).unwrap_err();
        assert!(err.to_string().contains("adminUsers[1].username"));
    }

    #[test]
    fn test_valid_object_passes() {
        let obj = Object::new()
            .with("awsRegion", "us-east-1")
            .with("rootVolume", Object::new().with("volumeType", Value::Enum("GP3".into())));
        assert!(validate(&schema(), &obj).is_ok());
    }
}
