//! Typed field values
//!
//! A resource body is an [`Object`]: an ordered map from field name to
//! [`Value`]. A field that is not in the map is unspecified. An object that is
//! present but has no fields is explicitly empty, which is different from
//! absent and survives canonicalization.

use std::collections::BTreeMap;
use std::fmt;

/// A single field value, one variant per schema field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Enum(String),
    StringArray(Vec<String>),
    StringMap(BTreeMap<String, String>),
    Object(Object),
    ObjectList(Vec<Object>),
}

impl Value {
    /// Whether this value carries no information.
    ///
    /// Empty strings, enums, arrays, maps and lists are unspecified. Integers,
    /// booleans and objects are always specified once present.
    pub fn is_unspecified(&self) -> bool {
        match self {
            Value::String(s) | Value::Enum(s) => s.is_empty(),
            Value::StringArray(items) => items.is_empty(),
            Value::StringMap(map) => map.is_empty(),
            Value::ObjectList(items) => items.is_empty(),
            Value::Integer(_) | Value::Boolean(_) | Value::Object(_) => false,
        }
    }

    /// Like [`Value::is_unspecified`], but also true for an object with no fields
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Object(obj) => obj.is_empty(),
            other => other.is_unspecified(),
        }
    }

    /// Whether this is the zero value of its type
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(n) => *n == 0,
            Value::Boolean(b) => !*b,
            other => other.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Object]> {
        match self {
            Value::ObjectList(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in codec errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Enum(_) => "enum",
            Value::StringArray(_) => "string array",
            Value::StringMap(_) => "string map",
            Value::Object(_) => "object",
            Value::ObjectList(_) => "object list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Enum(s) => write!(f, "{}", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::StringArray(items) => write!(f, "[{}]", items.join(", ")),
            Value::StringMap(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Value::Object(obj) => write!(f, "{}", obj),
            Value::ObjectList(items) => {
                let rendered: Vec<String> = items.iter().map(|o| o.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

/// The present fields of a resource or nested sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    fields: BTreeMap<String, Value>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Insert when `value` is present, remove the field otherwise
    pub fn set(&mut self, name: &str, value: Option<Value>) {
        match value {
            Some(v) => self.insert(name, v),
            None => {
                self.fields.remove(name);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_object(&self, name: &str) -> Option<&Object> {
        self.get(name).and_then(Value::as_object)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields present in `other` but missing here are copied over
    pub fn fill_missing_from(&mut self, other: &Object) {
        for (name, value) in other.iter() {
            if !self.contains(name) {
                self.insert(name, value.clone());
            }
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Object {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unspecified_vs_zero() {
        assert!(Value::String(String::new()).is_unspecified());
        assert!(Value::StringArray(vec![]).is_unspecified());
        assert!(!Value::Integer(0).is_unspecified());
        assert!(Value::Integer(0).is_zero());
        assert!(!Value::Boolean(false).is_unspecified());
        assert!(Value::Boolean(false).is_zero());
    }

    #[test]
    fn test_explicit_empty_object_is_not_unspecified() {
        let empty = Value::Object(Object::new());
        assert!(!empty.is_unspecified());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_set_none_removes_field() {
        let mut obj = Object::new().with("description", "prod");
        obj.set("description", None);
        assert!(!obj.contains("description"));
    }

    #[test]
    fn test_fill_missing_keeps_existing() {
        let mut obj = Object::new().with("uid", "abc");
        let other = Object::new().with("uid", "zzz").with("state", "RUNNING");
        obj.fill_missing_from(&other);
        assert_eq!(obj.get_str("uid"), Some("abc"));
        assert_eq!(obj.get_str("state"), Some("RUNNING"));
    }

    #[test]
    fn test_display_is_stable() {
        let obj = Object::new()
            .with("b", Value::StringArray(vec!["s1".into(), "s2".into()]))
            .with("a", 3i64);
        assert_eq!(obj.to_string(), "{a: 3, b: [s1, s2]}");
    }
}
