//! Field policy model
//!
//! Every resource kind describes its body as a [`Schema`]: a table of
//! [`FieldSpec`]s, one per field, each carrying the field's type, its
//! mutability, whether it is required or server-defaulted, and the equality
//! used when comparing two values of it. Nested objects and lists of objects
//! carry their own schema, so the whole tree is described statically and
//! walked without any runtime type inspection.
//!
//! # Module Structure
//!
//! - [`value`] - Typed values and the [`Object`] field map
//! - [`codec`] - JSON encoding driven by the schema, in both directions
//! - [`validate`] - Required-field and enum checks run before any request

pub mod codec;
pub mod validate;
pub mod value;

use std::fmt;

pub use value::{Object, Value};

/// Static description of an object's fields
#[derive(Debug, Clone)]
pub struct Schema<U> {
    fields: Vec<FieldSpec<U>>,
}

impl<U: Copy + Eq> Schema<U> {
    pub fn new(fields: Vec<FieldSpec<U>>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec<U>] {
        &self.fields
    }

    /// Look up a field by its wire (camelCase) name
    pub fn field(&self, name: &str) -> Option<&FieldSpec<U>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether any field in this subtree is updated by `op`
    pub fn touches(&self, op: U) -> bool {
        self.fields.iter().any(|f| f.touches(op))
    }
}

/// Type of a field, with nested schemas for objects
#[derive(Debug, Clone)]
pub enum FieldType<U> {
    String,
    Integer,
    Boolean,
    /// Enumerated string with its valid set
    Enum(&'static [&'static str]),
    StringArray,
    StringMap,
    Object(Schema<U>),
    ObjectList(Schema<U>, ListKind),
}

impl<U> FieldType<U> {
    pub fn nested(&self) -> Option<&Schema<U>> {
        match self {
            FieldType::Object(schema) | FieldType::ObjectList(schema, _) => Some(schema),
            _ => None,
        }
    }
}

/// How a list of objects is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Order matters; elements are compared positionally
    Slice,
    /// Order does not matter; elements are matched by equivalence
    Set,
}

/// Who may change a field, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability<U> {
    /// Settable only at creation; any change requires recreation
    Immutable,
    /// Changed in place by the named update operation
    Updatable(U),
    /// Populated by the remote system only; never sent
    OutputOnly,
}

/// Remedial action a differing field implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector<U> {
    Recreate,
    Update(U),
    None,
}

impl<U: fmt::Display> fmt::Display for Selector<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Recreate => write!(f, "Recreate"),
            Selector::Update(op) => write!(f, "{}", op),
            Selector::None => write!(f, "None"),
        }
    }
}

/// Type-specific equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equivalence {
    #[default]
    Exact,
    /// Strings equal after trimming whitespace
    Trimmed,
    /// Resource references equal when their last path segments match
    SelfLink,
    /// String arrays equal regardless of element order
    Unordered,
}

impl Equivalence {
    /// Compare two values of the same field.
    ///
    /// Values of different variants are never equivalent.
    pub fn equivalent(self, a: &Value, b: &Value) -> bool {
        match (self, a, b) {
            (Equivalence::Trimmed, Value::String(x), Value::String(y)) => x.trim() == y.trim(),
            (Equivalence::SelfLink, Value::String(x), Value::String(y)) => {
                last_segment(x) == last_segment(y)
            }
            (Equivalence::Unordered, Value::StringArray(x), Value::StringArray(y)) => {
                let mut x = x.clone();
                let mut y = y.clone();
                x.sort();
                y.sort();
                x == y
            }
            _ => a == b,
        }
    }
}

fn last_segment(s: &str) -> &str {
    s.trim_end_matches('/').rsplit('/').next().unwrap_or(s)
}

/// Policy for a single field
#[derive(Debug, Clone)]
pub struct FieldSpec<U> {
    /// Wire name (camelCase)
    pub name: &'static str,
    pub ty: FieldType<U>,
    pub mutability: Mutability<U>,
    pub required: bool,
    /// The remote system picks a value when the caller leaves it unset
    pub server_default: bool,
    pub equivalence: Equivalence,
}

impl<U: Copy + Eq> FieldSpec<U> {
    fn new(name: &'static str, ty: FieldType<U>) -> Self {
        Self {
            name,
            ty,
            mutability: Mutability::Immutable,
            required: false,
            server_default: false,
            equivalence: Equivalence::Exact,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn enumeration(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::new(name, FieldType::Enum(values))
    }

    pub fn string_array(name: &'static str) -> Self {
        Self::new(name, FieldType::StringArray)
    }

    pub fn string_map(name: &'static str) -> Self {
        Self::new(name, FieldType::StringMap)
    }

    pub fn object(name: &'static str, fields: Vec<FieldSpec<U>>) -> Self {
        Self::new(name, FieldType::Object(Schema::new(fields)))
    }

    pub fn list(name: &'static str, kind: ListKind, fields: Vec<FieldSpec<U>>) -> Self {
        Self::new(name, FieldType::ObjectList(Schema::new(fields), kind))
    }

    pub fn updatable(mut self, op: U) -> Self {
        self.mutability = Mutability::Updatable(op);
        self
    }

    pub fn output_only(mut self) -> Self {
        self.mutability = Mutability::OutputOnly;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn server_default(mut self) -> Self {
        self.server_default = true;
        self
    }

    pub fn equivalence(mut self, equivalence: Equivalence) -> Self {
        self.equivalence = equivalence;
        self
    }

    pub fn is_output_only(&self) -> bool {
        self.mutability == Mutability::OutputOnly
    }

    /// The operation a difference on this field selects
    pub fn selector(&self) -> Selector<U> {
        match self.mutability {
            Mutability::Immutable => Selector::Recreate,
            Mutability::Updatable(op) => Selector::Update(op),
            Mutability::OutputOnly => Selector::None,
        }
    }

    /// Whether this field, or anything below it, is updated by `op`
    pub fn touches(&self, op: U) -> bool {
        if self.mutability == Mutability::Updatable(op) {
            return true;
        }
        self.ty.nested().is_some_and(|schema| schema.touches(op))
    }

    /// Whether `value` carries no information for this field.
    ///
    /// Zero integers and booleans count as unspecified only on
    /// server-defaulted fields, where the remote system owns the default.
    pub fn is_unspecified(&self, value: &Value) -> bool {
        if self.server_default && value.is_zero() {
            return true;
        }
        value.is_unspecified()
    }

    pub fn equivalent(&self, a: &Value, b: &Value) -> bool {
        self.equivalence.equivalent(a, b)
    }
}

/// One step in a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Field(&'static str),
    Index(usize),
}

/// Dotted path to a field, e.g. `controlPlane.rootVolume.sizeGib`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &'static str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name));
        Self { segments }
    }

    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(i));
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Top-level field name, if any
    pub fn head(&self) -> Option<&'static str> {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// snake_case form for update masks; list indexes cut the path short
    pub fn to_mask(&self) -> String {
        self.segments
            .iter()
            .map_while(|segment| match segment {
                PathSegment::Field(name) => Some(to_snake_case(name)),
                PathSegment::Index(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Convert a camelCase wire name to snake_case
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Patch,
        Resize,
    }

    #[test]
    fn test_selector_follows_mutability() {
        let immutable: FieldSpec<Op> = FieldSpec::string("subnetId");
        let updatable = FieldSpec::string("description").updatable(Op::Patch);
        let output: FieldSpec<Op> = FieldSpec::string("uid").output_only();

        assert_eq!(immutable.selector(), Selector::Recreate);
        assert_eq!(updatable.selector(), Selector::Update(Op::Patch));
        assert_eq!(output.selector(), Selector::None);
    }

    #[test]
    fn test_touches_looks_through_nested_objects() {
        let field = FieldSpec::object(
            "controlPlane",
            vec![
                FieldSpec::string("version").updatable(Op::Patch),
                FieldSpec::string("instanceType"),
            ],
        );
        assert!(field.touches(Op::Patch));
        assert!(!field.touches(Op::Resize));
    }

    #[test]
    fn test_every_equivalence_is_reflexive() {
        let samples = [
            Value::from("NaN"),
            Value::from(" padded "),
            Value::from("projects/p/locations/l/awsClusters/c1"),
            Value::StringArray(vec!["b".into(), "a".into()]),
            Value::Integer(0),
        ];
        for equivalence in [
            Equivalence::Exact,
            Equivalence::Trimmed,
            Equivalence::SelfLink,
            Equivalence::Unordered,
        ] {
            for value in &samples {
                assert!(equivalence.equivalent(value, value), "{:?} on {}", equivalence, value);
            }
        }
    }

    #[test]
    fn test_equivalence_rules() {
        let a = Value::from(" m5.large ");
        let b = Value::from("m5.large");
        assert!(Equivalence::Trimmed.equivalent(&a, &b));
        assert!(!Equivalence::Exact.equivalent(&a, &b));

        let link = Value::from("projects/p/locations/l/awsClusters/c1");
        assert!(Equivalence::SelfLink.equivalent(&link, &Value::from("c1")));

        let x = Value::StringArray(vec!["a".into(), "b".into()]);
        let y = Value::StringArray(vec!["b".into(), "a".into()]);
        assert!(Equivalence::Unordered.equivalent(&x, &y));
        assert!(!Equivalence::Exact.equivalent(&x, &y));
    }

    #[test]
    fn test_server_default_zero_is_unspecified() {
        let plain: FieldSpec<Op> = FieldSpec::integer("iops");
        let defaulted: FieldSpec<Op> = FieldSpec::integer("iops").server_default();
        assert!(!plain.is_unspecified(&Value::Integer(0)));
        assert!(defaulted.is_unspecified(&Value::Integer(0)));
        assert!(!defaulted.is_unspecified(&Value::Integer(3000)));
    }

    #[test]
    fn test_field_path_display_and_mask() {
        let path = FieldPath::root().field("controlPlane").field("rootVolume").field("sizeGib");
        assert_eq!(path.to_string(), "controlPlane.rootVolume.sizeGib");
        assert_eq!(path.to_mask(), "control_plane.root_volume.size_gib");

        let listed = FieldPath::root().field("config").field("taints").index(2).field("key");
        assert_eq!(listed.to_string(), "config.taints[2].key");
        assert_eq!(listed.to_mask(), "config.taints");
        assert_eq!(listed.head(), Some("config"));
    }
}
