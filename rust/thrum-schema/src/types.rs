//! Type model for interface schemas.
//!
//! Structured types (records and enums) live in an arena owned by
//! [`Schema`](crate::Schema) and are referenced by [`RecordId`] / [`EnumId`].
//! This keeps recursive records (a record that contains itself, directly or
//! through a container) representable without boxing cycles.

use std::fmt;

/// Index of a record definition in a schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u32);

/// Index of an enum definition in a schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

impl fmt::Display for EnumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enum#{}", self.0)
    }
}

/// A schema-level type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    /// Signed 8-bit integer.
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Enum(EnumId),
    Record(RecordId),
    List(Box<Type>),
    Set(Box<Type>),
    Map(Box<Type>, Box<Type>),
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn set(elem: Type) -> Self {
        Type::Set(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    /// True for list, set and map.
    pub fn is_container(&self) -> bool {
        matches!(self, Type::List(_) | Type::Set(_) | Type::Map(_, _))
    }
}

/// Whether a field must be present on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requiredness {
    /// Decoding fails when the field is absent.
    Required,
    /// The field may be absent.
    Optional,
    /// Written when set, tolerated when absent.
    #[default]
    Default,
}

impl Requiredness {
    pub fn as_str(self) -> &'static str {
        match self {
            Requiredness::Required => "required",
            Requiredness::Optional => "optional",
            Requiredness::Default => "default",
        }
    }
}

/// A field of a record, or a parameter of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Wire identity of the field.
    pub id: i16,
    /// Name used by the text format and the docs endpoint.
    pub name: String,
    pub ty: Type,
    pub requiredness: Requiredness,
}

impl FieldDef {
    pub fn new(id: i16, name: impl Into<String>, ty: Type) -> Self {
        FieldDef {
            id,
            name: name.into(),
            ty,
            requiredness: Requiredness::Default,
        }
    }

    pub fn required(mut self) -> Self {
        self.requiredness = Requiredness::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.requiredness = Requiredness::Optional;
        self
    }
}

/// Find a field by wire id.
pub fn field_by_id(fields: &[FieldDef], id: i16) -> Option<&FieldDef> {
    fields.iter().find(|f| f.id == id)
}

/// Find a field by name.
pub fn field_by_name<'a>(fields: &'a [FieldDef], name: &str) -> Option<&'a FieldDef> {
    fields.iter().find(|f| f.name == name)
}

/// A structured type with ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl RecordDef {
    pub fn field(&self, id: i16) -> Option<&FieldDef> {
        field_by_id(&self.fields, id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        field_by_name(&self.fields, name)
    }
}

/// An enumeration with ordered `(name, value)` members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<(String, i32)>,
}

impl EnumDef {
    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, value: i32) -> bool {
        self.members.iter().any(|(_, v)| *v == value)
    }
}

/// A service method: ordered parameters and one return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<FieldDef>,
    pub returns: Type,
}

impl MethodDef {
    pub fn param(&self, id: i16) -> Option<&FieldDef> {
        field_by_id(&self.params, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_builders_set_requiredness() {
        let f = FieldDef::new(1, "id", Type::String);
        assert_eq!(f.requiredness, Requiredness::Default);
        assert_eq!(f.clone().required().requiredness, Requiredness::Required);
        assert_eq!(f.optional().requiredness, Requiredness::Optional);
    }

    #[test]
    fn enum_lookups() {
        let e = EnumDef {
            name: "Feature".into(),
            members: vec![("ONE".into(), 1), ("TWO".into(), 2)],
        };
        assert_eq!(e.name_of(2), Some("TWO"));
        assert_eq!(e.name_of(3), None);
        assert_eq!(e.value_of("ONE"), Some(1));
        assert!(e.contains(1));
        assert!(!e.contains(0));
    }

    #[test]
    fn containers() {
        assert!(Type::list(Type::I32).is_container());
        assert!(Type::map(Type::String, Type::Bool).is_container());
        assert!(!Type::Record(RecordId(0)).is_container());
    }
}
