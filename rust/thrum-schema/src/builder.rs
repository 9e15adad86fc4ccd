//! Schema construction and validation.
//!
//! Records can be forward-declared with [`SchemaBuilder::declare_record`] and
//! defined later, which is how self-referential records are written:
//!
//! ```rust
//! use thrum_schema::{FieldDef, SchemaBuilder, Type};
//!
//! let mut builder = SchemaBuilder::new("TestService");
//! let node = builder.declare_record("Node").unwrap();
//! builder
//!     .define_record(
//!         node,
//!         vec![
//!             FieldDef::new(1, "label", Type::String),
//!             FieldDef::new(2, "next", Type::Record(node)).optional(),
//!         ],
//!     )
//!     .unwrap();
//! builder
//!     .add_method("walk", vec![FieldDef::new(1, "head", Type::Record(node))], Type::I32)
//!     .unwrap();
//! let schema = builder.build().unwrap();
//! assert_eq!(schema.type_name(&Type::Record(node)), "Node");
//! ```

use std::collections::{HashMap, HashSet};

use crate::types::{EnumDef, EnumId, FieldDef, MethodDef, RecordDef, RecordId, Type};
use crate::Schema;

/// Maximum length of any schema name, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Error type for schema construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{kind} name cannot be empty")]
    EmptyName { kind: &'static str },

    #[error("{kind} name `{name}` exceeds {max} bytes", max = MAX_NAME_LEN)]
    NameTooLong { kind: &'static str, name: String },

    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },

    #[error("duplicate field id {id} in `{owner}`")]
    DuplicateFieldId { owner: String, id: i16 },

    #[error("duplicate field name `{field}` in `{owner}`")]
    DuplicateFieldName { owner: String, field: String },

    #[error("record `{0}` was declared but never defined")]
    UndefinedRecord(String),

    #[error("record `{0}` is already defined")]
    RecordAlreadyDefined(String),

    #[error("unknown record id {0}")]
    UnknownRecordId(u32),

    #[error("unknown enum id {0}")]
    UnknownEnumId(u32),

    #[error("enum `{0}` has no members")]
    EmptyEnum(String),

    #[error("enum `{enum_name}` has duplicate value {value}")]
    DuplicateEnumValue { enum_name: String, value: i32 },
}

struct PendingRecord {
    name: String,
    fields: Option<Vec<FieldDef>>,
}

/// Builder for a [`Schema`].
pub struct SchemaBuilder {
    service: String,
    records: Vec<PendingRecord>,
    record_names: HashMap<String, RecordId>,
    enums: Vec<EnumDef>,
    enum_names: HashMap<String, EnumId>,
    methods: Vec<MethodDef>,
    method_names: HashMap<String, usize>,
}

impl SchemaBuilder {
    pub fn new(service: impl Into<String>) -> Self {
        SchemaBuilder {
            service: service.into(),
            records: Vec::new(),
            record_names: HashMap::new(),
            enums: Vec::new(),
            enum_names: HashMap::new(),
            methods: Vec::new(),
            method_names: HashMap::new(),
        }
    }

    /// Reserve a record id without defining its fields yet.
    pub fn declare_record(&mut self, name: impl Into<String>) -> Result<RecordId, SchemaError> {
        let name = name.into();
        check_name("record", &name)?;
        self.check_type_name_free(&name)?;

        let id = RecordId(self.records.len() as u32);
        self.record_names.insert(name.clone(), id);
        self.records.push(PendingRecord { name, fields: None });
        Ok(id)
    }

    /// Give a declared record its fields.
    pub fn define_record(
        &mut self,
        id: RecordId,
        fields: Vec<FieldDef>,
    ) -> Result<(), SchemaError> {
        let pending = self
            .records
            .get_mut(id.0 as usize)
            .ok_or(SchemaError::UnknownRecordId(id.0))?;
        if pending.fields.is_some() {
            return Err(SchemaError::RecordAlreadyDefined(pending.name.clone()));
        }
        check_fields(&pending.name, &fields)?;
        pending.fields = Some(fields);
        Ok(())
    }

    /// Declare and define a record in one step.
    pub fn add_record(
        &mut self,
        name: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Result<RecordId, SchemaError> {
        let id = self.declare_record(name)?;
        self.define_record(id, fields)?;
        Ok(id)
    }

    pub fn add_enum<N: Into<String>>(
        &mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = (N, i32)>,
    ) -> Result<EnumId, SchemaError> {
        let name = name.into();
        check_name("enum", &name)?;
        self.check_type_name_free(&name)?;

        let members: Vec<(String, i32)> = members.into_iter().map(|(n, v)| (n.into(), v)).collect();
        if members.is_empty() {
            return Err(SchemaError::EmptyEnum(name));
        }
        let mut seen_names = HashSet::new();
        let mut seen_values = HashSet::new();
        for (member, value) in &members {
            check_name("enum member", member)?;
            if !seen_names.insert(member.as_str()) {
                return Err(SchemaError::Duplicate {
                    kind: "enum member",
                    name: format!("{name}.{member}"),
                });
            }
            if !seen_values.insert(*value) {
                return Err(SchemaError::DuplicateEnumValue {
                    enum_name: name.clone(),
                    value: *value,
                });
            }
        }

        let id = EnumId(self.enums.len() as u32);
        self.enum_names.insert(name.clone(), id);
        self.enums.push(EnumDef { name, members });
        Ok(id)
    }

    pub fn add_method(
        &mut self,
        name: impl Into<String>,
        params: Vec<FieldDef>,
        returns: Type,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        check_name("method", &name)?;
        if self.method_names.contains_key(&name) {
            return Err(SchemaError::Duplicate { kind: "method", name });
        }
        check_fields(&name, &params)?;

        self.method_names.insert(name.clone(), self.methods.len());
        self.methods.push(MethodDef { name, params, returns });
        Ok(())
    }

    /// Validate all cross-references and freeze the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut records = Vec::with_capacity(self.records.len());
        for pending in self.records {
            let fields = pending
                .fields
                .ok_or_else(|| SchemaError::UndefinedRecord(pending.name.clone()))?;
            records.push(RecordDef {
                name: pending.name,
                fields,
            });
        }

        let check = |ty: &Type| check_type_refs(ty, records.len(), self.enums.len());
        for record in &records {
            for field in &record.fields {
                check(&field.ty)?;
            }
        }
        for method in &self.methods {
            for param in &method.params {
                check(&param.ty)?;
            }
            check(&method.returns)?;
        }

        Ok(Schema::from_parts(
            self.service,
            records,
            self.enums,
            self.methods,
            self.method_names,
        ))
    }

    fn check_type_name_free(&self, name: &str) -> Result<(), SchemaError> {
        if self.record_names.contains_key(name) || self.enum_names.contains_key(name) {
            return Err(SchemaError::Duplicate {
                kind: "type",
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::EmptyName { kind });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SchemaError::NameTooLong {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn check_fields(owner: &str, fields: &[FieldDef]) -> Result<(), SchemaError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for field in fields {
        check_name("field", &field.name)?;
        if !ids.insert(field.id) {
            return Err(SchemaError::DuplicateFieldId {
                owner: owner.to_string(),
                id: field.id,
            });
        }
        if !names.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateFieldName {
                owner: owner.to_string(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_type_refs(ty: &Type, record_count: usize, enum_count: usize) -> Result<(), SchemaError> {
    match ty {
        Type::Record(id) if id.0 as usize >= record_count => {
            Err(SchemaError::UnknownRecordId(id.0))
        }
        Type::Enum(id) if id.0 as usize >= enum_count => Err(SchemaError::UnknownEnumId(id.0)),
        Type::List(elem) | Type::Set(elem) => check_type_refs(elem, record_count, enum_count),
        Type::Map(key, value) => {
            check_type_refs(key, record_count, enum_count)?;
            check_type_refs(value, record_count, enum_count)
        }
        _ => Ok(()),
    }
}
