//! Serializable introspection views of a schema.

use serde::Serialize;

use crate::types::{EnumDef, FieldDef, MethodDef, RecordDef};
use crate::Schema;

/// Full description of a service.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDoc {
    pub service: String,
    pub methods: Vec<MethodDoc>,
    pub records: Vec<RecordDoc>,
    pub enums: Vec<EnumDoc>,
}

/// One method, with its parameters in wire order.
#[derive(Debug, Clone, Serialize)]
pub struct MethodDoc {
    pub name: String,
    pub params: Vec<FieldDoc>,
    pub returns: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDoc {
    pub id: i16,
    pub name: String,
    pub type_name: String,
    pub requiredness: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordDoc {
    pub name: String,
    pub fields: Vec<FieldDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumDoc {
    pub name: String,
    pub members: Vec<EnumMemberDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumMemberDoc {
    pub name: String,
    pub value: i32,
}

/// A named type: either a record or an enum.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDoc {
    Record(RecordDoc),
    Enum(EnumDoc),
}

impl Schema {
    pub fn describe(&self) -> SchemaDoc {
        SchemaDoc {
            service: self.service().to_string(),
            methods: self.methods().map(|m| self.method_doc(m)).collect(),
            records: self.records().map(|(_, r)| self.record_doc(r)).collect(),
            enums: self.enums().map(|(_, e)| enum_doc(e)).collect(),
        }
    }

    pub fn describe_method(&self, name: &str) -> Option<MethodDoc> {
        self.method(name).map(|m| self.method_doc(m))
    }

    /// Describe a record or enum by name.
    pub fn describe_type(&self, name: &str) -> Option<TypeDoc> {
        if let Some((_, record)) = self.record_by_name(name) {
            return Some(TypeDoc::Record(self.record_doc(record)));
        }
        self.enum_by_name(name).map(|(_, e)| TypeDoc::Enum(enum_doc(e)))
    }

    fn method_doc(&self, method: &MethodDef) -> MethodDoc {
        MethodDoc {
            name: method.name.clone(),
            params: method.params.iter().map(|f| self.field_doc(f)).collect(),
            returns: self.type_name(&method.returns),
        }
    }

    fn record_doc(&self, record: &RecordDef) -> RecordDoc {
        RecordDoc {
            name: record.name.clone(),
            fields: record.fields.iter().map(|f| self.field_doc(f)).collect(),
        }
    }

    fn field_doc(&self, field: &FieldDef) -> FieldDoc {
        FieldDoc {
            id: field.id,
            name: field.name.clone(),
            type_name: self.type_name(&field.ty),
            requiredness: field.requiredness.as_str(),
        }
    }
}

fn enum_doc(e: &EnumDef) -> EnumDoc {
    EnumDoc {
        name: e.name.clone(),
        members: e
            .members
            .iter()
            .map(|(name, value)| EnumMemberDoc {
                name: name.clone(),
                value: *value,
            })
            .collect(),
    }
}
