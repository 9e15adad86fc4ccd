use std::collections::HashMap;

use crate::builder::SchemaBuilder;
use crate::types::{EnumDef, EnumId, MethodDef, RecordDef, RecordId, Type};

/// Immutable, process-wide description of a service's methods and types.
///
/// Built once through [`SchemaBuilder`] and shared read-only (usually behind
/// an `Arc`) by the codecs and the dispatcher.
#[derive(Debug, Clone)]
pub struct Schema {
    service: String,
    records: Vec<RecordDef>,
    enums: Vec<EnumDef>,
    methods: Vec<MethodDef>,
    method_index: HashMap<String, usize>,
}

impl Schema {
    pub fn builder(service: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(service)
    }

    pub(crate) fn from_parts(
        service: String,
        records: Vec<RecordDef>,
        enums: Vec<EnumDef>,
        methods: Vec<MethodDef>,
        method_index: HashMap<String, usize>,
    ) -> Self {
        Schema {
            service,
            records,
            enums,
            methods,
            method_index,
        }
    }

    /// Service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.method_index.get(name).map(|&idx| &self.methods[idx])
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter()
    }

    pub fn record(&self, id: RecordId) -> Option<&RecordDef> {
        self.records.get(id.0 as usize)
    }

    pub fn enum_def(&self, id: EnumId) -> Option<&EnumDef> {
        self.enums.get(id.0 as usize)
    }

    pub fn records(&self) -> impl Iterator<Item = (RecordId, &RecordDef)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (RecordId(i as u32), r))
    }

    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &EnumDef)> {
        self.enums
            .iter()
            .enumerate()
            .map(|(i, e)| (EnumId(i as u32), e))
    }

    pub fn record_by_name(&self, name: &str) -> Option<(RecordId, &RecordDef)> {
        self.records().find(|(_, r)| r.name == name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<(EnumId, &EnumDef)> {
        self.enums().find(|(_, e)| e.name == name)
    }

    /// Render a type in IDL notation, e.g. `map<string,bool>`.
    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Bool => "bool".to_string(),
            Type::Byte => "byte".to_string(),
            Type::I16 => "i16".to_string(),
            Type::I32 => "i32".to_string(),
            Type::I64 => "i64".to_string(),
            Type::Double => "double".to_string(),
            Type::String => "string".to_string(),
            Type::Enum(id) => self
                .enum_def(*id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| id.to_string()),
            Type::Record(id) => self
                .record(*id)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| id.to_string()),
            Type::List(elem) => format!("list<{}>", self.type_name(elem)),
            Type::Set(elem) => format!("set<{}>", self.type_name(elem)),
            Type::Map(key, value) => {
                format!("map<{},{}>", self.type_name(key), self.type_name(value))
            }
        }
    }
}
