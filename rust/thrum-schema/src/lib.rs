#![forbid(unsafe_code)]

//! Interface schema model for thrum services.
//!
//! A [`Schema`] names a service, its methods (ordered, typed parameters and a
//! return type) and the structured types those methods use. It is the single
//! source of truth for both codec type resolution and dispatcher method
//! resolution.

mod builder;
mod doc;
mod schema;
mod types;

pub use builder::{MAX_NAME_LEN, SchemaBuilder, SchemaError};
pub use doc::{EnumDoc, EnumMemberDoc, FieldDoc, MethodDoc, RecordDoc, SchemaDoc, TypeDoc};
pub use schema::Schema;
pub use types::{
    EnumDef, EnumId, FieldDef, MethodDef, RecordDef, RecordId, Requiredness, Type, field_by_id,
    field_by_name,
};
