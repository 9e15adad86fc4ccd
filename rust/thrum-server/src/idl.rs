//! The `TestService` interface.
//!
//! ```text
//! enum Feature { ONE = 1, TWO = 2, THREE = 3 }
//! struct Message { 1: string content, 2: list<string> tags, 3: optional Message nested }
//! ```

use thrum_schema::{FieldDef, Schema, SchemaBuilder, SchemaError, Type};

pub const SERVICE: &str = "TestService";

/// Field ids of `Message`.
pub mod message {
    pub const CONTENT: i16 = 1;
    pub const TAGS: i16 = 2;
    pub const NESTED: i16 = 3;
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    One = 1,
    Two = 2,
    Three = 3,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::One, Feature::Two, Feature::Three];

    pub fn name(self) -> &'static str {
        match self {
            Feature::One => "ONE",
            Feature::Two => "TWO",
            Feature::Three => "THREE",
        }
    }
}

pub fn schema() -> Result<Schema, SchemaError> {
    let mut builder = SchemaBuilder::new(SERVICE);

    let feature = builder.add_enum("Feature", Feature::ALL.map(|f| (f.name(), f as i32)))?;

    let msg = builder.declare_record("Message")?;
    builder.define_record(
        msg,
        vec![
            FieldDef::new(message::CONTENT, "content", Type::String),
            FieldDef::new(message::TAGS, "tags", Type::list(Type::String)),
            FieldDef::new(message::NESTED, "nested", Type::Record(msg)).optional(),
        ],
    )?;

    builder.add_method("simpleCall", vec![FieldDef::new(1, "id", Type::String)], Type::String)?;
    builder.add_method("boolCall", vec![FieldDef::new(1, "tf", Type::Bool)], Type::Bool)?;
    builder.add_method(
        "messageCall",
        vec![FieldDef::new(1, "message", Type::Record(msg))],
        Type::Record(msg),
    )?;
    builder.add_method(
        "mapCall",
        vec![FieldDef::new(1, "maps", Type::map(Type::String, Type::Bool))],
        Type::map(Type::String, Type::Bool),
    )?;
    builder.add_method(
        "stringCall",
        vec![FieldDef::new(1, "strs", Type::list(Type::String))],
        Type::list(Type::String),
    )?;
    builder.add_method(
        "stringsCall",
        vec![FieldDef::new(1, "strs", Type::list(Type::Record(msg)))],
        Type::list(Type::Record(msg)),
    )?;
    builder.add_method(
        "enumCall",
        vec![FieldDef::new(1, "feature", Type::Enum(feature))],
        Type::list(Type::Enum(feature)),
    )?;

    builder.build()
}
