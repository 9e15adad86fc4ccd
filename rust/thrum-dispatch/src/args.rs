use std::sync::Arc;

use thrum_codec::{ApplicationError, ExceptionKind, RecordValue, Value};
use thrum_schema::MethodDef;

/// Arguments of one call, in schema parameter order.
///
/// Built by the dispatcher from the decoded request; handlers take values out
/// positionally.
#[derive(Debug)]
pub struct Args {
    method: Arc<MethodDef>,
    values: Vec<Option<Value>>,
}

impl Args {
    pub(crate) fn from_record(method: Arc<MethodDef>, mut record: RecordValue) -> Self {
        let values = method.params.iter().map(|p| record.remove(p.id)).collect();
        Args { method, values }
    }

    /// Build arguments directly, for driving a handler without a request.
    pub fn new(method: Arc<MethodDef>, values: Vec<Option<Value>>) -> Self {
        Args { method, values }
    }

    /// Name of the method being called.
    pub fn method(&self) -> &str {
        &self.method.name
    }

    /// Number of declared parameters, present or not.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for a method without parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Peek at the argument in parameter position `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Move an argument out, leaving it absent.
    pub fn take(&mut self, index: usize) -> Option<Value> {
        self.values.get_mut(index).and_then(Option::take)
    }

    /// Take an argument that must be present.
    pub fn require(&mut self, index: usize) -> Result<Value, ApplicationError> {
        self.take(index).ok_or_else(|| self.bad_arg(index, "is missing"))
    }

    /// Take a string argument.
    pub fn string(&mut self, index: usize) -> Result<String, ApplicationError> {
        let value = self.require(index)?;
        value.into_string().ok_or_else(|| self.bad_arg(index, "is not a string"))
    }

    /// Take a bool argument.
    pub fn bool(&mut self, index: usize) -> Result<bool, ApplicationError> {
        let value = self.require(index)?;
        value.as_bool().ok_or_else(|| self.bad_arg(index, "is not a bool"))
    }

    /// Take an enum argument as its numeric value.
    pub fn enum_value(&mut self, index: usize) -> Result<i32, ApplicationError> {
        match self.require(index)? {
            Value::Enum(v) => Ok(v),
            _ => Err(self.bad_arg(index, "is not an enum")),
        }
    }

    /// Take a record argument.
    pub fn record(&mut self, index: usize) -> Result<RecordValue, ApplicationError> {
        let value = self.require(index)?;
        value.into_record().ok_or_else(|| self.bad_arg(index, "is not a record"))
    }

    /// Elements of a list or set argument.
    pub fn list(&mut self, index: usize) -> Result<Vec<Value>, ApplicationError> {
        let value = self.require(index)?;
        value.into_list().ok_or_else(|| self.bad_arg(index, "is not a list"))
    }

    /// Entries of a map argument.
    pub fn map(&mut self, index: usize) -> Result<Vec<(Value, Value)>, ApplicationError> {
        let value = self.require(index)?;
        value.into_map().ok_or_else(|| self.bad_arg(index, "is not a map"))
    }

    fn bad_arg(&self, index: usize, problem: &str) -> ApplicationError {
        let name = self
            .method
            .params
            .get(index)
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        ApplicationError::new(
            ExceptionKind::ProtocolError,
            format!("{}: argument {index} (`{name}`) {problem}", self.method.name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_schema::{FieldDef, Type};

    fn method() -> Arc<MethodDef> {
        Arc::new(MethodDef {
            name: "pair".into(),
            params: vec![
                FieldDef::new(2, "name", Type::String),
                FieldDef::new(1, "on", Type::Bool),
            ],
            returns: Type::Bool,
        })
    }

    #[test]
    fn positional_by_schema_order() {
        let record = RecordValue::new().with(1, true).with(2, "x").with(9, 1);
        let mut args = Args::from_record(method(), record);
        assert_eq!(args.len(), 2);
        assert_eq!(args.method(), "pair");
        assert_eq!(args.string(0).unwrap(), "x");
        assert!(args.bool(1).unwrap());
    }

    #[test]
    fn missing_and_mistyped_arguments() {
        let mut args = Args::from_record(method(), RecordValue::new().with(2, 5));
        let err = args.string(0).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ProtocolError);
        assert_eq!(err.message, "pair: argument 0 (`name`) is not a string");

        let err = args.bool(1).unwrap_err();
        assert_eq!(err.message, "pair: argument 1 (`on`) is missing");
        assert!(args.get(5).is_none());
    }

    #[test]
    fn take_consumes() {
        let mut args = Args::from_record(method(), RecordValue::new().with(1, false));
        assert_eq!(args.take(1), Some(Value::Bool(false)));
        assert_eq!(args.take(1), None);
    }
}
