//! Request and response envelopes.

use std::fmt;

use thrum_schema::{FieldDef, MethodDef, Schema, Type};

use crate::binary::{BinaryReader, BinaryWriter};
use crate::compact::{CompactReader, CompactWriter};
use crate::error::{DecodeError, EncodeError};
use crate::format::Format;
use crate::value::{RecordValue, Value};
use crate::wire::{self, BodyShape, MessageHeader, MessageType};
use crate::{json, text};

/// Failure kinds, numbered like the Thrift application exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
}

impl ExceptionKind {
    /// Unrecognized numbers map to [`ExceptionKind::Unknown`].
    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => ExceptionKind::UnknownMethod,
            2 => ExceptionKind::InvalidMessageType,
            3 => ExceptionKind::WrongMethodName,
            4 => ExceptionKind::BadSequenceId,
            5 => ExceptionKind::MissingResult,
            6 => ExceptionKind::InternalError,
            7 => ExceptionKind::ProtocolError,
            _ => ExceptionKind::Unknown,
        }
    }

    /// Wire number of this kind.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Variant name, as printed by `Display`.
    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Unknown => "Unknown",
            ExceptionKind::UnknownMethod => "UnknownMethod",
            ExceptionKind::InvalidMessageType => "InvalidMessageType",
            ExceptionKind::WrongMethodName => "WrongMethodName",
            ExceptionKind::BadSequenceId => "BadSequenceId",
            ExceptionKind::MissingResult => "MissingResult",
            ExceptionKind::InternalError => "InternalError",
            ExceptionKind::ProtocolError => "ProtocolError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed failure that travels to the caller as an `EXCEPTION` reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApplicationError {
    pub kind: ExceptionKind,
    pub message: String,
}

impl ApplicationError {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        ApplicationError {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::InternalError, message)
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ExceptionKind::UnknownMethod,
            format!("Invalid method name: '{method}'"),
        )
    }
}

/// A decoded call: method, sequence id and arguments keyed by parameter id.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub method: String,
    pub seqid: i32,
    pub args: RecordValue,
}

impl RequestEnvelope {
    pub fn new(method: impl Into<String>, seqid: i32, args: RecordValue) -> Self {
        RequestEnvelope {
            method: method.into(),
            seqid,
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Success(Value),
    Exception(ApplicationError),
}

/// A reply, encoded in the same format as the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub method: String,
    pub seqid: i32,
    pub format: Format,
    pub body: ReplyBody,
}

impl ResponseEnvelope {
    pub fn success(method: impl Into<String>, seqid: i32, format: Format, value: Value) -> Self {
        ResponseEnvelope {
            method: method.into(),
            seqid,
            format,
            body: ReplyBody::Success(value),
        }
    }

    pub fn exception(
        method: impl Into<String>,
        seqid: i32,
        format: Format,
        error: ApplicationError,
    ) -> Self {
        ResponseEnvelope {
            method: method.into(),
            seqid,
            format,
            body: ReplyBody::Exception(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.body, ReplyBody::Success(_))
    }

    pub fn into_call_result(self) -> CallResult {
        CallResult::from(self)
    }
}

/// Client-side view of a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    result: Result<Value, ApplicationError>,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ApplicationError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<Value, ApplicationError> {
        self.result
    }
}

impl From<ResponseEnvelope> for CallResult {
    fn from(response: ResponseEnvelope) -> Self {
        let result = match response.body {
            ReplyBody::Success(value) => Ok(value),
            ReplyBody::Exception(err) => Err(err),
        };
        CallResult { result }
    }
}

fn args_shape(method: &MethodDef) -> BodyShape {
    BodyShape {
        owner: format!("{}_args", method.name),
        fields: method.params.clone(),
    }
}

fn result_shape(method: &MethodDef) -> BodyShape {
    BodyShape {
        owner: format!("{}_result", method.name),
        fields: vec![FieldDef::new(0, "success", method.returns.clone())],
    }
}

fn exception_shape() -> BodyShape {
    BodyShape {
        owner: "TApplicationException".to_string(),
        fields: vec![
            FieldDef::new(1, "message", Type::String),
            FieldDef::new(2, "type", Type::I32),
        ],
    }
}

fn write_message(
    schema: &Schema,
    format: Format,
    header: &MessageHeader,
    shape: &BodyShape,
    values: &RecordValue,
) -> Result<Vec<u8>, EncodeError> {
    match format {
        Format::Binary => wire::write_message(BinaryWriter::new(), schema, header, shape, values),
        Format::Compact => wire::write_message(CompactWriter::new(), schema, header, shape, values),
        Format::Json => json::write_message(schema, header, shape, values),
        Format::Text => text::write_message(schema, header, shape, values),
    }
}

fn read_message<F>(
    schema: &Schema,
    bytes: &[u8],
    format: Format,
    shape: F,
) -> Result<(MessageHeader, RecordValue), DecodeError>
where
    F: FnOnce(&MessageHeader) -> Result<Option<BodyShape>, DecodeError>,
{
    match format {
        Format::Binary => wire::read_message(BinaryReader::new(bytes), schema, shape),
        Format::Compact => wire::read_message(CompactReader::new(bytes), schema, shape),
        Format::Json => json::read_message(bytes, schema, shape),
        Format::Text => text::read_message(bytes, schema, shape),
    }
}

/// Encode a call. The method must exist in `schema`.
pub fn encode_request(
    schema: &Schema,
    request: &RequestEnvelope,
    format: Format,
) -> Result<Vec<u8>, EncodeError> {
    let method = schema
        .method(&request.method)
        .ok_or_else(|| EncodeError::UnknownMethod(request.method.clone()))?;
    let header = MessageHeader::new(&request.method, MessageType::Call, request.seqid);
    write_message(schema, format, &header, &args_shape(method), &request.args)
}

/// Decode a call.
///
/// A method missing from `schema` is not a decode error: its arguments are
/// skipped and the envelope comes back with no args, so the dispatcher can
/// answer with an `UnknownMethod` failure.
pub fn decode_request(
    schema: &Schema,
    bytes: &[u8],
    format: Format,
) -> Result<RequestEnvelope, DecodeError> {
    let (header, args) = read_message(schema, bytes, format, |header| match header.kind {
        MessageType::Call => {
            let method = schema.method(&header.name);
            if method.is_none() {
                tracing::debug!(method = %header.name, "skipping arguments of unknown method");
            }
            Ok(method.map(args_shape))
        }
        other => Err(DecodeError::UnexpectedMessageType(other.as_str())),
    })?;
    Ok(RequestEnvelope {
        method: header.name,
        seqid: header.seqid,
        args,
    })
}

/// Encode a reply in `response.format`.
pub fn encode_response(
    schema: &Schema,
    response: &ResponseEnvelope,
) -> Result<Vec<u8>, EncodeError> {
    match &response.body {
        ReplyBody::Success(value) => {
            let method = schema
                .method(&response.method)
                .ok_or_else(|| EncodeError::UnknownMethod(response.method.clone()))?;
            let header = MessageHeader::new(&response.method, MessageType::Reply, response.seqid);
            let values = RecordValue::new().with(0, value.clone());
            write_message(schema, response.format, &header, &result_shape(method), &values)
        }
        ReplyBody::Exception(err) => {
            let header =
                MessageHeader::new(&response.method, MessageType::Exception, response.seqid);
            let values = RecordValue::new()
                .with(1, err.message.as_str())
                .with(2, err.kind.as_i32());
            write_message(schema, response.format, &header, &exception_shape(), &values)
        }
    }
}

/// Decode a reply. A `REPLY` without a result becomes a `MissingResult`
/// failure.
pub fn decode_response(
    schema: &Schema,
    bytes: &[u8],
    format: Format,
) -> Result<ResponseEnvelope, DecodeError> {
    let (header, mut values) = read_message(schema, bytes, format, |header| match header.kind {
        MessageType::Reply => schema
            .method(&header.name)
            .map(|method| Some(result_shape(method)))
            .ok_or_else(|| DecodeError::UnknownMethod(header.name.clone())),
        MessageType::Exception => Ok(Some(exception_shape())),
        other => Err(DecodeError::UnexpectedMessageType(other.as_str())),
    })?;

    let body = match header.kind {
        MessageType::Reply => match values.remove(0) {
            Some(value) => ReplyBody::Success(value),
            None => ReplyBody::Exception(ApplicationError::new(
                ExceptionKind::MissingResult,
                format!("{} failed: unknown result", header.name),
            )),
        },
        _ => {
            let message = values
                .remove(1)
                .and_then(Value::into_string)
                .unwrap_or_default();
            let kind = values
                .get(2)
                .and_then(Value::as_i32)
                .map(ExceptionKind::from_i32)
                .unwrap_or(ExceptionKind::Unknown);
            ReplyBody::Exception(ApplicationError::new(kind, message))
        }
    };
    Ok(ResponseEnvelope {
        method: header.name,
        seqid: header.seqid,
        format,
        body,
    })
}
