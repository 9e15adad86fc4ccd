#![forbid(unsafe_code)]

//! Schema-driven codecs for thrum.
//!
//! Values are encoded against a [`thrum_schema::Schema`] in one of four
//! [`Format`]s. The same schema resolves record and enum references on both
//! sides, so the wire never carries type names.
//!
//! - [`encode`] / [`decode`] handle a bare value of a given type.
//! - [`encode_request`] / [`decode_request`] and [`encode_response`] /
//!   [`decode_response`] handle full call and reply envelopes.

mod binary;
mod codec;
mod compact;
mod error;
mod format;
mod json;
mod message;
mod text;
mod value;
mod wire;

pub use codec::{decode, encode};
pub use error::{DecodeError, EncodeError};
pub use format::{Format, UnknownFormat, UnsupportedContentType};
pub use message::{
    ApplicationError, CallResult, ExceptionKind, ReplyBody, RequestEnvelope, ResponseEnvelope,
    decode_request, decode_response, encode_request, encode_response,
};
pub use value::{RecordValue, Value};
pub use wire::{MAX_DEPTH, MessageHeader, MessageType, TType};
