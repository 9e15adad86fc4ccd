/// Error produced while encoding a value or a message.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("expected {expected}, found {found} value")]
    TypeMismatch { expected: String, found: &'static str },

    #[error("{value} is not a member of enum `{enum_name}`")]
    InvalidEnumValue { enum_name: String, value: i32 },

    #[error("required field `{field}` of `{owner}` is missing")]
    MissingRequiredField { owner: String, field: String },

    #[error("`{owner}` has no field with id {id}")]
    UnknownField { owner: String, id: i16 },

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("type {0} is not defined in the schema")]
    UnknownType(String),

    #[error("{0} does not fit in a 32-bit length prefix")]
    TooLong(usize),

    #[error("nesting exceeds the depth limit of {0}")]
    DepthLimitExceeded(usize),

    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error produced while decoding untrusted input.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid length {0}")]
    InvalidLength(i64),

    #[error("varint exceeds its maximum encoded length")]
    VarintTooLong,

    #[error("unknown wire type id {0}")]
    UnknownWireType(u8),

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{value} is not a member of enum `{enum_name}`")]
    InvalidEnumValue { enum_name: String, value: i32 },

    #[error("`{name}` is not a member of enum `{enum_name}`")]
    UnknownEnumName { enum_name: String, name: String },

    #[error("required field `{field}` of `{owner}` is missing")]
    MissingRequiredField { owner: String, field: String },

    #[error("{value} is out of range for {ty}")]
    IntegerOutOfRange { ty: &'static str, value: String },

    #[error("string is not valid utf-8")]
    InvalidUtf8,

    #[error("bad protocol version {0:#x}")]
    BadVersion(u32),

    #[error("invalid message type {0}")]
    InvalidMessageType(i64),

    #[error("unexpected message type {0}")]
    UnexpectedMessageType(&'static str),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("type {0} is not defined in the schema")]
    UnknownType(String),

    #[error("nesting exceeds the depth limit of {0}")]
    DepthLimitExceeded(usize),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        DecodeError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_readable() {
        let err = DecodeError::IntegerOutOfRange {
            ty: "i16",
            value: "70000".into(),
        };
        assert_eq!(err.to_string(), "70000 is out of range for i16");
        let err = EncodeError::InvalidEnumValue {
            enum_name: "Feature".into(),
            value: 9,
        };
        assert_eq!(err.to_string(), "9 is not a member of enum `Feature`");
        assert_eq!(DecodeError::BadVersion(0x8002).to_string(), "bad protocol version 0x8002");
    }
}
