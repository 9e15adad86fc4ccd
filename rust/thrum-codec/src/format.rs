use std::fmt;
use std::str::FromStr;

/// Wire encoding of a request or response.
///
/// The discriminant is stable and can be carried in headers or logs as a
/// `u16`. The response to a request is always encoded in the request's format.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Strict binary layout, big-endian fixed-width integers.
    Binary = 1,
    /// Zigzag varints, field-id deltas and nibble-packed headers.
    Compact = 2,
    /// JSON keyed by field id with explicit type tags.
    Json = 3,
    /// Human-readable JSON keyed by field name.
    Text = 4,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Binary, Format::Compact, Format::Json, Format::Text];

    /// Format selected when the caller does not name one.
    pub const DEFAULT: Format = Format::Binary;

    /// The canonical `Content-Type` for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Binary => "application/x-thrift; protocol=TBINARY",
            Format::Compact => "application/x-thrift; protocol=TCOMPACT",
            Format::Json => "application/x-thrift; protocol=TJSON",
            Format::Text => "application/x-thrift; protocol=TTEXT",
        }
    }

    /// Negotiate a format from a `Content-Type` header value.
    ///
    /// Bare `application/x-thrift` selects [`Format::DEFAULT`]. Media type and
    /// protocol names compare case-insensitively.
    pub fn from_content_type(value: &str) -> Result<Format, UnsupportedContentType> {
        let unsupported = || UnsupportedContentType(value.to_string());

        let mut parts = value.split(';');
        let media_type = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        match media_type.as_str() {
            "application/x-thrift" => {
                let protocol = parts.find_map(|param| {
                    let (key, val) = param.split_once('=')?;
                    key.trim()
                        .eq_ignore_ascii_case("protocol")
                        .then(|| val.trim().trim_matches('"').to_string())
                });
                match protocol {
                    None => Ok(Format::DEFAULT),
                    Some(protocol) => protocol.parse().map_err(|_| unsupported()),
                }
            }
            "application/vnd.apache.thrift.binary" => Ok(Format::Binary),
            "application/vnd.apache.thrift.compact" => Ok(Format::Compact),
            "application/vnd.apache.thrift.json" => Ok(Format::Json),
            _ => Err(unsupported()),
        }
    }
}

impl TryFrom<u16> for Format {
    type Error = UnknownFormat;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Format::Binary),
            2 => Ok(Format::Compact),
            3 => Ok(Format::Json),
            4 => Ok(Format::Text),
            _ => Err(UnknownFormat(v.to_string())),
        }
    }
}

impl From<Format> for u16 {
    fn from(format: Format) -> u16 {
        format as u16
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    /// Accepts short names (`binary`) and protocol names (`TBINARY`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "tbinary" => Ok(Format::Binary),
            "compact" | "tcompact" => Ok(Format::Compact),
            "json" | "tjson" => Ok(Format::Json),
            "text" | "ttext" => Ok(Format::Text),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Binary => write!(f, "binary"),
            Format::Compact => write!(f, "compact"),
            Format::Json => write!(f, "json"),
            Format::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format: {0}")]
pub struct UnknownFormat(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported content type: {0}")]
pub struct UnsupportedContentType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_conversion() {
        for format in Format::ALL {
            let id: u16 = format.into();
            assert_eq!(Format::try_from(id).unwrap(), format);
        }
        assert_eq!(u16::from(Format::Binary), 1);
        assert_eq!(u16::from(Format::Text), 4);
        assert!(Format::try_from(0).is_err());
        assert!(Format::try_from(5).is_err());
    }

    #[test]
    fn display_parses_back() {
        for format in Format::ALL {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
        assert_eq!("TCOMPACT".parse::<Format>().unwrap(), Format::Compact);
        assert!("xml".parse::<Format>().is_err());
    }

    #[test]
    fn negotiates_canonical_content_types() {
        for format in Format::ALL {
            assert_eq!(Format::from_content_type(format.content_type()), Ok(format));
        }
    }

    #[test]
    fn negotiates_defaults_and_aliases() {
        assert_eq!(Format::from_content_type("application/x-thrift"), Ok(Format::Binary));
        assert_eq!(
            Format::from_content_type("Application/X-Thrift;Protocol=tjson"),
            Ok(Format::Json)
        );
        assert_eq!(
            Format::from_content_type("application/x-thrift; charset=utf-8; protocol=TTEXT"),
            Ok(Format::Text)
        );
        assert_eq!(
            Format::from_content_type("application/vnd.apache.thrift.compact"),
            Ok(Format::Compact)
        );
        assert_eq!(
            Format::from_content_type("application/vnd.apache.thrift.json; charset=utf-8"),
            Ok(Format::Json)
        );
    }

    #[test]
    fn rejects_unsupported_content_types() {
        assert!(Format::from_content_type("application/json").is_err());
        assert!(Format::from_content_type("text/plain").is_err());
        assert!(Format::from_content_type("application/x-thrift; protocol=TXML").is_err());
        assert!(Format::from_content_type("").is_err());
    }
}
