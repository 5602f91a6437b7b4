use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RLPDecodeError {
    #[error("Invalid RLP length{}", fmt_ctx(.0))]
    InvalidLength(Option<&'static str>),
    #[error("Malformed RLP data{}", fmt_ctx(.0))]
    MalformedData(Option<&'static str>),
    #[error("Malformed boolean: expected 0x80 or 0x01, got 0x{0:02x}")]
    MalformedBoolean(u8),
    #[error("Expected RLP string, got list{}", fmt_ctx(.0))]
    UnexpectedList(Option<&'static str>),
    #[error("Expected RLP list, got string{}", fmt_ctx(.0))]
    UnexpectedString(Option<&'static str>),
    #[error("Non-canonical RLP encoding: {0}")]
    NonCanonicalSize(&'static str),
    #[error("Error decoding field '{field}' of type {type_name}")]
    Field {
        field: String,
        type_name: &'static str,
        #[source]
        source: Box<RLPDecodeError>,
    },
    #[error("{0}")]
    Custom(String),
}

fn fmt_ctx(ctx: &Option<&'static str>) -> String {
    ctx.map(|c| format!(" decoding {c}")).unwrap_or_default()
}

impl RLPDecodeError {
    pub fn invalid_length() -> Self {
        Self::InvalidLength(None)
    }

    pub fn malformed_data() -> Self {
        Self::MalformedData(None)
    }

    pub fn unexpected_list() -> Self {
        Self::UnexpectedList(None)
    }

    pub fn unexpected_string() -> Self {
        Self::UnexpectedString(None)
    }

    pub fn with_context(self, ctx: &'static str) -> Self {
        match self {
            Self::InvalidLength(_) => Self::InvalidLength(Some(ctx)),
            Self::MalformedData(_) => Self::MalformedData(Some(ctx)),
            Self::UnexpectedList(_) => Self::UnexpectedList(Some(ctx)),
            Self::UnexpectedString(_) => Self::UnexpectedString(Some(ctx)),
            other => other,
        }
    }

    /// Wraps `self` as the cause of a failure decoding the field `field` of type `T`.
    pub fn in_field<T>(self, field: &str) -> Self {
        Self::Field {
            field: field.to_string(),
            type_name: std::any::type_name::<T>(),
            source: Box::new(self),
        }
    }

    /// Innermost error of a chain of field errors.
    pub fn root_cause(&self) -> &RLPDecodeError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RLPEncodeError {
    #[error("Unsupported type for RLP encoding: {0}")]
    UnsupportedType(String),
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),
    #[error("{0}")]
    Custom(String),
}
