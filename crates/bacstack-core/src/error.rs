use crate::types::protocol::RejectReason;
use thiserror::Error;

/// Errors raised while encoding a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The write would pass the buffer's limit. For request payloads the
    /// limit is header + max-APDU, so this is what triggers segmentation.
    #[error("not enough buffer")]
    NotEnoughBuffer,
    #[error("value out of range")]
    ValueOutOfRange,
    #[error("invalid length")]
    InvalidLength,
    #[error("{0}")]
    Message(&'static str),
}

/// Errors raised while decoding a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid tag")]
    InvalidTag,
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid value")]
    InvalidValue,
    #[error("missing required parameter")]
    MissingRequired,
    #[error("too many arguments")]
    TooManyArguments,
    #[error("unsupported encoding")]
    Unsupported,
}

impl DecodeError {
    /// The Reject reason a server reports when a request payload fails to
    /// decode with this error.
    pub const fn reject_reason(self) -> RejectReason {
        match self {
            Self::InvalidTag | Self::InvalidValue | Self::InvalidLength => RejectReason::InvalidTag,
            Self::MissingRequired | Self::UnexpectedEof => RejectReason::MissingRequiredParameter,
            Self::TooManyArguments => RejectReason::TooManyArguments,
            Self::Unsupported => RejectReason::Other,
        }
    }
}
