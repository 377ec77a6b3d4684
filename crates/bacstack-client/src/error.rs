use bacstack_core::types::{AbortReason, ErrorClass, ErrorCode, RejectReason};
use bacstack_datalink::TransportError;
use thiserror::Error;

/// Failures surfaced to a caller of the client or engine.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("encode error: {0}")]
    Encode(#[from] bacstack_core::EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] bacstack_core::DecodeError),
    /// All retries elapsed without an acknowledgement.
    #[error("request timed out")]
    Timeout,
    #[error("engine closed")]
    Closed,
    /// The peer answered with an Error PDU.
    #[error("service {service} failed: class {class:?}, code {code:?}")]
    ServiceError {
        service: u8,
        class: ErrorClass,
        code: ErrorCode,
    },
    /// The peer rejected the request outright.
    #[error("request rejected: {reason:?}")]
    Rejected { reason: RejectReason },
    /// The peer aborted the transaction.
    #[error("transaction aborted: {reason:?} (from_server={from_server})")]
    Aborted {
        reason: AbortReason,
        from_server: bool,
    },
    #[error("request exceeds the negotiated segment budget")]
    RequestTooLarge,
    #[error("reassembled response exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },
    #[error("all 256 invoke ids are in flight")]
    InvokeIdsExhausted,
    #[error("peer answered with an unexpected PDU")]
    UnexpectedResponse,
    #[error("device {0} not discovered")]
    UnknownDevice(u32),
    #[error("point name {0:?} is not addressable")]
    BadPointName(String),
}
