mod acks;
mod confirmed;
mod faults;
mod kind;
mod unconfirmed;

pub use acks::{ComplexAck, SegmentAck, SimpleAck};
pub use confirmed::ConfirmedRequest;
pub use faults::{AbortPdu, ErrorPdu, RejectPdu};
pub use kind::PduType;
pub use unconfirmed::UnconfirmedRequest;
