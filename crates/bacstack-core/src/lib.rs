//! BACnet application-protocol encoding and decoding.
//!
//! `bacstack-core` holds everything that touches the wire format: the tag
//! codec, NPDU and APDU framing, and the per-service request/response
//! payloads. It knows nothing about sockets or timers; those live in
//! `bacstack-datalink` and `bacstack-client`.

/// APDU header variants: confirmed/unconfirmed requests, acks, error,
/// reject, abort, and segment-ack.
pub mod apdu;
/// Tag codec, encode buffer with back-pressure, and decode cursor.
pub mod encoding;
/// Encode and decode error types.
pub mod error;
/// NPDU (network-layer) header.
pub mod npdu;
/// Per-service payload codecs.
pub mod services;
/// Core data types: object ids, property ids, tagged values.
pub mod types;

pub use error::{DecodeError, EncodeError};
