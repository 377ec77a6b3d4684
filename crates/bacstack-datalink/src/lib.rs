//! BACnet/IP datalink layer: transport addresses, BVLC framing, and the
//! UDP transport.

pub mod address;
pub mod bvlc;
pub mod transport;

pub use address::Address;
pub use bvlc::{BvlcFunction, BvlcHeader, BVLC_HEADER_LEN};
pub use transport::{Transport, TransportError, UdpTransport, UdpTransportConfig};
