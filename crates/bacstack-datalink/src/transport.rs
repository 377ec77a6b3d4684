use crate::address::{Address, BACNET_IP_PORT};
use crate::bvlc::{BvlcFunction, BvlcHeader, BVLC_HEADER_LEN};
use bacstack_core::encoding::cursor::DecodeCursor;
use bacstack_core::types::MaxApdu;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Largest datagram a BACnet/IP transport handles.
pub const MAX_FRAME_LEN: usize = 1600;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame too large")]
    FrameTooLarge,
    #[error("invalid frame")]
    InvalidFrame,
    #[error("unsupported link function 0x{0:02x}")]
    UnsupportedFunction(u8),
}

/// Abstract datalink transport.
///
/// A frame handed to [`send`](Self::send) starts with
/// [`header_length`](Self::header_length) reserved bytes that the transport
/// fills with its own framing, so the application layer never copies the
/// payload to prepend a header.
pub trait Transport: Send + Sync + 'static {
    /// Bytes to reserve at the front of every outgoing frame.
    fn header_length(&self) -> usize;

    /// Largest frame (header included) this transport will carry.
    fn max_frame_length(&self) -> usize;

    /// This side's max-APDU capability, advertised to peers.
    fn max_apdu(&self) -> MaxApdu;

    /// The address that reaches every device on the local broadcast domain.
    fn broadcast_address(&self) -> Address;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;

    /// Sends `frame` (reserved header space at the front) to `address`,
    /// returning the bytes put on the wire.
    fn send(
        &self,
        frame: &mut [u8],
        address: &Address,
    ) -> impl std::future::Future<Output = Result<usize, TransportError>> + Send;

    /// Receives one frame, stripping the link framing; returns the payload
    /// length and the sender.
    fn recv(
        &self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = Result<(usize, Address), TransportError>> + Send;
}

/// Configuration for the BACnet/IP UDP transport.
#[derive(Debug, Clone)]
pub struct UdpTransportConfig {
    /// Local bind address; port 47808 unless overridden.
    pub bind: SocketAddr,
    /// Broadcast destination. Defaults to the limited broadcast on the
    /// bound port.
    pub broadcast: Option<SocketAddr>,
    /// This side's advertised max-APDU.
    pub max_apdu: MaxApdu,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), BACNET_IP_PORT),
            broadcast: None,
            max_apdu: MaxApdu::UpTo1476,
        }
    }
}

impl UdpTransportConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind.set_port(port);
        self
    }
}

/// BACnet/IP over UDP: BVLC framing, SO_BROADCAST, Forwarded-NPDU
/// unwrapping.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    broadcast: SocketAddr,
    max_apdu: MaxApdu,
}

impl UdpTransport {
    pub async fn bind(config: UdpTransportConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.bind).await?;
        socket.set_broadcast(true)?;
        let port = socket.local_addr()?.port();
        let broadcast = config
            .broadcast
            .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port));
        Ok(Self {
            socket: Arc::new(socket),
            broadcast,
            max_apdu: config.max_apdu,
        })
    }

    /// Binds to an ephemeral localhost port; used by tests and clients
    /// that should not claim 47808.
    pub async fn bind_ephemeral() -> Result<Self, TransportError> {
        Self::bind(UdpTransportConfig {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            ..UdpTransportConfig::default()
        })
        .await
    }
}

impl Transport for UdpTransport {
    fn header_length(&self) -> usize {
        BVLC_HEADER_LEN
    }

    fn max_frame_length(&self) -> usize {
        MAX_FRAME_LEN
    }

    fn max_apdu(&self) -> MaxApdu {
        self.max_apdu
    }

    fn broadcast_address(&self) -> Address {
        Address::new(self.broadcast)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    async fn send(&self, frame: &mut [u8], address: &Address) -> Result<usize, TransportError> {
        if frame.len() < BVLC_HEADER_LEN {
            return Err(TransportError::InvalidFrame);
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge);
        }
        let length = u16::try_from(frame.len()).map_err(|_| TransportError::FrameTooLarge)?;
        let is_broadcast = address.is_broadcast() || address.endpoint() == self.broadcast;
        let function = if is_broadcast {
            BvlcFunction::OriginalBroadcastNpdu
        } else {
            BvlcFunction::OriginalUnicastNpdu
        };
        BvlcHeader { function, length }
            .write_into(&mut frame[..BVLC_HEADER_LEN])
            .map_err(|_| TransportError::InvalidFrame)?;

        let target = if is_broadcast {
            self.broadcast
        } else {
            address.endpoint()
        };
        Ok(self.socket.send_to(frame, target).await?)
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, Address), TransportError> {
        let mut frame = [0u8; MAX_FRAME_LEN];
        let (n, source) = self.socket.recv_from(&mut frame).await?;
        let mut cur = DecodeCursor::new(&frame[..n]);
        let header = BvlcHeader::decode(&mut cur).map_err(|_| TransportError::InvalidFrame)?;
        let payload_len = (header.length as usize)
            .checked_sub(BVLC_HEADER_LEN)
            .ok_or(TransportError::InvalidFrame)?;

        match header.function {
            BvlcFunction::OriginalUnicastNpdu
            | BvlcFunction::OriginalBroadcastNpdu
            | BvlcFunction::DistributeBroadcastToNetwork => {
                let payload = cur.take(payload_len).map_err(|_| TransportError::InvalidFrame)?;
                if payload.len() > buf.len() {
                    return Err(TransportError::FrameTooLarge);
                }
                buf[..payload.len()].copy_from_slice(payload);
                Ok((payload.len(), Address::new(source)))
            }
            // A BBMD on the domain relays remote broadcasts with the origin
            // endpoint prefixed; surface that origin as the sender.
            BvlcFunction::ForwardedNpdu => {
                let forwarded = cur.take(payload_len).map_err(|_| TransportError::InvalidFrame)?;
                if forwarded.len() < 6 {
                    return Err(TransportError::InvalidFrame);
                }
                let origin_ip = Ipv4Addr::new(forwarded[0], forwarded[1], forwarded[2], forwarded[3]);
                let origin_port = u16::from_be_bytes([forwarded[4], forwarded[5]]);
                let payload = &forwarded[6..];
                if payload.len() > buf.len() {
                    return Err(TransportError::FrameTooLarge);
                }
                buf[..payload.len()].copy_from_slice(payload);
                Ok((
                    payload.len(),
                    Address::new(SocketAddr::new(IpAddr::V4(origin_ip), origin_port)),
                ))
            }
            other => Err(TransportError::UnsupportedFunction(other.to_u8())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Transport, TransportError, UdpTransport};
    use crate::address::Address;
    use crate::bvlc::{BvlcFunction, BvlcHeader, BVLC_HEADER_LEN, BVLC_TYPE};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use tokio::net::UdpSocket;

    async fn localhost_pair() -> (UdpTransport, UdpTransport) {
        let a = UdpTransport::bind_ephemeral().await.unwrap();
        let b = UdpTransport::bind_ephemeral().await.unwrap();
        (a, b)
    }

    fn loopback_addr(transport: &UdpTransport) -> Address {
        let port = transport.local_addr().unwrap().port();
        Address::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
    }

    #[tokio::test]
    async fn unicast_roundtrip_with_bvlc_framing() {
        let (a, b) = localhost_pair().await;
        let mut frame = [0u8; 16];
        frame[BVLC_HEADER_LEN..BVLC_HEADER_LEN + 3].copy_from_slice(&[1, 2, 3]);
        let sent = a
            .send(&mut frame[..BVLC_HEADER_LEN + 3], &loopback_addr(&b))
            .await
            .unwrap();
        assert_eq!(sent, 7);
        assert_eq!(&frame[..2], &[BVLC_TYPE, 0x0A]);

        let mut rx = [0u8; 64];
        let (n, _src) = b.recv(&mut rx).await.unwrap();
        assert_eq!(&rx[..n], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn forwarded_npdu_surfaces_origin() {
        let transport = UdpTransport::bind_ephemeral().await.unwrap();
        let target = transport.local_addr().unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), target.port());
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut frame = Vec::new();
        frame.extend_from_slice(&[BVLC_TYPE, BvlcFunction::ForwardedNpdu.to_u8()]);
        frame.extend_from_slice(&(4u16 + 6 + 3).to_be_bytes());
        frame.extend_from_slice(&[10, 1, 2, 3]);
        frame.extend_from_slice(&47808u16.to_be_bytes());
        frame.extend_from_slice(&[9, 9, 9]);
        sender.send_to(&frame, target).await.unwrap();

        let mut rx = [0u8; 64];
        let (n, src) = transport.recv(&mut rx).await.unwrap();
        assert_eq!(&rx[..n], &[9, 9, 9]);
        assert_eq!(
            src.endpoint(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 47808)
        );
    }

    #[tokio::test]
    async fn admin_functions_are_rejected() {
        let transport = UdpTransport::bind_ephemeral().await.unwrap();
        let target = transport.local_addr().unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), target.port());
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        sender
            .send_to(&[BVLC_TYPE, 0x05, 0, 6, 0, 60], target)
            .await
            .unwrap();
        let mut rx = [0u8; 16];
        let err = transport.recv(&mut rx).await.unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedFunction(0x05)));
    }

    #[tokio::test]
    async fn short_frames_are_invalid() {
        let transport = UdpTransport::bind_ephemeral().await.unwrap();
        let target = transport.local_addr().unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), target.port());
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        sender.send_to(&[BVLC_TYPE, 0x0A], target).await.unwrap();
        let mut rx = [0u8; 16];
        assert!(matches!(
            transport.recv(&mut rx).await,
            Err(TransportError::InvalidFrame)
        ));

        // Length field smaller than the header itself.
        let bogus = BvlcHeader {
            function: BvlcFunction::OriginalUnicastNpdu,
            length: 4,
        };
        let mut head = [0u8; 4];
        bogus.write_into(&mut head).unwrap();
        sender.send_to(&head, target).await.unwrap();
        let mut rx = [0u8; 16];
        let (n, _) = transport.recv(&mut rx).await.unwrap();
        assert_eq!(n, 0);
    }
}
