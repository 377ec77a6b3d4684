use bacstack_core::npdu::RemoteStation;
use core::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default BACnet/IP UDP port (0xBAC0).
pub const BACNET_IP_PORT: u16 = 47808;

/// A transport endpoint: the IPv4 socket address plus the BACnet network
/// number, and the routed source/destination stations for traffic that
/// crossed a BACnet router. Immutable after construction; equality is
/// structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    endpoint: SocketAddr,
    network: u16,
    routed_source: Option<RemoteStation>,
    routed_destination: Option<RemoteStation>,
}

impl Address {
    pub const LOCAL_NETWORK: u16 = 0;

    pub const fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            network: Self::LOCAL_NETWORK,
            routed_source: None,
            routed_destination: None,
        }
    }

    pub fn with_network(mut self, network: u16) -> Self {
        self.network = network;
        self
    }

    pub fn with_routed_source(mut self, source: RemoteStation) -> Self {
        self.routed_source = Some(source);
        self
    }

    pub fn with_routed_destination(mut self, destination: RemoteStation) -> Self {
        self.routed_destination = Some(destination);
        self
    }

    /// The limited-broadcast address for the given port.
    pub fn local_broadcast(port: u16) -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port))
    }

    pub const fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub const fn network(&self) -> u16 {
        self.network
    }

    pub fn routed_source(&self) -> Option<&RemoteStation> {
        self.routed_source.as_ref()
    }

    pub fn routed_destination(&self) -> Option<&RemoteStation> {
        self.routed_destination.as_ref()
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self.endpoint.ip(), IpAddr::V4(v4) if v4.is_broadcast())
    }

    /// The station form of this endpoint: 6 MAC bytes, IPv4 + port.
    pub fn station(&self) -> RemoteStation {
        let mut mac = Vec::with_capacity(6);
        if let IpAddr::V4(v4) = self.endpoint.ip() {
            mac.extend_from_slice(&v4.octets());
        }
        mac.extend_from_slice(&self.endpoint.port().to_be_bytes());
        RemoteStation {
            network: self.network,
            mac,
        }
    }

    /// True when two addresses reach the same peer, ignoring routing
    /// annotations.
    pub fn same_endpoint(&self, other: &Address) -> bool {
        self.endpoint == other.endpoint
    }
}

impl From<SocketAddr> for Address {
    fn from(endpoint: SocketAddr) -> Self {
        Self::new(endpoint)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.network == Self::LOCAL_NETWORK {
            write!(f, "{}", self.endpoint)
        } else {
            write!(f, "{}@net{}", self.endpoint, self.network)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Address, BACNET_IP_PORT};

    #[test]
    fn equality_is_structural() {
        let a = Address::new("192.168.1.10:47808".parse().unwrap());
        let b = Address::new("192.168.1.10:47808".parse().unwrap());
        let c = b.clone().with_network(5);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.same_endpoint(&c));
    }

    #[test]
    fn broadcast_detection() {
        assert!(Address::local_broadcast(BACNET_IP_PORT).is_broadcast());
        assert!(!Address::new("10.0.0.1:47808".parse().unwrap()).is_broadcast());
    }

    #[test]
    fn station_packs_ip_and_port() {
        let addr = Address::new("10.1.2.3:47808".parse().unwrap());
        let station = addr.station();
        assert_eq!(station.mac, vec![10, 1, 2, 3, 0xBA, 0xC0]);
    }
}
