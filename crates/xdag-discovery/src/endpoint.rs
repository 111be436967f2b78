//! Network endpoint advertised in discovery payloads.

use crate::packet::DecodeError;
use crate::rlp::{RlpReader, RlpStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Address of a discovery peer.
///
/// `tcp_port == 0` means the peer did not advertise a listening port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// IP literal
    pub host: IpAddr,
    /// Discovery (UDP) port, never zero
    pub udp_port: u16,
    /// Listening (TCP) port, zero when unspecified
    pub tcp_port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    #[must_use]
    pub const fn new(host: IpAddr, udp_port: u16, tcp_port: u16) -> Self {
        Self {
            host,
            udp_port,
            tcp_port,
        }
    }

    /// Endpoint taken from a datagram's source address, without a TCP port.
    #[must_use]
    pub const fn from_udp(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port(), 0)
    }

    /// Address discovery packets are sent to.
    #[must_use]
    pub const fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.udp_port)
    }

    /// Address for outbound connections, if one was advertised.
    #[must_use]
    pub const fn tcp_addr(&self) -> Option<SocketAddr> {
        if self.tcp_port == 0 {
            None
        } else {
            Some(SocketAddr::new(self.host, self.tcp_port))
        }
    }

    /// Append `[ip, udp, tcp | null]` to `stream`.
    pub fn encode(&self, stream: &mut RlpStream) {
        stream.begin_list();
        self.append_fields(stream);
        stream.end_list();
    }

    /// Read an endpoint list. A missing third field means no TCP port.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] for an address that is neither 4
    /// nor 16 bytes, a zero UDP port, or extra fields.
    pub fn decode(reader: &mut RlpReader<'_>) -> Result<Self, DecodeError> {
        let mut list = reader.enter_list()?;

        let host = ip_from_bytes(list.read_bytes()?)?;

        let udp_port = list.read_u16()?;
        if udp_port == 0 {
            return Err(DecodeError::Malformed("endpoint udp port is zero".into()));
        }

        let tcp_port = if list.is_empty() || list.next_is_null() {
            if !list.is_empty() {
                list.skip()?;
            }
            0
        } else {
            list.read_u16()?
        };
        list.finish()?;

        Ok(Self::new(host, udp_port, tcp_port))
    }
}

impl Endpoint {
    /// Append the three endpoint fields without a list header.
    pub(crate) fn append_fields(&self, stream: &mut RlpStream) {
        match self.host {
            IpAddr::V4(ip) => stream.append_bytes(&ip.octets()),
            IpAddr::V6(ip) => stream.append_bytes(&ip.octets()),
        };
        stream.append_u16_fixed(self.udp_port);
        if self.tcp_port == 0 {
            stream.append_null();
        } else {
            stream.append_u16_fixed(self.tcp_port);
        }
    }
}

/// Parse a raw 4- or 16-byte address.
pub(crate) fn ip_from_bytes(bytes: &[u8]) -> Result<IpAddr, DecodeError> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        Ok(IpAddr::V4(Ipv4Addr::from(octets)))
    } else if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        Ok(IpAddr::V6(Ipv6Addr::from(octets)))
    } else {
        Err(DecodeError::Malformed(format!(
            "address of {} bytes",
            bytes.len()
        )))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.udp_addr())?;
        if self.tcp_port != 0 {
            write!(f, "/tcp:{}", self.tcp_port)?;
        }
        Ok(())
    }
}
