//! Payload variants.
//!
//! Each payload is one RLP list:
//!
//! | Type | Shape |
//! |------|-------|
//! | PING | `[version, from, to, expiration]` |
//! | PONG | `[to, ping_hash, expiration]` |
//! | FIND_NEIGHBORS | `[target, expiration]` |
//! | NEIGHBORS | `[[ip, udp, tcp, id]..., expiration]` |
//!
//! Expirations are milliseconds since the Unix epoch.

use super::error::DecodeError;
use super::types::PacketType;
use crate::endpoint::{Endpoint, ip_from_bytes};
use crate::identity::PeerId;
use crate::rlp::{RlpReader, RlpStream};

/// Protocol version carried in PING.
pub const PING_VERSION: u64 = 4;

/// Liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    /// Sender's own endpoint
    pub from: Endpoint,
    /// Recipient endpoint as seen by the sender
    pub to: Endpoint,
    /// Expiration (ms epoch)
    pub expiration: u64,
}

impl Ping {
    fn encode(&self, stream: &mut RlpStream) {
        stream.begin_list();
        stream.append_u64(PING_VERSION);
        self.from.encode(stream);
        self.to.encode(stream);
        stream.append_u64(self.expiration);
        stream.end_list();
    }

    /// Decode a PING payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] on a shape or version mismatch.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut list = RlpReader::from_single_list(payload)?;
        let version = list.read_u64()?;
        if version != PING_VERSION {
            return Err(DecodeError::Malformed(format!(
                "unsupported ping version {version}"
            )));
        }
        let from = Endpoint::decode(&mut list)?;
        let to = Endpoint::decode(&mut list)?;
        let expiration = list.read_u64()?;
        list.finish()?;
        Ok(Self {
            from,
            to,
            expiration,
        })
    }
}

/// Reply to a PING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    /// Endpoint the PING came from
    pub to: Endpoint,
    /// Hash of the PING being answered
    pub ping_hash: [u8; 32],
    /// Expiration (ms epoch)
    pub expiration: u64,
}

impl Pong {
    fn encode(&self, stream: &mut RlpStream) {
        stream.begin_list();
        self.to.encode(stream);
        stream.append_bytes(&self.ping_hash);
        stream.append_u64(self.expiration);
        stream.end_list();
    }

    /// Decode a PONG payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] on a shape mismatch.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut list = RlpReader::from_single_list(payload)?;
        let to = Endpoint::decode(&mut list)?;
        let ping_hash = list.read_array::<32>()?;
        let expiration = list.read_u64()?;
        list.finish()?;
        Ok(Self {
            to,
            ping_hash,
            expiration,
        })
    }
}

/// Request for the peers closest to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNeighbors {
    /// Lookup target
    pub target: PeerId,
    /// Expiration (ms epoch)
    pub expiration: u64,
}

impl FindNeighbors {
    fn encode(&self, stream: &mut RlpStream) {
        stream.begin_list();
        stream.append_bytes(self.target.as_bytes());
        stream.append_u64(self.expiration);
        stream.end_list();
    }

    /// Decode a FIND_NEIGHBORS payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] on a shape mismatch or an invalid
    /// target id.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut list = RlpReader::from_single_list(payload)?;
        let target = PeerId::from_slice(list.read_bytes()?)?;
        let expiration = list.read_u64()?;
        list.finish()?;
        Ok(Self { target, expiration })
    }
}

/// One entry of a NEIGHBORS reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborRecord {
    /// Where the peer can be reached
    pub endpoint: Endpoint,
    /// The peer's identity
    pub id: PeerId,
}

impl NeighborRecord {
    fn encode(&self, stream: &mut RlpStream) {
        stream.begin_list();
        self.endpoint.append_fields(stream);
        stream.append_bytes(self.id.as_bytes());
        stream.end_list();
    }

    fn decode(reader: &mut RlpReader<'_>) -> Result<Self, DecodeError> {
        let mut list = reader.enter_list()?;
        let host = ip_from_bytes(list.read_bytes()?)?;
        let udp_port = list.read_u16()?;
        if udp_port == 0 {
            return Err(DecodeError::Malformed("neighbor udp port is zero".into()));
        }
        let tcp_port = list.read_u16()?;
        let id = PeerId::from_slice(list.read_bytes()?)?;
        list.finish()?;
        Ok(Self {
            endpoint: Endpoint::new(host, udp_port, tcp_port),
            id,
        })
    }
}

/// Reply to FIND_NEIGHBORS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbors {
    /// Peers in the order the sender listed them
    pub peers: Vec<NeighborRecord>,
    /// Expiration (ms epoch)
    pub expiration: u64,
}

impl Neighbors {
    fn encode(&self, stream: &mut RlpStream) {
        stream.begin_list();
        stream.begin_list();
        for peer in &self.peers {
            peer.encode(stream);
        }
        stream.end_list();
        stream.append_u64(self.expiration);
        stream.end_list();
    }

    /// Decode a NEIGHBORS payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] if any record is malformed.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut list = RlpReader::from_single_list(payload)?;
        let mut records = list.enter_list()?;
        let mut peers = Vec::with_capacity(records.item_count()?);
        while !records.is_empty() {
            peers.push(NeighborRecord::decode(&mut records)?);
        }
        let expiration = list.read_u64()?;
        list.finish()?;
        Ok(Self { peers, expiration })
    }
}

/// Decoded payload, tagged by packet type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketData {
    /// PING
    Ping(Ping),
    /// PONG
    Pong(Pong),
    /// FIND_NEIGHBORS
    FindNeighbors(FindNeighbors),
    /// NEIGHBORS
    Neighbors(Neighbors),
}

impl PacketData {
    /// Type code of this payload.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::Ping(_) => PacketType::Ping,
            Self::Pong(_) => PacketType::Pong,
            Self::FindNeighbors(_) => PacketType::FindNeighbors,
            Self::Neighbors(_) => PacketType::Neighbors,
        }
    }

    /// Expiration timestamp carried by every payload.
    #[must_use]
    pub const fn expiration(&self) -> u64 {
        match self {
            Self::Ping(p) => p.expiration,
            Self::Pong(p) => p.expiration,
            Self::FindNeighbors(p) => p.expiration,
            Self::Neighbors(p) => p.expiration,
        }
    }

    /// RLP encoding of the payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new();
        match self {
            Self::Ping(p) => p.encode(&mut stream),
            Self::Pong(p) => p.encode(&mut stream),
            Self::FindNeighbors(p) => p.encode(&mut stream),
            Self::Neighbors(p) => p.encode(&mut stream),
        }
        stream.into_bytes()
    }
}

impl From<Ping> for PacketData {
    fn from(p: Ping) -> Self {
        Self::Ping(p)
    }
}

impl From<Pong> for PacketData {
    fn from(p: Pong) -> Self {
        Self::Pong(p)
    }
}

impl From<FindNeighbors> for PacketData {
    fn from(p: FindNeighbors) -> Self {
        Self::FindNeighbors(p)
    }
}

impl From<Neighbors> for PacketData {
    fn from(p: Neighbors) -> Self {
        Self::Neighbors(p)
    }
}
