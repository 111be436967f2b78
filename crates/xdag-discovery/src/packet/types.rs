//! Packet type codes and the payload decoder table.

use super::data::{FindNeighbors, Neighbors, PacketData, Ping, Pong};
use super::error::DecodeError;
use std::fmt;

/// Discovery packet type, carried in byte 97 of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Liveness probe
    Ping = 0x01,
    /// Reply to a [`PacketType::Ping`]
    Pong = 0x02,
    /// Request for peers close to a target id
    FindNeighbors = 0x03,
    /// Reply to a [`PacketType::FindNeighbors`]
    Neighbors = 0x04,
}

/// Decodes the RLP payload of one packet type.
pub type PayloadDecoder = fn(&[u8]) -> Result<PacketData, DecodeError>;

/// Payload decoders indexed by type code.
const DECODERS: [Option<(PacketType, PayloadDecoder)>; 5] = [
    None,
    Some((PacketType::Ping, decode_ping as PayloadDecoder)),
    Some((PacketType::Pong, decode_pong as PayloadDecoder)),
    Some((PacketType::FindNeighbors, decode_find_neighbors as PayloadDecoder)),
    Some((PacketType::Neighbors, decode_neighbors as PayloadDecoder)),
];

fn decode_ping(payload: &[u8]) -> Result<PacketData, DecodeError> {
    Ping::decode(payload).map(PacketData::Ping)
}

fn decode_pong(payload: &[u8]) -> Result<PacketData, DecodeError> {
    Pong::decode(payload).map(PacketData::Pong)
}

fn decode_find_neighbors(payload: &[u8]) -> Result<PacketData, DecodeError> {
    FindNeighbors::decode(payload).map(PacketData::FindNeighbors)
}

fn decode_neighbors(payload: &[u8]) -> Result<PacketData, DecodeError> {
    Neighbors::decode(payload).map(PacketData::Neighbors)
}

impl PacketType {
    /// Wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up a type by wire code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        lookup(code).map(|(packet_type, _)| packet_type)
    }

    /// Decoder registered for this type.
    #[must_use]
    pub fn decoder(self) -> PayloadDecoder {
        match self {
            Self::Ping => decode_ping,
            Self::Pong => decode_pong,
            Self::FindNeighbors => decode_find_neighbors,
            Self::Neighbors => decode_neighbors,
        }
    }
}

/// Type and decoder for a wire code, if one is registered.
pub(crate) fn lookup(code: u8) -> Option<(PacketType, PayloadDecoder)> {
    DECODERS.get(usize::from(code)).copied().flatten()
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::FindNeighbors => "FIND_NEIGHBORS",
            Self::Neighbors => "NEIGHBORS",
        };
        f.write_str(name)
    }
}
