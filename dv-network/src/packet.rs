//! Network layer packets and their wire format
//!
//! A packet is encoded as `[destination: 5 bytes, zero-padded][protocol: 1 byte][payload]`, using
//! ASCII for the header so encoded packets remain printable when the payload is text.

use crate::address::{NODE_ID_MAX_LENGTH, NodeId};
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

pub const DESTINATION_LENGTH: usize = NODE_ID_MAX_LENGTH;
pub const PROTOCOL_LENGTH: usize = 1;
pub const HEADER_LENGTH: usize = DESTINATION_LENGTH + PROTOCOL_LENGTH;

const PADDING: u8 = b'0';

/// The upper layer protocol carried by a packet
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// User data, forwarded hop by hop towards the destination
    Data,
    /// Routing advertisements exchanged between neighboring routers
    Control,
}

impl Protocol {
    pub fn code(self) -> u8 {
        match self {
            Protocol::Data => b'1',
            Protocol::Control => b'2',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'1' => Some(Protocol::Data),
            b'2' => Some(Protocol::Control),
            _ => None,
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Data => f.write_str("data"),
            Protocol::Control => f.write_str("control"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("destination `{0}` does not fit in the 5-byte destination field")]
    InvalidDestination(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodingError {
    #[error("packet is {0} bytes long, but the header alone takes 6 bytes")]
    Truncated(usize),
    #[error("unknown protocol code `{0}`")]
    UnknownProtocol(char),
    #[error("invalid destination field `{0}`")]
    InvalidDestination(String),
    #[error("malformed routing advertisement: {0}")]
    MalformedAdvertisement(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct NetworkPacket {
    pub destination: NodeId,
    pub protocol: Protocol,
    pub payload: Vec<u8>,
}

impl NetworkPacket {
    pub fn new(destination: NodeId, protocol: Protocol, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            destination,
            protocol,
            payload: payload.into(),
        }
    }

    pub fn data(destination: NodeId, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(destination, Protocol::Data, payload)
    }

    pub fn control(destination: NodeId, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(destination, Protocol::Control, payload)
    }

    /// Converts the packet to its wire representation
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let destination = self.destination.as_str();
        if destination.len() > DESTINATION_LENGTH {
            return Err(EncodingError::InvalidDestination(destination.to_string()));
        }

        let mut bytes = Vec::with_capacity(HEADER_LENGTH + self.payload.len());
        bytes.resize(DESTINATION_LENGTH - destination.len(), PADDING);
        bytes.extend_from_slice(destination.as_bytes());
        bytes.push(self.protocol.code());
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Parses a packet from its wire representation
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodingError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(DecodingError::Truncated(bytes.len()));
        }

        let (destination, rest) = bytes.split_at(DESTINATION_LENGTH);
        let (protocol, payload) = rest.split_at(PROTOCOL_LENGTH);

        let protocol = Protocol::from_code(protocol[0])
            .ok_or(DecodingError::UnknownProtocol(char::from(protocol[0])))?;

        // Only leading padding is stripped, so ids ending in zero survive the round trip
        let unpadded = destination
            .iter()
            .position(|&b| b != PADDING)
            .map_or(&[][..], |start| &destination[start..]);
        let destination = std::str::from_utf8(unpadded)
            .ok()
            .and_then(|s| s.parse::<NodeId>().ok())
            .ok_or_else(|| {
                DecodingError::InvalidDestination(String::from_utf8_lossy(destination).into_owned())
            })?;

        Ok(Self {
            destination,
            protocol,
            payload: payload.to_vec(),
        })
    }
}

impl Debug for NetworkPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} packet to {} ({:?})",
            self.protocol,
            self.destination,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn test_encode_pads_destination() {
        let packet = NetworkPacket::data(id("H2"), "hello");
        assert_eq!(packet.encode().unwrap(), b"000H21hello");

        let packet = NetworkPacket::control(id("RA"), "");
        assert_eq!(packet.encode().unwrap(), b"000RA2");
    }

    #[test]
    fn test_decode_round_trip() {
        let packets = [
            NetworkPacket::data(id("H1"), "some data"),
            NetworkPacket::data(id("12345"), Vec::new()),
            NetworkPacket::control(id("R10"), "RA;RA|RA|0"),
            NetworkPacket::data(id("7"), vec![0, 159, 146, 150]),
        ];

        for packet in packets {
            let decoded = NetworkPacket::decode(&packet.encode().unwrap()).unwrap();
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_decode_keeps_trailing_zeros() {
        let packet = NetworkPacket::decode(b"001001payload").unwrap();
        assert_eq!(packet.destination, id("100"));
        assert_eq!(packet.protocol, Protocol::Data);
        assert_eq!(packet.payload, b"payload");
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        for len in 0..HEADER_LENGTH {
            let bytes = &b"000H11"[..len];
            assert_eq!(
                NetworkPacket::decode(bytes),
                Err(DecodingError::Truncated(len))
            );
        }
    }

    #[test]
    fn test_decode_rejects_unknown_protocol() {
        for code in [b'0', b'3', b'x', b' '] {
            let mut bytes = b"000H1".to_vec();
            bytes.push(code);
            bytes.extend_from_slice(b"data");
            assert_eq!(
                NetworkPacket::decode(&bytes),
                Err(DecodingError::UnknownProtocol(char::from(code)))
            );
        }
    }

    #[test]
    fn test_decode_rejects_invalid_destination() {
        for bytes in [&b"000002"[..], b"00H-11", b"  H111"] {
            assert!(matches!(
                NetworkPacket::decode(bytes),
                Err(DecodingError::InvalidDestination(_))
            ));
        }
    }
}
