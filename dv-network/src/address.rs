use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Maximum length of a node identifier, which is also the width of the destination field on the
/// wire
pub const NODE_ID_MAX_LENGTH: usize = 5;

/// Identifier of a host or router in the simulated network (e.g. `H1`, `RA`, `42`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeIdError {
    #[error("node id cannot be empty")]
    Empty,
    #[error("node id `{0}` is longer than 5 characters")]
    TooLong(String),
    #[error("node id `{0}` contains characters other than ASCII letters and digits")]
    InvalidCharacter(String),
    #[error("node id `{0}` cannot start with `0`")]
    LeadingZero(String),
}

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = NodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NodeIdError::Empty);
        }

        if s.len() > NODE_ID_MAX_LENGTH {
            return Err(NodeIdError::TooLong(s.to_string()));
        }

        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(NodeIdError::InvalidCharacter(s.to_string()));
        }

        // Zeros are used for padding on the wire, so they would be lost when decoding
        if s.starts_with('0') {
            return Err(NodeIdError::LeadingZero(s.to_string()));
        }

        Ok(Self(s.into()))
    }
}

impl TryFrom<&str> for NodeId {
    type Error = NodeIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_valid_node_ids() {
        for input in ["H1", "RA", "42", "abcde", "R"] {
            let id = NodeId::from_str(input).unwrap();
            assert_eq!(id.as_str(), input);
        }
    }

    #[test]
    fn test_invalid_node_ids() {
        let cases = [
            ("", NodeIdError::Empty),
            ("ROUTER", NodeIdError::TooLong("ROUTER".to_string())),
            ("R-1", NodeIdError::InvalidCharacter("R-1".to_string())),
            ("01", NodeIdError::LeadingZero("01".to_string())),
        ];

        for (input, expected) in cases {
            assert_eq!(NodeId::from_str(input).unwrap_err(), expected);
        }
    }
}
