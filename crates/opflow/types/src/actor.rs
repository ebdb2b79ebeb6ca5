//! Actor identity: Ethereum-style addresses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a string does not look like an Ethereum address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid actor address {0:?}: must match ^(0x)?[0-9a-fA-F]{{40}}$")]
pub struct AddressParseError(pub String);

/// A validated Ethereum-style actor address.
///
/// The compliance invariant requires every compliance event's `userId` to be
/// a 40-hex-digit address, with or without the `0x` prefix. The value is
/// stored exactly as supplied (prefix and casing preserved).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorAddress(String);

impl ActorAddress {
    /// Parse and validate an address. The input is kept verbatim.
    pub fn parse(raw: impl Into<String>) -> Result<Self, AddressParseError> {
        let raw = raw.into();
        let hex_part = raw.strip_prefix("0x").unwrap_or(&raw);
        if hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(raw))
        } else {
            Err(AddressParseError(raw))
        }
    }

    /// The designated system actor: the all-zero address.
    ///
    /// Used by workflows whose acting subject is a soulbound id rather than
    /// an address; the soulbound id travels in the event context instead.
    pub fn system() -> Self {
        Self("0x0000000000000000000000000000000000000000".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_prefixed_and_bare_addresses() {
        assert!(ActorAddress::parse("0x1111111111111111111111111111111111111111").is_ok());
        assert!(ActorAddress::parse("AbCdEf0123456789abcdef0123456789ABCDEF01").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(ActorAddress::parse("not-an-address").is_err());
        assert!(ActorAddress::parse("0x123").is_err());
        // 40 chars but not hex
        assert!(ActorAddress::parse("zz11111111111111111111111111111111111111").is_err());
    }

    #[test]
    fn system_address_is_valid() {
        let system = ActorAddress::system();
        assert!(ActorAddress::parse(system.as_str()).is_ok());
    }

    #[test]
    fn input_is_preserved_verbatim() {
        let addr = ActorAddress::parse("0xAbCd111111111111111111111111111111111111").unwrap();
        assert_eq!(addr.as_str(), "0xAbCd111111111111111111111111111111111111");
    }
}
