//! Tag identifiers and the gate that lets exactly one of them through

use std::str::FromStr;

/// UID sizes from ISO/IEC 14443-3: single, double and triple size
pub const VALID_UID_LENGTHS: [usize; 3] = [4, 7, 10];

/// Raw UID bytes as reported by the reader
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{}", hex::encode_upper(_0))]
pub struct TagUid(Vec<u8>);

impl TagUid {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse hex text, case-insensitive, spaces and colons between bytes are ignored
    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        let digits: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();

        hex::decode(digits).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_valid_length(&self) -> bool {
        VALID_UID_LENGTHS.contains(&self.0.len())
    }
}

impl FromStr for TagUid {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Allows writes only to the tag whose UID was configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidGate {
    expected: TagUid,
}

impl UidGate {
    pub fn new(expected: TagUid) -> Self {
        Self { expected }
    }

    pub fn expected(&self) -> &TagUid {
        &self.expected
    }

    pub fn check(&self, observed: &TagUid) -> bool {
        check(observed, &self.expected)
    }
}

/// Byte-for-byte equality, a prefix or a different length never matches
pub fn check(observed: &TagUid, expected: &TagUid) -> bool {
    observed.as_bytes() == expected.as_bytes()
}
