//! Command and response APDUs for PC/SC contactless readers

use tagwriter_ndef::BYTES_PER_PAGE;

use crate::transport::TransportError;

/// Get data: UID of the tag in the field
pub const SELECT_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Update binary header, followed by the page number
const UPDATE_BINARY: [u8; 3] = [0xFF, 0xD6, 0x00];

pub const PAGE_WRITE_LEN: usize = UPDATE_BINARY.len() + 2 + BYTES_PER_PAGE;

/// `FF D6 00 <page> 04 <4 data bytes>`
pub fn page_write(page: u8, data: [u8; BYTES_PER_PAGE]) -> [u8; PAGE_WRITE_LEN] {
    let mut command = [0u8; PAGE_WRITE_LEN];
    command[..3].copy_from_slice(&UPDATE_BINARY);
    command[3] = page;
    command[4] = BYTES_PER_PAGE as u8;
    command[5..].copy_from_slice(&data);
    command
}

pub fn is_page_write(command: &[u8]) -> bool {
    command.len() == PAGE_WRITE_LEN && command.starts_with(&UPDATE_BINARY)
}

/// The two trailing status bytes of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{sw1:02X} {sw2:02X}")]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    pub const SUCCESS: Self = Self::new(0x90, 0x00);

    /// Generic failure reported by ACS readers
    pub const OPERATION_FAILED: Self = Self::new(0x63, 0x00);

    pub const FUNCTION_NOT_SUPPORTED: Self = Self::new(0x6A, 0x81);

    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl From<u16> for StatusWord {
    fn from(value: u16) -> Self {
        let [sw1, sw2] = value.to_be_bytes();
        Self { sw1, sw2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub data: Vec<u8>,
    pub status: StatusWord,
}

impl Response {
    pub fn new(data: Vec<u8>, status: StatusWord) -> Self {
        Self { data, status }
    }

    pub fn status(status: StatusWord) -> Self {
        Self::new(Vec::new(), status)
    }

    /// Split a raw response APDU into its data and trailing status bytes
    pub fn from_raw(mut raw: Vec<u8>) -> Result<Self, TransportError> {
        let Some(status_at) = raw.len().checked_sub(2) else {
            return Err(TransportError::ShortResponse {
                length: raw.len() as u32,
            });
        };

        let status = raw.split_off(status_at);
        Ok(Self::new(raw, StatusWord::new(status[0], status[1])))
    }
}
