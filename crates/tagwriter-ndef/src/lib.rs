//! NDEF text records framed for NFC Forum Type 2 tags
//!
//! Produces the TLV area that starts at the first user page of a 4-byte page
//! tag: an NDEF message TLV holding a single text record, the terminator TLV,
//! and zero padding up to a whole page.

use parser::{parse_tlv_message, stream};
use record::NdefRecord;

pub mod header;
pub mod message_info;
pub mod ndef_type;
pub mod parser;
pub mod payload;
pub mod record;
pub mod tlv;

pub use tlv::NdefPayload;

/// Number of bytes per page on the tag
pub const BYTES_PER_PAGE: usize = 4;

/// TLV tag of an NDEF message block
pub const NDEF_MESSAGE_TLV: u8 = 0x03;

/// TLV tag that ends the TLV area
pub const TERMINATOR_TLV: u8 = 0xFE;

/// Length byte announcing the three byte length form, or a 255 byte message
pub const LONG_LENGTH_MARKER: u8 = 0xFF;

/// Longest record written, the TLV length is always a single byte
pub const MAX_RECORD_LENGTH: usize = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("encoded NDEF record is {length} bytes, the limit is {max} bytes")]
    PayloadTooLarge { length: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Not enough data to parse the NDEF message")]
    NotEnoughData,

    #[error("Error parsing the NDEF message: {0}")]
    ParsingError(String),
}

/// Encode `text` as a single UTF-8 text record inside an NDEF message TLV
pub fn encode_text(text: &str) -> Result<NdefPayload, EncodeError> {
    NdefPayload::encode_text(text)
}

/// Decode a TLV area produced by [`encode_text`] back into its records
pub fn decode_message(bytes: &[u8]) -> Result<Vec<NdefRecord>, DecodeError> {
    let mut input = stream::new(bytes);
    parse_tlv_message(&mut input).map_err(|error| {
        if error.is_incomplete() {
            DecodeError::NotEnoughData
        } else {
            DecodeError::ParsingError(error.to_string())
        }
    })
}
