use tracing::debug;

use crate::{
    BYTES_PER_PAGE, EncodeError, MAX_RECORD_LENGTH, NDEF_MESSAGE_TLV, TERMINATOR_TLV,
    record::NdefRecord,
};

/// A text record framed as an NDEF message TLV, terminated and padded to whole pages
///
/// Layout: `03 <len> <record> FE 00..`, where `<len>` is a single byte, `FF` included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefPayload {
    bytes: Vec<u8>,
    record_len: usize,
}

impl NdefPayload {
    pub fn encode_text(text: &str) -> Result<Self, EncodeError> {
        let record = NdefRecord::text(text).to_bytes();
        let record_len = record.len();

        if record_len > MAX_RECORD_LENGTH {
            return Err(EncodeError::PayloadTooLarge {
                length: record_len,
                max: MAX_RECORD_LENGTH,
            });
        }

        let framed_len = record_len + 3;
        let mut bytes = Vec::with_capacity(framed_len + padding_for(framed_len));
        bytes.push(NDEF_MESSAGE_TLV);
        bytes.push(record_len as u8);
        bytes.extend_from_slice(&record);
        bytes.push(TERMINATOR_TLV);
        bytes.resize(framed_len + padding_for(framed_len), 0x00);

        debug!(record_len, total_len = bytes.len(), "encoded ndef text record");

        Ok(Self { bytes, record_len })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Length of the inner NDEF record, the value of the TLV length byte
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn record(&self) -> &[u8] {
        &self.bytes[2..2 + self.record_len]
    }

    pub fn page_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_PAGE
    }

    /// The buffer split into page sized chunks, in memory order
    pub fn pages(&self) -> impl Iterator<Item = [u8; BYTES_PER_PAGE]> + '_ {
        self.bytes.chunks_exact(BYTES_PER_PAGE).map(|chunk| {
            let mut page = [0u8; BYTES_PER_PAGE];
            page.copy_from_slice(chunk);
            page
        })
    }
}

impl AsRef<[u8]> for NdefPayload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

fn padding_for(len: usize) -> usize {
    (BYTES_PER_PAGE - len % BYTES_PER_PAGE) % BYTES_PER_PAGE
}
