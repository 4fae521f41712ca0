use crate::ndef_type::NdefType;

const MESSAGE_BEGIN: u8 = 0b1000_0000;
const MESSAGE_END: u8 = 0b0100_0000;
const CHUNKED: u8 = 0b0010_0000;
const SHORT_RECORD: u8 = 0b0001_0000;
const HAS_ID_LENGTH: u8 = 0b0000_1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefHeader {
    pub message_begin: bool,
    pub message_end: bool,
    pub chunked: bool,
    pub short_record: bool,
    pub has_id_length: bool,
    pub type_name_format: NdefType,
    pub type_length: u8,
    pub payload_length: u32,
    pub id_length: Option<u8>,
}

impl NdefHeader {
    /// Header of the only record in a message, no ID field
    ///
    /// Uses the short record form whenever the payload length fits in one byte
    pub fn sole_record(type_name_format: NdefType, type_length: u8, payload_length: u32) -> Self {
        Self {
            message_begin: true,
            message_end: true,
            chunked: false,
            short_record: payload_length <= u32::from(u8::MAX),
            has_id_length: false,
            type_name_format,
            type_length,
            payload_length,
            id_length: None,
        }
    }

    /// The flags byte, type name format in the low three bits
    pub fn flags(&self) -> u8 {
        [
            (self.message_begin, MESSAGE_BEGIN),
            (self.message_end, MESSAGE_END),
            (self.chunked, CHUNKED),
            (self.short_record, SHORT_RECORD),
            (self.has_id_length, HAS_ID_LENGTH),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(self.type_name_format.tnf(), |flags, (_, bit)| flags | bit)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.flags());
        out.push(self.type_length);

        match u8::try_from(self.payload_length) {
            Ok(length) if self.short_record => out.push(length),
            _ => out.extend_from_slice(&self.payload_length.to_be_bytes()),
        }

        if let Some(id_length) = self.id_length {
            out.push(id_length);
        }
    }

    pub fn encoded_len(&self) -> usize {
        let payload_length_field = if self.short_record { 1 } else { 4 };
        2 + payload_length_field + usize::from(self.id_length.is_some())
    }
}
