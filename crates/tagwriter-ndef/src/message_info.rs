#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MessageInfo {
    /// Length of the NDEF message, as reported in the TLV length field
    pub message_length: u16,

    /// Bytes taken by the TLV tag and length fields
    pub header_length: u8,
}

impl MessageInfo {
    /// Tag and a single length byte
    pub fn short(message_length: u8) -> Self {
        Self {
            message_length: u16::from(message_length),
            header_length: 2,
        }
    }

    /// Tag, the `FF` marker and a two byte length
    pub fn long(message_length: u16) -> Self {
        Self {
            message_length,
            header_length: 4,
        }
    }

    /// TLV header plus the message, without the terminator
    pub fn full_length(&self) -> usize {
        usize::from(self.header_length) + usize::from(self.message_length)
    }
}
