use crate::{
    header::NdefHeader,
    ndef_type::NdefType,
    payload::{RecordPayload, TEXT_RECORD_TYPE, TextPayload},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub header: NdefHeader,
    pub type_: Vec<u8>,
    pub id: Option<Vec<u8>>,
    pub payload: RecordPayload,
}

impl NdefRecord {
    /// Well-known UTF-8 text record, the only record of its message
    pub fn text(text: &str) -> Self {
        let payload = RecordPayload::Text(TextPayload::utf8(text));
        let payload_length = u32::try_from(payload.encoded_len()).unwrap_or(u32::MAX);

        Self {
            header: NdefHeader::sole_record(
                NdefType::WellKnown,
                TEXT_RECORD_TYPE.len() as u8,
                payload_length,
            ),
            type_: TEXT_RECORD_TYPE.to_vec(),
            id: None,
            payload,
        }
    }

    pub fn text_payload(&self) -> Option<&TextPayload> {
        match &self.payload {
            RecordPayload::Text(text) => Some(text),
            RecordPayload::Data(_) => None,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len()
            + self.type_.len()
            + self.id.as_ref().map_or(0, Vec::len)
            + self.payload.encoded_len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());

        self.header.write_to(&mut out);
        out.extend_from_slice(&self.type_);
        if let Some(id) = &self.id {
            out.extend_from_slice(id);
        }
        self.payload.write_to(&mut out);

        out
    }
}
