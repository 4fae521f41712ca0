/// Record type of an NFC Forum well-known text record
pub const TEXT_RECORD_TYPE: &[u8] = b"T";

/// Language code written into every text record
pub const DEFAULT_LANGUAGE: &str = "en";

const LANGUAGE_LENGTH_MASK: u8 = 0b0011_1111;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPayload {
    Text(TextPayload),
    Data(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    pub format: TextPayloadFormat,
    pub language: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPayloadFormat {
    Utf8,
    Utf16,
}

impl RecordPayload {
    pub fn encoded_len(&self) -> usize {
        match self {
            RecordPayload::Text(text) => text.encoded_len(),
            RecordPayload::Data(data) => data.len(),
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            RecordPayload::Text(text) => text.write_to(out),
            RecordPayload::Data(data) => out.extend_from_slice(data),
        }
    }
}

impl TextPayload {
    pub fn utf8(text: impl Into<String>) -> Self {
        Self {
            format: TextPayloadFormat::Utf8,
            language: DEFAULT_LANGUAGE.to_string(),
            text: text.into(),
        }
    }

    /// Status byte, language code, then the text
    pub fn encoded_len(&self) -> usize {
        1 + self.language_code().len() + self.text.len()
    }

    /// Always written as UTF-8, `format` only reports what a decoded record held
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let language = self.language_code();

        // language_code() caps the length at the six bit field
        out.push(language.len() as u8 & LANGUAGE_LENGTH_MASK);
        out.extend_from_slice(language);
        out.extend_from_slice(self.text.as_bytes());
    }

    fn language_code(&self) -> &[u8] {
        let language = self.language.as_bytes();
        &language[..language.len().min(LANGUAGE_LENGTH_MASK as usize)]
    }
}
