//! What the native UI sees: one writer object, a status enum and the transport callback

use tagwriter_ndef::EncodeError;

use crate::{
    config::ConfigError,
    event::TagWriter,
    session::{Outcome, Stage, WAITING_MESSAGE},
    transport::{FfiTransport, TagTransportProtocol},
    uid::TagUid,
};

/// [`Outcome`] flattened for the bindings, plus the idle state
#[derive(Debug, Clone, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum WriteStatus {
    Waiting,
    Succeeded,
    AccessDenied { observed_uid: String },
    EmptyInput,
    PayloadTooLarge { length: u32, max: u32 },
    TransportFailed { stage: Stage, detail: String },
}

impl WriteStatus {
    /// The status line, shared with [`Outcome`]'s `Display`
    pub fn message(&self) -> String {
        match self.outcome() {
            Some(outcome) => outcome.to_string(),
            None => WAITING_MESSAGE.to_string(),
        }
    }

    /// The session outcome behind this status, `None` while waiting
    pub fn outcome(&self) -> Option<Outcome> {
        let outcome = match self {
            WriteStatus::Waiting => return None,
            WriteStatus::Succeeded => Outcome::WriteSucceeded,
            WriteStatus::AccessDenied { observed_uid } => Outcome::AccessDenied {
                observed_uid: TagUid::from_hex(observed_uid).unwrap_or_default(),
            },
            WriteStatus::EmptyInput => Outcome::EmptyInput,
            WriteStatus::PayloadTooLarge { length, max } => Outcome::EncodeError {
                error: EncodeError::PayloadTooLarge {
                    length: *length as usize,
                    max: *max as usize,
                },
            },
            WriteStatus::TransportFailed { stage, detail } => Outcome::TransportError {
                stage: *stage,
                detail: detail.clone(),
            },
        };

        Some(outcome)
    }
}

impl From<Outcome> for WriteStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::WriteSucceeded => WriteStatus::Succeeded,
            Outcome::AccessDenied { observed_uid } => WriteStatus::AccessDenied {
                observed_uid: observed_uid.to_string(),
            },
            Outcome::EmptyInput => WriteStatus::EmptyInput,
            Outcome::EncodeError {
                error: EncodeError::PayloadTooLarge { length, max },
            } => WriteStatus::PayloadTooLarge {
                length: length as u32,
                max: max as u32,
            },
            Outcome::TransportError { stage, detail } => {
                WriteStatus::TransportFailed { stage, detail }
            }
        }
    }
}

#[derive(Debug, uniffi::Object)]
pub struct FfiTagWriter(TagWriter);

#[uniffi::export]
impl FfiTagWriter {
    #[uniffi::constructor(name = "new")]
    pub fn new(expected_uid_hex: String) -> Result<Self, ConfigError> {
        crate::logging::init();

        let writer = TagWriter::start(&expected_uid_hex, String::new())?;
        Ok(Self(writer))
    }

    pub fn set_text(&self, text: String) {
        self.0.set_text(text);
    }

    pub fn text(&self) -> String {
        self.0.text()
    }

    /// Status to show before a tag is presented
    pub fn waiting_status(&self) -> WriteStatus {
        if self.0.text().trim().is_empty() {
            return WriteStatus::EmptyInput;
        }

        WriteStatus::Waiting
    }

    /// Runs one full session against the tag behind `transport`
    pub fn write_to_tag(&self, transport: Box<dyn TagTransportProtocol>) -> WriteStatus {
        self.0.handle_card(FfiTransport::new(transport)).into()
    }
}

#[uniffi::export]
pub fn write_status_message(status: WriteStatus) -> String {
    status.message()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{simulator::MemoryTag, transport::TagTransport};

    /// Native side stand-in, answers from a simulated tag
    #[derive(Debug)]
    struct NativeReader(Arc<MemoryTag>);

    impl TagTransportProtocol for NativeReader {
        fn transmit_apdu(
            &self,
            command_apdu: Vec<u8>,
        ) -> Result<Vec<u8>, crate::transport::TransportError> {
            let response = self.0.transmit(&command_apdu)?;

            let mut raw = response.data;
            raw.extend([response.status.sw1, response.status.sw2]);
            Ok(raw)
        }
    }

    fn tag(uid: &str) -> Arc<MemoryTag> {
        Arc::new(MemoryTag::new(TagUid::from_hex(uid).unwrap()))
    }

    #[test]
    fn writes_through_the_callback() {
        let writer = FfiTagWriter::new("1DD94F118D0000".to_string()).unwrap();
        writer.set_text("hello".to_string());

        let tag = tag("1DD94F118D0000");
        let status = writer.write_to_tag(Box::new(NativeReader(tag.clone())));

        assert_eq!(status, WriteStatus::Succeeded);
        assert_eq!(status.message(), "Data written successfully!");
        assert_eq!(tag.written_pages(), vec![4, 5, 6, 7]);
    }

    #[test]
    fn wrong_tag_status() {
        let writer = FfiTagWriter::new("1DD94F118D0000".to_string()).unwrap();
        writer.set_text("hello".to_string());

        let status = writer.write_to_tag(Box::new(NativeReader(tag("00000000000000"))));

        assert_eq!(
            status,
            WriteStatus::AccessDenied {
                observed_uid: "00000000000000".to_string()
            }
        );
        assert_eq!(write_status_message(status), "Wrong NFC tag! Access Denied.");
    }

    #[test]
    fn waiting_status_follows_text() {
        let writer = FfiTagWriter::new("04A1B2C3".to_string()).unwrap();
        assert_eq!(writer.waiting_status(), WriteStatus::EmptyInput);

        writer.set_text("hello".to_string());
        assert_eq!(writer.waiting_status(), WriteStatus::Waiting);
        assert_eq!(writer.text(), "hello");
        assert_eq!(WriteStatus::Waiting.message(), "Waiting for NFC tag...");
    }

    #[test]
    fn invalid_expected_uid() {
        assert!(matches!(
            FfiTagWriter::new("abc".to_string()),
            Err(ConfigError::InvalidHex { .. })
        ));
    }

    #[test]
    fn every_outcome_keeps_its_status_line_over_ffi() {
        let outcomes = [
            Outcome::WriteSucceeded,
            Outcome::AccessDenied {
                observed_uid: TagUid::from_hex("00000000000000").unwrap(),
            },
            Outcome::EmptyInput,
            Outcome::EncodeError {
                error: EncodeError::PayloadTooLarge {
                    length: 300,
                    max: 255,
                },
            },
            Outcome::transport(Stage::Write, "90 01"),
            Outcome::transport(Stage::UidRead, "timeout"),
        ];

        for outcome in outcomes {
            let status = WriteStatus::from(outcome.clone());

            assert_eq!(status.message(), outcome.to_string());
            assert_eq!(write_status_message(status.clone()), outcome.to_string());
            assert_eq!(status.outcome(), Some(outcome));
        }

        assert_eq!(WriteStatus::Waiting.outcome(), None);
    }
}
