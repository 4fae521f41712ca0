//! Drives an encoded message onto the tag one page at a time

use tagwriter_ndef::{BYTES_PER_PAGE, NdefPayload};
use tracing::{debug, error, info, warn};

use crate::{
    apdu::{self, PAGE_WRITE_LEN},
    session::{Outcome, Stage},
    transport::TagTransport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("page {0} is beyond the last addressable page")]
pub struct PageOutOfRange(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWrite {
    pub page: u8,
    pub data: [u8; BYTES_PER_PAGE],
}

impl PageWrite {
    pub fn command(&self) -> [u8; PAGE_WRITE_LEN] {
        apdu::page_write(self.page, self.data)
    }
}

/// Page writes in memory order, one per chunk of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan(Vec<PageWrite>);

impl WritePlan {
    pub fn new(payload: &NdefPayload, start_page: u8) -> Result<Self, PageOutOfRange> {
        payload
            .pages()
            .enumerate()
            .map(|(index, data)| {
                let page = usize::from(start_page) + index;
                let page = u8::try_from(page).map_err(|_| PageOutOfRange(page))?;
                Ok(PageWrite { page, data })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageWrite> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Writes a plan page by page and stops at the first rejected page
///
/// Pages already written stay written, nothing is retried or read back.
#[derive(Debug)]
pub struct PageWriter<'a, T: ?Sized> {
    transport: &'a T,
}

impl<'a, T: TagTransport + ?Sized> PageWriter<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    pub fn write(&self, payload: &NdefPayload, start_page: u8) -> Outcome {
        match WritePlan::new(payload, start_page) {
            Ok(plan) => self.execute(&plan),
            Err(out_of_range) => {
                error!(%out_of_range, start_page, "payload does not fit the page range");
                Outcome::transport(Stage::Write, out_of_range)
            }
        }
    }

    pub fn execute(&self, plan: &WritePlan) -> Outcome {
        for write in plan.iter() {
            let response = match self.transport.transmit(&write.command()) {
                Ok(response) => response,
                Err(error) => {
                    error!(page = write.page, %error, "page write failed");
                    return Outcome::transport(Stage::Write, error);
                }
            };

            if !response.status.is_success() {
                warn!(page = write.page, status = %response.status, "tag rejected page write");
                return Outcome::transport(Stage::Write, response.status);
            }

            debug!(page = write.page, "page written");
        }

        info!(pages = plan.len(), "ndef message written");
        Outcome::WriteSucceeded
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        apdu::StatusWord, config::FIRST_USER_PAGE, simulator::MemoryTag, uid::TagUid,
    };

    fn tag() -> Arc<MemoryTag> {
        Arc::new(MemoryTag::new(TagUid::from_hex("1DD94F118D0000").unwrap()))
    }

    #[test]
    fn plan_starts_at_first_user_page() {
        let payload = NdefPayload::encode_text("hello").unwrap();
        let plan = WritePlan::new(&payload, FIRST_USER_PAGE).unwrap();

        let pages: Vec<u8> = plan.iter().map(|write| write.page).collect();
        assert_eq!(pages, vec![4, 5, 6, 7]);
        assert_eq!(plan.iter().next().unwrap().data, [0x03, 0x0C, 0xD1, 0x01]);
    }

    #[test]
    fn plan_past_last_page_is_rejected() {
        let payload = NdefPayload::encode_text("hello").unwrap();
        assert_eq!(WritePlan::new(&payload, 254), Err(PageOutOfRange(256)));
    }

    #[test]
    fn one_write_per_page_in_order() {
        let long = "x".repeat(200);
        for text in ["a", "hello", "a somewhat longer line of text", long.as_str()] {
            let tag = tag();
            let payload = NdefPayload::encode_text(text).unwrap();

            let outcome = PageWriter::new(&tag).write(&payload, FIRST_USER_PAGE);
            assert_eq!(outcome, Outcome::WriteSucceeded);

            let expected: Vec<u8> = (0..payload.page_count())
                .map(|index| FIRST_USER_PAGE + index as u8)
                .collect();
            assert_eq!(tag.written_pages(), expected);
            assert_eq!(&tag.user_memory()[..payload.len()], payload.as_bytes());
        }
    }

    #[test]
    fn custom_start_page() {
        let tag = tag();
        let payload = NdefPayload::encode_text("hello").unwrap();

        assert!(PageWriter::new(&tag).write(&payload, 8).is_success());
        assert_eq!(tag.written_pages(), vec![8, 9, 10, 11]);
    }

    #[test]
    fn aborts_on_the_first_rejected_page() {
        let payload = NdefPayload::encode_text(&"x".repeat(40)).unwrap();
        let failing = StatusWord::new(0x90, 0x01);

        for k in 1..=payload.page_count() {
            let tag = Arc::new(
                MemoryTag::new(TagUid::from_hex("1DD94F118D0000").unwrap())
                    .fail_write_at(k, failing),
            );

            let outcome = PageWriter::new(&tag).write(&payload, FIRST_USER_PAGE);

            assert_eq!(
                outcome,
                Outcome::TransportError {
                    stage: Stage::Write,
                    detail: "90 01".to_string()
                }
            );
            assert_eq!(tag.write_commands().len(), k, "failing chunk {k}");
        }
    }

    #[test]
    fn transport_failure_aborts() {
        #[derive(Debug)]
        struct Unplugged;

        impl TagTransport for Unplugged {
            fn transmit(
                &self,
                _command: &[u8],
            ) -> Result<apdu::Response, crate::transport::TransportError> {
                Err(crate::transport::TransportError::Timeout)
            }
        }

        let payload = NdefPayload::encode_text("hello").unwrap();
        let outcome = PageWriter::new(&Unplugged).write(&payload, FIRST_USER_PAGE);

        assert_eq!(
            outcome,
            Outcome::TransportError {
                stage: Stage::Write,
                detail: "timeout".to_string()
            }
        );
    }
}
