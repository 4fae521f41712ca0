//! An NTAG215 held in memory, answering the same APDUs a PC/SC reader would

use parking_lot::Mutex;
use tagwriter_ndef::BYTES_PER_PAGE;
use tracing::trace;

use crate::{
    apdu::{self, Response, SELECT_UID, StatusWord},
    config::FIRST_USER_PAGE,
    transport::{TagTransport, TransportError},
    uid::TagUid,
};

pub const PAGES: usize = 135;

/// Page 3, NDEF mapping 1.0 with 496 bytes of data area, read/write
pub const CAPABILITY_CONTAINER: [u8; BYTES_PER_PAGE] = [0xE1, 0x10, 0x3E, 0x00];

type Page = [u8; BYTES_PER_PAGE];

#[derive(Debug)]
pub struct MemoryTag {
    uid: TagUid,
    fail_write: Option<(usize, StatusWord)>,
    fail_uid_read: Option<StatusWord>,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    pages: Vec<Page>,
    commands: Vec<Vec<u8>>,
    write_count: usize,
    written: Vec<u8>,
}

impl MemoryTag {
    pub fn new(uid: TagUid) -> Self {
        let mut pages = vec![[0u8; BYTES_PER_PAGE]; PAGES];

        for (index, byte) in uid.as_bytes().iter().take(3 * BYTES_PER_PAGE).enumerate() {
            pages[index / BYTES_PER_PAGE][index % BYTES_PER_PAGE] = *byte;
        }
        pages[3] = CAPABILITY_CONTAINER;

        Self {
            uid,
            fail_write: None,
            fail_uid_read: None,
            inner: Mutex::new(Inner {
                pages,
                commands: Vec::new(),
                write_count: 0,
                written: Vec::new(),
            }),
        }
    }

    /// Answer the `nth` page write (1-based) with `status` and leave the page untouched
    pub fn fail_write_at(mut self, nth: usize, status: StatusWord) -> Self {
        self.fail_write = Some((nth, status));
        self
    }

    pub fn fail_uid_read(mut self, status: StatusWord) -> Self {
        self.fail_uid_read = Some(status);
        self
    }

    pub fn uid(&self) -> &TagUid {
        &self.uid
    }

    pub fn page(&self, page: usize) -> Option<Page> {
        self.inner.lock().pages.get(page).copied()
    }

    /// Every command received, in order
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.inner.lock().commands.clone()
    }

    pub fn write_commands(&self) -> Vec<Vec<u8>> {
        self.commands()
            .into_iter()
            .filter(|command| apdu::is_page_write(command))
            .collect()
    }

    /// Pages that were stored, in the order they were written
    pub fn written_pages(&self) -> Vec<u8> {
        self.inner.lock().written.clone()
    }

    /// Data area from the first user page to the end of memory
    pub fn user_memory(&self) -> Vec<u8> {
        let inner = self.inner.lock();
        inner.pages[usize::from(FIRST_USER_PAGE)..].concat()
    }

    fn select_uid(&self) -> Response {
        match self.fail_uid_read {
            Some(status) => Response::status(status),
            None => Response::new(self.uid.as_bytes().to_vec(), StatusWord::SUCCESS),
        }
    }

    fn page_write(&self, inner: &mut Inner, command: &[u8]) -> Response {
        inner.write_count += 1;

        if let Some((nth, status)) = self.fail_write {
            if nth == inner.write_count {
                return Response::status(status);
            }
        }

        let page = command[3];
        let index = usize::from(page);
        if page < FIRST_USER_PAGE || index >= PAGES {
            return Response::status(StatusWord::OPERATION_FAILED);
        }

        inner.pages[index].copy_from_slice(&command[5..]);
        inner.written.push(page);
        Response::status(StatusWord::SUCCESS)
    }
}

impl TagTransport for MemoryTag {
    fn transmit(&self, command: &[u8]) -> Result<Response, TransportError> {
        let mut inner = self.inner.lock();
        inner.commands.push(command.to_vec());
        trace!(command = %hex::encode_upper(command), "simulated tag received");

        let response = if command == SELECT_UID.as_slice() {
            self.select_uid()
        } else if apdu::is_page_write(command) {
            self.page_write(&mut inner, command)
        } else {
            Response::status(StatusWord::FUNCTION_NOT_SUPPORTED)
        };

        Ok(response)
    }
}
