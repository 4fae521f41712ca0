//! The reader link a session talks to the tag through

use std::{fmt::Debug, sync::Arc, thread, time::Duration};

use parking_lot::Mutex;
use tracing::warn;

use crate::apdu::Response;

/// Sends one command APDU to the tag in the field and waits for its response
pub trait TagTransport: Send + Sync + Debug {
    fn transmit(&self, command: &[u8]) -> Result<Response, TransportError>;
}

impl<T: TagTransport + ?Sized> TagTransport for Arc<T> {
    fn transmit(&self, command: &[u8]) -> Result<Response, TransportError> {
        (**self).transmit(command)
    }
}

impl<T: TagTransport + ?Sized> TagTransport for Box<T> {
    fn transmit(&self, command: &[u8]) -> Result<Response, TransportError> {
        (**self).transmit(command)
    }
}

// Implemented by the native side, which owns the actual reader connection
#[uniffi::export(callback_interface)]
pub trait TagTransportProtocol: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the raw response APDU, data followed by SW1 SW2
    fn transmit_apdu(&self, command_apdu: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error, uniffi::Error)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,

    #[error("response too short, {length} bytes")]
    ShortResponse { length: u32 },

    #[error("reader disconnected")]
    Disconnected,

    #[error("transmit failed: {0}")]
    Transmit(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for TransportError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Transmit(error.reason)
    }
}

/// Adapts the callback interface to [`TagTransport`]
#[derive(Debug)]
pub struct FfiTransport(Box<dyn TagTransportProtocol>);

impl FfiTransport {
    pub fn new(protocol: Box<dyn TagTransportProtocol>) -> Self {
        Self(protocol)
    }
}

impl TagTransport for FfiTransport {
    fn transmit(&self, command: &[u8]) -> Result<Response, TransportError> {
        let raw = self.0.transmit_apdu(command.to_vec())?;
        Response::from_raw(raw)
    }
}

/// Serializes exchanges on one reader across sessions
pub type ReaderLock = Arc<Mutex<()>>;

/// Bounds every transmit by a timeout
///
/// The call runs on a helper thread that holds the reader lock for the whole
/// exchange. When it times out the thread is left to finish on its own and its
/// late response is dropped, and later transmits sharing the lock wait for it.
#[derive(Debug, Clone)]
pub struct TimeoutTransport {
    inner: Arc<dyn TagTransport>,
    timeout: Option<Duration>,
    reader: ReaderLock,
}

impl TimeoutTransport {
    pub fn new(inner: impl TagTransport + 'static, timeout: Option<Duration>) -> Self {
        Self::with_reader_lock(inner, timeout, ReaderLock::default())
    }

    pub fn with_reader_lock(
        inner: impl TagTransport + 'static,
        timeout: Option<Duration>,
        reader: ReaderLock,
    ) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            reader,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl TagTransport for TimeoutTransport {
    fn transmit(&self, command: &[u8]) -> Result<Response, TransportError> {
        let Some(timeout) = self.timeout else {
            let _exchange = self.reader.lock();
            return self.inner.transmit(command);
        };

        let (sender, receiver) = flume::bounded(1);
        let inner = Arc::clone(&self.inner);
        let reader = Arc::clone(&self.reader);
        let command = command.to_vec();

        thread::Builder::new()
            .name("tag-transmit".to_string())
            .spawn(move || {
                let _exchange = reader.lock();
                // receiver is gone once the caller timed out
                let _ = sender.send(inner.transmit(&command));
            })
            .map_err(|error| TransportError::Transmit(error.to_string()))?;

        match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(flume::RecvTimeoutError::Timeout) => {
                warn!(?timeout, "transmit timed out");
                Err(TransportError::Timeout)
            }
            Err(flume::RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::apdu::{SELECT_UID, StatusWord};

    #[derive(Debug)]
    struct SlowTransport {
        delay: Duration,
    }

    impl TagTransport for SlowTransport {
        fn transmit(&self, _command: &[u8]) -> Result<Response, TransportError> {
            thread::sleep(self.delay);
            Ok(Response::status(StatusWord::SUCCESS))
        }
    }

    #[derive(Debug, Default)]
    struct RawProtocol {
        calls: AtomicUsize,
    }

    impl TagTransportProtocol for RawProtocol {
        fn transmit_apdu(&self, command_apdu: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match command_apdu.as_slice() {
                [0xFF, 0xCA, ..] => Ok(vec![0x04, 0xA1, 0xB2, 0xC3, 0x90, 0x00]),
                [0xFF, 0xD6, ..] => Ok(vec![0x90]),
                _ => Err(TransportError::Disconnected),
            }
        }
    }

    #[test]
    fn slow_transmit_times_out() {
        let transport = TimeoutTransport::new(
            SlowTransport {
                delay: Duration::from_millis(500),
            },
            Some(Duration::from_millis(20)),
        );

        assert_eq!(transport.transmit(&SELECT_UID), Err(TransportError::Timeout));
        assert_eq!(TransportError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn fast_transmit_passes_through() {
        let transport = TimeoutTransport::new(
            SlowTransport {
                delay: Duration::from_millis(1),
            },
            Some(Duration::from_secs(5)),
        );

        let response = transport.transmit(&SELECT_UID).unwrap();
        assert!(response.status.is_success());
    }

    #[test]
    fn no_timeout_calls_inline() {
        let transport = TimeoutTransport::new(
            SlowTransport {
                delay: Duration::from_millis(30),
            },
            None,
        );

        assert!(transport.transmit(&SELECT_UID).is_ok());
        assert_eq!(transport.timeout(), None);
    }

    #[derive(Debug, Default)]
    struct CountingReader {
        active: AtomicUsize,
        most_active: AtomicUsize,
        calls: AtomicUsize,
    }

    impl TagTransport for CountingReader {
        fn transmit(&self, _command: &[u8]) -> Result<Response, TransportError> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.most_active.fetch_max(active, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            thread::sleep(Duration::from_millis(100));
            self.active.fetch_sub(1, Ordering::SeqCst);

            Ok(Response::status(StatusWord::SUCCESS))
        }
    }

    #[test]
    fn timed_out_exchange_blocks_the_next_session_on_that_reader() {
        let reader = Arc::new(CountingReader::default());
        let lock = ReaderLock::default();

        let first = TimeoutTransport::with_reader_lock(
            reader.clone(),
            Some(Duration::from_millis(10)),
            lock.clone(),
        );
        assert_eq!(first.transmit(&SELECT_UID), Err(TransportError::Timeout));

        let second =
            TimeoutTransport::with_reader_lock(reader.clone(), Some(Duration::from_secs(5)), lock);
        assert!(second.transmit(&SELECT_UID).unwrap().status.is_success());

        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reader.most_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ffi_transport_splits_raw_response() {
        let transport = FfiTransport::new(Box::new(RawProtocol::default()));

        let response = transport.transmit(&SELECT_UID).unwrap();
        assert_eq!(response.data, vec![0x04, 0xA1, 0xB2, 0xC3]);
        assert!(response.status.is_success());
    }

    #[test]
    fn ffi_transport_rejects_short_response() {
        let transport = FfiTransport::new(Box::new(RawProtocol::default()));

        let command = crate::apdu::page_write(4, [0; 4]);
        assert_eq!(
            transport.transmit(&command),
            Err(TransportError::ShortResponse { length: 1 })
        );
    }

    #[test]
    fn ffi_transport_forwards_errors() {
        let transport = FfiTransport::new(Box::new(RawProtocol::default()));
        assert_eq!(transport.transmit(&[0x00]), Err(TransportError::Disconnected));
    }
}
