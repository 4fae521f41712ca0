//! Writes one NDEF text record to one specific NFC tag, refusing every other tag

pub mod apdu;
pub mod config;
pub mod event;
pub mod ffi;
pub mod logging;
pub mod session;
pub mod simulator;
pub mod transport;
pub mod uid;
pub mod writer;

pub use tagwriter_ndef as ndef;

pub use config::{ConfigError, WriterConfig};
pub use event::{CardBatch, CardEventSource, TagWriter, TagWriterHandle};
pub use session::{Outcome, SessionState, Stage, TagSession};
pub use transport::{TagTransport, TransportError};
pub use uid::{TagUid, UidGate};

uniffi::setup_scaffolding!();
