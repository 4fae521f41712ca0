//! One write attempt against one tag, from UID check to a terminal outcome

use std::fmt::{self, Display};

use tagwriter_ndef::{EncodeError, NdefPayload};
use tracing::{debug, error, warn};

use crate::{
    apdu::SELECT_UID, config::WriterConfig, transport::TagTransport, uid::TagUid,
    writer::PageWriter,
};

/// Shown while no tag has been presented yet
pub const WAITING_MESSAGE: &str = "Waiting for NFC tag...";

/// Where a transport failure happened
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, uniffi::Enum,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    UidRead,
    Write,
}

/// Terminal result of a session, exactly one per tag arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    WriteSucceeded,
    AccessDenied { observed_uid: TagUid },
    EmptyInput,
    EncodeError { error: EncodeError },
    TransportError { stage: Stage, detail: String },
}

impl Outcome {
    pub fn transport(stage: Stage, detail: impl Display) -> Self {
        Self::TransportError {
            stage,
            detail: detail.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::WriteSucceeded)
    }
}

/// The status line a UI shows for this outcome
impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::WriteSucceeded => write!(f, "Data written successfully!"),
            Outcome::AccessDenied { .. } => write!(f, "Wrong NFC tag! Access Denied."),
            Outcome::EmptyInput => write!(f, "No text entered. Please enter text."),
            Outcome::EncodeError { error } => write!(f, "Text does not fit on the tag: {error}"),
            Outcome::TransportError {
                stage: Stage::UidRead,
                detail,
            } => write!(f, "Unable to read tag: {detail}"),
            Outcome::TransportError {
                stage: Stage::Write,
                detail,
            } => write!(f, "Failed to write to NFC tag: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    UidChecking { observed_uid: TagUid },
    Encoding,
    Writing { payload: NdefPayload },
    Done(Outcome),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::UidChecking { .. } => "uid-checking",
            SessionState::Encoding => "encoding",
            SessionState::Writing { .. } => "writing",
            SessionState::Done(_) => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, SessionState::Done(_))
    }
}

/// Runs `Idle -> UidChecking -> Encoding -> Writing -> Done` for one tag
///
/// Owns the transport for its whole life. A new tag gets a new session.
#[derive(Debug)]
pub struct TagSession<'a, T> {
    config: &'a WriterConfig,
    text: &'a str,
    transport: T,
    state: SessionState,
}

impl<'a, T: TagTransport> TagSession<'a, T> {
    pub fn new(config: &'a WriterConfig, transport: T, text: &'a str) -> Self {
        Self {
            config,
            text,
            transport,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Advance by one state, `Done` stays `Done`
    pub fn step(&mut self) -> &SessionState {
        let state = std::mem::replace(&mut self.state, SessionState::Idle);

        self.state = match state {
            SessionState::Idle => self.read_uid(),
            SessionState::UidChecking { observed_uid } => self.check_uid(observed_uid),
            SessionState::Encoding => self.encode(),
            SessionState::Writing { payload } => self.write(&payload),
            done @ SessionState::Done(_) => done,
        };

        debug!(state = self.state.name(), "session advanced");
        &self.state
    }

    pub fn run(mut self) -> Outcome {
        loop {
            if let SessionState::Done(outcome) = self.state {
                return outcome;
            }

            self.step();
        }
    }

    fn read_uid(&self) -> SessionState {
        let response = match self.transport.transmit(&SELECT_UID) {
            Ok(response) => response,
            Err(error) => {
                error!(%error, "unable to read tag uid");
                return SessionState::Done(Outcome::transport(Stage::UidRead, error));
            }
        };

        if !response.status.is_success() {
            warn!(status = %response.status, "uid read rejected");
            return SessionState::Done(Outcome::transport(Stage::UidRead, response.status));
        }

        if response.data.is_empty() {
            warn!("reader returned an empty uid");
            return SessionState::Done(Outcome::transport(Stage::UidRead, "empty uid"));
        }

        SessionState::UidChecking {
            observed_uid: TagUid::from_bytes(response.data),
        }
    }

    fn check_uid(&self, observed_uid: TagUid) -> SessionState {
        if self.config.gate().check(&observed_uid) {
            debug!(uid = %observed_uid, "uid accepted");
            return SessionState::Encoding;
        }

        warn!(
            observed = %observed_uid,
            expected = %self.config.expected_uid(),
            "wrong tag, access denied"
        );

        SessionState::Done(Outcome::AccessDenied { observed_uid })
    }

    fn encode(&self) -> SessionState {
        let text = self.text.trim();
        if text.is_empty() {
            return SessionState::Done(Outcome::EmptyInput);
        }

        match NdefPayload::encode_text(text) {
            Ok(payload) => SessionState::Writing { payload },
            Err(error) => {
                warn!(%error, "text cannot be encoded");
                SessionState::Done(Outcome::EncodeError { error })
            }
        }
    }

    fn write(&self, payload: &NdefPayload) -> SessionState {
        let outcome = PageWriter::new(&self.transport).write(payload, self.config.start_page());
        SessionState::Done(outcome)
    }
}
