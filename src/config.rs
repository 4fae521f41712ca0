use std::time::Duration;

use crate::uid::{TagUid, UidGate};

/// Pages 0 to 3 hold the UID, lock bits and the capability container
pub const FIRST_USER_PAGE: u8 = 4;

pub const DEFAULT_TRANSMIT_TIMEOUT: Duration = Duration::from_secs(5);

pub const EXPECTED_UID_ENV: &str = "TAGWRITER_EXPECTED_UID";
pub const START_PAGE_ENV: &str = "TAGWRITER_START_PAGE";
pub const TIMEOUT_MS_ENV: &str = "TAGWRITER_TIMEOUT_MS";

type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, uniffi::Error)]
pub enum ConfigError {
    #[error("expected uid is not valid hex: {input}")]
    InvalidHex { input: String },

    #[error("expected uid must be 4, 7 or 10 bytes, found {found}")]
    InvalidUidLength { found: u32 },

    #[error("start page {page} is inside the reserved header pages")]
    ReservedStartPage { page: u8 },

    #[error("{name} is not set")]
    MissingEnv { name: String },

    #[error("{name} has an invalid value: {value}")]
    InvalidEnv { name: String, value: String },
}

/// Everything a writer needs to know before the first tag arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    gate: UidGate,
    start_page: u8,
    transmit_timeout: Option<Duration>,
}

impl WriterConfig {
    pub fn new(expected_uid_hex: &str) -> Result<Self> {
        let expected = TagUid::from_hex(expected_uid_hex).map_err(|_| ConfigError::InvalidHex {
            input: expected_uid_hex.to_string(),
        })?;

        if !expected.has_valid_length() {
            return Err(ConfigError::InvalidUidLength {
                found: expected.len() as u32,
            });
        }

        Ok(Self {
            gate: UidGate::new(expected),
            start_page: FIRST_USER_PAGE,
            transmit_timeout: Some(DEFAULT_TRANSMIT_TIMEOUT),
        })
    }

    pub fn with_start_page(mut self, page: u8) -> Result<Self> {
        self.start_page = check_start_page(page)?;
        Ok(self)
    }

    /// `None` waits on the reader forever
    pub fn with_transmit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transmit_timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from named settings, a timeout of `0` disables it
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let expected = lookup(EXPECTED_UID_ENV).ok_or_else(|| ConfigError::MissingEnv {
            name: EXPECTED_UID_ENV.to_string(),
        })?;

        let mut config = Self::new(&expected)?;

        if let Some(value) = lookup(START_PAGE_ENV) {
            let page = parse_env(START_PAGE_ENV, &value)?;
            config = config.with_start_page(page)?;
        }

        if let Some(value) = lookup(TIMEOUT_MS_ENV) {
            let millis: u64 = parse_env(TIMEOUT_MS_ENV, &value)?;
            let timeout = (millis > 0).then(|| Duration::from_millis(millis));
            config = config.with_transmit_timeout(timeout);
        }

        Ok(config)
    }

    pub fn expected_uid(&self) -> &TagUid {
        self.gate.expected()
    }

    pub fn gate(&self) -> &UidGate {
        &self.gate
    }

    pub fn start_page(&self) -> u8 {
        self.start_page
    }

    pub fn transmit_timeout(&self) -> Option<Duration> {
        self.transmit_timeout
    }
}

/// Pages below [`FIRST_USER_PAGE`] are never written
pub fn check_start_page(page: u8) -> Result<u8> {
    if page < FIRST_USER_PAGE {
        return Err(ConfigError::ReservedStartPage { page });
    }

    Ok(page)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}
