//! PIN material and card credentials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::domain::DomainError;

/// Required PIN length
pub const PIN_LENGTH: usize = 4;

/// A validated 4-digit PIN. The plaintext is zeroed when dropped.
pub struct Pin(Vec<u8>);

impl Pin {
    /// Validate and take ownership of the plaintext. The input buffer is
    /// zeroed on the failure path as well.
    pub fn parse(raw: String) -> Result<Self, DomainError> {
        let mut bytes = raw.into_bytes();

        if bytes.len() != PIN_LENGTH || !bytes.iter().all(u8::is_ascii_digit) {
            scrub(&mut bytes);
            return Err(DomainError::InvalidPinFormat);
        }

        Ok(Self(bytes))
    }

    /// Plaintext digits, for the hasher only
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        scrub(&mut self.0);
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl<'de> Deserialize<'de> for Pin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Pin::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Overwrite plaintext in place
pub(crate) fn scrub(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b = 0;
    }
    std::hint::black_box(bytes);
}

/// PIN state of an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardCredential {
    /// No PIN has ever been set
    NoCredential,
    Credential {
        hash: String,
        last_changed: DateTime<Utc>,
    },
}

impl CardCredential {
    pub fn is_set(&self) -> bool {
        matches!(self, CardCredential::Credential { .. })
    }

    /// Stored hash, or `CredentialNotFound`
    pub fn require_hash(&self, account_id: i64) -> Result<&str, DomainError> {
        match self {
            CardCredential::Credential { hash, .. } => Ok(hash),
            CardCredential::NoCredential => Err(DomainError::CredentialNotFound(account_id)),
        }
    }

    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        match self {
            CardCredential::Credential { last_changed, .. } => Some(*last_changed),
            CardCredential::NoCredential => None,
        }
    }
}
