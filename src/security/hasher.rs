//! PIN Hasher
//!
//! Salted, iterated SHA-256 with a constant-time comparator.
//! Stored format: `sha256$<iterations>$<salt hex>$<digest hex>`.

use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::task::{self, JoinError};

use super::Pin;

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

/// Default key-stretching rounds
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Stateless hashing service. Construct once and inject into the handlers
/// that need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinHasher {
    iterations: u32,
}

impl Default for PinHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PinHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a PIN with a fresh random salt.
    ///
    /// Empty input yields an empty string and a warning instead of an error;
    /// an empty hash never verifies.
    pub fn hash(&self, pin: &[u8]) -> String {
        if pin.is_empty() {
            tracing::warn!("Refusing to hash an empty PIN");
            return String::new();
        }

        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let digest = stretch(pin, &salt, self.iterations);

        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(digest)
        )
    }

    /// Check a PIN against a stored hash. Returns false for empty or
    /// unparseable input; never errors.
    ///
    /// The iteration count is taken from the stored hash, so hashes made
    /// under an older setting keep verifying.
    pub fn verify(&self, pin: &[u8], stored: &str) -> bool {
        if pin.is_empty() || stored.is_empty() {
            return false;
        }

        let Some(parsed) = ParsedHash::parse(stored) else {
            tracing::warn!("Stored PIN hash has an unrecognised format");
            return false;
        };

        let digest = stretch(pin, &parsed.salt, parsed.iterations);
        constant_time_eq(&digest, &parsed.digest)
    }
}

impl PinHasher {
    /// `hash` on the blocking pool. The PIN is scrubbed inside the task.
    pub async fn hash_pin(&self, pin: Pin) -> Result<String, JoinError> {
        let hasher = *self;
        task::spawn_blocking(move || hasher.hash(pin.expose())).await
    }

    /// `verify` on the blocking pool. The PIN is scrubbed inside the task.
    pub async fn verify_pin(&self, pin: Pin, stored: String) -> Result<bool, JoinError> {
        let hasher = *self;
        task::spawn_blocking(move || hasher.verify(pin.expose(), &stored)).await
    }
}

struct ParsedHash {
    iterations: u32,
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl ParsedHash {
    fn parse(stored: &str) -> Option<Self> {
        let mut parts = stored.split('$');
        if parts.next()? != SCHEME {
            return None;
        }
        let iterations = parts.next()?.parse::<u32>().ok().filter(|n| *n > 0)?;
        let salt = hex::decode(parts.next()?).ok()?;
        let digest = hex::decode(parts.next()?).ok()?;

        if parts.next().is_some() || salt.len() != SALT_LEN || digest.len() != DIGEST_LEN {
            return None;
        }

        Some(Self {
            iterations,
            salt,
            digest,
        })
    }
}

fn stretch(pin: &[u8], salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(pin);
    let mut digest: [u8; DIGEST_LEN] = hasher.finalize().into();

    for _ in 1..iterations {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt);
        hasher.update(pin);
        digest = hasher.finalize().into();
    }

    digest
}

/// Compares every byte regardless of where the first difference is
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
