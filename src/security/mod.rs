//! PIN security
//!
//! Salted one-way hashing of 4-digit PINs and the credential state kept
//! per account. Plaintext never leaves this module unscrubbed.

mod hasher;
mod pin;

pub use hasher::{PinHasher, DEFAULT_ITERATIONS};
pub use pin::{CardCredential, Pin, PIN_LENGTH};
