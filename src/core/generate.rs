//! # Generate
//!
//! Random identifier generation for authorization codes, tokens, nonces,
//! and JWT ids. All entropy comes from the [`Random`] provider so the
//! library itself holds no RNG.

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::provider::Random;

/// Generate an opaque token string from 32 random bytes.
#[must_use]
pub fn token(random: &impl Random) -> String {
    Base64UrlUnpadded::encode_string(&random.random_bytes(32))
}

/// Generate a nonce (`c_nonce`, DPoP server nonce, state) from 32 random
/// bytes.
#[must_use]
pub fn nonce(random: &impl Random) -> String {
    Base64UrlUnpadded::encode_string(&random.random_bytes(32))
}

/// Generate a JWT id (`jti`) from 16 random bytes.
#[must_use]
pub fn jti(random: &impl Random) -> String {
    Base64UrlUnpadded::encode_string(&random.random_bytes(16))
}

/// Generate a transaction id for deferred issuance.
#[must_use]
pub fn transaction_id(random: &impl Random) -> String {
    Base64UrlUnpadded::encode_string(&random.random_bytes(16))
}

/// Generate a notification id.
#[must_use]
pub fn notification_id(random: &impl Random) -> String {
    Base64UrlUnpadded::encode_string(&random.random_bytes(16))
}
