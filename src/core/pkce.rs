//! # PKCE Code Challenge & Verifier
//!
//! Proof Key for Code Exchange ([RFC 7636]) binds an authorization code to
//! the client that requested it.
//!
//! [RFC 7636]: https://www.rfc-editor.org/rfc/rfc7636

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

use crate::core::strings::constant_time_eq;
use crate::oauth::CodeChallengeMethod;
use crate::provider::Random;

/// Minimum code verifier length ([RFC 7636] §4.1).
pub const MIN_LEN: usize = 43;

/// Maximum code verifier length ([RFC 7636] §4.1).
pub const MAX_LEN: usize = 128;

/// Generate a random code verifier: 32 random bytes, base64url-encoded to
/// 43 unreserved characters.
#[must_use]
pub fn code_verifier(random: &impl Random) -> String {
    Base64UrlUnpadded::encode_string(&random.random_bytes(32))
}

/// Compute the `S256` code challenge for a code verifier:
/// `base64url(sha256(verifier))`.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&hash)
}

/// Verify a code verifier against the challenge recorded at authorization
/// time. The comparison is constant time for both methods.
#[must_use]
pub fn verify(verifier: &str, challenge: &str, method: CodeChallengeMethod) -> bool {
    if verifier.len() < MIN_LEN || verifier.len() > MAX_LEN {
        return false;
    }
    match method {
        CodeChallengeMethod::S256 => {
            constant_time_eq(code_challenge(verifier).as_bytes(), challenge.as_bytes())
        }
        CodeChallengeMethod::Plain => constant_time_eq(verifier.as_bytes(), challenge.as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 appendix B test vector.
    #[test]
    fn s256_challenge() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(code_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert!(verify(verifier, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM", CodeChallengeMethod::S256));
    }

    #[test]
    fn verifier_length_bounds() {
        // 42 characters is one short of the RFC minimum
        let short = "a".repeat(42);
        assert!(!verify(&short, &code_challenge(&short), CodeChallengeMethod::S256));

        let ok = "a".repeat(43);
        assert!(verify(&ok, &code_challenge(&ok), CodeChallengeMethod::S256));
        assert!(verify(&ok, &ok, CodeChallengeMethod::Plain));
    }
}
