//! # DPoP
//!
//! Demonstrating Proof-of-Possession at the application layer ([RFC 9449]).
//! A DPoP proof is a JWT signed with the client's DPoP key, binding a
//! request to the HTTP method and URL it accompanies and, on resource
//! requests, to the access token in play. The authorization server binds
//! issued tokens to the key by embedding its JWK thumbprint as `cnf.jkt`.
//!
//! [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449

use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::{Position, Url};

use crate::core::strings::constant_time_eq;
use crate::core::generate;
use crate::error::{Error, invalid};
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::{Type, jws};
use crate::provider::{JwtSigner, Random, Signer, Verifier, VerifyJwtInput};
use crate::Result;

/// Default tolerance for `iat` clock skew, in seconds.
pub const DEFAULT_CLOCK_SKEW: i64 = 60;

/// The claims of a DPoP proof JWT ([RFC 9449] §4.2).
///
/// [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DpopClaims {
    /// Unique identifier of the proof, for replay detection by the server.
    pub jti: String,

    /// The HTTP method of the request the proof accompanies, uppercase.
    pub htm: String,

    /// The HTTP URL of the request, without query and fragment parts.
    pub htu: String,

    /// The time the proof was created, as unix seconds.
    pub iat: i64,

    /// A server-provided nonce, echoed when the server enforces a nonce
    /// policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Hash of the access token the proof accompanies:
    /// `base64url(sha256(access_token))`. Present on resource requests
    /// only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath: Option<String>,
}

/// Options for creating a DPoP proof.
#[derive(Clone, Debug, Default)]
pub struct CreateProofOptions<'a> {
    /// The access token the proof accompanies, for resource requests. Sets
    /// the `ath` claim.
    pub access_token: Option<&'a str>,

    /// The server-provided nonce to echo.
    pub nonce: Option<&'a str>,

    /// Proof creation time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

/// Create a DPoP proof JWT for a request.
///
/// The signer must carry an embedded public JWK — the proof header is the
/// only place the server can learn the key.
///
/// # Errors
///
/// Returns an error when the signer has no embedded JWK, the URL cannot be
/// canonicalized, or signing fails.
pub async fn create_proof(
    provider: &(impl Signer + Random), key: &JwtSigner, method: &str, url: &str,
    options: CreateProofOptions<'_>,
) -> anyhow::Result<String> {
    if key.public_jwk().is_none() {
        return Err(anyhow!("DPoP requires a signer with an embedded public JWK"));
    }

    let claims = DpopClaims {
        jti: generate::jti(provider),
        htm: method.to_uppercase(),
        htu: canonical_htu(url).ok_or_else(|| anyhow!("invalid request url: {url}"))?,
        iat: options.now.unwrap_or_else(Utc::now).timestamp(),
        nonce: options.nonce.map(ToString::to_string),
        ath: options.access_token.map(access_token_hash),
    };

    jws::encode(provider, key, Type::DpopJwt, &claims).await
}

/// Compute the `ath` claim value for an access token:
/// `base64url(sha256(access_token))`.
#[must_use]
pub fn access_token_hash(access_token: &str) -> String {
    let hash = Sha256::digest(access_token.as_bytes());
    Base64UrlUnpadded::encode_string(&hash)
}

/// Canonicalize a URL for the `htu` claim: lowercase scheme and host, no
/// query or fragment, path case preserved, trailing slash stripped unless
/// the path is the root.
#[must_use]
pub fn canonical_htu(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let htu = &parsed[..Position::AfterPath];
    if parsed.path() == "/" {
        Some(htu.to_string())
    } else {
        Some(htu.trim_end_matches('/').to_string())
    }
}

/// What a DPoP proof must be bound to in order to verify.
#[derive(Clone, Debug, Default)]
pub struct VerifyProofOptions<'a> {
    /// The HTTP method of the received request.
    pub method: &'a str,

    /// The URL of the received request.
    pub url: &'a str,

    /// The access token presented alongside the proof, when verifying a
    /// resource request. Requires a matching `ath` claim.
    pub access_token: Option<&'a str>,

    /// The server's current DPoP nonce for this client, when a nonce
    /// policy is in force. A proof without this exact nonce fails with
    /// `use_dpop_nonce`, carrying the value to return in the `DPoP-Nonce`
    /// header.
    pub expected_nonce: Option<&'a str>,

    /// Acceptable proof signature algorithms, typically
    /// `dpop_signing_alg_values_supported` from server metadata. When
    /// empty, any asymmetric algorithm is acceptable.
    pub allowed_algs: &'a [String],

    /// Verification time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,

    /// Tolerance for `iat` skew in seconds. Defaults to
    /// [`DEFAULT_CLOCK_SKEW`].
    pub clock_skew: Option<i64>,
}

/// A verified DPoP proof: the key it proves possession of and the claims a
/// caller needs for replay detection.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerifiedProof {
    /// The public JWK embedded in the proof header.
    pub jwk: PublicKeyJwk,

    /// The RFC 7638 thumbprint of the key, to be bound into the access
    /// token as `cnf.jkt`.
    pub jkt: String,

    /// The proof's unique identifier. Replay tracking is the caller's
    /// responsibility.
    pub jti: String,

    /// The proof's creation time, as unix seconds.
    pub iat: i64,
}

/// Verify a DPoP proof JWT against the request it accompanies.
///
/// # Errors
///
/// Returns `invalid_dpop_proof` when the proof is malformed, signed with an
/// unacceptable algorithm, bound to a different request, outside the clock
/// skew window, or carries a mismatched `ath`; `use_dpop_nonce` when a
/// nonce policy is in force and the proof does not carry the current
/// nonce.
pub async fn verify_proof(
    provider: &impl Verifier, proof: &str, options: VerifyProofOptions<'_>,
) -> Result<VerifiedProof> {
    let (header_value, claims_value, _) = jws::decode_parts(proof)
        .map_err(|e| Error::InvalidDpopProof(format!("issue decoding proof: {e}")))?;

    // the embedded key must be public: a `d` member would be a private key
    if header_value.get("jwk").and_then(|jwk| jwk.get("d")).is_some() {
        return Err(Error::InvalidDpopProof("proof header contains a private key".to_string()));
    }

    let header: jws::JwsHeader = serde_json::from_value(header_value.clone())
        .map_err(|e| Error::InvalidDpopProof(format!("malformed proof header: {e}")))?;
    let claims: DpopClaims = serde_json::from_value(claims_value.clone())
        .map_err(|e| Error::InvalidDpopProof(format!("malformed proof claims: {e}")))?;

    if header.typ.as_deref() != Some("dpop+jwt") {
        return Err(Error::InvalidDpopProof("proof `typ` is not dpop+jwt".to_string()));
    }
    if !jws::is_asymmetric(&header.alg) {
        return Err(Error::InvalidDpopProof(format!(
            "`{}` is not an asymmetric algorithm",
            header.alg
        )));
    }
    if !options.allowed_algs.is_empty()
        && !options.allowed_algs.iter().any(|a| a == &header.alg)
    {
        return Err(Error::InvalidDpopProof(format!(
            "algorithm `{}` is not accepted for DPoP proofs",
            header.alg
        )));
    }
    let Some(jwk) = &header.jwk else {
        return Err(Error::InvalidDpopProof("proof header has no `jwk`".to_string()));
    };
    jwk.validate_for_alg(&header.alg)
        .map_err(|e| Error::InvalidDpopProof(format!("unusable proof key: {e}")))?;

    // signature, against the embedded key and no other
    let result = provider
        .verify_jwt(VerifyJwtInput {
            compact: proof,
            header: &header_value,
            claims: &claims_value,
            expected_jwk: Some(jwk),
        })
        .await
        .map_err(|e| Error::InvalidDpopProof(format!("issue verifying proof: {e}")))?;
    if !result.valid {
        return Err(Error::InvalidDpopProof("proof signature does not verify".to_string()));
    }

    // htm/htu binding
    if !claims.htm.eq_ignore_ascii_case(options.method) {
        return Err(Error::InvalidDpopProof("proof `htm` does not match request".to_string()));
    }
    let Some(expected_htu) = canonical_htu(options.url) else {
        return Err(invalid!("request url cannot be canonicalized: {}", options.url));
    };
    if canonical_htu(&claims.htu).as_deref() != Some(expected_htu.as_str()) {
        return Err(Error::InvalidDpopProof("proof `htu` does not match request".to_string()));
    }

    // freshness
    let now = options.now.unwrap_or_else(Utc::now).timestamp();
    let skew = options.clock_skew.unwrap_or(DEFAULT_CLOCK_SKEW);
    if (claims.iat - now).abs() > skew {
        return Err(Error::InvalidDpopProof("proof `iat` is outside the allowed window".to_string()));
    }

    if claims.jti.is_empty() {
        return Err(Error::InvalidDpopProof("proof has no `jti`".to_string()));
    }

    // access token binding
    if let Some(access_token) = options.access_token {
        let expected_ath = access_token_hash(access_token);
        let Some(ath) = &claims.ath else {
            return Err(Error::InvalidDpopProof("proof has no `ath`".to_string()));
        };
        if !constant_time_eq(ath.as_bytes(), expected_ath.as_bytes()) {
            return Err(Error::InvalidDpopProof(
                "proof `ath` does not match the access token".to_string(),
            ));
        }
    }

    // nonce policy
    if let Some(expected_nonce) = options.expected_nonce {
        let nonce_matches = claims
            .nonce
            .as_ref()
            .is_some_and(|n| constant_time_eq(n.as_bytes(), expected_nonce.as_bytes()));
        if !nonce_matches {
            return Err(Error::UseDpopNonce {
                hint: "nonce is missing or stale".to_string(),
                new_nonce: expected_nonce.to_string(),
            });
        }
    }

    let jkt = jwk
        .thumbprint()
        .map_err(|e| Error::InvalidDpopProof(format!("issue computing thumbprint: {e}")))?;

    Ok(VerifiedProof {
        jwk: jwk.clone(),
        jkt,
        jti: claims.jti,
        iat: claims.iat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htu_canonicalization() {
        assert_eq!(
            canonical_htu("HTTPS://AS.Example.com/Token?foo=bar#frag").as_deref(),
            Some("https://as.example.com/Token")
        );
        assert_eq!(
            canonical_htu("https://as.example.com/token/").as_deref(),
            Some("https://as.example.com/token")
        );
        // the root path keeps its slash
        assert_eq!(
            canonical_htu("https://as.example.com").as_deref(),
            Some("https://as.example.com/")
        );
    }

    #[test]
    fn ath_hash() {
        // base64url(sha256("T"))
        assert_eq!(access_token_hash("T"), "5jK3CVsL8ywmD6TFOen9e4UtDeRU6b4m8k0Nb5HQadM");
    }
}
