//! # Proof-of-Possession Verification
//!
//! The issuer side of key binding: verifying the `openid4vci-proof+jwt`
//! presented in a Credential Request and returning the signer's key so the
//! issued credential can be bound to it.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::Result;
use crate::core::strings::constant_time_eq;
use crate::error::Error;
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::jws::{self, JwsHeader};
use crate::oid4vci::types::ProofClaims;
use crate::provider::{Verifier, VerifyJwtInput};

/// Default tolerance for `iat` clock skew, in seconds.
pub const DEFAULT_CLOCK_SKEW: i64 = 60;

/// What a proof-of-possession JWT must be bound to in order to verify.
#[derive(Clone, Debug, Default)]
pub struct VerifyProofOptions<'a> {
    /// The Credential Issuer Identifier the proof must be addressed to.
    pub credential_issuer: &'a str,

    /// The `c_nonce` the issuer expects the proof to consume. The caller
    /// tracks which nonces are live; a proof without this exact nonce is
    /// rejected.
    pub expected_nonce: Option<&'a str>,

    /// Acceptable proof signature algorithms, typically
    /// `proof_signing_alg_values_supported` from the credential
    /// configuration. When empty, any asymmetric algorithm is acceptable.
    pub allowed_algs: &'a [String],

    /// Verification time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,

    /// Tolerance for `iat` skew in seconds. Defaults to
    /// [`DEFAULT_CLOCK_SKEW`].
    pub clock_skew: Option<i64>,
}

/// A verified proof of possession: the header and claims, plus the key
/// the caller binds the issued credential to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifiedProofJwt {
    /// The proof's protected header.
    pub header: JwsHeader,

    /// The proof's claims.
    pub claims: ProofClaims,

    /// The signer's public JWK: the header's embedded `jwk`, or the key
    /// the verification callback resolved from `kid` / `x5c`.
    pub signer_jwk: Option<PublicKeyJwk>,
}

/// Verify a proof-of-possession JWT from a Credential Request.
///
/// # Errors
///
/// Returns `invalid_proof` when the proof is malformed, mistyped, violates
/// the key-material exclusivity invariant, is addressed to another issuer,
/// is outside the clock-skew window, or its signature does not verify;
/// `invalid_nonce` when the consumed `c_nonce` is missing or stale.
#[instrument(level = "debug", skip_all)]
pub async fn verify_proof_jwt(
    provider: &impl Verifier, proof_jwt: &str, options: VerifyProofOptions<'_>,
) -> Result<VerifiedProofJwt> {
    tracing::debug!("verify_proof_jwt");

    let (header_value, claims_value, _) = jws::decode_parts(proof_jwt)
        .map_err(|e| Error::InvalidProof(format!("issue decoding proof JWT: {e}")))?;

    let header: JwsHeader = serde_json::from_value(header_value.clone())
        .map_err(|e| Error::InvalidProof(format!("malformed proof header: {e}")))?;
    let claims: ProofClaims = serde_json::from_value(claims_value.clone())
        .map_err(|e| Error::InvalidProof(format!("malformed proof claims: {e}")))?;

    if header.typ.as_deref() != Some("openid4vci-proof+jwt") {
        return Err(Error::InvalidProof(format!(
            "proof JWT `typ` ({}) is not openid4vci-proof+jwt",
            header.typ.as_deref().unwrap_or_default()
        )));
    }

    // exactly one of kid / jwk / x5c, and trust_chain only without kid
    header
        .verify_key_material()
        .map_err(|e| Error::InvalidProof(format!("proof key material: {e}")))?;

    if !jws::is_asymmetric(&header.alg) {
        return Err(Error::InvalidProof(format!(
            "`{}` is not an asymmetric algorithm",
            header.alg
        )));
    }
    if !options.allowed_algs.is_empty() && !options.allowed_algs.iter().any(|a| a == &header.alg)
    {
        return Err(Error::InvalidProof(format!(
            "algorithm `{}` is not accepted for proofs",
            header.alg
        )));
    }

    // signature: against the embedded key when the header carries one,
    // otherwise the callback resolves kid / x5c out of band
    let result = provider
        .verify_jwt(VerifyJwtInput {
            compact: proof_jwt,
            header: &header_value,
            claims: &claims_value,
            expected_jwk: header.jwk.as_ref(),
        })
        .await
        .map_err(|e| Error::InvalidProof(format!("issue verifying proof: {e}")))?;
    if !result.valid {
        return Err(Error::InvalidProof("proof signature does not verify".to_string()));
    }

    if claims.aud != options.credential_issuer {
        return Err(Error::InvalidProof(
            "proof `aud` is not this credential issuer".to_string(),
        ));
    }

    if let Some(expected_nonce) = options.expected_nonce {
        let nonce_matches = claims
            .nonce
            .as_ref()
            .is_some_and(|n| constant_time_eq(n.as_bytes(), expected_nonce.as_bytes()));
        if !nonce_matches {
            return Err(Error::InvalidNonce("proof nonce is missing or stale".to_string()));
        }
    }

    let now = options.now.unwrap_or_else(Utc::now).timestamp();
    let skew = options.clock_skew.unwrap_or(DEFAULT_CLOCK_SKEW);
    if (claims.iat - now).abs() > skew {
        return Err(Error::InvalidProof(
            "proof `iat` is outside the allowed window".to_string(),
        ));
    }

    let signer_jwk = header.jwk.clone().or(result.signer_jwk);

    Ok(VerifiedProofJwt {
        header,
        claims,
        signer_jwk,
    })
}
