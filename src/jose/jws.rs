//! # JSON Web Signature (JWS)
//!
//! Compact JWT assembly and decoding. The library builds protected headers
//! and claim sets; the signature itself is produced and checked by the
//! [`Signer`] and [`Verifier`] callbacks so no cryptographic primitives are
//! linked here.

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::jose::Type;
use crate::jose::jwk::PublicKeyJwk;
use crate::provider::{JwtSigner, Signer, SigningInput};

/// Algorithms acceptable in DPoP and proof-of-possession JWT headers.
/// Symmetric (HMAC) algorithms and `none` are never acceptable: the header
/// carries the verification key, so a symmetric algorithm would let anyone
/// forge a signature.
const ASYMMETRIC_ALGS: [&str; 11] = [
    "ES256", "ES256K", "ES384", "ES512", "EdDSA", "PS256", "PS384", "PS512", "RS256", "RS384",
    "RS512",
];

/// Returns `true` if `alg` is an asymmetric signature algorithm.
#[must_use]
pub fn is_asymmetric(alg: &str) -> bool {
    ASYMMETRIC_ALGS.contains(&alg)
}

/// A protected JWS header.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwsHeader {
    /// Digital signature algorithm.
    pub alg: String,

    /// The media type of the JWT ("typ").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    /// Key ID. When the key is bound to a DID, a DID URL identifying a
    /// particular key in the DID document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// The public key material the JWT is signed with, embedded in the
    /// header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicKeyJwk>,

    /// X.509 certificate chain: base64 (not base64url) DER certificates,
    /// signing certificate first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,

    /// An OpenID Federation trust chain. May only be present when `kid` is
    /// absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_chain: Option<Vec<String>>,
}

impl JwsHeader {
    /// Exactly one of `kid` / `jwk` / `x5c` may identify the signing key.
    ///
    /// # Errors
    ///
    /// Returns an error when none or more than one is present, or when a
    /// `trust_chain` accompanies a `kid`.
    pub fn verify_key_material(&self) -> anyhow::Result<()> {
        let set = usize::from(self.kid.is_some())
            + usize::from(self.jwk.is_some())
            + usize::from(self.x5c.is_some());
        if set != 1 {
            bail!("exactly one of `kid`, `jwk`, or `x5c` must be present");
        }
        if self.trust_chain.is_some() && self.kid.is_some() {
            bail!("`trust_chain` may only be present when `kid` is absent");
        }
        Ok(())
    }
}

/// A decoded JWT: protected header and claims, without signature
/// verification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwt<C> {
    /// The protected header.
    pub header: JwsHeader,

    /// The claims set.
    pub claims: C,
}

/// Build and sign a compact JWT.
///
/// The protected header is populated from the signer variant (`kid` for
/// DID-bound keys, `jwk` for embedded keys, `x5c` for certificate chains,
/// nothing for custom signers), then the compact serialization is delegated
/// to the [`Signer`] callback.
///
/// # Errors
///
/// Returns an error if the claims cannot be serialized or the signing
/// callback fails.
pub async fn encode<C: Serialize + Send + Sync>(
    provider: &impl Signer, signer: &JwtSigner, typ: Type, claims: &C,
) -> anyhow::Result<String> {
    let mut header = JwsHeader {
        alg: signer.alg().to_string(),
        typ: Some(typ.to_string()),
        ..JwsHeader::default()
    };
    match signer {
        JwtSigner::Did { did_url, .. } => header.kid = Some(did_url.clone()),
        JwtSigner::Jwk { public_jwk, .. } => header.jwk = Some(public_jwk.clone()),
        JwtSigner::X5c { x5c, .. } => header.x5c = Some(x5c.clone()),
        JwtSigner::Custom { .. } => {}
    }

    let input = SigningInput {
        header: serde_json::to_value(&header)?,
        claims: serde_json::to_value(claims)?,
    };
    provider.sign_jwt(signer, &input).await
}

/// Decode a compact JWT into its header and claims without verifying the
/// signature. Signature verification is a separate step through the
/// [`Verifier`] callback.
///
/// [`Verifier`]: crate::provider::Verifier
///
/// # Errors
///
/// Returns an error when the token is not three base64url segments of valid
/// JSON.
pub fn decode<C: DeserializeOwned>(compact: &str) -> anyhow::Result<Jwt<C>> {
    let (header, claims, _) = decode_parts(compact)?;
    Ok(Jwt {
        header: serde_json::from_value(header)?,
        claims: serde_json::from_value(claims)?,
    })
}

/// Decode a compact JWT into raw JSON header and claims values plus the
/// encoded signature segment.
///
/// # Errors
///
/// Returns an error when the token is not three base64url segments of valid
/// JSON.
pub fn decode_parts(
    compact: &str,
) -> anyhow::Result<(serde_json::Value, serde_json::Value, String)> {
    let mut segments = compact.split('.');
    let (Some(header), Some(claims), Some(signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        bail!("JWT is not three dot-separated segments");
    };

    let header = Base64UrlUnpadded::decode_vec(header)
        .map_err(|e| anyhow!("issue decoding JWT header: {e}"))?;
    let claims = Base64UrlUnpadded::decode_vec(claims)
        .map_err(|e| anyhow!("issue decoding JWT claims: {e}"))?;

    Ok((
        serde_json::from_slice(&header)?,
        serde_json::from_slice(&claims)?,
        signature.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_compact() {
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"ES256","typ":"dpop+jwt"}"#);
        let claims = Base64UrlUnpadded::encode_string(br#"{"htm":"POST"}"#);
        let compact = format!("{header}.{claims}.sig");

        let (header, claims, signature) =
            decode_parts(&compact).expect("should decode");
        assert_eq!(header, json!({"alg": "ES256", "typ": "dpop+jwt"}));
        assert_eq!(claims, json!({"htm": "POST"}));
        assert_eq!(signature, "sig");
    }

    #[test]
    fn reject_two_segments() {
        assert!(decode_parts("one.two").is_err());
    }

    #[test]
    fn key_material_exclusive() {
        let mut header = JwsHeader {
            alg: "ES256".into(),
            kid: Some("did:example:123#key-1".into()),
            ..JwsHeader::default()
        };
        header.verify_key_material().expect("kid alone is valid");

        header.jwk = Some(PublicKeyJwk::default());
        assert!(header.verify_key_material().is_err());

        header.kid = None;
        header.jwk = None;
        assert!(header.verify_key_material().is_err());
    }

    #[test]
    fn symmetric_algs_rejected() {
        assert!(is_asymmetric("ES256"));
        assert!(is_asymmetric("EdDSA"));
        assert!(!is_asymmetric("HS256"));
        assert!(!is_asymmetric("none"));
    }
}
