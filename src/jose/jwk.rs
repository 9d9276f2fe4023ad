//! # JSON Web Key (JWK)
//!
//! A JWK ([RFC7517]) is a JSON representation of a cryptographic key.
//! Additionally, a JWK Set (JWKS) is used to represent a set of JWKs.
//!
//! JWK Thumbprints ([RFC7638]) identify a key independently of its encoding:
//! the SHA-256 hash of the canonical JSON of the key's required members,
//! base64url-encoded. For example:
//!
//!  - JSON: `{"crv":"Ed25519","kty":"OKP","x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}`
//!  - thumbprint: `kPrK_qmxVWaYVA9wwBF6Iuo3vVzz7TxHCTwXBygrS4k`
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517
//! [RFC7638]: https://www.rfc-editor.org/rfc/rfc7638

use anyhow::{anyhow, bail};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Simplified JSON Web Key (JWK) public key structure.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct PublicKeyJwk {
    /// Key identifier.
    /// For example, "_Qq0UL2Fq651Q0Fjd6TvnYE-faHiOpRlPVQcY_-tA4A".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key type. One of "EC", "OKP", or "RSA".
    pub kty: String,

    /// Cryptographic curve type for elliptic curve keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// X coordinate (EC, OKP keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Y coordinate. Not required for `EdDSA` verification keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Algorithm intended for use with the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Use of the key.
    #[serde(rename = "use")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
}

impl PublicKeyJwk {
    /// Compute the JWK Thumbprint ([RFC7638]) of the key: the base64url
    /// encoding of the SHA-256 hash over the canonical JSON of the key
    /// type's required members, in lexicographic order.
    ///
    /// [RFC7638]: https://www.rfc-editor.org/rfc/rfc7638
    ///
    /// # Errors
    ///
    /// Returns an error when the key is missing a member required for its
    /// key type, or when the key type is unrecognized.
    pub fn thumbprint(&self) -> anyhow::Result<String> {
        let canonical = match self.kty.as_str() {
            "EC" => {
                let crv = self.crv.as_ref().ok_or_else(|| anyhow!("EC key missing `crv`"))?;
                let x = self.x.as_ref().ok_or_else(|| anyhow!("EC key missing `x`"))?;
                let y = self.y.as_ref().ok_or_else(|| anyhow!("EC key missing `y`"))?;
                format!(r#"{{"crv":"{crv}","kty":"EC","x":"{x}","y":"{y}"}}"#)
            }
            "OKP" => {
                let crv = self.crv.as_ref().ok_or_else(|| anyhow!("OKP key missing `crv`"))?;
                let x = self.x.as_ref().ok_or_else(|| anyhow!("OKP key missing `x`"))?;
                format!(r#"{{"crv":"{crv}","kty":"OKP","x":"{x}"}}"#)
            }
            "RSA" => {
                let e = self.e.as_ref().ok_or_else(|| anyhow!("RSA key missing `e`"))?;
                let n = self.n.as_ref().ok_or_else(|| anyhow!("RSA key missing `n`"))?;
                format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#)
            }
            kty => bail!("unsupported key type: {kty}"),
        };

        let digest = Sha256::digest(canonical.as_bytes());
        Ok(Base64UrlUnpadded::encode_string(&digest))
    }

    /// Verify the key is plausibly a public key for the given asymmetric
    /// algorithm: the key type carries the members the algorithm needs and
    /// no private-key member is present.
    ///
    /// # Errors
    ///
    /// Returns an error describing the mismatch.
    pub fn validate_for_alg(&self, alg: &str) -> anyhow::Result<()> {
        match (self.kty.as_str(), alg) {
            ("EC", "ES256" | "ES256K" | "ES384" | "ES512") => {
                if self.x.is_none() || self.y.is_none() {
                    bail!("EC key missing coordinates");
                }
            }
            ("OKP", "EdDSA") => {
                if self.x.is_none() {
                    bail!("OKP key missing `x` coordinate");
                }
            }
            ("RSA", "RS256" | "RS384" | "RS512" | "PS256" | "PS384" | "PS512") => {
                if self.n.is_none() || self.e.is_none() {
                    bail!("RSA key missing modulus or exponent");
                }
            }
            (kty, alg) => bail!("key type {kty} cannot be used with {alg}"),
        }
        Ok(())
    }
}

/// A set of JWKs, as published at a server's `jwks_uri`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Jwks {
    /// The set of public key JWKs.
    pub keys: Vec<PublicKeyJwk>,
}

impl Jwks {
    /// Find a key by its `kid`, falling back to the sole key of a
    /// single-key set.
    #[must_use]
    pub fn find(&self, kid: Option<&str>) -> Option<&PublicKeyJwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            None => {
                if self.keys.len() == 1 {
                    self.keys.first()
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7638 §3.1 example key and thumbprint.
    #[test]
    fn rsa_thumbprint() {
        let jwk = PublicKeyJwk {
            kty: "RSA".into(),
            n: Some(
                "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_\
                 BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_\
                 FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI\
                 4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw"
                    .to_string(),
            ),
            e: Some("AQAB".into()),
            ..PublicKeyJwk::default()
        };
        assert_eq!(
            jwk.thumbprint().expect("should compute thumbprint"),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    // RFC 8037 appendix A.3 Ed25519 thumbprint.
    #[test]
    fn okp_thumbprint() {
        let jwk = PublicKeyJwk {
            kty: "OKP".into(),
            crv: Some("Ed25519".into()),
            x: Some("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".into()),
            ..PublicKeyJwk::default()
        };
        assert_eq!(
            jwk.thumbprint().expect("should compute thumbprint"),
            "kPrK_qmxVWaYVA9wwBF6Iuo3vVzz7TxHCTwXBygrS4k"
        );
    }
}
