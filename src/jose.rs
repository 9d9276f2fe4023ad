//! # JSON Object Signing and Encryption (JOSE)
//!
//! JWK and compact-JWT utilities used by the protocol layer. Signing and
//! signature verification are delegated to the callbacks in [`provider`];
//! this module owns header assembly, decoding, and key-material invariants.
//!
//! [`provider`]: crate::provider

pub mod jwk;
pub mod jws;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub use self::jwk::{Jwks, PublicKeyJwk};
pub use self::jws::{Jwt, JwsHeader};

/// The JWS `typ` header parameter.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Type {
    /// General purpose JWT type.
    #[default]
    #[serde(rename = "jwt")]
    Jwt,

    /// JWT `typ` for the Wallet's proof of possession of key material.
    #[serde(rename = "openid4vci-proof+jwt")]
    Openid4VciProofJwt,

    /// JWT `typ` for a DPoP proof ([RFC 9449]).
    ///
    /// [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449
    #[serde(rename = "dpop+jwt")]
    DpopJwt,

    /// JWT `typ` for a JWT access token ([RFC 9068]).
    ///
    /// [RFC 9068]: https://www.rfc-editor.org/rfc/rfc9068
    #[serde(rename = "at+jwt")]
    AccessTokenJwt,
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwt => write!(f, "jwt"),
            Self::Openid4VciProofJwt => write!(f, "openid4vci-proof+jwt"),
            Self::DpopJwt => write!(f, "dpop+jwt"),
            Self::AccessTokenJwt => write!(f, "at+jwt"),
        }
    }
}
