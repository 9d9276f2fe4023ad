//! # OAuth 2.0
//!
//! The OAuth 2.0 flows credential issuance relies on: authorization code
//! with PKCE ([RFC 7636]), the pre-authorized code grant, Pushed
//! Authorization Requests ([RFC 9126]), the Authorization Challenge
//! endpoint, and DPoP sender-constrained tokens ([RFC 9449]).
//!
//! [RFC 7636]: https://www.rfc-editor.org/rfc/rfc7636
//! [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126
//! [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449

pub mod authorization;
pub mod client;
pub mod dpop;
pub mod metadata;
pub mod resource;
pub mod server;
pub mod token;

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use self::metadata::ServerMetadata;

/// OAuth 2.0 grant types.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum GrantType {
    /// The authorization code grant, as defined in [RFC 6749].
    ///
    /// [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749
    #[default]
    #[serde(rename = "authorization_code")]
    AuthorizationCode,

    /// The `OpenID4VCI` pre-authorized code grant.
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    PreAuthorizedCode,
}

impl GrantType {
    /// The grant identifier as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::PreAuthorizedCode => "urn:ietf:params:oauth:grant-type:pre-authorized_code",
        }
    }
}

impl Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "urn:ietf:params:oauth:grant-type:pre-authorized_code" => Ok(Self::PreAuthorizedCode),
            _ => Err(anyhow::anyhow!("unknown grant type: {s}")),
        }
    }
}

/// The type of an issued access token.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum TokenType {
    /// A bearer token ([RFC 6750]).
    ///
    /// [RFC 6750]: https://www.rfc-editor.org/rfc/rfc6750
    #[default]
    Bearer,

    /// A DPoP sender-constrained token ([RFC 9449]). The client must
    /// present a DPoP proof signed with the same key on every resource
    /// request.
    ///
    /// [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449
    #[serde(rename = "DPoP")]
    DPoP,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => write!(f, "Bearer"),
            Self::DPoP => write!(f, "DPoP"),
        }
    }
}

/// PKCE code challenge methods ([RFC 7636]).
///
/// [RFC 7636]: https://www.rfc-editor.org/rfc/rfc7636
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    /// `code_challenge = base64url(sha256(code_verifier))`. Preferred
    /// whenever the server advertises it.
    #[default]
    S256,

    /// `code_challenge = code_verifier`. Permitted only as a last resort.
    #[serde(rename = "plain")]
    Plain,
}

impl Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S256 => write!(f, "S256"),
            Self::Plain => write!(f, "plain"),
        }
    }
}
