//! # Errors
//!
//! This module defines the error surfaces of the library: the structured
//! OAuth 2.0 / `OpenID4VCI` error envelope returned by server-side
//! operations, and the client-side errors raised while driving a flow
//! against a remote server.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// OAuth 2.0 and `OpenID4VCI` error codes returned by server-side
/// operations. Serializes to the RFC 6749 error envelope so handlers can
/// echo it back to the client verbatim.
#[derive(Error, Debug, Deserialize)]
pub enum Error {
    /// The request is missing a required parameter, includes an unsupported
    /// parameter value, repeats a parameter, or is otherwise malformed.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// Client authentication failed (e.g., unknown client, no client
    /// authentication included, or unsupported authentication method).
    #[error(r#"{{"error": "invalid_client", "error_description": "{0}"}}"#)]
    InvalidClient(String),

    /// The provided authorization grant (authorization code,
    /// pre-authorized code) is invalid, expired, revoked, does not match the
    /// redirection URI used in the authorization request, or was issued to
    /// another client.
    ///
    /// Also returned when the authorization server expects a Transaction
    /// Code in the pre-authorized flow but the client provides the wrong
    /// one.
    #[error(r#"{{"error": "invalid_grant", "error_description": "{0}"}}"#)]
    InvalidGrant(String),

    /// The client is not authorized to request an authorization code using
    /// this method.
    #[error(r#"{{"error": "unauthorized_client", "error_description": "{0}"}}"#)]
    UnauthorizedClient(String),

    /// The authorization grant type is not supported by the authorization
    /// server.
    #[error(r#"{{"error": "unsupported_grant_type", "error_description": "{0}"}}"#)]
    UnsupportedGrantType(String),

    /// The requested scope is invalid, unknown, malformed, or exceeds the
    /// scope granted.
    #[error(r#"{{"error": "invalid_scope", "error_description": "{0}"}}"#)]
    InvalidScope(String),

    /// The resource owner or authorization server denied the request.
    #[error(r#"{{"error": "access_denied", "error_description": "{0}"}}"#)]
    AccessDenied(String),

    /// The authorization server encountered an unexpected condition that
    /// prevented it from fulfilling the request.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    ServerError(String),

    /// The authorization server is unable to handle the request due to
    /// temporary overloading or maintenance.
    #[error(r#"{{"error": "temporarily_unavailable", "error_description": "{0}"}}"#)]
    TemporarilyUnavailable(String),

    /// The Credential Request is missing a required parameter, includes an
    /// unsupported parameter or parameter value, repeats the same parameter,
    /// or is otherwise malformed.
    #[error(r#"{{"error": "invalid_credential_request", "error_description": "{0}"}}"#)]
    InvalidCredentialRequest(String),

    /// Requested credential type is not supported.
    #[error(r#"{{"error": "unsupported_credential_type", "error_description": "{0}"}}"#)]
    UnsupportedCredentialType(String),

    /// Requested credential format is not supported.
    #[error(r#"{{"error": "unsupported_credential_format", "error_description": "{0}"}}"#)]
    UnsupportedCredentialFormat(String),

    /// The Credential Request did not contain a proof, or the proof was
    /// invalid. Handlers may enrich the response envelope with fresh
    /// `c_nonce` / `c_nonce_expires_in` values for the Wallet to use when
    /// creating another proof of possession.
    #[error(r#"{{"error": "invalid_proof", "error_description": "{0}"}}"#)]
    InvalidProof(String),

    /// At least one of the key proofs in the Credential Request contains an
    /// invalid `c_nonce` value. The Wallet should retrieve a fresh `c_nonce`.
    #[error(r#"{{"error": "invalid_nonce", "error_description": "{0}"}}"#)]
    InvalidNonce(String),

    /// The DPoP proof accompanying the request is missing, malformed, or
    /// failed verification ([RFC 9449]).
    ///
    /// [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449
    #[error(r#"{{"error": "invalid_dpop_proof", "error_description": "{0}"}}"#)]
    InvalidDpopProof(String),

    /// The server requires a DPoP nonce and the proof did not carry the
    /// current value. The response MUST set the fresh nonce in the
    /// `DPoP-Nonce` header; it is available from [`Error::dpop_nonce`].
    #[allow(missing_docs)]
    #[error(r#"{{"error": "use_dpop_nonce", "error_description": "{hint}"}}"#)]
    UseDpopNonce { hint: String, new_nonce: String },

    /// The Deferred Credential Request contains an invalid `transaction_id`,
    /// i.e. one not issued by this Credential Issuer or already used.
    #[error(r#"{{"error": "invalid_transaction_id", "error_description": "{0}"}}"#)]
    InvalidTransactionId(String),

    /// The Credential issuance is still pending. The `interval` member is
    /// the minimum number of seconds the Wallet must wait before retrying
    /// the Deferred Credential Endpoint.
    #[error(r#"{{"error": "issuance_pending", "interval": {0}}}"#)]
    IssuancePending(i64),
}

impl Error {
    /// Transform the error to the `OpenID`-compatible JSON envelope.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// Transform the error to an HTTP query string, as used in redirect
    /// responses. Does not include `c_nonce` values as these are not
    /// required in query string responses.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        serde_urlencoded::to_string(self).unwrap_or_default()
    }

    /// The fresh DPoP nonce to be returned in the `DPoP-Nonce` response
    /// header when the error is `use_dpop_nonce`.
    #[must_use]
    pub fn dpop_nonce(&self) -> Option<&str> {
        match self {
            Self::UseDpopNonce { new_nonce, .. } => Some(new_nonce),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Self>() {
            Ok(err) => err,
            Err(err) => Self::ServerError(err.to_string()),
        }
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerdeError;

        let Ok(response) = serde_json::from_str::<ErrorResponse>(&self.to_string()) else {
            return Err(SerdeError::custom("issue serializing error envelope"));
        };
        response.serialize(serializer)
    }
}

/// The OAuth 2.0 error envelope as it appears on the wire, including the
/// `OpenID4VCI` extension members carried on credential-request errors.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable ASCII text providing additional information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// A URI identifying a human-readable web page with information about
    /// the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,

    /// A fresh `c_nonce` to use when retrying Proof submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,

    /// The expiry time (in seconds) of the `c_nonce`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<i64>,

    /// The minimum number of seconds to wait before retrying a deferred
    /// credential request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
}

/// The error envelope returned by the Authorization Challenge Endpoint,
/// extending the OAuth 2.0 envelope with challenge-specific members.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChallengeErrorResponse {
    /// The OAuth 2.0 error envelope.
    #[serde(flatten)]
    pub error: ErrorResponse,

    /// The authorization session to present in follow-up challenge
    /// requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_session: Option<String>,

    /// An `OpenID4VP` request URL the Wallet should resolve to complete a
    /// presentation during issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,

    /// A `request_uri` to redirect the End-User to the authorization
    /// endpoint with, as if a Pushed Authorization Request had been made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,

    /// The lifetime in seconds of the `request_uri`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

/// Errors raised on the wallet side while driving a flow against a remote
/// Credential Issuer or Authorization Server.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A local or remote payload failed schema validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The library was used incorrectly: a missing grant, an ambiguous
    /// authorization server, an unsupported signer method, and the like.
    #[error("{0}")]
    Oauth2(String),

    /// The server rejected a request with a structured OAuth 2.0 error
    /// envelope.
    #[error("server responded with \"{}\"", .0.error)]
    Server(ErrorResponse),

    /// The Authorization Challenge Endpoint rejected a request. Carries the
    /// challenge-specific envelope members (`presentation`, `auth_session`,
    /// `request_uri`).
    #[error("authorization challenge responded with \"{}\"", .0.error.error)]
    AuthorizationChallenge(ChallengeErrorResponse),

    /// The response could not be used: a non-2xx status without a valid
    /// error envelope, or an unexpected content type.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse {
        /// The request URL.
        url: String,
        /// Why the response was unusable.
        reason: String,
    },

    /// A response body could not be parsed as JSON.
    #[error("issue parsing JSON: {0}")]
    JsonParse(String),
}

/// Construct an `Error::InvalidRequest` error from a string or existing
/// error value.
macro_rules! invalid {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::InvalidRequest(format!($err))
    };
}
pub(crate) use invalid;

/// Construct an `Error::ServerError` error from a string or existing error
/// value.
macro_rules! server {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::ServerError(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::ServerError(format!($err))
    };
}
pub(crate) use server;

#[cfg(test)]
mod test {
    use serde_json::{Value, json};

    use super::*;

    // Test that error details are returned as json.
    #[test]
    fn err_json() {
        let err = invalid!("bad request");
        let ser: Value = serde_json::to_value(&err).unwrap();
        assert_eq!(ser, json!({"error": "invalid_request", "error_description": "bad request"}));
    }

    // Test that the error details are returned as an http query string.
    #[test]
    fn err_querystring() {
        let err = Error::InvalidGrant("Invalid grant description".into());
        let ser = serde_urlencoded::to_string(&err).unwrap();
        assert_eq!(ser, "error=invalid_grant&error_description=Invalid+grant+description");
    }

    // Credential-request error envelopes can carry a fresh c_nonce for
    // the Wallet's proof retry.
    #[test]
    fn proof_err_envelope() {
        let envelope = ErrorResponse {
            error: "invalid_proof".into(),
            error_description: Some("nonce mismatch".into()),
            c_nonce: Some("fresh".into()),
            c_nonce_expires_in: Some(300),
            ..ErrorResponse::default()
        };
        let ser = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            ser,
            json!({
                "error": "invalid_proof",
                "error_description": "nonce mismatch",
                "c_nonce": "fresh",
                "c_nonce_expires_in": 300,
            })
        );
    }

    // The fresh nonce on a use_dpop_nonce error travels in the DPoP-Nonce
    // header, not the response body.
    #[test]
    fn dpop_nonce_err() {
        let err = Error::UseDpopNonce {
            hint: "nonce required".into(),
            new_nonce: "N1".into(),
        };
        assert_eq!(err.dpop_nonce(), Some("N1"));

        let ser = serde_json::to_value(&err).unwrap();
        assert_eq!(
            ser,
            json!({"error": "use_dpop_nonce", "error_description": "nonce required"})
        );
    }
}
