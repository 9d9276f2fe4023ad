//! # Authorization Request Types
//!
//! The authorization request as it appears in redirect URLs and Pushed
//! Authorization Requests ([RFC 9126]), and the first-party Authorization
//! Challenge exchange.
//!
//! [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126

use serde::{Deserialize, Serialize};

use crate::oauth::CodeChallengeMethod;

/// A PKCE pair generated for an authorization request and redeemed at the
/// token endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PkcePair {
    /// The code verifier: 43–128 unreserved characters, held by the client
    /// until the token request.
    pub code_verifier: String,

    /// The derived code challenge sent with the authorization request.
    pub code_challenge: String,

    /// The method used to derive the challenge.
    pub code_challenge_method: CodeChallengeMethod,
}

/// An OAuth 2.0 authorization request ([RFC 6749] §4.1.1) with the PKCE
/// and `OpenID4VCI` extension parameters.
///
/// [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorizationRequest {
    /// Response type. Always `code` for the flows in this library.
    pub response_type: String,

    /// The client identifier.
    pub client_id: String,

    /// The client's redirection endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Opaque client state, returned unchanged in the redirect back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Requested scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,

    /// Issuer state from a Credential Offer's authorization code grant,
    /// passed through so the issuer can correlate the request with the
    /// offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,

    /// The resource the authorization is requested for, typically the
    /// credential issuer identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Authorization Details conveying the credentials the Wallet wants to
    /// obtain. Carried opaquely: JSON-encoded then URL-encoded on the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<serde_json::Value>,
}

impl AuthorizationRequest {
    /// Flatten the request to ordered query/form pairs.
    ///
    /// # Errors
    ///
    /// Returns an error when `authorization_details` cannot be serialized.
    pub fn to_pairs(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut pairs = vec![
            ("response_type".to_string(), self.response_type.clone()),
            ("client_id".to_string(), self.client_id.clone()),
        ];
        if let Some(redirect_uri) = &self.redirect_uri {
            pairs.push(("redirect_uri".to_string(), redirect_uri.clone()));
        }
        if let Some(state) = &self.state {
            pairs.push(("state".to_string(), state.clone()));
        }
        if let Some(scope) = &self.scope {
            pairs.push(("scope".to_string(), scope.clone()));
        }
        if let Some(code_challenge) = &self.code_challenge {
            pairs.push(("code_challenge".to_string(), code_challenge.clone()));
        }
        if let Some(method) = &self.code_challenge_method {
            pairs.push(("code_challenge_method".to_string(), method.to_string()));
        }
        if let Some(issuer_state) = &self.issuer_state {
            pairs.push(("issuer_state".to_string(), issuer_state.clone()));
        }
        if let Some(resource) = &self.resource {
            pairs.push(("resource".to_string(), resource.clone()));
        }
        if let Some(details) = &self.authorization_details {
            pairs.push(("authorization_details".to_string(), serde_json::to_string(details)?));
        }
        Ok(pairs)
    }
}

/// The response to a Pushed Authorization Request ([RFC 9126] §2.2).
///
/// [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PushedAuthorizationResponse {
    /// The request URI standing in for the pushed request parameters at
    /// the authorization endpoint.
    pub request_uri: String,

    /// The lifetime in seconds of the `request_uri`.
    pub expires_in: i64,
}

/// A request to the Authorization Challenge endpoint,
/// `application/x-www-form-urlencoded`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorizationChallengeRequest {
    /// The client identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Requested scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,

    /// Issuer state from a Credential Offer's authorization code grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,

    /// The authorization session issued by a previous challenge error
    /// response, presented when resuming the challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_session: Option<String>,

    /// The session returned by an `OpenID4VP` verifier after a
    /// presentation during issuance, presented to resume the challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_during_issuance_session: Option<String>,
}

impl AuthorizationChallengeRequest {
    /// Flatten the request to ordered form pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![];
        if let Some(client_id) = &self.client_id {
            pairs.push(("client_id".to_string(), client_id.clone()));
        }
        if let Some(scope) = &self.scope {
            pairs.push(("scope".to_string(), scope.clone()));
        }
        if let Some(code_challenge) = &self.code_challenge {
            pairs.push(("code_challenge".to_string(), code_challenge.clone()));
        }
        if let Some(method) = &self.code_challenge_method {
            pairs.push(("code_challenge_method".to_string(), method.to_string()));
        }
        if let Some(issuer_state) = &self.issuer_state {
            pairs.push(("issuer_state".to_string(), issuer_state.clone()));
        }
        if let Some(auth_session) = &self.auth_session {
            pairs.push(("auth_session".to_string(), auth_session.clone()));
        }
        if let Some(session) = &self.presentation_during_issuance_session {
            pairs.push((
                "presentation_during_issuance_session".to_string(),
                session.clone(),
            ));
        }
        pairs
    }
}

/// A successful response from the Authorization Challenge endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationChallengeResponse {
    /// The authorization code to present directly at the token endpoint.
    pub authorization_code: String,
}

/// The outcome of initiating authorization: which flow the client must now
/// drive to obtain an authorization code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationFlow {
    /// The End-User must be sent to the authorization endpoint. Redeem the
    /// code returned to the redirect URI at the token endpoint, presenting
    /// the PKCE verifier.
    Oauth2Redirect {
        /// The fully-assembled authorization URL.
        url: String,

        /// The PKCE pair in play, when one was negotiated.
        pkce: Option<PkcePair>,
    },

    /// The authorization challenge succeeded without a redirect. Present
    /// the code at the token endpoint directly.
    AuthorizationChallenge {
        /// The issued authorization code.
        authorization_code: String,
    },

    /// The server requires a credential presentation before authorization
    /// can proceed. Resolve the `OpenID4VP` request, then repeat the
    /// challenge with the verifier-issued
    /// `presentation_during_issuance_session` and this `auth_session`.
    PresentationDuringIssuance {
        /// The `OpenID4VP` request URL to hand to the holder.
        oid4vp_request_url: String,

        /// The authorization session to present when resuming.
        auth_session: String,
    },
}
