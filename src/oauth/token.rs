//! # Token Endpoint Types
//!
//! Requests to and responses from the token endpoint, as defined in
//! [RFC 6749] with the `OpenID4VCI` extensions for the pre-authorized code
//! flow.
//!
//! [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749

use serde::{Deserialize, Serialize};

use crate::oauth::TokenType;

/// A Token Request as posted to the token endpoint,
/// `application/x-www-form-urlencoded`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenRequest {
    /// OAuth 2.0 Client ID used by the Wallet.
    ///
    /// REQUIRED if the client is not authenticating with the authorization
    /// server. For the pre-authorized code grant, client authentication is
    /// OPTIONAL and the parameter is only needed when a form of client
    /// authentication that relies on it is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Authorization grant type and its parameters.
    #[serde(flatten)]
    pub grant_type: TokenGrantType,

    /// Requested scope. Mapped to credential configurations via the
    /// `scope` member of issuer metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// The resource the token is requested for, typically the credential
    /// issuer identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Authorization Details conveying the credentials the Wallet wants to
    /// obtain. Carried opaquely: JSON-encoded then URL-encoded on the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<serde_json::Value>,
}

/// Token authorization grant types and their grant-specific parameters.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "grant_type")]
pub enum TokenGrantType {
    /// Parameters of the authorization code grant.
    #[serde(rename = "authorization_code")]
    AuthorizationCode {
        /// The authorization code received from the authorization server.
        code: String,

        /// The client's redirection endpoint. REQUIRED if `redirect_uri`
        /// was included in the authorization request; values MUST be
        /// identical.
        #[serde(skip_serializing_if = "Option::is_none")]
        redirect_uri: Option<String>,

        /// PKCE code verifier. MUST verify against the `code_challenge`
        /// provided in the authorization request.
        #[serde(skip_serializing_if = "Option::is_none")]
        code_verifier: Option<String>,
    },

    /// Parameters of the pre-authorized code grant.
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    PreAuthorizedCode {
        /// The pre-authorized code provided to the Wallet in a Credential
        /// Offer.
        #[serde(rename = "pre-authorized_code")]
        pre_authorized_code: String,

        /// The Transaction Code provided to the End-User during the offer
        /// process. MUST be present if `tx_code` was set in the offer.
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_code: Option<String>,

        /// Draft 11 legacy spelling of the Transaction Code. Emitted
        /// instead of `tx_code` when the issuer metadata was normalized
        /// from draft 11.
        #[serde(skip_serializing_if = "Option::is_none")]
        user_pin: Option<String>,
    },
}

impl Default for TokenGrantType {
    fn default() -> Self {
        Self::AuthorizationCode {
            code: String::new(),
            redirect_uri: None,
            code_verifier: None,
        }
    }
}

impl TokenRequest {
    /// Flatten the request to ordered form pairs suitable for an
    /// `application/x-www-form-urlencoded` POST body. Object-valued fields
    /// are JSON-encoded.
    ///
    /// # Errors
    ///
    /// Returns an error when `authorization_details` cannot be serialized
    /// to JSON.
    pub fn form_encode(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut form = vec![];
        match &self.grant_type {
            TokenGrantType::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                form.push(("grant_type".to_string(), "authorization_code".to_string()));
                form.push(("code".to_string(), code.clone()));
                if let Some(redirect_uri) = redirect_uri {
                    form.push(("redirect_uri".to_string(), redirect_uri.clone()));
                }
                if let Some(code_verifier) = code_verifier {
                    form.push(("code_verifier".to_string(), code_verifier.clone()));
                }
            }
            TokenGrantType::PreAuthorizedCode {
                pre_authorized_code,
                tx_code,
                user_pin,
            } => {
                form.push((
                    "grant_type".to_string(),
                    "urn:ietf:params:oauth:grant-type:pre-authorized_code".to_string(),
                ));
                form.push(("pre-authorized_code".to_string(), pre_authorized_code.clone()));
                if let Some(tx_code) = tx_code {
                    form.push(("tx_code".to_string(), tx_code.clone()));
                }
                if let Some(user_pin) = user_pin {
                    form.push(("user_pin".to_string(), user_pin.clone()));
                }
            }
        }
        if let Some(client_id) = &self.client_id {
            form.push(("client_id".to_string(), client_id.clone()));
        }
        if let Some(scope) = &self.scope {
            form.push(("scope".to_string(), scope.clone()));
        }
        if let Some(resource) = &self.resource {
            form.push(("resource".to_string(), resource.clone()));
        }
        if let Some(details) = &self.authorization_details {
            form.push(("authorization_details".to_string(), serde_json::to_string(details)?));
        }
        Ok(form)
    }

    /// Reconstruct a request from decoded form pairs, as received by a
    /// token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when no recognizable grant is present or
    /// `authorization_details` is not valid JSON.
    pub fn form_decode(form: &[(String, String)]) -> anyhow::Result<Self> {
        let get = |name: &str| {
            form.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
        };

        let grant_type = match get("grant_type") {
            Some(grant) if grant == "authorization_code" => TokenGrantType::AuthorizationCode {
                code: get("code").ok_or_else(|| anyhow::anyhow!("`code` is missing"))?,
                redirect_uri: get("redirect_uri"),
                code_verifier: get("code_verifier"),
            },
            Some(grant) if grant == "urn:ietf:params:oauth:grant-type:pre-authorized_code" => {
                TokenGrantType::PreAuthorizedCode {
                    pre_authorized_code: get("pre-authorized_code")
                        .ok_or_else(|| anyhow::anyhow!("`pre-authorized_code` is missing"))?,
                    tx_code: get("tx_code"),
                    user_pin: get("user_pin"),
                }
            }
            Some(grant) => anyhow::bail!("unsupported grant type: {grant}"),
            None => anyhow::bail!("`grant_type` is missing"),
        };

        Ok(Self {
            client_id: get("client_id"),
            grant_type,
            scope: get("scope"),
            resource: get("resource"),
            authorization_details: match get("authorization_details") {
                Some(details) => Some(serde_json::from_str(&details)?),
                None => None,
            },
        })
    }
}

/// Token Response as defined in [RFC 6749], with the `OpenID4VCI` and DPoP
/// extension members.
///
/// [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// The issued access token.
    pub access_token: String,

    /// The type of the token: `Bearer`, or `DPoP` when the token is bound
    /// to the DPoP key used at the token endpoint.
    pub token_type: TokenType,

    /// The lifetime in seconds of the access token.
    pub expires_in: i64,

    /// The granted scope, when it differs from the requested scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// A nonce to be used in the proof of possession of key material of a
    /// subsequent Credential Request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,

    /// The lifetime in seconds of the `c_nonce` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<i64>,

    /// Authorization Details with the `credential_identifiers` the Wallet
    /// may use in Credential Requests. Carried opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::urlencode;

    // Token requests round-trip through form encoding unchanged.
    #[test]
    fn form_encoding_round_trip() {
        let request = TokenRequest {
            client_id: Some("1234".to_string()),
            grant_type: TokenGrantType::PreAuthorizedCode {
                pre_authorized_code: "WQHhDmQ3ZygxyOPlBjunlA".to_string(),
                tx_code: Some("111222".to_string()),
                user_pin: None,
            },
            scope: Some("pid".to_string()),
            resource: None,
            authorization_details: Some(serde_json::json!([{
                "type": "openid_credential",
                "credential_configuration_id": "EmployeeID_JWT",
            }])),
        };

        let form = request.form_encode().expect("should flatten to pairs");
        let decoded = TokenRequest::form_decode(&form).expect("should decode");
        assert_eq!(request, decoded);
    }

    // The pre-authorized grant body serializes byte-for-byte as specified.
    #[test]
    fn pre_authorized_body() {
        let request = TokenRequest {
            grant_type: TokenGrantType::PreAuthorizedCode {
                pre_authorized_code: "abc".to_string(),
                tx_code: None,
                user_pin: None,
            },
            ..TokenRequest::default()
        };

        let form = request.form_encode().expect("should flatten to pairs");
        assert_eq!(
            urlencode::to_string(&form),
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Apre-authorized_code&pre-authorized_code=abc"
        );
    }

    #[test]
    fn missing_grant_rejected() {
        let form = vec![("client_id".to_string(), "1234".to_string())];
        assert!(TokenRequest::form_decode(&form).is_err());
    }
}
