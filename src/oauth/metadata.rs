//! # Authorization Server Metadata
//!
//! Authorization server metadata as defined in [RFC 8414], extended with
//! the `OpenID4VCI`, PAR, authorization challenge, and DPoP members the
//! issuance flows rely on, and the well-known discovery that resolves it.
//!
//! [RFC 8414]: https://www.rfc-editor.org/rfc/rfc8414

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::core::strings::canonicalize_url;
use crate::error::ClientError;
use crate::oauth::{CodeChallengeMethod, GrantType};
use crate::provider::{HttpClient, HttpRequest};

/// Well-known path for OAuth 2.0 authorization server metadata ([RFC 8414]).
///
/// [RFC 8414]: https://www.rfc-editor.org/rfc/rfc8414
pub const WELL_KNOWN_OAUTH: &str = ".well-known/oauth-authorization-server";

/// Well-known path for `OpenID` Connect discovery metadata.
pub const WELL_KNOWN_OPENID: &str = ".well-known/openid-configuration";

/// Authorization server metadata: a superset of [RFC 8414] carrying the
/// extensions used by credential issuance.
///
/// [RFC 8414]: https://www.rfc-editor.org/rfc/rfc8414
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerMetadata {
    /// The authorization server's issuer identifier. Exactly matches the
    /// URL prefix the metadata was discovered from.
    pub issuer: String,

    /// URL of the authorization endpoint. May be omitted by servers that
    /// only support the pre-authorized code grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// URL of the token endpoint.
    pub token_endpoint: String,

    /// URL of the server's JWK Set document, used by resource servers to
    /// verify access-token signatures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// URL of the pushed authorization request endpoint ([RFC 9126]).
    ///
    /// [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed_authorization_request_endpoint: Option<String>,

    /// Whether the server requires authorization requests to be pushed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub require_pushed_authorization_requests: bool,

    /// URL of the authorization challenge endpoint. When present, the
    /// client attempts the first-party authorization challenge flow before
    /// falling back to a browser redirect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_challenge_endpoint: Option<String>,

    /// PKCE code challenge methods supported. `S256` must be used whenever
    /// it appears here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<CodeChallengeMethod>>,

    /// JWS algorithms supported for DPoP proofs. Absent when the server
    /// does not support DPoP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpop_signing_alg_values_supported: Option<Vec<String>>,

    /// OAuth 2.0 grant types supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<GrantType>>,

    /// OAuth 2.0 response types supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    /// Scope values supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Client authentication methods supported by the token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// Whether the server supports anonymous (no `client_id`) token
    /// requests for the pre-authorized code grant.
    #[serde(
        rename = "pre-authorized_grant_anonymous_access_supported",
        default,
        skip_serializing_if = "is_false"
    )]
    pub pre_authorized_grant_anonymous_access_supported: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ServerMetadata {
    /// Whether the server advertises DPoP support for at least one
    /// algorithm.
    #[must_use]
    pub fn supports_dpop(&self) -> bool {
        self.dpop_signing_alg_values_supported.as_ref().is_some_and(|algs| !algs.is_empty())
    }
}

/// Resolve authorization server metadata for an issuer identifier.
///
/// The two well-known documents are requested concurrently:
/// `/.well-known/oauth-authorization-server` is preferred, with
/// `/.well-known/openid-configuration` as fallback. A document only wins if
/// it parses and its `issuer` matches the requested identifier after
/// canonicalization.
///
/// # Errors
///
/// Returns a [`ClientError::Oauth2`] when no document can be resolved.
#[instrument(level = "debug", skip(provider))]
pub async fn resolve_server_metadata(
    provider: &impl HttpClient, issuer: &str,
) -> Result<ServerMetadata, ClientError> {
    tracing::debug!("resolve_server_metadata");

    let Some(canonical) = canonicalize_url(issuer) else {
        return Err(ClientError::Oauth2(format!("invalid authorization server url: {issuer}")));
    };

    let (oauth, openid) = futures::future::join(
        fetch_metadata(provider, &canonical, WELL_KNOWN_OAUTH),
        fetch_metadata(provider, &canonical, WELL_KNOWN_OPENID),
    )
    .await;

    oauth.or(openid).ok_or_else(|| {
        ClientError::Oauth2(format!("authorization server metadata not found for {issuer}"))
    })
}

// Fetch and validate one well-known document. Any failure (transport,
// non-2xx, schema, issuer mismatch) disqualifies the candidate.
async fn fetch_metadata(
    provider: &impl HttpClient, issuer: &str, well_known: &str,
) -> Option<ServerMetadata> {
    let url = format!("{issuer}/{well_known}");
    let response = provider.fetch(HttpRequest::get(url)).await.ok()?;
    if !response.is_success() {
        return None;
    }
    let metadata: ServerMetadata = response.json().ok()?;

    // RFC 8414 §3.3: the `issuer` value must match the identifier the
    // metadata was resolved for.
    if canonicalize_url(&metadata.issuer)? != issuer {
        return None;
    }
    Some(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_roundtrip() {
        let json = serde_json::json!({
            "issuer": "https://as.example.com",
            "token_endpoint": "https://as.example.com/token",
            "pushed_authorization_request_endpoint": "https://as.example.com/par",
            "require_pushed_authorization_requests": true,
            "code_challenge_methods_supported": ["S256"],
            "dpop_signing_alg_values_supported": ["ES256"],
            "pre-authorized_grant_anonymous_access_supported": true,
        });

        let metadata: ServerMetadata =
            serde_json::from_value(json.clone()).expect("should deserialize");
        assert!(metadata.require_pushed_authorization_requests);
        assert!(metadata.pre_authorized_grant_anonymous_access_supported);
        assert!(metadata.supports_dpop());

        let ser = serde_json::to_value(&metadata).expect("should serialize");
        assert_eq!(ser, json);
    }
}
