//! # Metadata Resolution
//!
//! The unified resolver: credential issuer metadata from
//! `/.well-known/openid-credential-issuer`, draft 11 normalization, and
//! the authorization server metadata of every server the issuer names.

use tracing::instrument;

use crate::core::strings::canonicalize_url;
use crate::error::ClientError;
use crate::oauth::metadata::{self, ServerMetadata};
use crate::oid4vci::types::{Draft, IssuerMetadata};
use crate::provider::{HttpClient, HttpRequest};

/// Well-known path for credential issuer metadata.
pub const WELL_KNOWN_ISSUER: &str = ".well-known/openid-credential-issuer";

/// The result of metadata resolution: the issuer's configuration and the
/// authorization servers that can authorize issuance against it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedMetadata {
    /// The credential issuer's metadata, normalized to the draft 14
    /// shape.
    pub credential_issuer: IssuerMetadata,

    /// Metadata of each resolved authorization server, in the order the
    /// issuer names them.
    pub authorization_servers: Vec<ServerMetadata>,

    /// The draft the issuer's metadata was published in. Draft 11 issuers
    /// take the legacy `user_pin` parameter in pre-authorized token
    /// requests.
    pub draft: Draft,
}

/// Resolve a credential issuer's metadata and that of its authorization
/// servers.
///
/// The issuer document is fetched from
/// `{issuer}/.well-known/openid-credential-issuer` and must carry a
/// `credential_issuer` equal to the requested identifier after
/// canonicalization. Authorization server identifiers come from
/// `authorization_servers`, falling back to the issuer identifier itself,
/// and each is resolved per [`metadata::resolve_server_metadata`].
///
/// # Errors
///
/// Returns a [`ClientError::Oauth2`] when the issuer metadata cannot be
/// found or fails validation, or when any named authorization server
/// cannot be resolved.
#[instrument(level = "debug", skip(provider))]
pub async fn resolve_issuer_metadata(
    provider: &impl HttpClient, issuer: &str,
) -> Result<ResolvedMetadata, ClientError> {
    tracing::debug!("resolve_issuer_metadata");

    let Some(canonical) = canonicalize_url(issuer) else {
        return Err(ClientError::Oauth2(format!("invalid credential issuer url: {issuer}")));
    };

    let url = format!("{canonical}/{WELL_KNOWN_ISSUER}");
    let response = provider.fetch(HttpRequest::get(url.as_str())).await.map_err(|e| {
        ClientError::InvalidResponse {
            url: url.clone(),
            reason: e.to_string(),
        }
    })?;
    if !response.is_success() {
        return Err(ClientError::Oauth2(format!("issuer metadata not found for {issuer}")));
    }

    let value: serde_json::Value =
        response.json().map_err(|e| ClientError::JsonParse(e.to_string()))?;
    let (credential_issuer, draft) = normalize_issuer_metadata(value)?;

    if canonicalize_url(&credential_issuer.credential_issuer).as_deref() != Some(&*canonical) {
        return Err(ClientError::Validation(format!(
            "metadata `credential_issuer` does not match {issuer}"
        )));
    }

    // the issuer is its own authorization server when it names none
    let server_ids = credential_issuer
        .authorization_servers
        .clone()
        .unwrap_or_else(|| vec![credential_issuer.credential_issuer.clone()]);

    let mut authorization_servers = Vec::with_capacity(server_ids.len());
    for server_id in &server_ids {
        authorization_servers.push(metadata::resolve_server_metadata(provider, server_id).await?);
    }

    Ok(ResolvedMetadata {
        credential_issuer,
        authorization_servers,
        draft,
    })
}

// Parse issuer metadata, normalizing a draft 11 document forward: the
// `credentials_supported` map becomes `credential_configurations_supported`
// and `cryptographic_suites_supported` becomes
// `credential_signing_alg_values_supported`. The transform is forward-only
// and idempotent over its output.
fn normalize_issuer_metadata(
    mut value: serde_json::Value,
) -> Result<(IssuerMetadata, Draft), ClientError> {
    let mut draft = Draft::Draft14;

    if value.get("credential_configurations_supported").is_none()
        && let Some(configurations) = value
            .as_object_mut()
            .and_then(|object| object.remove("credentials_supported"))
    {
        draft = Draft::Draft11;

        let mut normalized = configurations;
        if let Some(map) = normalized.as_object_mut() {
            for configuration in map.values_mut() {
                if let Some(object) = configuration.as_object_mut()
                    && let Some(suites) = object.remove("cryptographic_suites_supported")
                {
                    object.insert("credential_signing_alg_values_supported".to_string(), suites);
                }
            }
        }
        if let Some(object) = value.as_object_mut() {
            object.insert("credential_configurations_supported".to_string(), normalized);
        }
    }

    let metadata: IssuerMetadata = serde_json::from_value(value)
        .map_err(|e| ClientError::Validation(format!("malformed issuer metadata: {e}")))?;
    Ok((metadata, draft))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft11_metadata_normalized() {
        let value = serde_json::json!({
            "credential_issuer": "https://issuer.example.com",
            "credential_endpoint": "https://issuer.example.com/credential",
            "credentials_supported": {
                "pid": {
                    "format": "vc+sd-jwt",
                    "vct": "https://sd-jwt.example.com/pid",
                    "cryptographic_suites_supported": ["ES256"],
                }
            }
        });

        let (metadata, draft) = normalize_issuer_metadata(value).expect("should normalize");
        assert_eq!(draft, Draft::Draft11);

        let config = metadata.credential_configuration("pid").expect("config exists");
        assert_eq!(
            config.credential_signing_alg_values_supported,
            Some(vec!["ES256".to_string()])
        );
    }

    #[test]
    fn draft14_metadata_untouched() {
        let value = serde_json::json!({
            "credential_issuer": "https://issuer.example.com",
            "credential_endpoint": "https://issuer.example.com/credential",
            "credential_configurations_supported": {},
        });

        let (_, draft) = normalize_issuer_metadata(value).expect("should parse");
        assert_eq!(draft, Draft::Draft14);
    }
}
