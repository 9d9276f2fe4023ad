//! # Credential Offer Resolution
//!
//! Parsing and building credential offer URLs, resolving an offer by value
//! or by reference, and selecting the authorization server to drive a
//! grant against.

use tracing::instrument;

use crate::core::strings::canonicalize_url;
use crate::error::ClientError;
use crate::oid4vci::types::{CredentialOffer, CredentialOfferDraft11, IssuerMetadata};
use crate::provider::{HttpClient, HttpRequest};

/// The default URL scheme for credential offers.
pub const OFFER_SCHEME: &str = "openid-credential-offer";

/// Build a credential offer URL: `<scheme>://?credential_offer=<json>`.
///
/// # Errors
///
/// Returns a [`ClientError::Validation`] when the offer does not satisfy
/// its invariants.
pub fn build_offer_url(offer: &CredentialOffer, scheme: Option<&str>) -> Result<String, ClientError> {
    offer.validate()?;
    let json = serde_json::to_string(offer).map_err(|e| ClientError::JsonParse(e.to_string()))?;
    let scheme = scheme.unwrap_or(OFFER_SCHEME);
    Ok(format!("{scheme}://?credential_offer={}", urlencoding::encode(&json)))
}

/// Build a credential offer URL referencing an offer by URI:
/// `<scheme>://?credential_offer_uri=<https-url>`.
#[must_use]
pub fn build_offer_uri_url(offer_uri: &str, scheme: Option<&str>) -> String {
    let scheme = scheme.unwrap_or(OFFER_SCHEME);
    format!("{scheme}://?credential_offer_uri={}", urlencoding::encode(offer_uri))
}

/// What a credential offer URL carries: the offer itself, or a reference
/// to fetch it from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfferPayload {
    /// The offer, inline in the URL.
    Value(CredentialOffer),

    /// An HTTPS URL the offer can be retrieved from.
    Reference(String),
}

/// Parse a credential offer URL. Any URI is accepted (the first `?`
/// delimits the query), and exactly one of `credential_offer` /
/// `credential_offer_uri` must be present.
///
/// An inline offer in either the draft 14 or the draft 11 shape is
/// accepted; draft 11 offers are normalized forward.
///
/// # Errors
///
/// Returns a [`ClientError::Validation`] when neither or both parameters
/// are present, or the inline offer matches neither draft.
pub fn parse_offer_url(url: &str) -> Result<OfferPayload, ClientError> {
    let Some((_, query)) = url.split_once('?') else {
        return Err(ClientError::Validation("offer url has no query".to_string()));
    };

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| ClientError::Validation(format!("malformed offer query: {e}")))?;

    let offer = pairs.iter().find(|(name, _)| name == "credential_offer");
    let offer_uri = pairs.iter().find(|(name, _)| name == "credential_offer_uri");

    match (offer, offer_uri) {
        (Some((_, json)), None) => Ok(OfferPayload::Value(parse_offer_json(json)?)),
        (None, Some((_, uri))) => Ok(OfferPayload::Reference(uri.clone())),
        _ => Err(ClientError::Validation(
            "exactly one of `credential_offer` and `credential_offer_uri` must be present"
                .to_string(),
        )),
    }
}

// Parse an offer body against the union of the draft 14 and draft 11
// shapes, normalizing draft 11 forward.
fn parse_offer_json(json: &str) -> Result<CredentialOffer, ClientError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ClientError::JsonParse(e.to_string()))?;

    let offer = if value.get("credential_configuration_ids").is_some() {
        serde_json::from_value::<CredentialOffer>(value)
            .map_err(|e| ClientError::Validation(format!("malformed credential offer: {e}")))?
    } else if value.get("credentials").is_some() {
        serde_json::from_value::<CredentialOfferDraft11>(value)
            .map_err(|e| ClientError::Validation(format!("malformed credential offer: {e}")))?
            .normalize()
    } else {
        return Err(ClientError::Validation(
            "offer matches neither the draft 14 nor the draft 11 shape".to_string(),
        ));
    };

    offer.validate()?;
    Ok(offer)
}

/// Resolve a credential offer URL to an offer, following a
/// `credential_offer_uri` reference when present.
///
/// # Errors
///
/// Returns the errors of [`parse_offer_url`], plus
/// [`ClientError::InvalidResponse`] when the reference cannot be fetched.
#[instrument(level = "debug", skip(provider))]
pub async fn resolve_credential_offer(
    provider: &impl HttpClient, url: &str,
) -> Result<CredentialOffer, ClientError> {
    tracing::debug!("resolve_credential_offer");

    match parse_offer_url(url)? {
        OfferPayload::Value(offer) => Ok(offer),
        OfferPayload::Reference(uri) => {
            let response = provider.fetch(HttpRequest::get(uri.as_str())).await.map_err(|e| {
                ClientError::InvalidResponse {
                    url: uri.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !response.is_success() {
                return Err(ClientError::InvalidResponse {
                    url: uri,
                    reason: format!("status {}", response.status),
                });
            }
            let body = String::from_utf8(response.body.clone())
                .map_err(|e| ClientError::JsonParse(e.to_string()))?;
            parse_offer_json(&body)
        }
    }
}

/// Select the authorization server for a grant.
///
/// A grant-pinned `authorization_server` must be listed in the issuer
/// metadata. Without a pin, a sole known server wins; multiple candidates
/// are ambiguous and the caller must disambiguate.
///
/// # Errors
///
/// Returns a [`ClientError::Oauth2`] for an unknown pinned server or an
/// ambiguous choice.
pub fn determine_authorization_server(
    grant_server: Option<&str>, issuer_metadata: &IssuerMetadata,
) -> Result<String, ClientError> {
    // without `authorization_servers`, the issuer is its own server
    let candidates = issuer_metadata
        .authorization_servers
        .clone()
        .unwrap_or_else(|| vec![issuer_metadata.credential_issuer.clone()]);

    if let Some(pinned) = grant_server {
        return candidates
            .iter()
            .find(|c| canonicalize_url(c) == canonicalize_url(pinned))
            .cloned()
            .ok_or_else(|| {
                ClientError::Oauth2(format!("unknown authorization server: {pinned}"))
            });
    }

    if candidates.len() == 1 {
        return Ok(candidates.into_iter().next().unwrap_or_default());
    }
    Err(ClientError::Oauth2(
        "multiple authorization servers known: the grant must pin one".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid4vci::types::{Grants, PreAuthorizedCodeGrant};

    fn offer() -> CredentialOffer {
        CredentialOffer {
            credential_issuer: "https://issuer.example.com".to_string(),
            credential_configuration_ids: vec!["pidSdJwt".to_string()],
            grants: Some(Grants {
                authorization_code: None,
                pre_authorized_code: Some(PreAuthorizedCodeGrant {
                    pre_authorized_code: "abc".to_string(),
                    tx_code: None,
                    authorization_server: None,
                }),
            }),
        }
    }

    // Offers round-trip through their URL form unchanged.
    #[test]
    fn offer_url_round_trip() {
        let url = build_offer_url(&offer(), None).expect("should build");
        assert!(url.starts_with("openid-credential-offer://?credential_offer="));

        let OfferPayload::Value(parsed) = parse_offer_url(&url).expect("should parse") else {
            panic!("expected an inline offer");
        };
        assert_eq!(parsed, offer());
    }

    #[test]
    fn both_parameters_rejected() {
        let url = "openid-credential-offer://?credential_offer=%7B%7D&credential_offer_uri=https%3A%2F%2Fissuer";
        assert!(parse_offer_url(url).is_err());
    }

    #[test]
    fn neither_parameter_rejected() {
        assert!(parse_offer_url("openid-credential-offer://?foo=bar").is_err());
    }

    #[test]
    fn draft11_offer_normalized() {
        let draft11 = r#"{"credential_issuer":"https://issuer.example.com","credentials":["pid"],"grants":{"urn:ietf:params:oauth:grant-type:pre-authorized_code":{"pre-authorized_code":"abc","user_pin_required":true}}}"#;
        let url =
            format!("openid-credential-offer://?credential_offer={}", urlencoding::encode(draft11));

        let OfferPayload::Value(parsed) = parse_offer_url(&url).expect("should parse") else {
            panic!("expected an inline offer");
        };
        assert_eq!(parsed.credential_configuration_ids, vec!["pid".to_string()]);
        assert!(
            parsed.pre_authorized_code().and_then(|g| g.tx_code.as_ref()).is_some()
        );
    }

    #[test]
    fn authorization_server_selection() {
        let mut metadata = IssuerMetadata {
            credential_issuer: "https://issuer.example.com".to_string(),
            ..IssuerMetadata::default()
        };

        // no listed servers: the issuer is the server
        assert_eq!(
            determine_authorization_server(None, &metadata).expect("issuer acts as server"),
            "https://issuer.example.com"
        );

        // multiple servers without a pin is ambiguous
        metadata.authorization_servers =
            Some(vec!["https://as1.example.com".to_string(), "https://as2.example.com".to_string()]);
        assert!(determine_authorization_server(None, &metadata).is_err());

        // a pinned server must be listed
        assert_eq!(
            determine_authorization_server(Some("https://as2.example.com"), &metadata)
                .expect("pinned server is listed"),
            "https://as2.example.com"
        );
        assert!(
            determine_authorization_server(Some("https://other.example.com"), &metadata).is_err()
        );
    }
}
