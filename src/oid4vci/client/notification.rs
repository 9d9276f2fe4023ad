//! # Notification
//!
//! The outbound notification POST: the Wallet reports the disposition of
//! an issued credential to the issuer's Notification Endpoint,
//! authenticated with the issuance access token and, for
//! sender-constrained tokens, a DPoP proof on the notification URL.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::error::{ClientError, ErrorResponse};
use crate::oauth::TokenType;
use crate::oauth::dpop::{self, CreateProofOptions};
use crate::oid4vci::types::{IssuerMetadata, NotificationRequest};
use crate::provider::{HttpClient, HttpRequest, JwtSigner, Random, Signer};

/// Options for sending a notification.
#[derive(Clone, Debug, Default)]
pub struct NotificationOptions<'a> {
    /// The access token from the issuance exchange.
    pub access_token: &'a str,

    /// The token's type.
    pub token_type: TokenType,

    /// The DPoP key used during issuance, required for `DPoP` tokens.
    pub dpop_signer: Option<&'a JwtSigner>,

    /// The freshest DPoP nonce for the issuer.
    pub dpop_nonce: Option<&'a str>,

    /// Request time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

/// POST a notification to the issuer's Notification Endpoint. The server
/// dedupes by `notification_id`, so the call is idempotent from the
/// client's standpoint.
///
/// # Errors
///
/// Returns a [`ClientError::Oauth2`] when the issuer has no notification
/// endpoint or the DPoP signer is missing, [`ClientError::Server`] for
/// structured rejections, and [`ClientError::InvalidResponse`] for
/// transport failures.
#[instrument(level = "debug", skip_all)]
pub async fn send_notification(
    provider: &(impl HttpClient + Signer + Random), issuer: &IssuerMetadata,
    request: &NotificationRequest, options: NotificationOptions<'_>,
) -> Result<(), ClientError> {
    tracing::debug!("send_notification");

    let Some(endpoint) = &issuer.notification_endpoint else {
        return Err(ClientError::Oauth2("issuer has no notification endpoint".to_string()));
    };

    let mut http = HttpRequest::json_post(endpoint.as_str(), request)
        .map_err(|e| ClientError::JsonParse(e.to_string()))?
        .header("authorization", format!("{} {}", options.token_type, options.access_token));

    if options.token_type == TokenType::DPoP {
        let Some(signer) = options.dpop_signer else {
            return Err(ClientError::Oauth2(
                "token is sender-constrained but no DPoP signer was supplied".to_string(),
            ));
        };
        let proof = dpop::create_proof(
            provider,
            signer,
            "POST",
            endpoint,
            CreateProofOptions {
                access_token: Some(options.access_token),
                nonce: options.dpop_nonce,
                now: options.now,
            },
        )
        .await
        .map_err(|e| ClientError::Oauth2(format!("issue creating DPoP proof: {e}")))?;
        http = http.header("DPoP", proof);
    }

    let response = provider.fetch(http).await.map_err(|e| ClientError::InvalidResponse {
        url: endpoint.clone(),
        reason: e.to_string(),
    })?;

    if !response.is_success() {
        let envelope: ErrorResponse = response.json().map_err(|_| {
            ClientError::InvalidResponse {
                url: endpoint.clone(),
                reason: format!("status {} without a valid error envelope", response.status),
            }
        })?;
        return Err(ClientError::Server(envelope));
    }

    Ok(())
}
