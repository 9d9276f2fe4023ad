//! # Credential Request
//!
//! The wallet side of the Credential Endpoint: creating the
//! proof-of-possession JWT, sending the request with its access token (and
//! DPoP proof when the token is sender-constrained), and acquiring fresh
//! `c_nonce` values from the Nonce Endpoint.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::error::{ClientError, ErrorResponse};
use crate::oauth::TokenType;
use crate::oauth::dpop::{self, CreateProofOptions};
use crate::oid4vci::types::{
    CredentialRequest, CredentialResponse, IssuerMetadata, NonceResponse, ProofClaims,
};
use crate::jose::{Type, jws};
use crate::provider::{HttpClient, HttpRequest, JwtSigner, Random, Signer};

/// Options for creating a proof-of-possession JWT.
#[derive(Clone, Debug, Default)]
pub struct ProofOptions<'a> {
    /// The Wallet's `client_id`, set as the proof's `iss` claim. Required
    /// for the authorization code flow with a public client; omitted in
    /// the anonymous pre-authorized flow. Opt in per call: some
    /// authorization servers expect it even for pre-authorized exchanges
    /// when client attestation is in use.
    pub client_id: Option<&'a str>,

    /// The `c_nonce` to consume, from the token response, the Nonce
    /// Endpoint, or a credential-response error.
    pub c_nonce: Option<&'a str>,

    /// Proof creation time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

/// Create the proof-of-possession JWT for a Credential Request: header
/// `typ` of `openid4vci-proof+jwt` with exactly one of `kid` / `jwk` /
/// `x5c` per the signer variant, and claims binding the proof to the
/// credential issuer and the current `c_nonce`.
///
/// # Errors
///
/// Returns a [`ClientError::Oauth2`] when signing fails.
pub async fn create_proof_jwt(
    provider: &impl Signer, signer: &JwtSigner, credential_issuer: &str,
    options: ProofOptions<'_>,
) -> Result<String, ClientError> {
    let claims = ProofClaims {
        iss: options.client_id.map(ToString::to_string),
        aud: credential_issuer.to_string(),
        iat: options.now.unwrap_or_else(Utc::now).timestamp(),
        nonce: options.c_nonce.map(ToString::to_string),
    };

    jws::encode(provider, signer, Type::Openid4VciProofJwt, &claims)
        .await
        .map_err(|e| ClientError::Oauth2(format!("issue signing proof: {e}")))
}

/// Options for sending a Credential Request.
#[derive(Clone, Debug, Default)]
pub struct CredentialRequestOptions<'a> {
    /// The access token from the token exchange.
    pub access_token: &'a str,

    /// The token's type: `Bearer`, or `DPoP` when sender-constrained.
    pub token_type: TokenType,

    /// The DPoP key used at the token endpoint. Required when the token
    /// type is `DPoP`; the proof carries the token's `ath` hash.
    pub dpop_signer: Option<&'a JwtSigner>,

    /// The freshest DPoP nonce for the issuer.
    pub dpop_nonce: Option<&'a str>,

    /// Request time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

/// The result of a credential request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialResult {
    /// The issuer's response.
    pub credential_response: CredentialResponse,

    /// The freshest DPoP nonce for the issuer, to carry into subsequent
    /// requests.
    pub dpop_nonce: Option<String>,
}

/// POST a Credential Request to the issuer's credential endpoint.
///
/// # Errors
///
/// Returns [`ClientError::Server`] for structured rejections (the envelope
/// may carry a fresh `c_nonce` for a proof retry),
/// [`ClientError::InvalidResponse`] for transport failures, and
/// [`ClientError::Oauth2`] when the token is sender-constrained but no
/// DPoP signer was supplied.
#[instrument(level = "debug", skip_all)]
pub async fn request_credential(
    provider: &(impl HttpClient + Signer + Random), issuer: &IssuerMetadata,
    request: &CredentialRequest, options: CredentialRequestOptions<'_>,
) -> Result<CredentialResult, ClientError> {
    tracing::debug!("request_credential");

    let endpoint = &issuer.credential_endpoint;
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

    let dpop_nonce = response
        .header("DPoP-Nonce")
        .map(ToString::to_string)
        .or_else(|| options.dpop_nonce.map(ToString::to_string));

    if !response.is_success() {
        let envelope: ErrorResponse = response.json().map_err(|_| {
            ClientError::InvalidResponse {
                url: endpoint.clone(),
                reason: format!("status {} without a valid error envelope", response.status),
            }
        })?;
        return Err(ClientError::Server(envelope));
    }

    let credential_response: CredentialResponse =
        response.json().map_err(|e| ClientError::JsonParse(e.to_string()))?;

    Ok(CredentialResult {
        credential_response,
        dpop_nonce,
    })
}

/// Acquire a fresh `c_nonce` from the issuer's Nonce Endpoint.
///
/// # Errors
///
/// Returns a [`ClientError::Oauth2`] when the issuer has no nonce
/// endpoint, or the response errors of [`request_credential`].
#[instrument(level = "debug", skip_all)]
pub async fn request_nonce(
    provider: &impl HttpClient, issuer: &IssuerMetadata,
) -> Result<NonceResponse, ClientError> {
    tracing::debug!("request_nonce");

    let Some(endpoint) = &issuer.nonce_endpoint else {
        return Err(ClientError::Oauth2("issuer has no nonce endpoint".to_string()));
    };

    let http = HttpRequest {
        method: "POST".to_string(),
        url: endpoint.clone(),
        headers: vec![("accept".to_string(), "application/json".to_string())],
        body: None,
    };
    let response = provider.fetch(http).await.map_err(|e| ClientError::InvalidResponse {
        url: endpoint.clone(),
        reason: e.to_string(),
    })?;
    if !response.is_success() {
        return Err(ClientError::InvalidResponse {
            url: endpoint.clone(),
            reason: format!("status {}", response.status),
        });
    }
    response.json().map_err(|e| ClientError::JsonParse(e.to_string()))
}
