//! # Resource Request Verification
//!
//! Verification of access tokens presented to a resource server (such as
//! the credential endpoint): scheme checks, JWT verification against the
//! authorization server's published JWKS, audience and lifetime checks,
//! and the DPoP sender-constraint.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::Result;
use crate::core::strings::{canonicalize_url, constant_time_eq};
use crate::error::{Error, invalid};
use crate::jose::jwk::{Jwks, PublicKeyJwk};
use crate::jose::jws;
use crate::oauth::dpop::{self, VerifyProofOptions};
use crate::oauth::metadata::ServerMetadata;
use crate::oauth::server::AccessTokenClaims;
use crate::oauth::TokenType;
use crate::provider::{HttpClient, HttpRequest, Verifier, VerifyJwtInput};

/// Default tolerance for `iat` clock skew, in seconds.
pub const DEFAULT_CLOCK_SKEW: i64 = 60;

/// An incoming resource request to be verified.
#[derive(Clone, Debug, Default)]
pub struct ResourceRequest<'a> {
    /// The HTTP method of the request.
    pub method: &'a str,

    /// The URL the request arrived at.
    pub url: &'a str,

    /// The `Authorization` header value, e.g. `Bearer eyJ...` or
    /// `DPoP eyJ...`.
    pub authorization: &'a str,

    /// The `DPoP` header value, when present.
    pub dpop_proof: Option<&'a str>,
}

/// The verification policy of the resource server.
#[derive(Clone, Debug, Default)]
pub struct ResourceOptions<'a> {
    /// The authorization servers whose tokens are accepted. The token's
    /// `iss` must match one of them by issuer identifier.
    pub authorization_servers: &'a [ServerMetadata],

    /// This resource server's identifier; the token's `aud` must equal it.
    pub resource_server: &'a str,

    /// The authentication schemes accepted on this endpoint.
    pub allowed_schemes: &'a [TokenType],

    /// The server's current DPoP nonce for this client, when a nonce
    /// policy is in force on resource requests.
    pub dpop_nonce: Option<&'a str>,

    /// Verification time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,

    /// Tolerance for clock skew in seconds. Defaults to
    /// [`DEFAULT_CLOCK_SKEW`].
    pub clock_skew: Option<i64>,
}

/// A verified resource request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifiedResourceRequest {
    /// The verified access token claims.
    pub token_claims: AccessTokenClaims,

    /// The DPoP key the request proved possession of, when the DPoP scheme
    /// was used.
    pub dpop_jwk: Option<PublicKeyJwk>,
}

/// Verify an incoming resource request.
///
/// The access token is decoded to discover its issuer, verified against
/// that server's published JWKS, and checked for audience and lifetime.
/// When the `DPoP` scheme is used, the accompanying proof must bind to the
/// request method and URL, hash the access token into `ath`, and prove
/// possession of the key the token's `cnf.jkt` names. A `Bearer` token
/// carrying `cnf.jkt` is rejected: it is sender-constrained and must only
/// be accepted with its proof.
///
/// # Errors
///
/// Returns `invalid_request` for malformed headers, `access_denied` for
/// token verification failures, and `invalid_dpop_proof` for DPoP binding
/// failures.
#[instrument(level = "debug", skip_all)]
pub async fn verify_resource_request(
    provider: &(impl HttpClient + Verifier), request: ResourceRequest<'_>,
    options: ResourceOptions<'_>,
) -> Result<VerifiedResourceRequest> {
    tracing::debug!("verify_resource_request");

    // authorization scheme
    let (scheme, access_token) = request
        .authorization
        .split_once(' ')
        .ok_or_else(|| invalid!("malformed authorization header"))?;
    let scheme = match scheme {
        "Bearer" => TokenType::Bearer,
        "DPoP" => TokenType::DPoP,
        _ => return Err(invalid!("unsupported authorization scheme: {scheme}")),
    };
    if !options.allowed_schemes.contains(&scheme) {
        return Err(invalid!("authorization scheme {scheme} is not accepted"));
    }

    // decode the token to discover its issuer
    let (header_value, claims_value, _) = jws::decode_parts(access_token)
        .map_err(|e| Error::AccessDenied(format!("issue decoding access token: {e}")))?;
    let claims: AccessTokenClaims = serde_json::from_value(claims_value.clone())
        .map_err(|e| Error::AccessDenied(format!("malformed access token: {e}")))?;

    let issuer = options
        .authorization_servers
        .iter()
        .find(|server| canonicalize_url(&server.issuer) == canonicalize_url(&claims.iss))
        .ok_or_else(|| Error::AccessDenied("unknown token issuer".to_string()))?;

    // signature, against the issuer's published keys
    let kid = header_value.get("kid").and_then(serde_json::Value::as_str);
    let jwk = fetch_jwks_key(provider, issuer, kid).await?;
    let result = provider
        .verify_jwt(VerifyJwtInput {
            compact: access_token,
            header: &header_value,
            claims: &claims_value,
            expected_jwk: Some(&jwk),
        })
        .await
        .map_err(|e| Error::AccessDenied(format!("issue verifying access token: {e}")))?;
    if !result.valid {
        return Err(Error::AccessDenied("access token signature does not verify".to_string()));
    }

    // audience and lifetime
    if claims.aud != options.resource_server {
        return Err(Error::AccessDenied("access token audience mismatch".to_string()));
    }
    let now = options.now.unwrap_or_else(Utc::now).timestamp();
    let skew = options.clock_skew.unwrap_or(DEFAULT_CLOCK_SKEW);
    if claims.exp <= now {
        return Err(Error::AccessDenied("access token has expired".to_string()));
    }
    if claims.iat > now + skew {
        return Err(Error::AccessDenied("access token issued in the future".to_string()));
    }

    // sender-constraint
    match scheme {
        TokenType::Bearer => {
            if claims.cnf.is_some() {
                return Err(Error::AccessDenied(
                    "sender-constrained token presented as Bearer".to_string(),
                ));
            }
            Ok(VerifiedResourceRequest {
                token_claims: claims,
                dpop_jwk: None,
            })
        }
        TokenType::DPoP => {
            let Some(proof) = request.dpop_proof else {
                return Err(Error::InvalidDpopProof("DPoP proof is required".to_string()));
            };
            let Some(cnf) = &claims.cnf else {
                return Err(Error::InvalidDpopProof(
                    "access token has no DPoP binding".to_string(),
                ));
            };

            let verified = dpop::verify_proof(
                provider,
                proof,
                VerifyProofOptions {
                    method: request.method,
                    url: request.url,
                    access_token: Some(access_token),
                    expected_nonce: options.dpop_nonce,
                    allowed_algs: &[],
                    now: options.now,
                    clock_skew: options.clock_skew,
                },
            )
            .await?;

            if !constant_time_eq(verified.jkt.as_bytes(), cnf.jkt.as_bytes()) {
                return Err(Error::InvalidDpopProof(
                    "DPoP key does not match token binding".to_string(),
                ));
            }

            Ok(VerifiedResourceRequest {
                token_claims: claims,
                dpop_jwk: Some(verified.jwk),
            })
        }
    }
}

// Fetch the issuer's JWKS and select the verification key.
async fn fetch_jwks_key(
    provider: &impl HttpClient, issuer: &ServerMetadata, kid: Option<&str>,
) -> Result<PublicKeyJwk> {
    let Some(jwks_uri) = &issuer.jwks_uri else {
        return Err(Error::AccessDenied("token issuer publishes no JWKS".to_string()));
    };
    let response = provider
        .fetch(HttpRequest::get(jwks_uri.as_str()))
        .await
        .map_err(|e| Error::AccessDenied(format!("issue fetching JWKS: {e}")))?;
    if !response.is_success() {
        return Err(Error::AccessDenied(format!(
            "JWKS request returned status {}",
            response.status
        )));
    }
    let jwks: Jwks = response
        .json()
        .map_err(|e| Error::AccessDenied(format!("malformed JWKS: {e}")))?;

    jwks.find(kid)
        .cloned()
        .ok_or_else(|| Error::AccessDenied("no matching key in JWKS".to_string()))
}
