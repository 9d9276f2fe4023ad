//! # OAuth 2.0 Server
//!
//! The authorization-server side of the token endpoint: parsing and
//! verifying token requests, and minting JWT access tokens ([RFC 9068]),
//! optionally bound to a DPoP key.
//!
//! The server holds the expected grant state (issued codes, transaction
//! codes, PKCE challenges, DPoP nonces) out of band and supplies it to the
//! verification operations; the library compares in constant time and
//! never stores anything.
//!
//! [RFC 9068]: https://www.rfc-editor.org/rfc/rfc9068

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::Result;
use crate::core::strings::constant_time_eq;
use crate::core::{generate, pkce, urlencode};
use crate::error::{Error, invalid, server};
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::{Type, jws};
use crate::oauth::dpop::{self, VerifyProofOptions};
use crate::oauth::token::{TokenGrantType, TokenRequest, TokenResponse};
use crate::oauth::{CodeChallengeMethod, TokenType};
use crate::provider::{JwtSigner, Random, Signer, Verifier};

/// A token request parsed from an incoming POST, ready for verification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedTokenRequest {
    /// The decoded request.
    pub request: TokenRequest,

    /// The compact DPoP proof from the `DPoP` header, shape-checked but
    /// not yet verified.
    pub dpop_proof: Option<String>,
}

/// Parse and shape-check an incoming token request.
///
/// # Errors
///
/// Returns `invalid_request` for a malformed body, `invalid_grant` /
/// `unsupported_grant_type` for a missing or unknown grant, and
/// `invalid_dpop_proof` when a `DPoP` header is present but not a
/// well-formed `dpop+jwt`.
#[instrument(level = "debug", skip_all)]
pub fn parse_token_request(body: &str, dpop_header: Option<&str>) -> Result<ParsedTokenRequest> {
    tracing::debug!("parse_token_request");

    let form = urlencode::parse(body).map_err(|e| invalid!("malformed request body: {e}"))?;

    let grant = form.iter().find(|(name, _)| name == "grant_type").map(|(_, value)| value);
    let request = match grant.map(String::as_str) {
        Some("authorization_code" | "urn:ietf:params:oauth:grant-type:pre-authorized_code") => {
            TokenRequest::form_decode(&form)
                .map_err(|e| Error::InvalidGrant(format!("malformed grant: {e}")))?
        }
        Some(grant) => {
            return Err(Error::UnsupportedGrantType(format!("unsupported grant type: {grant}")));
        }
        None => return Err(Error::InvalidGrant("no grant in request".to_string())),
    };

    let dpop_proof = match dpop_header {
        Some(proof) => {
            let (header, _, _) = jws::decode_parts(proof)
                .map_err(|e| Error::InvalidDpopProof(format!("malformed DPoP header: {e}")))?;
            if header.get("typ").and_then(serde_json::Value::as_str) != Some("dpop+jwt") {
                return Err(Error::InvalidDpopProof("DPoP `typ` is not dpop+jwt".to_string()));
            }
            Some(proof.to_string())
        }
        None => None,
    };

    Ok(ParsedTokenRequest { request, dpop_proof })
}

/// The DPoP policy in force for a token request.
#[derive(Clone, Debug, Default)]
pub struct DpopPolicy<'a> {
    /// Whether a DPoP proof is required.
    pub required: bool,

    /// The server's current DPoP nonce for this client, when a nonce
    /// policy is in force.
    pub nonce: Option<&'a str>,

    /// Acceptable proof signature algorithms.
    pub allowed_algs: &'a [String],
}

/// The grant state the server recorded when it issued a pre-authorized
/// code.
#[derive(Clone, Debug, Default)]
pub struct ExpectedPreAuthorizedCode<'a> {
    /// The issued pre-authorized code.
    pub pre_authorized_code: &'a str,

    /// The Transaction Code the End-User was given, when one was required.
    pub tx_code: Option<&'a str>,
}

/// The grant state the server recorded when it issued an authorization
/// code.
#[derive(Clone, Debug, Default)]
pub struct ExpectedAuthorizationCode<'a> {
    /// The issued authorization code.
    pub code: &'a str,

    /// The PKCE challenge from the authorization request, when PKCE was
    /// used.
    pub code_challenge: Option<&'a str>,

    /// The challenge method from the authorization request.
    pub code_challenge_method: CodeChallengeMethod,

    /// The redirect URI from the authorization request, when one was
    /// present.
    pub redirect_uri: Option<&'a str>,
}

/// Common context for token request verification.
#[derive(Clone, Debug, Default)]
pub struct TokenRequestContext<'a> {
    /// The HTTP method the request arrived with, for DPoP binding.
    pub method: &'a str,

    /// The token endpoint URL the request arrived at, for DPoP binding.
    pub endpoint: &'a str,

    /// The DPoP policy in force.
    pub dpop: DpopPolicy<'a>,

    /// Verification time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,

    /// Tolerance for DPoP `iat` skew in seconds.
    pub clock_skew: Option<i64>,
}

/// The outcome of token request verification: the key material to bind
/// the access token to, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifiedTokenRequest {
    /// The DPoP key the request proved possession of.
    pub dpop_jwk: Option<PublicKeyJwk>,

    /// The RFC 7638 thumbprint of that key, to mint into the access token
    /// as `cnf.jkt`.
    pub dpop_jkt: Option<String>,
}

/// Verify a pre-authorized code token request against the recorded grant
/// state. Code and transaction code comparisons are constant time.
///
/// # Errors
///
/// Returns `invalid_grant` for a code or transaction code mismatch, and
/// the DPoP errors of [`dpop::verify_proof`].
#[instrument(level = "debug", skip_all)]
pub async fn verify_pre_authorized_code_token_request(
    provider: &impl Verifier, parsed: &ParsedTokenRequest,
    expected: ExpectedPreAuthorizedCode<'_>, ctx: TokenRequestContext<'_>,
) -> Result<VerifiedTokenRequest> {
    tracing::debug!("verify_pre_authorized_code_token_request");

    let TokenGrantType::PreAuthorizedCode {
        pre_authorized_code,
        tx_code,
        user_pin,
    } = &parsed.request.grant_type
    else {
        return Err(Error::InvalidGrant("not a pre-authorized code grant".to_string()));
    };

    if !constant_time_eq(
        pre_authorized_code.as_bytes(),
        expected.pre_authorized_code.as_bytes(),
    ) {
        return Err(Error::InvalidGrant("pre-authorized code is invalid".to_string()));
    }

    // either spelling of the transaction code satisfies the check
    let presented = tx_code.as_deref().or(user_pin.as_deref());
    match (expected.tx_code, presented) {
        (None, _) => {}
        (Some(expected), Some(presented)) => {
            if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
                return Err(Error::InvalidGrant("invalid `tx_code` provided".to_string()));
            }
        }
        (Some(_), None) => {
            return Err(Error::InvalidGrant("`tx_code` is required".to_string()));
        }
    }

    verify_request_dpop(provider, parsed, &ctx).await
}

/// Verify an authorization code token request against the recorded grant
/// state. The code comparison and PKCE verifier check are constant time.
///
/// # Errors
///
/// Returns `invalid_grant` for code or `redirect_uri` mismatches,
/// `access_denied` for PKCE failures, and the DPoP errors of
/// [`dpop::verify_proof`].
#[instrument(level = "debug", skip_all)]
pub async fn verify_authorization_code_token_request(
    provider: &impl Verifier, parsed: &ParsedTokenRequest,
    expected: ExpectedAuthorizationCode<'_>, ctx: TokenRequestContext<'_>,
) -> Result<VerifiedTokenRequest> {
    tracing::debug!("verify_authorization_code_token_request");

    let TokenGrantType::AuthorizationCode {
        code,
        redirect_uri,
        code_verifier,
    } = &parsed.request.grant_type
    else {
        return Err(Error::InvalidGrant("not an authorization code grant".to_string()));
    };

    if !constant_time_eq(code.as_bytes(), expected.code.as_bytes()) {
        return Err(Error::InvalidGrant("authorization code is invalid".to_string()));
    }

    // redirect_uri must match the authorization request: both absent or
    // both identical
    if redirect_uri.as_deref() != expected.redirect_uri {
        return Err(Error::InvalidGrant(
            "`redirect_uri` differs from authorized one".to_string(),
        ));
    }

    if let Some(code_challenge) = expected.code_challenge {
        let Some(verifier) = code_verifier else {
            return Err(Error::AccessDenied("`code_verifier` is missing".to_string()));
        };
        if !pkce::verify(verifier, code_challenge, expected.code_challenge_method) {
            return Err(Error::AccessDenied("`code_verifier` is invalid".to_string()));
        }
    }

    verify_request_dpop(provider, parsed, &ctx).await
}

// Verify the request's DPoP proof against the policy in force.
async fn verify_request_dpop(
    provider: &impl Verifier, parsed: &ParsedTokenRequest, ctx: &TokenRequestContext<'_>,
) -> Result<VerifiedTokenRequest> {
    let Some(proof) = &parsed.dpop_proof else {
        if ctx.dpop.required {
            return Err(Error::InvalidDpopProof("DPoP proof is required".to_string()));
        }
        return Ok(VerifiedTokenRequest::default());
    };

    let verified = dpop::verify_proof(
        provider,
        proof,
        VerifyProofOptions {
            method: ctx.method,
            url: ctx.endpoint,
            access_token: None,
            expected_nonce: ctx.dpop.nonce,
            allowed_algs: ctx.dpop.allowed_algs,
            now: ctx.now,
            clock_skew: ctx.clock_skew,
        },
    )
    .await?;

    Ok(VerifiedTokenRequest {
        dpop_jwk: Some(verified.jwk),
        dpop_jkt: Some(verified.jkt),
    })
}

/// JWT access token claims ([RFC 9068]).
///
/// [RFC 9068]: https://www.rfc-editor.org/rfc/rfc9068
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// The authorization server's issuer identifier.
    pub iss: String,

    /// The resource server the token is intended for.
    pub aud: String,

    /// The subject the token was issued to.
    pub sub: String,

    /// Issue time, as unix seconds.
    pub iat: i64,

    /// Expiry time, as unix seconds.
    pub exp: i64,

    /// Unique token identifier, for revocation and replay tracking.
    pub jti: String,

    /// The client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// The granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Confirmation claim binding the token to key material.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<Cnf>,
}

/// The confirmation claim of a sender-constrained token ([RFC 9449] §6.1).
///
/// [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Cnf {
    /// The RFC 7638 thumbprint of the DPoP key the token is bound to.
    pub jkt: String,
}

/// Options for minting an access token.
#[derive(Clone, Debug, Default)]
pub struct AccessTokenOptions<'a> {
    /// The authorization server's issuer identifier.
    pub issuer: &'a str,

    /// The resource server the token is intended for.
    pub audience: &'a str,

    /// The subject the token is issued to.
    pub subject: &'a str,

    /// Token lifetime in seconds.
    pub expires_in: i64,

    /// The client the token is issued to.
    pub client_id: Option<&'a str>,

    /// The granted scope.
    pub scope: Option<&'a str>,

    /// The DPoP key thumbprint to bind the token to, from
    /// [`VerifiedTokenRequest::dpop_jkt`].
    pub dpop_jkt: Option<&'a str>,

    /// Issue time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

/// Mint a JWT access token with header `typ` of `at+jwt`.
///
/// # Errors
///
/// Returns `server_error` when signing fails.
#[instrument(level = "debug", skip_all)]
pub async fn create_access_token_jwt(
    provider: &(impl Signer + Random), signer: &JwtSigner, options: AccessTokenOptions<'_>,
) -> Result<(String, AccessTokenClaims)> {
    tracing::debug!("create_access_token_jwt");

    let iat = options.now.unwrap_or_else(Utc::now).timestamp();
    let claims = AccessTokenClaims {
        iss: options.issuer.to_string(),
        aud: options.audience.to_string(),
        sub: options.subject.to_string(),
        iat,
        exp: iat + options.expires_in,
        jti: generate::jti(provider),
        client_id: options.client_id.map(ToString::to_string),
        scope: options.scope.map(ToString::to_string),
        cnf: options.dpop_jkt.map(|jkt| Cnf { jkt: jkt.to_string() }),
    };

    let jwt = jws::encode(provider, signer, Type::AccessTokenJwt, &claims)
        .await
        .map_err(|e| server!("issue signing access token: {e}"))?;

    Ok((jwt, claims))
}

/// Assemble the token response for a minted access token. The token type
/// is `DPoP` when the token carries a `cnf.jkt` binding, `Bearer`
/// otherwise.
#[must_use]
pub fn create_token_response(
    access_token: String, claims: &AccessTokenClaims, c_nonce: Option<String>,
    c_nonce_expires_in: Option<i64>,
) -> TokenResponse {
    TokenResponse {
        access_token,
        token_type: if claims.cnf.is_some() { TokenType::DPoP } else { TokenType::Bearer },
        expires_in: claims.exp - claims.iat,
        scope: claims.scope.clone(),
        c_nonce,
        c_nonce_expires_in,
        authorization_details: None,
    }
}
