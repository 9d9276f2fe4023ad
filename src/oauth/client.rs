//! # OAuth 2.0 Client
//!
//! The wallet-side orchestrator: initiating authorization (authorization
//! challenge, PAR, or a plain redirect) and exchanging a grant for an
//! access token, with the DPoP nonce handshake handled in place.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::core::pkce;
use crate::error::{ChallengeErrorResponse, ClientError, ErrorResponse};
use crate::oauth::authorization::{
    AuthorizationChallengeRequest, AuthorizationChallengeResponse, AuthorizationFlow,
    AuthorizationRequest, PkcePair, PushedAuthorizationResponse,
};
use crate::oauth::dpop::{self, CreateProofOptions};
use crate::oauth::metadata::ServerMetadata;
use crate::oauth::token::{TokenGrantType, TokenRequest, TokenResponse};
use crate::oauth::CodeChallengeMethod;
use crate::provider::{
    ClientAuthentication, HttpClient, HttpRequest, HttpResponse, JwtSigner, OutgoingRequest,
    Random, Signer,
};

/// Options for initiating authorization with an authorization server.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationOptions {
    /// The Wallet's client identifier.
    pub client_id: String,

    /// The redirection endpoint for the authorization response.
    pub redirect_uri: Option<String>,

    /// Requested scope.
    pub scope: Option<String>,

    /// Opaque client state for the redirect round trip.
    pub state: Option<String>,

    /// Issuer state from a Credential Offer's authorization code grant.
    pub issuer_state: Option<String>,

    /// A caller-supplied PKCE code verifier. Generated when absent and the
    /// server supports PKCE.
    pub code_verifier: Option<String>,

    /// The resource the authorization is requested for.
    pub resource: Option<String>,

    /// Authorization Details, carried opaquely.
    pub authorization_details: Option<serde_json::Value>,

    /// The `auth_session` from a previous challenge error response, when
    /// resuming an authorization challenge.
    pub auth_session: Option<String>,

    /// The session issued by an `OpenID4VP` verifier after a presentation
    /// during issuance, when resuming an authorization challenge.
    pub presentation_during_issuance_session: Option<String>,
}

/// Select the PKCE method the server supports and derive a pair.
///
/// `S256` is used whenever the server advertises it, regardless of caller
/// preference; `plain` only when it is the sole advertised method; no PKCE
/// otherwise.
#[must_use]
pub fn select_pkce(
    random: &impl Random, server: &ServerMetadata, code_verifier: Option<String>,
) -> Option<PkcePair> {
    let methods = server.code_challenge_methods_supported.as_deref()?;

    let method = if methods.contains(&CodeChallengeMethod::S256) {
        CodeChallengeMethod::S256
    } else if methods.contains(&CodeChallengeMethod::Plain) {
        CodeChallengeMethod::Plain
    } else {
        return None;
    };

    let code_verifier = code_verifier.unwrap_or_else(|| pkce::code_verifier(random));
    let code_challenge = match method {
        CodeChallengeMethod::S256 => pkce::code_challenge(&code_verifier),
        CodeChallengeMethod::Plain => code_verifier.clone(),
    };

    Some(PkcePair {
        code_verifier,
        code_challenge,
        code_challenge_method: method,
    })
}

/// Initiate authorization with an authorization server.
///
/// The ordered policy is: the authorization challenge endpoint when the
/// server has one (with its `redirect_to_web` fallback), then a Pushed
/// Authorization Request when the server requires or supports PAR, then a
/// plain authorization request URL.
///
/// # Errors
///
/// Returns [`ClientError::AuthorizationChallenge`] for challenge errors
/// other than the documented fallbacks, [`ClientError::Server`] for PAR
/// rejections, and [`ClientError::Oauth2`] for local misuse such as a
/// missing authorization endpoint.
#[instrument(level = "debug", skip(provider, options))]
pub async fn initiate_authorization(
    provider: &(impl HttpClient + Random + ClientAuthentication), server: &ServerMetadata,
    options: AuthorizationOptions,
) -> Result<AuthorizationFlow, ClientError> {
    tracing::debug!("initiate_authorization");

    let pkce = select_pkce(provider, server, options.code_verifier.clone());

    if let Some(challenge_endpoint) = &server.authorization_challenge_endpoint {
        match send_challenge(provider, challenge_endpoint, server, &options, pkce.as_ref()).await? {
            ChallengeOutcome::Flow(flow) => return Ok(flow),
            ChallengeOutcome::FallThrough => {}
        }
    }

    if server.require_pushed_authorization_requests
        || server.pushed_authorization_request_endpoint.is_some()
    {
        return push_authorization_request(provider, server, &options, pkce).await;
    }

    plain_authorization_url(server, &options, pkce)
}

enum ChallengeOutcome {
    Flow(AuthorizationFlow),
    FallThrough,
}

// Drive one round of the authorization challenge exchange.
async fn send_challenge(
    provider: &(impl HttpClient + ClientAuthentication), endpoint: &str, server: &ServerMetadata,
    options: &AuthorizationOptions, pkce: Option<&PkcePair>,
) -> Result<ChallengeOutcome, ClientError> {
    let request = AuthorizationChallengeRequest {
        client_id: Some(options.client_id.clone()),
        scope: options.scope.clone(),
        code_challenge: pkce.map(|p| p.code_challenge.clone()),
        code_challenge_method: pkce.map(|p| p.code_challenge_method),
        issuer_state: options.issuer_state.clone(),
        auth_session: options.auth_session.clone(),
        presentation_during_issuance_session: options
            .presentation_during_issuance_session
            .clone(),
    };

    let response = post_form(provider, endpoint, request.to_pairs()).await?;
    if response.is_success() {
        let challenge: AuthorizationChallengeResponse = response
            .json()
            .map_err(|e| ClientError::JsonParse(e.to_string()))?;
        return Ok(ChallengeOutcome::Flow(AuthorizationFlow::AuthorizationChallenge {
            authorization_code: challenge.authorization_code,
        }));
    }

    let envelope: ChallengeErrorResponse = response.json().map_err(|_| {
        ClientError::InvalidResponse {
            url: endpoint.to_string(),
            reason: format!("status {} without a valid error envelope", response.status),
        }
    })?;

    match envelope.error.error.as_str() {
        "redirect_to_web" => match &envelope.request_uri {
            // the server pre-registered the request for us: same shape as
            // a successful PAR
            Some(request_uri) => {
                let url = request_uri_redirect(server, &options.client_id, request_uri)?;
                Ok(ChallengeOutcome::Flow(AuthorizationFlow::Oauth2Redirect {
                    url,
                    pkce: pkce.cloned(),
                }))
            }
            None => Ok(ChallengeOutcome::FallThrough),
        },
        "insufficient_authorization" => {
            if let (Some(presentation), Some(auth_session)) =
                (&envelope.presentation, &envelope.auth_session)
            {
                Ok(ChallengeOutcome::Flow(AuthorizationFlow::PresentationDuringIssuance {
                    oid4vp_request_url: presentation.clone(),
                    auth_session: auth_session.clone(),
                }))
            } else {
                Err(ClientError::AuthorizationChallenge(envelope))
            }
        }
        _ => Err(ClientError::AuthorizationChallenge(envelope)),
    }
}

// Push the authorization request and build the redirect URL from the
// returned request_uri.
async fn push_authorization_request(
    provider: &(impl HttpClient + ClientAuthentication), server: &ServerMetadata,
    options: &AuthorizationOptions, pkce: Option<PkcePair>,
) -> Result<AuthorizationFlow, ClientError> {
    let Some(par_endpoint) = &server.pushed_authorization_request_endpoint else {
        return Err(ClientError::Oauth2(
            "server requires pushed authorization requests but has no endpoint".to_string(),
        ));
    };

    let request = authorization_request(options, pkce.as_ref());
    let pairs = request.to_pairs().map_err(|e| ClientError::Validation(e.to_string()))?;

    let response = post_form(provider, par_endpoint, pairs).await?;
    if !response.is_success() {
        let envelope: ErrorResponse = response.json().map_err(|_| {
            ClientError::InvalidResponse {
                url: par_endpoint.to_string(),
                reason: format!("status {} without a valid error envelope", response.status),
            }
        })?;
        return Err(ClientError::Server(envelope));
    }

    let pushed: PushedAuthorizationResponse =
        response.json().map_err(|e| ClientError::JsonParse(e.to_string()))?;
    if pushed.request_uri.is_empty() {
        return Err(ClientError::Validation("PAR response has no `request_uri`".to_string()));
    }

    let url = request_uri_redirect(server, &options.client_id, &pushed.request_uri)?;
    Ok(AuthorizationFlow::Oauth2Redirect { url, pkce })
}

// Assemble a plain authorization request URL carrying every parameter.
fn plain_authorization_url(
    server: &ServerMetadata, options: &AuthorizationOptions, pkce: Option<PkcePair>,
) -> Result<AuthorizationFlow, ClientError> {
    let Some(authorization_endpoint) = &server.authorization_endpoint else {
        return Err(ClientError::Oauth2(
            "authorization server has no authorization endpoint".to_string(),
        ));
    };

    let request = authorization_request(options, pkce.as_ref());
    let pairs = request.to_pairs().map_err(|e| ClientError::Validation(e.to_string()))?;
    let query = serde_urlencoded::to_string(&pairs)
        .map_err(|e| ClientError::Validation(e.to_string()))?;

    Ok(AuthorizationFlow::Oauth2Redirect {
        url: format!("{authorization_endpoint}?{query}"),
        pkce,
    })
}

fn authorization_request(
    options: &AuthorizationOptions, pkce: Option<&PkcePair>,
) -> AuthorizationRequest {
    AuthorizationRequest {
        response_type: "code".to_string(),
        client_id: options.client_id.clone(),
        redirect_uri: options.redirect_uri.clone(),
        state: options.state.clone(),
        scope: options.scope.clone(),
        code_challenge: pkce.map(|p| p.code_challenge.clone()),
        code_challenge_method: pkce.map(|p| p.code_challenge_method),
        issuer_state: options.issuer_state.clone(),
        resource: options.resource.clone(),
        authorization_details: options.authorization_details.clone(),
    }
}

fn request_uri_redirect(
    server: &ServerMetadata, client_id: &str, request_uri: &str,
) -> Result<String, ClientError> {
    let Some(authorization_endpoint) = &server.authorization_endpoint else {
        return Err(ClientError::Oauth2(
            "authorization server has no authorization endpoint".to_string(),
        ));
    };
    let query = serde_urlencoded::to_string([
        ("request_uri", request_uri),
        ("client_id", client_id),
    ])
    .map_err(|e| ClientError::Validation(e.to_string()))?;
    Ok(format!("{authorization_endpoint}?{query}"))
}

// POST a form with client authentication applied.
async fn post_form(
    provider: &(impl HttpClient + ClientAuthentication), endpoint: &str,
    form: Vec<(String, String)>,
) -> Result<HttpResponse, ClientError> {
    let mut outgoing = OutgoingRequest {
        endpoint: endpoint.to_string(),
        form,
        headers: vec![],
    };
    provider
        .authenticate(&mut outgoing)
        .await
        .map_err(|e| ClientError::Oauth2(format!("issue authenticating client: {e}")))?;

    let mut request = HttpRequest::form_post(outgoing.endpoint.as_str(), &outgoing.form);
    for (name, value) in outgoing.headers {
        request = request.header(name, value);
    }
    provider.fetch(request).await.map_err(|e| ClientError::InvalidResponse {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })
}

/// Options for a token request.
#[derive(Clone, Debug, Default)]
pub struct TokenOptions<'a> {
    /// The DPoP key to sender-constrain the token with. When set, every
    /// token request carries a DPoP proof and the same key must be used on
    /// subsequent resource requests.
    pub dpop_signer: Option<&'a JwtSigner>,

    /// A DPoP nonce previously issued by this server.
    pub dpop_nonce: Option<&'a str>,

    /// Request time. Defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

/// The result of a token request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenResult {
    /// The token endpoint's response.
    pub token_response: TokenResponse,

    /// The freshest DPoP nonce for this server, to carry into subsequent
    /// requests.
    pub dpop_nonce: Option<String>,

    /// The issuer identifier of the server that issued the token.
    pub authorization_server: String,
}

/// Exchange a pre-authorized code for an access token.
///
/// # Errors
///
/// See [`retrieve_token`].
pub async fn retrieve_pre_authorized_code_token(
    provider: &(impl HttpClient + Signer + Random + ClientAuthentication),
    server: &ServerMetadata, request: TokenRequest, options: TokenOptions<'_>,
) -> Result<TokenResult, ClientError> {
    if !matches!(request.grant_type, TokenGrantType::PreAuthorizedCode { .. }) {
        return Err(ClientError::Oauth2(
            "request does not carry a pre-authorized code grant".to_string(),
        ));
    }
    retrieve_token(provider, server, &request, options).await
}

/// Exchange an authorization code (with its PKCE verifier) for an access
/// token.
///
/// # Errors
///
/// See [`retrieve_token`].
pub async fn retrieve_authorization_code_token(
    provider: &(impl HttpClient + Signer + Random + ClientAuthentication),
    server: &ServerMetadata, request: TokenRequest, options: TokenOptions<'_>,
) -> Result<TokenResult, ClientError> {
    if !matches!(request.grant_type, TokenGrantType::AuthorizationCode { .. }) {
        return Err(ClientError::Oauth2(
            "request does not carry an authorization code grant".to_string(),
        ));
    }
    retrieve_token(provider, server, &request, options).await
}

/// POST a token request, handling the DPoP nonce handshake: when the
/// server answers `400 use_dpop_nonce` with a `DPoP-Nonce` header, the
/// proof is rebuilt with that nonce and the request retried exactly once.
///
/// # Errors
///
/// Returns [`ClientError::Server`] for structured rejections (including a
/// second `use_dpop_nonce`), [`ClientError::InvalidResponse`] for
/// transport-level failures, and [`ClientError::JsonParse`] when a success
/// body is not valid JSON.
#[instrument(level = "debug", skip_all)]
pub async fn retrieve_token(
    provider: &(impl HttpClient + Signer + Random + ClientAuthentication),
    server: &ServerMetadata, request: &TokenRequest, options: TokenOptions<'_>,
) -> Result<TokenResult, ClientError> {
    tracing::debug!("retrieve_token");

    let form = request.form_encode().map_err(|e| ClientError::Validation(e.to_string()))?;
    let mut outgoing = OutgoingRequest {
        endpoint: server.token_endpoint.clone(),
        form,
        headers: vec![],
    };
    provider
        .authenticate(&mut outgoing)
        .await
        .map_err(|e| ClientError::Oauth2(format!("issue authenticating client: {e}")))?;

    let mut dpop_nonce = options.dpop_nonce.map(ToString::to_string);
    let mut retried = false;

    loop {
        let mut http = HttpRequest::form_post(outgoing.endpoint.as_str(), &outgoing.form);
        for (name, value) in &outgoing.headers {
            http = http.header(name.clone(), value.clone());
        }
        if let Some(signer) = options.dpop_signer {
            let proof = dpop::create_proof(
                provider,
                signer,
                "POST",
                &outgoing.endpoint,
                CreateProofOptions {
                    access_token: None,
                    nonce: dpop_nonce.as_deref(),
                    now: options.now,
                },
            )
            .await
            .map_err(|e| ClientError::Oauth2(format!("issue creating DPoP proof: {e}")))?;
            http = http.header("DPoP", proof);
        }

        let response =
            provider.fetch(http).await.map_err(|e| ClientError::InvalidResponse {
                url: outgoing.endpoint.clone(),
                reason: e.to_string(),
            })?;

        if response.is_success() {
            let token_response: TokenResponse =
                response.json().map_err(|e| ClientError::JsonParse(e.to_string()))?;
            if let Some(fresh) = response.header("DPoP-Nonce") {
                dpop_nonce = Some(fresh.to_string());
            }
            return Ok(TokenResult {
                token_response,
                dpop_nonce,
                authorization_server: server.issuer.clone(),
            });
        }

        let envelope: ErrorResponse = response.json().map_err(|_| {
            ClientError::InvalidResponse {
                url: outgoing.endpoint.clone(),
                reason: format!("status {} without a valid error envelope", response.status),
            }
        })?;

        if envelope.error == "use_dpop_nonce"
            && !retried
            && options.dpop_signer.is_some()
            && let Some(fresh) = response.header("DPoP-Nonce")
        {
            tracing::debug!("retrying token request with DPoP nonce");
            dpop_nonce = Some(fresh.to_string());
            retried = true;
            continue;
        }

        return Err(ClientError::Server(envelope));
    }
}
