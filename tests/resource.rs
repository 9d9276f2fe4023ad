//! Resource Request Verification and DPoP Nonce Handshake Tests

mod utils;

use chrono::{TimeZone, Utc};
use oid4vci::{ClientError, Error};
use oid4vci::oauth::client::{self, TokenOptions};
use oid4vci::oauth::dpop::{self, CreateProofOptions, VerifyProofOptions};
use oid4vci::oauth::metadata::ServerMetadata;
use oid4vci::oauth::resource::{self, ResourceOptions, ResourceRequest};
use oid4vci::oauth::server::{self, AccessTokenOptions};
use oid4vci::oauth::TokenType;
use oid4vci::jose::Jwks;
use serde_json::json;
use utils::{TestProvider, json_response, json_response_with_headers, test_jwk, test_signer};

const AS: &str = "https://as.example.com";
const RS: &str = "https://iss.example.com";

fn as_metadata() -> ServerMetadata {
    serde_json::from_value(json!({
        "issuer": AS,
        "token_endpoint": format!("{AS}/token"),
        "jwks_uri": format!("{AS}/jwks"),
        "dpop_signing_alg_values_supported": ["ES256"],
    }))
    .expect("metadata is well-formed")
}

// Mint a DPoP-bound access token signed by the authorization server.
async fn mint_token(provider: &TestProvider, jkt: Option<&str>) -> String {
    let as_signer = test_signer("as-signing-key");
    let (jwt, _) = server::create_access_token_jwt(
        provider,
        &as_signer,
        AccessTokenOptions {
            issuer: AS,
            audience: RS,
            subject: "holder-1",
            expires_in: 300,
            dpop_jkt: jkt,
            ..AccessTokenOptions::default()
        },
    )
    .await
    .expect("token should mint");
    jwt
}

fn respond_jwks(provider: &TestProvider) {
    provider.respond(
        &format!("{AS}/jwks"),
        json_response(200, &Jwks { keys: vec![test_jwk("as-signing-key")] }),
    );
}

// Scenario: a DPoP proof from a key other than the one the token is bound
// to is rejected with invalid_dpop_proof.
#[tokio::test]
async fn mismatched_dpop_binding_rejected() {
    let provider = TestProvider::new();
    respond_jwks(&provider);

    let bound_jkt = test_jwk("key-one").thumbprint().expect("thumbprint");
    let token = mint_token(&provider, Some(&bound_jkt)).await;

    // proof from a different key
    let other_key = test_signer("key-two");
    let url = format!("{RS}/credential");
    let proof = dpop::create_proof(
        &provider,
        &other_key,
        "POST",
        &url,
        CreateProofOptions {
            access_token: Some(&token),
            ..CreateProofOptions::default()
        },
    )
    .await
    .expect("proof should sign");

    let err = resource::verify_resource_request(
        &provider,
        ResourceRequest {
            method: "POST",
            url: &url,
            authorization: &format!("DPoP {token}"),
            dpop_proof: Some(&proof),
        },
        ResourceOptions {
            authorization_servers: &[as_metadata()],
            resource_server: RS,
            allowed_schemes: &[TokenType::DPoP],
            ..ResourceOptions::default()
        },
    )
    .await
    .expect_err("mismatched binding must be rejected");
    assert!(matches!(err, Error::InvalidDpopProof(_)));
}

// The happy path: the proof key matches the binding, and the verified
// claims surface to the caller.
#[tokio::test]
async fn matching_dpop_binding_accepted() {
    let provider = TestProvider::new();
    respond_jwks(&provider);

    let key = test_signer("key-one");
    let jkt = test_jwk("key-one").thumbprint().expect("thumbprint");
    let token = mint_token(&provider, Some(&jkt)).await;

    let url = format!("{RS}/credential");
    let proof = dpop::create_proof(
        &provider,
        &key,
        "POST",
        &url,
        CreateProofOptions {
            access_token: Some(&token),
            ..CreateProofOptions::default()
        },
    )
    .await
    .expect("proof should sign");

    let verified = resource::verify_resource_request(
        &provider,
        ResourceRequest {
            method: "POST",
            url: &url,
            authorization: &format!("DPoP {token}"),
            dpop_proof: Some(&proof),
        },
        ResourceOptions {
            authorization_servers: &[as_metadata()],
            resource_server: RS,
            allowed_schemes: &[TokenType::DPoP],
            ..ResourceOptions::default()
        },
    )
    .await
    .expect("request should verify");

    assert_eq!(verified.token_claims.aud, RS);
    assert_eq!(verified.token_claims.sub, "holder-1");
    assert_eq!(verified.dpop_jwk, Some(test_jwk("key-one")));
}

// A sender-constrained token presented as Bearer is rejected.
#[tokio::test]
async fn bearer_with_cnf_rejected() {
    let provider = TestProvider::new();
    respond_jwks(&provider);

    let jkt = test_jwk("key-one").thumbprint().expect("thumbprint");
    let token = mint_token(&provider, Some(&jkt)).await;

    let err = resource::verify_resource_request(
        &provider,
        ResourceRequest {
            method: "POST",
            url: &format!("{RS}/credential"),
            authorization: &format!("Bearer {token}"),
            dpop_proof: None,
        },
        ResourceOptions {
            authorization_servers: &[as_metadata()],
            resource_server: RS,
            allowed_schemes: &[TokenType::Bearer, TokenType::DPoP],
            ..ResourceOptions::default()
        },
    )
    .await
    .expect_err("sender-constrained token must not verify as Bearer");
    assert!(matches!(err, Error::AccessDenied(_)));
}

// A plain Bearer token without cnf verifies.
#[tokio::test]
async fn bearer_without_cnf_accepted() {
    let provider = TestProvider::new();
    respond_jwks(&provider);

    let token = mint_token(&provider, None).await;

    let verified = resource::verify_resource_request(
        &provider,
        ResourceRequest {
            method: "GET",
            url: &format!("{RS}/credential"),
            authorization: &format!("Bearer {token}"),
            dpop_proof: None,
        },
        ResourceOptions {
            authorization_servers: &[as_metadata()],
            resource_server: RS,
            allowed_schemes: &[TokenType::Bearer],
            ..ResourceOptions::default()
        },
    )
    .await
    .expect("request should verify");
    assert!(verified.dpop_jwk.is_none());
}

// Scenario: the first token POST fails with use_dpop_nonce; the client
// retries once with the nonce from the DPoP-Nonce header. A second
// use_dpop_nonce is not retried and surfaces as a server error.
#[tokio::test]
async fn dpop_nonce_retry() {
    let provider = TestProvider::new();
    let server = as_metadata();
    let key = test_signer("wallet-dpop");

    provider.respond(
        &format!("{AS}/token"),
        json_response_with_headers(
            400,
            &json!({"error": "use_dpop_nonce"}),
            &[("DPoP-Nonce", "N")],
        ),
    );
    provider.respond(
        &format!("{AS}/token"),
        json_response(
            200,
            &json!({"access_token": "T", "token_type": "DPoP", "expires_in": 300}),
        ),
    );

    let request = oid4vci::oauth::token::TokenRequest {
        grant_type: oid4vci::oauth::token::TokenGrantType::PreAuthorizedCode {
            pre_authorized_code: "abc".to_string(),
            tx_code: None,
            user_pin: None,
        },
        ..Default::default()
    };

    let token = client::retrieve_token(
        &provider,
        &server,
        &request,
        TokenOptions {
            dpop_signer: Some(&key),
            ..TokenOptions::default()
        },
    )
    .await
    .expect("retry with nonce should succeed");
    assert_eq!(token.token_response.access_token, "T");

    // the retried proof embeds the server's nonce
    let requests = provider.requests();
    let retried = requests.last().expect("two requests were sent");
    let proof = utils::request_header(retried, "DPoP").expect("proof attached");
    let verified = dpop::verify_proof(
        &provider,
        proof,
        VerifyProofOptions {
            method: "POST",
            url: &format!("{AS}/token"),
            expected_nonce: Some("N"),
            ..VerifyProofOptions::default()
        },
    )
    .await
    .expect("proof carries the nonce");
    assert!(!verified.jti.is_empty());

    // back-to-back use_dpop_nonce responses are not retried twice
    let provider = TestProvider::new();
    provider.respond(
        &format!("{AS}/token"),
        json_response_with_headers(
            400,
            &json!({"error": "use_dpop_nonce"}),
            &[("DPoP-Nonce", "N2")],
        ),
    );
    provider.respond(
        &format!("{AS}/token"),
        json_response_with_headers(
            400,
            &json!({"error": "use_dpop_nonce"}),
            &[("DPoP-Nonce", "N3")],
        ),
    );

    let err = client::retrieve_token(
        &provider,
        &server,
        &request,
        TokenOptions {
            dpop_signer: Some(&key),
            ..TokenOptions::default()
        },
    )
    .await
    .expect_err("second use_dpop_nonce must surface");
    let ClientError::Server(envelope) = err else {
        panic!("expected a server error");
    };
    assert_eq!(envelope.error, "use_dpop_nonce");
}

// Boundary: a proof iat just inside the skew window verifies; just
// outside, it is rejected.
#[tokio::test]
async fn dpop_iat_skew_window() {
    let provider = TestProvider::new();
    let key = test_signer("wallet-dpop");
    let url = format!("{AS}/token");

    let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp");

    for (offset, inside) in [(59, true), (61, false), (-59, true), (-61, false)] {
        let issued = Utc
            .timestamp_opt(1_700_000_000 - offset, 0)
            .single()
            .expect("valid timestamp");
        let proof = dpop::create_proof(
            &provider,
            &key,
            "POST",
            &url,
            CreateProofOptions {
                now: Some(issued),
                ..CreateProofOptions::default()
            },
        )
        .await
        .expect("proof should sign");

        let result = dpop::verify_proof(
            &provider,
            &proof,
            VerifyProofOptions {
                method: "POST",
                url: &url,
                now: Some(now),
                ..VerifyProofOptions::default()
            },
        )
        .await;
        assert_eq!(result.is_ok(), inside, "offset {offset}s");
    }
}
