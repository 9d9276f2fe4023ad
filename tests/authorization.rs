//! Authorization Code Flow Tests: PAR + PKCE + DPoP, and the
//! authorization challenge flow.

mod utils;

use oid4vci::oauth::authorization::AuthorizationFlow;
use oid4vci::oauth::client::{self, AuthorizationOptions, TokenOptions};
use oid4vci::oauth::dpop::{self, VerifyProofOptions};
use oid4vci::oauth::metadata::ServerMetadata;
use oid4vci::oauth::server::{
    self, ExpectedAuthorizationCode, TokenRequestContext,
};
use oid4vci::oauth::{CodeChallengeMethod, TokenType};
use oid4vci::oid4vci::client::{CredentialRequestOptions, ProofOptions};
use oid4vci::oid4vci::{client as wallet, types};
use serde_json::json;
use utils::{
    TestProvider, form_body, json_response, json_response_with_headers, request_header,
    test_signer,
};

const AS: &str = "https://as.example.com";
const ISSUER: &str = "https://iss.example.com";

const CODE_VERIFIER: &str =
    "l-yZMbym56l7IlENP17y-XgKzT6a37ut5n9yXMrh9BpTOt9g77CwCsWheRW0oMA2tL471UZhIr705MdHxRSQvQ";
const CODE_CHALLENGE: &str = "MuPA1CQYF9t3udwnb4A_SWig3BArengnQXS2yo8AFew";

fn par_server() -> ServerMetadata {
    serde_json::from_value(json!({
        "issuer": AS,
        "authorization_endpoint": format!("{AS}/authorize"),
        "token_endpoint": format!("{AS}/token"),
        "pushed_authorization_request_endpoint": format!("{AS}/par"),
        "require_pushed_authorization_requests": true,
        "code_challenge_methods_supported": ["S256"],
        "dpop_signing_alg_values_supported": ["ES256"],
    }))
    .expect("metadata is well-formed")
}

// Scenario: authorization code flow with PAR, PKCE, and DPoP. The pushed
// request carries the derived S256 challenge, the redirect URL references
// the returned request_uri, and the token and credential requests are
// DPoP-bound with the nonce the server hands out.
#[tokio::test]
async fn par_pkce_dpop() {
    let provider = TestProvider::new();
    let server = par_server();

    // --------------------------------------------------
    // PAR with the fixture verifier
    // --------------------------------------------------
    provider.respond(
        &format!("{AS}/par"),
        json_response(201, &json!({"request_uri": "urn:x", "expires_in": 60})),
    );

    let flow = client::initiate_authorization(
        &provider,
        &server,
        AuthorizationOptions {
            client_id: "wallet".to_string(),
            redirect_uri: Some("openid-credential-offer://cb".to_string()),
            code_verifier: Some(CODE_VERIFIER.to_string()),
            ..AuthorizationOptions::default()
        },
    )
    .await
    .expect("authorization should initiate");

    let AuthorizationFlow::Oauth2Redirect { url, pkce } = flow else {
        panic!("expected a redirect flow");
    };
    assert!(url.ends_with("?request_uri=urn%3Ax&client_id=wallet"));

    let pkce = pkce.expect("PKCE was negotiated");
    assert_eq!(pkce.code_challenge_method, CodeChallengeMethod::S256);
    assert_eq!(pkce.code_challenge, CODE_CHALLENGE);

    let pushed = provider.last_request(&format!("{AS}/par")).expect("request was pushed");
    let form = form_body(&pushed);
    assert!(form.contains(&("code_challenge".to_string(), CODE_CHALLENGE.to_string())));
    assert!(form.contains(&("code_challenge_method".to_string(), "S256".to_string())));

    // --------------------------------------------------
    // Token request with DPoP; server hands out a nonce
    // --------------------------------------------------
    let dpop_key = test_signer("wallet-dpop");
    provider.respond(
        &format!("{AS}/token"),
        json_response_with_headers(
            200,
            &json!({
                "access_token": "T",
                "token_type": "DPoP",
                "expires_in": 300,
                "c_nonce": "N",
            }),
            &[("DPoP-Nonce", "N1")],
        ),
    );

    let token_request = oid4vci::oauth::token::TokenRequest {
        client_id: Some("wallet".to_string()),
        grant_type: oid4vci::oauth::token::TokenGrantType::AuthorizationCode {
            code: "C".to_string(),
            redirect_uri: Some("openid-credential-offer://cb".to_string()),
            code_verifier: Some(pkce.code_verifier.clone()),
        },
        ..Default::default()
    };
    let token = client::retrieve_authorization_code_token(
        &provider,
        &server,
        token_request,
        TokenOptions {
            dpop_signer: Some(&dpop_key),
            ..TokenOptions::default()
        },
    )
    .await
    .expect("token should be issued");

    assert_eq!(token.token_response.token_type, TokenType::DPoP);
    assert_eq!(token.dpop_nonce.as_deref(), Some("N1"));

    // the server verifies the request: PKCE and the DPoP proof
    let recorded = provider.last_request(&format!("{AS}/token")).expect("request was sent");
    let body = String::from_utf8(recorded.body.clone().unwrap_or_default()).expect("utf-8");
    let parsed =
        server::parse_token_request(&body, request_header(&recorded, "DPoP")).expect("parses");

    let verified = server::verify_authorization_code_token_request(
        &provider,
        &parsed,
        ExpectedAuthorizationCode {
            code: "C",
            code_challenge: Some(CODE_CHALLENGE),
            code_challenge_method: CodeChallengeMethod::S256,
            redirect_uri: Some("openid-credential-offer://cb"),
        },
        TokenRequestContext {
            method: "POST",
            endpoint: &format!("{AS}/token"),
            ..TokenRequestContext::default()
        },
    )
    .await
    .expect("request should verify");
    assert_eq!(
        verified.dpop_jkt.as_deref(),
        Some(utils::test_jwk("wallet-dpop").thumbprint().expect("thumbprint").as_str())
    );

    // a tampered verifier is rejected
    let tampered = body.replace(CODE_VERIFIER, &"a".repeat(43));
    let parsed_tampered = server::parse_token_request(&tampered, None).expect("parses");
    server::verify_authorization_code_token_request(
        &provider,
        &parsed_tampered,
        ExpectedAuthorizationCode {
            code: "C",
            code_challenge: Some(CODE_CHALLENGE),
            code_challenge_method: CodeChallengeMethod::S256,
            redirect_uri: Some("openid-credential-offer://cb"),
        },
        TokenRequestContext::default(),
    )
    .await
    .expect_err("wrong verifier must be rejected");

    // --------------------------------------------------
    // Credential request: DPoP proof carries nonce and ath
    // --------------------------------------------------
    let issuer_metadata = types::IssuerMetadata {
        credential_issuer: ISSUER.to_string(),
        credential_endpoint: format!("{ISSUER}/credential"),
        ..types::IssuerMetadata::default()
    };

    provider.respond(
        &format!("{ISSUER}/credential"),
        json_response(200, &json!({"credential": "X", "format": "vc+sd-jwt"})),
    );

    let holder = test_signer("holder");
    let proof_jwt = wallet::create_proof_jwt(
        &provider,
        &holder,
        ISSUER,
        ProofOptions {
            client_id: Some("wallet"),
            c_nonce: Some("N"),
            ..ProofOptions::default()
        },
    )
    .await
    .expect("proof should sign");

    let request = types::CredentialRequest {
        credential: types::RequestBy::Format(types::Format::VcSdJwt(types::ProfileSdJwt {
            vct: "https://sd-jwt.example.com/pid".to_string(),
            claims: None,
        })),
        proof: Some(types::Proof::Single {
            proof_type: types::SingleProof::Jwt { jwt: proof_jwt },
        }),
    };

    wallet::request_credential(
        &provider,
        &issuer_metadata,
        &request,
        CredentialRequestOptions {
            access_token: "T",
            token_type: TokenType::DPoP,
            dpop_signer: Some(&dpop_key),
            dpop_nonce: token.dpop_nonce.as_deref(),
            ..CredentialRequestOptions::default()
        },
    )
    .await
    .expect("credential should be issued");

    let recorded =
        provider.last_request(&format!("{ISSUER}/credential")).expect("request was sent");
    assert_eq!(request_header(&recorded, "authorization"), Some("DPoP T"));

    let proof = request_header(&recorded, "DPoP").expect("proof attached");
    let verified = dpop::verify_proof(
        &provider,
        proof,
        VerifyProofOptions {
            method: "POST",
            url: &format!("{ISSUER}/credential"),
            access_token: Some("T"),
            expected_nonce: Some("N1"),
            ..VerifyProofOptions::default()
        },
    )
    .await
    .expect("proof should verify");
    assert_eq!(verified.jkt, utils::test_jwk("wallet-dpop").thumbprint().expect("thumbprint"));
}

// Scenario: the authorization challenge endpoint requires a presentation
// during issuance, then issues a code once the presentation session is
// replayed.
#[tokio::test]
async fn challenge_presentation_during_issuance() {
    let provider = TestProvider::new();
    let server: ServerMetadata = serde_json::from_value(json!({
        "issuer": AS,
        "token_endpoint": format!("{AS}/token"),
        "authorization_challenge_endpoint": format!("{AS}/challenge"),
    }))
    .expect("metadata is well-formed");

    provider.respond(
        &format!("{AS}/challenge"),
        json_response(
            400,
            &json!({
                "error": "insufficient_authorization",
                "presentation": "openid4vp://request",
                "auth_session": "S1",
            }),
        ),
    );
    provider.respond(
        &format!("{AS}/challenge"),
        json_response(200, &json!({"authorization_code": "C"})),
    );

    let flow = client::initiate_authorization(
        &provider,
        &server,
        AuthorizationOptions {
            client_id: "wallet".to_string(),
            scope: Some("pid".to_string()),
            ..AuthorizationOptions::default()
        },
    )
    .await
    .expect("challenge should resolve to a flow");

    let AuthorizationFlow::PresentationDuringIssuance {
        oid4vp_request_url,
        auth_session,
    } = flow
    else {
        panic!("expected a presentation during issuance");
    };
    assert_eq!(oid4vp_request_url, "openid4vp://request");
    assert_eq!(auth_session, "S1");

    // the verifier has been satisfied: resume the challenge
    let flow = client::initiate_authorization(
        &provider,
        &server,
        AuthorizationOptions {
            client_id: "wallet".to_string(),
            scope: Some("pid".to_string()),
            auth_session: Some(auth_session),
            presentation_during_issuance_session: Some("P1".to_string()),
            ..AuthorizationOptions::default()
        },
    )
    .await
    .expect("resumed challenge should succeed");

    let AuthorizationFlow::AuthorizationChallenge { authorization_code } = flow else {
        panic!("expected a short-circuit authorization code");
    };
    assert_eq!(authorization_code, "C");

    let resumed = provider.last_request(&format!("{AS}/challenge")).expect("request was sent");
    let form = form_body(&resumed);
    assert!(form.contains(&("auth_session".to_string(), "S1".to_string())));
    assert!(
        form.contains(&("presentation_during_issuance_session".to_string(), "P1".to_string()))
    );
}

// Scenario: a challenge error of redirect_to_web with a request_uri is
// treated as a successful PAR; without one, the client falls through to
// the plain redirect.
#[tokio::test]
async fn challenge_redirect_to_web() {
    let provider = TestProvider::new();
    let server: ServerMetadata = serde_json::from_value(json!({
        "issuer": AS,
        "authorization_endpoint": format!("{AS}/authorize"),
        "token_endpoint": format!("{AS}/token"),
        "authorization_challenge_endpoint": format!("{AS}/challenge"),
        "code_challenge_methods_supported": ["S256"],
    }))
    .expect("metadata is well-formed");

    provider.respond(
        &format!("{AS}/challenge"),
        json_response(
            400,
            &json!({"error": "redirect_to_web", "request_uri": "urn:y", "expires_in": 60}),
        ),
    );
    provider.respond(
        &format!("{AS}/challenge"),
        json_response(400, &json!({"error": "redirect_to_web"})),
    );

    let options = AuthorizationOptions {
        client_id: "wallet".to_string(),
        ..AuthorizationOptions::default()
    };

    let flow = client::initiate_authorization(&provider, &server, options.clone())
        .await
        .expect("challenge fallback should produce a redirect");
    let AuthorizationFlow::Oauth2Redirect { url, .. } = flow else {
        panic!("expected a redirect flow");
    };
    assert!(url.ends_with("?request_uri=urn%3Ay&client_id=wallet"));

    // no request_uri: fall through to a plain authorization URL
    let flow = client::initiate_authorization(&provider, &server, options)
        .await
        .expect("fallback should produce a redirect");
    let AuthorizationFlow::Oauth2Redirect { url, pkce } = flow else {
        panic!("expected a redirect flow");
    };
    assert!(url.starts_with(&format!("{AS}/authorize?response_type=code&client_id=wallet")));
    assert!(pkce.is_some());
}
