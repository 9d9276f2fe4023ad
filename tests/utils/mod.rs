//! Deterministic test provider: canned HTTP exchanges, counter-based
//! randomness, and a content-hash stand-in for signatures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use base64ct::{Base64UrlUnpadded, Encoding};
use oid4vci::jose::PublicKeyJwk;
use oid4vci::provider::{
    ClientAuthentication, HttpClient, HttpRequest, HttpResponse, JwtSigner, OutgoingRequest,
    Provider, Random, Signer, SigningInput, Verifier, VerifyJwtInput, VerifyJwtResult,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Default)]
struct Inner {
    responses: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    counter: Mutex<u8>,
}

/// A provider serving canned responses and recording every request.
#[derive(Clone, Default)]
pub struct TestProvider(Arc<Inner>);

impl TestProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a URL. Multiple responses for the same URL are
    /// served in queue order.
    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.0
            .responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every request fetched so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.0.requests.lock().unwrap().clone()
    }

    /// The most recent request to a URL.
    pub fn last_request(&self, url: &str) -> Option<HttpRequest> {
        self.0.requests.lock().unwrap().iter().rev().find(|r| r.url == url).cloned()
    }
}

impl Provider for TestProvider {}

impl HttpClient for TestProvider {
    async fn fetch(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        self.0.requests.lock().unwrap().push(request.clone());
        let mut responses = self.0.responses.lock().unwrap();
        let queue = responses
            .get_mut(&request.url)
            .ok_or_else(|| anyhow::anyhow!("no canned response for {}", request.url))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().expect("queue is non-empty"))
        } else {
            queue.front().cloned().ok_or_else(|| anyhow::anyhow!("response queue drained"))
        }
    }
}

impl Random for TestProvider {
    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut counter = self.0.counter.lock().unwrap();
        *counter = counter.wrapping_add(1);
        vec![*counter; len]
    }
}

impl Signer for TestProvider {
    async fn sign_jwt(&self, _signer: &JwtSigner, input: &SigningInput) -> anyhow::Result<String> {
        Ok(toy_sign(&input.header, &input.claims))
    }
}

impl Verifier for TestProvider {
    async fn verify_jwt(&self, input: VerifyJwtInput<'_>) -> anyhow::Result<VerifyJwtResult> {
        let Some((signing_input, signature)) = input.compact.rsplit_once('.') else {
            anyhow::bail!("not a compact JWT");
        };
        let expected = Base64UrlUnpadded::encode_string(&Sha256::digest(signing_input.as_bytes()));

        let header_jwk = input
            .header
            .get("jwk")
            .and_then(|jwk| serde_json::from_value::<PublicKeyJwk>(jwk.clone()).ok());

        Ok(VerifyJwtResult {
            valid: signature == expected,
            signer_jwk: input.expected_jwk.cloned().or(header_jwk),
        })
    }
}

impl ClientAuthentication for TestProvider {
    async fn authenticate(&self, _request: &mut OutgoingRequest) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Produce a compact JWT the [`TestProvider`] verifier accepts: the
/// "signature" is the base64url SHA-256 of the signing input.
pub fn toy_sign(header: &serde_json::Value, claims: &serde_json::Value) -> String {
    let header = Base64UrlUnpadded::encode_string(&serde_json::to_vec(header).unwrap());
    let claims = Base64UrlUnpadded::encode_string(&serde_json::to_vec(claims).unwrap());
    let signing_input = format!("{header}.{claims}");
    let signature = Base64UrlUnpadded::encode_string(&Sha256::digest(signing_input.as_bytes()));
    format!("{signing_input}.{signature}")
}

/// A JSON response with the given status.
pub fn json_response<T: Serialize>(status: u16, body: &T) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: serde_json::to_vec(body).unwrap(),
    }
}

/// A JSON response with extra headers.
pub fn json_response_with_headers<T: Serialize>(
    status: u16, body: &T, headers: &[(&str, &str)],
) -> HttpResponse {
    let mut response = json_response(status, body);
    for (name, value) in headers {
        response.headers.push(((*name).to_string(), (*value).to_string()));
    }
    response
}

/// A P-256 test key with a deterministic coordinate, usable as a DPoP or
/// proof-of-possession signer.
pub fn test_jwk(seed: &str) -> PublicKeyJwk {
    let x = Base64UrlUnpadded::encode_string(&Sha256::digest(seed.as_bytes()));
    let y = Base64UrlUnpadded::encode_string(&Sha256::digest(format!("{seed}-y").as_bytes()));
    PublicKeyJwk {
        kty: "EC".to_string(),
        crv: Some("P-256".to_string()),
        x: Some(x),
        y: Some(y),
        ..PublicKeyJwk::default()
    }
}

/// A JWK signer over [`test_jwk`] key material.
pub fn test_signer(seed: &str) -> JwtSigner {
    JwtSigner::Jwk {
        public_jwk: test_jwk(seed),
        alg: "ES256".to_string(),
    }
}

/// The form body of a recorded request, decoded to pairs.
pub fn form_body(request: &HttpRequest) -> Vec<(String, String)> {
    let body = request.body.as_deref().unwrap_or_default();
    serde_urlencoded::from_bytes(body).expect("body is form-encoded")
}

/// A named header of a recorded request.
pub fn request_header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
