//! # Provider
//!
//! The callback surface of the library. The protocol core performs no I/O,
//! cryptography, or random number generation itself. Implementers build an
//! adapter once and pass it to every operation.
//!
//! Traits are deliberately narrow so each side of an exchange can implement
//! only what it uses: a wallet needs [`HttpClient`], [`Signer`],
//! [`Random`], and [`ClientAuthentication`]; an issuer needs [`Signer`],
//! [`Verifier`], [`Random`], and [`HttpClient`] (for JWKS retrieval).

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::jose::PublicKeyJwk;

/// Result type for provider callbacks. Implementers should return their own
/// error, mapped into [`anyhow::Error`].
pub type Result<T> = anyhow::Result<T>;

/// A provider that supports every callback. Convenient for implementations
/// that serve both sides of an exchange, such as test fixtures.
pub trait Provider:
    HttpClient + Signer + Verifier + Random + ClientAuthentication + Clone
{
}

/// The key material and method used to sign a JWT. Header population is
/// deterministic per variant: `Did` sets `kid`, `Jwk` embeds the public
/// key, `X5c` sets the certificate chain, and `Custom` leaves header
/// population to the [`Signer`] callback.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum JwtSigner {
    /// Sign with a key bound to a DID. The DID URL is set as the `kid`
    /// header; the callback resolves the DID out of band.
    Did {
        /// DID URL identifying the verification method, e.g.
        /// `did:example:123#key-1`.
        did_url: String,

        /// Signature algorithm, e.g. `ES256`.
        alg: String,
    },

    /// Sign with a key whose public JWK is embedded in the header.
    Jwk {
        /// The public JWK to embed.
        public_jwk: PublicKeyJwk,

        /// Signature algorithm.
        alg: String,
    },

    /// Sign with a key identified by an X.509 certificate chain.
    X5c {
        /// Certificate chain, signing certificate first.
        x5c: Vec<String>,

        /// Signature algorithm.
        alg: String,
    },

    /// The callback populates header key material itself.
    Custom {
        /// Signature algorithm.
        alg: String,
    },
}

impl JwtSigner {
    /// The signature algorithm of the signer.
    #[must_use]
    pub fn alg(&self) -> &str {
        match self {
            Self::Did { alg, .. }
            | Self::Jwk { alg, .. }
            | Self::X5c { alg, .. }
            | Self::Custom { alg } => alg,
        }
    }

    /// The public JWK of the signer, when it carries one.
    #[must_use]
    pub const fn public_jwk(&self) -> Option<&PublicKeyJwk> {
        match self {
            Self::Jwk { public_jwk, .. } => Some(public_jwk),
            _ => None,
        }
    }
}

/// The pre-assembled header and claims handed to the signing callback.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SigningInput {
    /// The protected JWS header, with `alg`, `typ`, and key material
    /// already populated.
    pub header: serde_json::Value,

    /// The claims set.
    pub claims: serde_json::Value,
}

/// Sign JWTs on behalf of the library.
pub trait Signer: Send + Sync {
    /// Produce a compact JWT over the provided header and claims using the
    /// signer's key material. The header is fully populated; the callback
    /// may extend it (e.g. for [`JwtSigner::Custom`]) but must not remove
    /// members the library set.
    fn sign_jwt(
        &self, signer: &JwtSigner, input: &SigningInput,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// The decoded JWT handed to the verification callback, together with the
/// key the library expects it to be signed with, when known.
#[derive(Clone, Debug)]
pub struct VerifyJwtInput<'a> {
    /// The compact serialization.
    pub compact: &'a str,

    /// The decoded protected header.
    pub header: &'a serde_json::Value,

    /// The decoded claims set.
    pub claims: &'a serde_json::Value,

    /// The key the signature must verify against, when the library has
    /// already determined it (the embedded `jwk` of a DPoP proof, a JWKS
    /// key matched by `kid`). `None` when the callback must resolve the
    /// key itself, e.g. from a `kid` holding a DID URL.
    pub expected_jwk: Option<&'a PublicKeyJwk>,
}

/// The outcome of signature verification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VerifyJwtResult {
    /// Whether the signature verifies.
    pub valid: bool,

    /// The public JWK the signature was verified against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_jwk: Option<PublicKeyJwk>,
}

/// Verify JWT signatures on behalf of the library.
pub trait Verifier: Send + Sync {
    /// Verify the signature of a compact JWT. When `expected_jwk` is set
    /// the signature MUST be checked against that key and no other.
    fn verify_jwt(
        &self, input: VerifyJwtInput<'_>,
    ) -> impl Future<Output = Result<VerifyJwtResult>> + Send;
}

/// Generate cryptographically strong random bytes, used for code
/// verifiers, nonces, `jti` values, and access tokens.
pub trait Random: Send + Sync {
    /// Return `len` cryptographically strong random bytes.
    fn random_bytes(&self, len: usize) -> Vec<u8>;
}

/// An outgoing HTTP request.
#[derive(Clone, Debug, Default)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: String,

    /// Absolute request URL.
    pub url: String,

    /// Request headers.
    pub headers: Vec<(String, String)>,

    /// Request body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// A GET request with an `Accept: application/json` header.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    /// A POST request with a form-encoded body.
    #[must_use]
    pub fn form_post(url: impl Into<String>, form: &[(String, String)]) -> Self {
        let body = serde_urlencoded::to_string(form).unwrap_or_default();
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: vec![(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body.into_bytes()),
        }
    }

    /// A POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error when the body cannot be serialized.
    pub fn json_post<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(serde_json::to_vec(body)?),
        })
    }

    /// Append a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// An HTTP response as returned by the [`HttpClient`] callback.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    pub headers: Vec<(String, String)>,

    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Look up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not valid JSON of the expected
    /// shape.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Perform HTTP requests on behalf of the library. The implementation is
/// expected to honor standard HTTP semantics (redirects, TLS); timeouts and
/// cancellation are the implementer's concern.
pub trait HttpClient: Send + Sync {
    /// Execute the request and return the response. Non-2xx statuses are
    /// returned, not raised: the protocol layer decodes error envelopes
    /// from them.
    fn fetch(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// An outgoing form-encoded endpoint request (token, PAR, authorization
/// challenge) about to be sent, presented to the client-authentication
/// callback for adjustment.
#[derive(Clone, Debug, Default)]
pub struct OutgoingRequest {
    /// The endpoint URL the request will be posted to.
    pub endpoint: String,

    /// The form body. The callback may append members such as
    /// `client_secret` or `client_assertion`.
    pub form: Vec<(String, String)>,

    /// Request headers. The callback may append members such as an
    /// `Authorization` header for `client_secret_basic`.
    pub headers: Vec<(String, String)>,
}

/// Add client authentication to outgoing token-endpoint requests: none,
/// `client_secret_basic`, `client_secret_post`, `private_key_jwt`, or
/// `attest_jwt_client_auth`.
pub trait ClientAuthentication: Send + Sync {
    /// Adjust the outgoing request in place.
    fn authenticate(
        &self, request: &mut OutgoingRequest,
    ) -> impl Future<Output = Result<()>> + Send;
}
