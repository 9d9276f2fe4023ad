//! An API for the issuance of Verifiable Credentials based on the
//! [OpenID for Verifiable Credential Issuance](https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html)
//! specification and the OAuth 2.0 flows it relies on.
//!
//! The library implements the protocol state and message layer for both sides
//! of a credential issuance exchange:
//!
//! * a **wallet client** that resolves a Credential Offer, obtains an access
//!   token (authorization code with PKCE, pre-authorized code, PAR, or the
//!   authorization challenge flow), and requests a Credential, optionally
//!   sender-constraining its tokens with DPoP ([RFC 9449]);
//! * an **issuer / authorization server / resource server** that produces
//!   offers, issues and verifies access tokens, and serves Credentials.
//!
//! The library holds no state and performs no I/O, cryptography, or random
//! number generation of its own. Implementers inject these through the
//! [`provider`] traits and hold protocol state (issued codes, nonces, DPoP
//! nonces) themselves. Each operation is a pure function of its inputs plus
//! the injected callbacks, so callers are free to layer caching, persistence,
//! and replay detection however they choose.
//!
//! [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449

mod core;
mod error;
pub mod jose;
pub mod oauth;
pub mod oid4vci;
pub mod provider;

/// PKCE
pub mod pkce {
    pub use crate::core::pkce::{code_challenge, code_verifier, verify};
}

/// Random identifier generation for codes, tokens, and nonces.
pub mod generate {
    pub use crate::core::generate::{jti, nonce, notification_id, token, transaction_id};
}

pub use error::{ClientError, Error};

/// Result type for protocol endpoint operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
