//! # `OpenID` for Verifiable Credential Issuance
//!
//! The issuance-specific layer over [`oauth`]: credential offers, issuer
//! metadata, the Credential and Notification Endpoints, and the
//! proof-of-possession JWTs that bind issued credentials to holder keys.
//!
//! The [`client`] module is the Wallet's side of each exchange; the
//! [`issuer`] module is the Credential Issuer's. Both are stateless —
//! callers hold offers, nonces, and tokens between calls.
//!
//! [`oauth`]: crate::oauth

pub mod client;
pub mod issuer;
pub mod types;
