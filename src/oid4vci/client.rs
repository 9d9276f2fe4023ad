//! # Wallet Client
//!
//! The Wallet's side of the issuance exchanges: resolving credential
//! offers and metadata, requesting credentials with proofs of possession,
//! and notifying the issuer of the outcome.

pub mod credential;
pub mod metadata;
pub mod notification;
pub mod offer;

pub use self::credential::{
    CredentialRequestOptions, CredentialResult, ProofOptions, create_proof_jwt,
    request_credential, request_nonce,
};
pub use self::metadata::{ResolvedMetadata, resolve_issuer_metadata};
pub use self::notification::{NotificationOptions, send_notification};
pub use self::offer::{
    OfferPayload, build_offer_uri_url, build_offer_url, determine_authorization_server,
    parse_offer_url, resolve_credential_offer,
};
