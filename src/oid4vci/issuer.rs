//! # Credential Issuer
//!
//! The issuer's side of the Credential Endpoint: request parsing and
//! format dispatch, proof-of-possession verification, and response
//! assembly.

pub mod credential;
pub mod proof;

pub use self::credential::{
    CredentialResponseOptions, RequestedCredential, create_credential_response,
    create_deferred_response, parse_credential_request, requested_credential,
    resolve_configuration_id,
};
pub use self::proof::{VerifiedProofJwt, VerifyProofOptions, verify_proof_jwt};
