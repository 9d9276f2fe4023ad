//! # Credential Request & Response
//!
//! The Credential Endpoint exchange: the Wallet's request (identifying the
//! credential by identifier or format, with its proof of possession) and
//! the issuer's response. Credential payloads are opaque to this library.

use serde::{Deserialize, Serialize};

use crate::oid4vci::types::Format;

/// A Credential Request made by the Wallet to the Credential Endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Identifies the credential requested for issuance using either a
    /// `credential_identifier` (when the Token Response carried
    /// `credential_identifiers`) or a supported format. Exactly one of the
    /// two forms must be used.
    #[serde(flatten)]
    pub credential: RequestBy,

    /// The Wallet's proof of possession of the key material the issued
    /// credential will be bound to. REQUIRED when `proof_types_supported`
    /// is present in the credential configuration.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

/// The means used to identify the credential being requested.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(untagged)]
pub enum RequestBy {
    /// Request by credential identifier from the Token Response's
    /// authorization details.
    Identifier {
        /// The credential identifier.
        credential_identifier: String,
    },

    /// Request by format, carrying the format-specific identification
    /// (`vct`, `doctype`, `credential_definition`).
    Format(Format),
}

impl Default for RequestBy {
    fn default() -> Self {
        Self::Identifier {
            credential_identifier: String::new(),
        }
    }
}

/// The Wallet's proof of possession: a single proof or a batch container.
/// Exactly one of the two forms may be present in a request.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub enum Proof {
    /// A single proof of possession.
    #[serde(rename = "proof")]
    Single {
        /// The proof, tagged by proof type.
        #[serde(flatten)]
        proof_type: SingleProof,
    },

    /// One or more proofs of possession, for batch issuance of multiple
    /// credential instances bound to different keys. Exactly one proof
    /// type key is present.
    #[serde(rename = "proofs")]
    Multiple(MultipleProofs),
}

impl Default for Proof {
    fn default() -> Self {
        Self::Single {
            proof_type: SingleProof::default(),
        }
    }
}

/// A single proof of possession, tagged by proof type.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(tag = "proof_type")]
pub enum SingleProof {
    /// A JWT proof of possession.
    #[serde(rename = "jwt")]
    Jwt {
        /// The proof-of-possession JWT.
        jwt: String,
    },
}

impl Default for SingleProof {
    fn default() -> Self {
        Self::Jwt { jwt: String::new() }
    }
}

/// A batch of proofs of possession, keyed by proof type.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub enum MultipleProofs {
    /// JWT proofs of possession.
    #[serde(rename = "jwt")]
    Jwt(Vec<String>),
}

impl Default for MultipleProofs {
    fn default() -> Self {
        Self::Jwt(vec![])
    }
}

impl Proof {
    /// The proof JWTs carried, in request order.
    #[must_use]
    pub fn jwts(&self) -> Vec<&str> {
        match self {
            Self::Single {
                proof_type: SingleProof::Jwt { jwt },
            } => vec![jwt.as_str()],
            Self::Multiple(MultipleProofs::Jwt(jwts)) => {
                jwts.iter().map(String::as_str).collect()
            }
        }
    }

    /// Whether this is the batch (`proofs`) form.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Multiple(_))
    }
}

/// Claims of a proof-of-possession JWT (`typ` of `openid4vci-proof+jwt`).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofClaims {
    /// The `client_id` of the Wallet making the Credential Request.
    /// Required for the authorization code flow with a public client;
    /// omitted in the anonymous pre-authorized flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// The Credential Issuer Identifier.
    pub aud: String,

    /// The time the proof was created, as unix seconds.
    pub iat: i64,

    /// The `c_nonce` provided by the Credential Issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// The issuer's response to a Credential Request. Mirrors the request
/// form: a single credential for a single proof, a batch for batch proofs,
/// or a transaction id when issuance is deferred.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialResponse {
    /// The issued credential(s) or deferral.
    #[serde(flatten)]
    pub response: CredentialResponseType,

    /// A fresh nonce to use in the proof of a subsequent Credential
    /// Request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,

    /// The lifetime in seconds of the `c_nonce`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<i64>,

    /// Identifies the issued credential in later calls to the Notification
    /// Endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

/// The response from the Nonce Endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NonceResponse {
    /// A fresh nonce to use in the proof of a Credential Request.
    pub c_nonce: String,
}

/// The body forms a Credential Response can take.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CredentialResponseType {
    /// A single issued credential, for a request with a single proof.
    Credential {
        /// The issued credential, opaque to this library.
        credential: serde_json::Value,

        /// The credential's format.
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Multiple issued credentials, for a request with batch proofs.
    Credentials {
        /// The issued credentials, in proof order.
        credentials: Vec<serde_json::Value>,
    },

    /// Issuance is deferred; the Wallet retrieves the credential later
    /// with this transaction id.
    TransactionId {
        /// The deferred issuance transaction id.
        transaction_id: String,
    },
}

impl Default for CredentialResponseType {
    fn default() -> Self {
        Self::Credential {
            credential: serde_json::Value::Null,
            format: None,
        }
    }
}
