//! # Credential Issuer Metadata
//!
//! The Credential Issuer's configuration: its endpoints, the authorization
//! servers it trusts, and the credential configurations it can issue.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which draft of the issuance specification a peer speaks, as detected
/// during metadata discovery. Draft 11 payloads are normalized forward to
/// the draft 14 shape on receipt; the detected draft is retained so legacy
/// wire parameters (such as `user_pin`) can be emitted where required.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Draft {
    /// Draft 11 wire shapes.
    Draft11,

    /// Draft 14 (and compatible draft 13) wire shapes.
    #[default]
    Draft14,
}

/// The Credential Issuer's configuration, as published at
/// `/.well-known/openid-credential-issuer`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct IssuerMetadata {
    /// The Credential Issuer's identifier.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub credential_issuer: String,

    /// Authorization Server identifiers (metadata `issuer` values). If
    /// omitted, the Credential Issuer is acting as its own Authorization
    /// Server and `credential_issuer` doubles as the `issuer` identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_servers: Option<Vec<String>>,

    /// URL of the Credential Endpoint. MAY contain port, path and query
    /// parameter components.
    pub credential_endpoint: String,

    /// URL of the Nonce Endpoint. If omitted, the Credential Issuer does
    /// not support the Nonce Endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce_endpoint: Option<String>,

    /// URL of the Deferred Credential Endpoint. If omitted, the Credential
    /// Issuer does not support deferred issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferred_credential_endpoint: Option<String>,

    /// URL of the Notification Endpoint. If omitted, the Credential Issuer
    /// does not support notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_endpoint: Option<String>,

    /// The credential configurations the issuer can issue, keyed by
    /// configuration id.
    pub credential_configurations_supported: HashMap<String, CredentialConfiguration>,

    /// Display properties of the Credential Issuer for rendering by the
    /// Wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<Vec<IssuerDisplay>>,
}

impl IssuerMetadata {
    /// The credential configuration for a configuration id.
    #[must_use]
    pub fn credential_configuration(&self, id: &str) -> Option<&CredentialConfiguration> {
        self.credential_configurations_supported.get(id)
    }
}

/// Display properties of a Credential Issuer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IssuerDisplay {
    /// A display name for the issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The language of this display object, as an RFC 5646 tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Metadata about a credential configuration the issuer can issue: a
/// format tag with its format-specific identification, plus cryptographic
/// and proof requirements.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialConfiguration {
    /// The credential's format and format-specific identification.
    #[serde(flatten)]
    pub format: Format,

    /// The OAuth 2.0 scope value that requests this configuration through
    /// the authorization endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// The methods the issuer supports for binding the issued credential
    /// to the holder's key, e.g. `jwk`, `did:jwk`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cryptographic_binding_methods_supported: Option<Vec<String>>,

    /// The algorithms the issuer may sign the issued credential with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_signing_alg_values_supported: Option<Vec<String>>,

    /// The proof types accepted in Credential Requests for this
    /// configuration, keyed by proof type (e.g. `jwt`). An empty or absent
    /// map means no proof is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_types_supported: Option<HashMap<String, ProofTypesSupported>>,

    /// Display properties of the credential for rendering by the Wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<Vec<CredentialDisplay>>,
}

/// The signing algorithms accepted for a supported proof type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProofTypesSupported {
    /// Algorithms a proof of this type may be signed with.
    pub proof_signing_alg_values_supported: Vec<String>,
}

/// Display properties of a credential configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialDisplay {
    /// A display name for the credential.
    pub name: String,

    /// The language of this display object, as an RFC 5646 tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// The credential format profiles transported by this library. The format
/// tag selects which format-specific members identify the credential; the
/// credential payloads themselves are opaque here.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "format")]
pub enum Format {
    /// IETF SD-JWT VC: SD-JWT-based Verifiable Credentials for selective
    /// disclosure.
    #[serde(rename = "vc+sd-jwt")]
    VcSdJwt(ProfileSdJwt),

    /// ISO mDL / mdoc, as defined in [ISO.18013-5].
    ///
    /// [ISO.18013-5]: https://www.iso.org/standard/69084.html
    #[serde(rename = "mso_mdoc")]
    MsoMdoc(ProfileMdoc),

    /// A W3C Verifiable Credential secured as a JWT (not JSON-LD
    /// processed).
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson(ProfileW3c),
}

impl Default for Format {
    fn default() -> Self {
        Self::VcSdJwt(ProfileSdJwt::default())
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VcSdJwt(_) => write!(f, "vc+sd-jwt"),
            Self::MsoMdoc(_) => write!(f, "mso_mdoc"),
            Self::JwtVcJson(_) => write!(f, "jwt_vc_json"),
        }
    }
}

/// Format profile for SD-JWT VC credentials.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileSdJwt {
    /// The Verifiable Credential type: a case-sensitive string or URI
    /// identifying the type of the SD-JWT VC.
    pub vct: String,

    /// Claim metadata, carried opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
}

/// Format profile for ISO mdoc credentials.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileMdoc {
    /// The document type, as defined in [ISO.18013-5].
    ///
    /// [ISO.18013-5]: https://www.iso.org/standard/69084.html
    pub doctype: String,

    /// Claim metadata, carried opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
}

/// Format profile for W3C VC-JWT credentials.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileW3c {
    /// The credential's definition.
    pub credential_definition: CredentialDefinition,
}

/// A W3C credential definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialDefinition {
    /// The `type` values of the credential, e.g.
    /// `["VerifiableCredential", "EmployeeIDCredential"]`.
    #[serde(rename = "type")]
    pub type_: Vec<String>,

    /// Claim metadata for the credential subject, carried opaquely.
    #[serde(rename = "credentialSubject", skip_serializing_if = "Option::is_none")]
    pub credential_subject: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // Parsing then re-serializing well-formed issuer metadata yields a
    // semantically equal object.
    #[test]
    fn metadata_round_trip() {
        let json = serde_json::json!({
            "credential_issuer": "https://issuer.example.com",
            "credential_endpoint": "https://issuer.example.com/credential",
            "nonce_endpoint": "https://issuer.example.com/nonce",
            "authorization_servers": ["https://as.example.com"],
            "credential_configurations_supported": {
                "pidSdJwt": {
                    "format": "vc+sd-jwt",
                    "vct": "https://sd-jwt.example.com/pid",
                    "scope": "pid",
                    "credential_signing_alg_values_supported": ["ES256"],
                    "proof_types_supported": {
                        "jwt": {"proof_signing_alg_values_supported": ["ES256", "EdDSA"]}
                    }
                },
                "mdl": {
                    "format": "mso_mdoc",
                    "doctype": "org.iso.18013.5.1.mDL"
                }
            }
        });

        let metadata: IssuerMetadata =
            serde_json::from_value(json.clone()).expect("should deserialize");
        let config = metadata.credential_configuration("pidSdJwt").expect("config exists");
        assert!(matches!(&config.format, Format::VcSdJwt(p) if p.vct == "https://sd-jwt.example.com/pid"));

        let ser = serde_json::to_value(&metadata).expect("should serialize");
        assert_eq!(ser, json);
    }
}
