//! # Credential Offer
//!
//! The Credential Offer made by a Credential Issuer to a Wallet, its
//! grants, and the forward-only normalization of draft 11 offers to the
//! draft 14 shape.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Input character sets for a Transaction Code.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Only digits.
    #[default]
    Numeric,

    /// Any characters.
    Text,
}

/// Metadata describing the Transaction Code the End-User must supply with
/// a pre-authorized token request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TxCode {
    /// Specifies the input character set. The default is "numeric".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_mode: Option<InputMode>,

    /// Specifies the length of the Transaction Code. This helps the Wallet
    /// to render the input screen and improve the user experience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,

    /// Guidance for the Holder on how to obtain the Transaction Code,
    /// e.g., describing over which communication channel it is delivered.
    /// MUST NOT exceed 300 characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The grants a Credential Issuer is prepared to process for a Credential
/// Offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Grants {
    /// Authorization Code Grant Type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<AuthorizationCodeGrant>,

    /// Pre-Authorized Code Grant Type.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    pub pre_authorized_code: Option<PreAuthorizedCodeGrant>,
}

/// Parameters used by the Wallet when requesting the Authorization Code
/// Flow.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationCodeGrant {
    /// Issuer state linking an Authorization Request to the Offer context.
    /// If the Wallet uses the Authorization Code Flow, it MUST include it
    /// in the Authorization Request using the `issuer_state` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,

    /// Identifies the Authorization Server to use with this grant type
    /// when the issuer metadata's `authorization_servers` has multiple
    /// entries. MUST NOT be used otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
}

/// Parameters used by the Wallet when using the Pre-Authorized Code Flow.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreAuthorizedCodeGrant {
    /// The code representing the Credential Issuer's authorization for the
    /// Wallet to obtain Credentials of a certain type.
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,

    /// Metadata of the Transaction Code the End-User must supply with the
    /// token request. Absent when no Transaction Code is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_code: Option<TxCode>,

    /// Identifies the Authorization Server to use with this grant type
    /// when the issuer metadata's `authorization_servers` has multiple
    /// entries. MUST NOT be used otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
}

/// A Credential Offer that can be sent to a Wallet by value or retrieved
/// by reference.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOffer {
    /// The URL of the Credential Issuer the Wallet is requested to obtain
    /// one or more Credentials from.
    pub credential_issuer: String,

    /// Names identifying entries in the
    /// `credential_configurations_supported` map of the Credential Issuer
    /// metadata.
    ///
    /// # Example
    ///
    /// ```json
    ///    "credential_configuration_ids": [
    ///       "UniversityDegree_JWT",
    ///       "org.iso.18013.5.1.mDL"
    ///    ],
    /// ```
    pub credential_configuration_ids: Vec<String>,

    /// The Grant Types the Credential Issuer is prepared to process for
    /// this offer. If not present, the Wallet MUST determine them from the
    /// Issuer metadata. When multiple grants are present, choosing is at
    /// the Wallet's discretion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grants>,
}

impl CredentialOffer {
    /// Validate the offer's shape: an HTTPS (or interop `http`) issuer, at
    /// least one configuration id, and at least one grant when a `grants`
    /// object is present.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError::Validation`] describing the violation.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.credential_issuer.is_empty() {
            return Err(ClientError::Validation("offer has no `credential_issuer`".to_string()));
        }
        if self.credential_configuration_ids.is_empty() {
            return Err(ClientError::Validation(
                "offer has no `credential_configuration_ids`".to_string(),
            ));
        }
        if let Some(grants) = &self.grants
            && grants.authorization_code.is_none()
            && grants.pre_authorized_code.is_none()
        {
            return Err(ClientError::Validation("offer `grants` is empty".to_string()));
        }
        if let Some(description) = self
            .grants
            .as_ref()
            .and_then(|g| g.pre_authorized_code.as_ref())
            .and_then(|g| g.tx_code.as_ref())
            .and_then(|t| t.description.as_ref())
            && description.len() > 300
        {
            return Err(ClientError::Validation(
                "`tx_code` description exceeds 300 characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Convenience method for extracting the pre-authorized code grant
    /// from the offer, if it exists.
    #[must_use]
    pub fn pre_authorized_code(&self) -> Option<&PreAuthorizedCodeGrant> {
        self.grants.as_ref().and_then(|grants| grants.pre_authorized_code.as_ref())
    }

    /// Convenience method for extracting the authorization code grant from
    /// the offer, if it exists.
    #[must_use]
    pub fn authorization_code(&self) -> Option<&AuthorizationCodeGrant> {
        self.grants.as_ref().and_then(|grants| grants.authorization_code.as_ref())
    }
}

/// A Credential Offer in the draft 11 wire shape, accepted for
/// compatibility and normalized forward to the draft 14 shape. The
/// normalization is forward-only and never reversed.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CredentialOfferDraft11 {
    /// The URL of the Credential Issuer.
    pub credential_issuer: String,

    /// Draft 11 names offered credentials directly.
    pub credentials: Vec<String>,

    /// The grants the issuer is prepared to process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grants: Option<GrantsDraft11>,
}

/// Draft 11 grants object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GrantsDraft11 {
    /// Authorization Code Grant Type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<AuthorizationCodeGrant>,

    /// Pre-Authorized Code Grant Type.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code")]
    pub pre_authorized_code: Option<PreAuthorizedCodeGrantDraft11>,
}

/// Draft 11 pre-authorized code grant, with the boolean PIN flag that
/// draft 14 replaced with the `tx_code` object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreAuthorizedCodeGrantDraft11 {
    /// The pre-authorized code.
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,

    /// Whether the End-User must supply a PIN with the token request.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub user_pin_required: bool,

    /// Identifies the Authorization Server to use with this grant type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_server: Option<String>,
}

impl CredentialOfferDraft11 {
    /// Normalize the offer to the draft 14 shape.
    ///
    /// `credentials` becomes `credential_configuration_ids` and
    /// `user_pin_required: true` becomes a `tx_code` with text input mode.
    /// The PIN's length and delivery are unknowable from the draft 11
    /// shape, so they are left unset rather than guessed. The
    /// `credential_issuer` is preserved bit-for-bit and the transform is
    /// idempotent over its output.
    #[must_use]
    pub fn normalize(self) -> CredentialOffer {
        let grants = self.grants.map(|grants| Grants {
            authorization_code: grants.authorization_code,
            pre_authorized_code: grants.pre_authorized_code.map(|grant| {
                PreAuthorizedCodeGrant {
                    pre_authorized_code: grant.pre_authorized_code,
                    tx_code: grant.user_pin_required.then(|| TxCode {
                        input_mode: Some(InputMode::Text),
                        length: None,
                        description: None,
                    }),
                    authorization_server: grant.authorization_server,
                }
            }),
        });

        CredentialOffer {
            credential_issuer: self.credential_issuer,
            credential_configuration_ids: self.credentials,
            grants,
        }
    }
}
