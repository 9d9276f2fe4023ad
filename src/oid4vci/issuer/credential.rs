//! # Credential Endpoint
//!
//! The issuer side of the Credential Endpoint: parsing and validating an
//! incoming Credential Request (dispatching on credential format) and
//! assembling the response in the shape the request calls for.

use tracing::instrument;

use crate::Result;
use crate::error::Error;
use crate::oid4vci::types::{
    CredentialRequest, CredentialResponse, CredentialResponseType, Format, IssuerMetadata, Proof,
    RequestBy,
};

/// Parse and validate an incoming Credential Request body.
///
/// Enforces the structural invariants: exactly one of
/// `credential_identifier` / a format object, at most one of `proof` /
/// `proofs`, and a known `format` tag when the format form is used.
///
/// # Errors
///
/// Returns `invalid_credential_request` for structural violations and
/// `unsupported_credential_format` for an unrecognized format.
#[instrument(level = "debug", skip_all)]
pub fn parse_credential_request(body: &serde_json::Value) -> Result<CredentialRequest> {
    tracing::debug!("parse_credential_request");

    let has_identifier = body.get("credential_identifier").is_some();
    let has_format = body.get("format").is_some();
    if has_identifier == has_format {
        return Err(Error::InvalidCredentialRequest(
            "exactly one of `credential_identifier` and `format` must be present".to_string(),
        ));
    }

    if body.get("proof").is_some() && body.get("proofs").is_some() {
        return Err(Error::InvalidCredentialRequest(
            "only one of `proof` and `proofs` may be present".to_string(),
        ));
    }
    if let Some(proofs) = body.get("proofs") {
        let keys = proofs.as_object().map_or(0, |proofs| proofs.len());
        if keys != 1 {
            return Err(Error::InvalidCredentialRequest(
                "`proofs` must contain exactly one proof type".to_string(),
            ));
        }
    }

    if has_format {
        let format = body.get("format").and_then(serde_json::Value::as_str).unwrap_or_default();
        if !matches!(format, "vc+sd-jwt" | "mso_mdoc" | "jwt_vc_json") {
            return Err(Error::UnsupportedCredentialFormat(format!(
                "unsupported credential format: {format}"
            )));
        }
    }

    serde_json::from_value(body.clone())
        .map_err(|e| Error::InvalidCredentialRequest(format!("malformed credential request: {e}")))
}

/// The credential dataset identification extracted from a request, after
/// format dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestedCredential<'a> {
    /// Requested by credential identifier from the token exchange.
    Identifier(&'a str),

    /// Requested by SD-JWT VC type.
    Vct(&'a str),

    /// Requested by mdoc document type.
    Doctype(&'a str),

    /// Requested by W3C credential type values.
    CredentialDefinition(&'a [String]),
}

/// Dispatch a parsed request to the identification its form carries.
#[must_use]
pub fn requested_credential(request: &CredentialRequest) -> RequestedCredential<'_> {
    match &request.credential {
        RequestBy::Identifier {
            credential_identifier,
        } => RequestedCredential::Identifier(credential_identifier),
        RequestBy::Format(Format::VcSdJwt(profile)) => RequestedCredential::Vct(&profile.vct),
        RequestBy::Format(Format::MsoMdoc(profile)) => {
            RequestedCredential::Doctype(&profile.doctype)
        }
        RequestBy::Format(Format::JwtVcJson(profile)) => {
            RequestedCredential::CredentialDefinition(&profile.credential_definition.type_)
        }
    }
}

/// Find the configuration id a by-format request resolves to in the
/// issuer's metadata.
///
/// # Errors
///
/// Returns `unsupported_credential_type` when no configuration matches.
pub fn resolve_configuration_id<'a>(
    issuer: &'a IssuerMetadata, request: &CredentialRequest,
) -> Result<&'a str> {
    let requested = requested_credential(request);

    // identifiers are minted by the token exchange; one naming a
    // configuration directly also resolves
    if let RequestedCredential::Identifier(id) = requested {
        return issuer
            .credential_configurations_supported
            .get_key_value(id)
            .map(|(id, _)| id.as_str())
            .ok_or_else(|| {
                Error::UnsupportedCredentialType(format!("unknown credential identifier: {id}"))
            });
    }

    issuer
        .credential_configurations_supported
        .iter()
        .find(|(_, configuration)| match (&requested, &configuration.format) {
            (RequestedCredential::Vct(vct), Format::VcSdJwt(profile)) => &profile.vct == vct,
            (RequestedCredential::Doctype(doctype), Format::MsoMdoc(profile)) => {
                &profile.doctype == doctype
            }
            (RequestedCredential::CredentialDefinition(type_), Format::JwtVcJson(profile)) => {
                &profile.credential_definition.type_ == type_
            }
            _ => false,
        })
        .map(|(id, _)| id.as_str())
        .ok_or_else(|| {
            Error::UnsupportedCredentialType(
                "no credential configuration matches the request".to_string(),
            )
        })
}

/// Options for assembling a Credential Response.
#[derive(Clone, Debug, Default)]
pub struct CredentialResponseOptions {
    /// A fresh `c_nonce` for the Wallet's next proof.
    pub c_nonce: Option<String>,

    /// The lifetime in seconds of the `c_nonce`.
    pub c_nonce_expires_in: Option<i64>,

    /// The id for later notification calls about the issued credential.
    pub notification_id: Option<String>,
}

/// Assemble a Credential Response mirroring the request's proof form: a
/// single `credential` for a single (or absent) proof, a `credentials`
/// batch for batch proofs.
///
/// # Errors
///
/// Returns `server_error` when the number of issued credentials does not
/// match the request form.
pub fn create_credential_response(
    request: &CredentialRequest, format: Option<String>,
    mut credentials: Vec<serde_json::Value>, options: CredentialResponseOptions,
) -> Result<CredentialResponse> {
    let batch = request.proof.as_ref().is_some_and(Proof::is_batch);

    let response = if batch {
        let expected = request.proof.as_ref().map(|p| p.jwts().len()).unwrap_or_default();
        if credentials.len() != expected {
            return Err(Error::ServerError(format!(
                "{} credentials issued for {expected} proofs",
                credentials.len()
            )));
        }
        CredentialResponseType::Credentials { credentials }
    } else {
        if credentials.len() != 1 {
            return Err(Error::ServerError(format!(
                "{} credentials issued for a single-credential request",
                credentials.len()
            )));
        }
        CredentialResponseType::Credential {
            credential: credentials.remove(0),
            format,
        }
    };

    Ok(CredentialResponse {
        response,
        c_nonce: options.c_nonce,
        c_nonce_expires_in: options.c_nonce_expires_in,
        notification_id: options.notification_id,
    })
}

/// Assemble a deferred-issuance response carrying a transaction id in
/// place of credentials.
#[must_use]
pub fn create_deferred_response(
    transaction_id: String, options: CredentialResponseOptions,
) -> CredentialResponse {
    CredentialResponse {
        response: CredentialResponseType::TransactionId { transaction_id },
        c_nonce: options.c_nonce,
        c_nonce_expires_in: options.c_nonce_expires_in,
        notification_id: options.notification_id,
    }
}
