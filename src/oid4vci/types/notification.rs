//! # Notification
//!
//! The Notification Endpoint exchange: the Wallet informs the Credential
//! Issuer of the disposition of an issued credential. Servers dedupe by
//! `notification_id`, so resending is harmless.

use serde::{Deserialize, Serialize};

/// A notification event.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// The credential was successfully stored in the Wallet.
    #[default]
    CredentialAccepted,

    /// The credential was deleted, either unsuccessful storage or deletion
    /// on the End-User's request.
    CredentialDeleted,

    /// Storage failed for any other reason.
    CredentialFailure,
}

/// A request to the Notification Endpoint, POSTed as JSON with the access
/// token from the issuance exchange.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NotificationRequest {
    /// The notification id from the Credential Response the notification
    /// refers to.
    pub notification_id: String,

    /// The event being notified.
    pub event: NotificationEvent,

    /// Human-readable ASCII detail about the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_description: Option<String>,
}
