//! # `OpenID4VCI` Types
//!
//! The wire types of the issuance exchanges.

mod credential;
mod credential_offer;
mod metadata;
mod notification;

pub use self::credential::*;
pub use self::credential_offer::*;
pub use self::metadata::*;
pub use self::notification::*;
