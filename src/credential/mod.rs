//! Short-lived realtime credentials
//!
//! The token endpoint is an external collaborator: one `POST`, no body, and a
//! `{token, endpoint, expires_at}` response validated on deserialisation.

mod client;
mod types;

pub use client::{CredentialFetcher, HttpCredentialFetcher};
pub use types::{Credential, TokenResponse};
