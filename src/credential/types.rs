use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::CredentialError;

/// Token response body from the credential endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(alias = "rtc_url")]
    pub endpoint: String,
    #[serde(alias = "expiresAt")]
    pub expires_at: String,
}

/// Short-lived authorization used once to open a realtime channel
#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub endpoint: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Validate a raw response body
    pub fn from_json(body: &[u8]) -> Result<Self, CredentialError> {
        let response: TokenResponse = serde_json::from_slice(body)
            .map_err(|e| CredentialError::ShapeInvalid(e.to_string()))?;
        Self::try_from(response)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl TryFrom<TokenResponse> for Credential {
    type Error = CredentialError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        let expires_at = DateTime::parse_from_rfc3339(&response.expires_at)
            .map_err(|e| {
                CredentialError::ShapeInvalid(format!(
                    "expires_at {:?} is not RFC 3339: {}",
                    response.expires_at, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            token: response.token,
            endpoint: response.endpoint,
            expires_at,
        })
    }
}

// Keep the token out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
