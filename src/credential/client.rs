use std::time::Duration;

use tracing::{info, warn};

use super::types::Credential;
use crate::error::CredentialError;

/// Source of short-lived realtime credentials
#[async_trait::async_trait]
pub trait CredentialFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Credential, CredentialError>;
}

/// Fetches credentials from the token endpoint over HTTP
pub struct HttpCredentialFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::FetchFailed(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl CredentialFetcher for HttpCredentialFetcher {
    async fn fetch(&self) -> Result<Credential, CredentialError> {
        info!("Requesting realtime token from {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| CredentialError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Token endpoint returned {}", status);
            return Err(CredentialError::FetchFailed(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CredentialError::FetchFailed(e.to_string()))?;

        let credential = Credential::from_json(&body)?;
        info!("Received realtime token (expires {})", credential.expires_at);

        Ok(credential)
    }
}
