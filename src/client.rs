use url::Url;

use crate::config::CircaConfig;
use crate::error::Result;
use crate::rest::CircaHttpClient;
use crate::session::SessionStatus;
use crate::types::{CreateGroupRequest, Group, LoginRequest};

/// Main Circa client.
///
/// Wraps the REST client and the session probe. The per-user flow logic
/// lives in [`crate::flow::AuthFlow`], which borrows this client.
#[derive(Debug, Clone)]
pub struct CircaClient {
    /// Client configuration.
    pub config: CircaConfig,
    /// HTTP client; owns the session cookie jar.
    pub http_client: CircaHttpClient,
}

impl CircaClient {
    pub fn new(config: CircaConfig) -> Result<Self> {
        Url::parse(&config.base_url)?;
        let http_client = CircaHttpClient::new(&config.base_url)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Probe `GET /me`. Never fails; anything short of a 2xx counts as
    /// signed out.
    pub async fn check_session(&self) -> SessionStatus {
        match self.http_client.get_me().await {
            Ok(profile) => SessionStatus::Authenticated(profile),
            Err(e) => {
                tracing::debug!(error = %e, "session probe negative");
                SessionStatus::Unauthenticated
            }
        }
    }

    /// Request a sign-in magic link for a returning user. Returns the
    /// server's acknowledgement message.
    pub async fn login(&self, email: &str) -> Result<String> {
        let resp = self
            .http_client
            .login(&LoginRequest {
                email: email.to_string(),
            })
            .await?;
        Ok(resp
            .message
            .unwrap_or_else(|| "Login link sent! Check your email.".to_string()))
    }

    /// End the current session.
    pub async fn logout(&self) -> Result<()> {
        self.http_client.logout().await?;
        tracing::info!("session ended");
        Ok(())
    }

    /// Create a savings circle owned by the current user.
    pub async fn create_group(&self, name: &str, description: Option<String>) -> Result<Group> {
        let group = self
            .http_client
            .create_group(&CreateGroupRequest {
                name: name.to_string(),
                description,
            })
            .await?;
        tracing::info!(group_id = %group.id, "group created");
        Ok(group)
    }
}
