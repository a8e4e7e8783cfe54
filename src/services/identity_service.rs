use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::user::CurrentUser;
use crate::services::catalog_service::parse_base;

/// Resolves a bearer token to the user it was issued for.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_current_user(&self, token: &str) -> Result<CurrentUser>;
}

#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    me_url: Url,
}

impl HttpIdentityProvider {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        let me_url = parse_base(&config.auth_server_url)?
            .join("api/v1/users/me")
            .map_err(|e| Error::Config(format!("Invalid AUTH_SERVER_URL: {}", e)))?;
        Ok(Self { client, me_url })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_current_user(&self, token: &str) -> Result<CurrentUser> {
        let response = self
            .client
            .get(self.me_url.clone())
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(Error::Unauthorized("invalid or expired token".to_string()))
            }
            status if status.is_success() => Ok(response.json::<CurrentUser>().await?),
            status => {
                tracing::warn!(%status, "auth server rejected token lookup");
                Err(Error::Internal(format!(
                    "auth server returned unexpected status {}",
                    status
                )))
            }
        }
    }
}
