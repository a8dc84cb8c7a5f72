use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ensure_success, ApiClient};
use crate::error::{ApiError, Result};

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
}

impl ApiClient {
    /// Log in and keep the returned token for subsequent requests.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Session> {
        let url = self.url("/login");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: LoginResponse = response.json().await?;
        let token = body
            .token
            .or(body.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::UnexpectedReply("login reply has no token".to_string()))?;

        info!("logged in as {}", username);
        self.token = Some(token.clone());

        Ok(Session {
            username: username.to_string(),
            token,
        })
    }
}
