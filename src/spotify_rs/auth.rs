use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::Mutex;

use crate::spotify_rs::types::SpotifyTokenResponse;

pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token request rejected with status {status}")]
    Rejected { status: u16 },
    #[error("Failed to send token request: {0}")]
    Transport(reqwest::Error),
    #[error("Failed to parse token response: {0}")]
    InvalidResponse(reqwest::Error),
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// Unix millis
    expires_at_ms: i64,
}

impl CachedToken {
    fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }
}

/// Client-credentials token provider.
///
/// Tokens are fetched lazily on first use and renewed once they expire. The
/// state lock is held for the whole refresh, so concurrent callers wait for
/// the in-flight refresh instead of issuing their own.
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    state: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    pub fn new(
        client_id: String,
        client_secret: String,
        accounts_base_url: &str,
        http: reqwest::Client,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: format!("{}/api/token", accounts_base_url.trim_end_matches('/')),
            http,
            request_timeout,
            state: Mutex::new(None),
        }
    }

    /// Returns a bearer token, refreshing it if absent or expired.
    ///
    /// A failed refresh leaves the previous (expired) token in place, but it
    /// is never handed out.
    pub async fn ensure_valid_credential(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;

        let now_ms = chrono::Utc::now().timestamp_millis();
        if let Some(cached) = state.as_ref().filter(|cached| cached.is_valid_at(now_ms)) {
            return Ok(cached.token.clone());
        }

        tracing::info!("Refreshing Spotify access token");
        let response = self.request_token().await?;

        let cached = CachedToken {
            token: response.access_token,
            expires_at_ms: chrono::Utc::now().timestamp_millis() + response.expires_in * 1000,
        };
        let token = cached.token.clone();
        *state = Some(cached);

        Ok(token)
    }

    async fn request_token(&self) -> Result<SpotifyTokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            // Serializes to x-www-form-urlencoded and sets the content type
            .form(&[("grant_type", "client_credentials")])
            .header(
                "Authorization",
                format!(
                    "Basic {}",
                    STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
                ),
            )
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = response.status();
        tracing::debug!("Token endpoint answered {}", status);
        if !status.is_success() {
            tracing::warn!("Spotify token refresh failed with status {}", status);
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .json::<SpotifyTokenResponse>()
            .await
            .map_err(AuthError::InvalidResponse)
    }

    #[cfg(test)]
    pub(crate) async fn seed_token(&self, token: &str, expires_at_ms: i64) {
        *self.state.lock().await = Some(CachedToken {
            token: token.to_string(),
            expires_at_ms,
        });
    }

    #[cfg(test)]
    pub(crate) async fn cached_token(&self) -> Option<String> {
        self.state.lock().await.as_ref().map(|cached| cached.token.clone())
    }
}
