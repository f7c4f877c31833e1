use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::ports::catalog::{ApiResponse, CatalogAlbum, CatalogArtist, CatalogClient, CatalogTrack};
use crate::spotify_rs::auth::{AuthError, ClientCredentials};
use crate::spotify_rs::pagination::{collect_pages, pages};
use crate::spotify_rs::types::{Page, SearchResponse, SpotifyAlbum, SpotifyArtist, SpotifyTrack};

pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Spotify caps paged listings at 50 entries
const PAGE_SIZE: u32 = 50;
const MAX_RATE_LIMIT_RETRIES: usize = 3;

#[derive(Debug)]
enum SendError {
    RateLimited,
    Transport(reqwest::Error),
}

/// Spotify Web API client authenticated with client credentials
pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: Arc<ClientCredentials>,
    api_base_url: String,
    request_timeout: Duration,
    retry_delay: Duration,
}

impl SpotifyClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<ClientCredentials>,
        api_base_url: &str,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout,
            retry_delay: Duration::from_millis(500),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Authenticated GET. Non-2xx statuses, including a rejected token refresh,
    /// come back as `ApiResponse::Failure`; only transport errors are `Err`.
    async fn signed_get<T: DeserializeOwned>(&self, url: &str) -> Result<ApiResponse<T>> {
        let token = match self.credentials.ensure_valid_credential().await {
            Ok(token) => token,
            Err(AuthError::Rejected { status }) => {
                return Ok(ApiResponse::Failure { status });
            }
            Err(error) => return Err(error).wrap_err("Failed to obtain Spotify access token"),
        };

        tracing::debug!("GET {}", url);
        let send = || async {
            let response = self
                .http
                .get(url)
                .bearer_auth(&token)
                .timeout(self.request_timeout)
                .send()
                .await
                .map_err(SendError::Transport)?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                return Err(SendError::RateLimited);
            }
            Ok(response)
        };

        let response = send
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.retry_delay)
                    .with_max_times(MAX_RATE_LIMIT_RETRIES),
            )
            .when(|error| matches!(error, SendError::RateLimited))
            .notify(|_, delay| {
                tracing::warn!("Spotify rate limited {}, retrying in {:?}", url, delay)
            })
            .await;

        let response = match response {
            Ok(response) => response,
            Err(SendError::RateLimited) => {
                return Ok(ApiResponse::Failure {
                    status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                });
            }
            Err(SendError::Transport(error)) => {
                return Err(error).wrap_err(format!("Failed to send request to {url}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Spotify request {} failed with status {}", url, status);
            return Ok(ApiResponse::Failure {
                status: status.as_u16(),
            });
        }

        let data = response
            .json::<T>()
            .await
            .wrap_err(format!("Failed to parse response from {url}"))?;

        Ok(ApiResponse::Success {
            status: status.as_u16(),
            data,
        })
    }

    async fn all_pages<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<ApiResponse<Vec<T>>> {
        collect_pages(pages(first_url, move |url| async move {
            self.signed_get::<Page<T>>(&url).await
        }))
        .await
    }
}

#[async_trait::async_trait]
impl CatalogClient for SpotifyClient {
    async fn artist_by_id(&self, id: &str) -> Result<ApiResponse<CatalogArtist>> {
        let url = format!("{}/artists/{}", self.api_base_url, urlencoding::encode(id));
        Ok(self
            .signed_get::<SpotifyArtist>(&url)
            .await?
            .map(CatalogArtist::from))
    }

    async fn search_artists(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ApiResponse<Vec<CatalogArtist>>> {
        let url = format!(
            "{}/search?type=artist&q={}&limit={}",
            self.api_base_url,
            urlencoding::encode(query.trim()),
            limit
        );
        Ok(self
            .signed_get::<SearchResponse>(&url)
            .await?
            .map(|response| {
                response
                    .artists
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(CatalogArtist::from)
                    .collect()
            }))
    }

    async fn artist_albums(&self, artist_id: &str) -> Result<ApiResponse<Vec<CatalogAlbum>>> {
        tracing::info!("Fetching discography for artist {}", artist_id);
        let url = format!(
            "{}/artists/{}/albums?include_groups=album,single&limit={}",
            self.api_base_url,
            urlencoding::encode(artist_id),
            PAGE_SIZE
        );
        Ok(self
            .all_pages::<SpotifyAlbum>(url)
            .await?
            .map(|albums| albums.into_iter().map(CatalogAlbum::from).collect()))
    }

    async fn album_tracks(&self, album_id: &str) -> Result<ApiResponse<Vec<CatalogTrack>>> {
        tracing::debug!("Fetching tracks for album {}", album_id);
        let url = format!(
            "{}/albums/{}/tracks?limit={}",
            self.api_base_url,
            urlencoding::encode(album_id),
            PAGE_SIZE
        );
        Ok(self
            .all_pages::<SpotifyTrack>(url)
            .await?
            .map(|tracks| tracks.into_iter().map(CatalogTrack::from).collect()))
    }
}
