use color_eyre::eyre::Result;
use serde::Serialize;

/// Decoupled representation of an artist from the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

/// Decoupled representation of an album from an artist's discography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

/// A track credit. Only the id and name are known from a track listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCredit {
    pub id: String,
    pub name: String,
}

/// Decoupled representation of a track from an album's track listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    pub artists: Vec<CatalogCredit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Catalog request failed with status {status}")]
pub struct RemoteFetchError {
    pub status: u16,
}

/// Outcome of a catalog call that reached the API.
///
/// Non-2xx responses (from the catalog or the token endpoint) are a `Failure`.
/// Transport problems are not represented here, they surface as the outer `Err`
/// of the port methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse<T> {
    Success { status: u16, data: T },
    Failure { status: u16 },
}

impl<T> ApiResponse<T> {
    #[cfg(test)]
    pub fn success(data: T) -> Self {
        ApiResponse::Success { status: 200, data }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        match self {
            ApiResponse::Success { status, data } => ApiResponse::Success {
                status,
                data: f(data),
            },
            ApiResponse::Failure { status } => ApiResponse::Failure { status },
        }
    }

    pub fn into_result(self) -> Result<T, RemoteFetchError> {
        match self {
            ApiResponse::Success { data, .. } => Ok(data),
            ApiResponse::Failure { status } => Err(RemoteFetchError { status }),
        }
    }
}

/// Port trait wrapping the catalog capabilities used by the cache orchestrator.
///
/// Implementations live in `spotify_rs::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    async fn artist_by_id(&self, id: &str) -> Result<ApiResponse<CatalogArtist>>;
    async fn search_artists(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<ApiResponse<Vec<CatalogArtist>>>;
    /// Every album of the artist, all pages. A failed page fails the call.
    async fn artist_albums(&self, artist_id: &str) -> Result<ApiResponse<Vec<CatalogAlbum>>>;
    /// Every track of the album, all pages. A failed page fails the call.
    async fn album_tracks(&self, album_id: &str) -> Result<ApiResponse<Vec<CatalogTrack>>>;
}
