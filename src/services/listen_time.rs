use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use color_eyre::eyre::Result;
use futures::{StreamExt, stream};
use serde::Serialize;

use crate::database::{Album, AlbumTrack, Artist, Database, Track};
use crate::ports::catalog::{ApiResponse, CatalogArtist, CatalogClient};
use crate::time_units::{TimeUnits, format_duration};

pub const DEFAULT_ALBUM_CONCURRENCY: usize = 8;

/// Searches with fewer characters than this never reach the catalog
const MIN_SEARCH_QUERY_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<CatalogArtist> for ArtistSummary {
    fn from(artist: CatalogArtist) -> Self {
        Self {
            id: artist.id,
            name: artist.name,
            image: artist.image,
        }
    }
}

impl From<Artist> for ArtistSummary {
    fn from(artist: Artist) -> Self {
        Self {
            id: artist.id,
            name: artist.name,
            image: artist.image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRuntime {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub runtime_ms: i64,
}

/// How long it takes to listen to everything an artist is credited on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackTiming {
    pub artist: ArtistSummary,
    pub total_time_ms: i64,
    pub time: TimeUnits,
    pub albums: Vec<AlbumRuntime>,
}

/// Read-through cache over the remote catalog.
///
/// Every lookup is answered from the local store when possible. Misses are
/// fetched from the catalog, persisted, and read back so callers always see
/// store rows. Catalog failures degrade to empty results, while transport and
/// store errors are returned.
pub struct ListenTimeService<C: CatalogClient> {
    db: Arc<Database>,
    client: C,
    retention: Duration,
    album_concurrency: usize,
}

impl<C: CatalogClient> ListenTimeService<C> {
    pub fn new(db: Arc<Database>, client: C, retention: Duration) -> Self {
        Self {
            db,
            client,
            retention,
            album_concurrency: DEFAULT_ALBUM_CONCURRENCY,
        }
    }

    /// Upper bound on album track listings fetched at once.
    pub fn with_album_concurrency(mut self, album_concurrency: usize) -> Self {
        self.album_concurrency = album_concurrency.max(1);
        self
    }

    pub async fn get_artist_by_id(&self, artist_id: &str) -> Result<Option<Artist>> {
        let cached = self.db.get_artist(artist_id).await?;
        match &cached {
            Some(artist) if artist.last_updated.is_some() => {
                tracing::debug!("Artist cache hit for {}", artist_id);
                return Ok(cached);
            }
            Some(_) => tracing::debug!("Artist {} is only known from credits", artist_id),
            None => tracing::debug!("Artist cache miss for {}", artist_id),
        }

        tracing::info!("Fetching artist {} from catalog", artist_id);
        match self.client.artist_by_id(artist_id).await? {
            ApiResponse::Success { data, .. } => Ok(Some(self.db.upsert_artist(&data).await?)),
            ApiResponse::Failure { status } => {
                tracing::warn!("Catalog lookup of artist {} failed: {}", artist_id, status);
                Ok(cached)
            }
        }
    }

    /// Cached albums of the artist, or its whole discography fetched,
    /// persisted, and read back.
    ///
    /// If any album's track listing cannot be fetched nothing is stored and
    /// the result is empty.
    pub async fn get_artist_albums(&self, artist_id: &str) -> Result<Vec<Album>> {
        Ok(self.fetch_discography(artist_id).await?.unwrap_or_default())
    }

    /// `None` when the discography could not be fetched. An artist without
    /// albums of its own yields `Some` of an empty list.
    async fn fetch_discography(&self, artist_id: &str) -> Result<Option<Vec<Album>>> {
        let cached = self.db.get_artist_albums(artist_id).await?;
        if !cached.is_empty() {
            tracing::debug!("Album cache hit for artist {} ({})", artist_id, cached.len());
            return Ok(Some(cached));
        }

        // Albums reference the artist row
        if self.db.get_artist(artist_id).await?.is_none()
            && self.get_artist_by_id(artist_id).await?.is_none()
        {
            return Ok(None);
        }

        tracing::info!("Fetching discography of artist {}", artist_id);
        let albums = match self.client.artist_albums(artist_id).await?.into_result() {
            Ok(albums) => albums,
            Err(error) => {
                tracing::warn!("Failed to fetch albums of artist {}: {}", artist_id, error);
                return Ok(None);
            }
        };

        let mut fetches = stream::iter(albums)
            .map(|album| async move {
                let response = self.client.album_tracks(&album.id).await;
                (album, response)
            })
            .buffer_unordered(self.album_concurrency);

        let mut album_rows = Vec::new();
        let mut album_tracks = Vec::new();
        while let Some((album, response)) = fetches.next().await {
            let tracks = match response?.into_result() {
                Ok(tracks) => tracks,
                Err(error) => {
                    tracing::warn!(
                        "Failed to fetch tracks of album {}: {}, discarding discography of {}",
                        album.id,
                        error,
                        artist_id
                    );
                    return Ok(None);
                }
            };

            album_rows.push(Album {
                id: album.id.clone(),
                name: album.name,
                artist_id: artist_id.to_string(),
                image: album.image,
                total_runtime_ms: Some(tracks.iter().map(|track| track.duration_ms).sum()),
            });
            album_tracks.extend(tracks.into_iter().map(|track| AlbumTrack {
                album_id: album.id.clone(),
                track,
            }));
        }

        tracing::info!(
            "Persisting {} albums and {} tracks for artist {}",
            album_rows.len(),
            album_tracks.len(),
            artist_id
        );
        self.db
            .persist_discography_batch(&album_rows, &album_tracks)
            .await?;

        Ok(Some(self.db.get_artist_albums(artist_id).await?))
    }

    /// Tracks of a cached album. Albums are only ever fetched as part of a
    /// discography, so an unknown album is empty.
    pub async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        self.db.get_album_tracks(album_id).await
    }

    pub async fn get_artist_track_timing(&self, artist_id: &str) -> Result<Option<TrackTiming>> {
        let Some(mut artist) = self.get_artist_by_id(artist_id).await? else {
            return Ok(None);
        };

        if self.is_stale(&artist) {
            tracing::info!("Cached data for artist {} expired, refetching", artist.id);
            self.db.clear_artist_cache(&artist.id).await?;
            let Some(fresh) = self.get_artist_by_id(artist_id).await? else {
                return Ok(None);
            };
            artist = fresh;
        }

        let discography = self.fetch_discography(&artist.id).await?;

        let total_time_ms = match (artist.total_runtime_ms, &discography) {
            (Some(total), _) => {
                tracing::debug!("Using cached runtime for artist {}", artist.id);
                total
            }
            // The fetch failed, keep the runtime open for the next lookup
            (None, None) => 0,
            (None, Some(_)) => {
                let total = self.db.aggregate_artist_runtime(&artist.id).await?;
                if let Some(updated) = self.db.get_artist(&artist.id).await? {
                    artist = updated;
                }
                total
            }
        };

        Ok(Some(TrackTiming {
            artist: artist.into(),
            total_time_ms,
            time: format_duration(total_time_ms),
            albums: discography
                .unwrap_or_default()
                .into_iter()
                .map(|album| AlbumRuntime {
                    id: album.id,
                    name: album.name,
                    image: album.image,
                    runtime_ms: album.total_runtime_ms.unwrap_or(0),
                })
                .collect(),
        }))
    }

    pub async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistSummary>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_QUERY_CHARS {
            return Ok(Vec::new());
        }

        match self.client.search_artists(query, limit).await? {
            ApiResponse::Success { data, .. } => {
                Ok(data.into_iter().map(ArtistSummary::from).collect())
            }
            ApiResponse::Failure { status } => {
                tracing::warn!(
                    "Catalog search for '{}' failed: {}, searching cache",
                    query,
                    status
                );
                let local = self
                    .db
                    .search_artists_by_name(query, limit as usize)
                    .await?;
                Ok(local.into_iter().map(ArtistSummary::from).collect())
            }
        }
    }

    /// Timing for `input` taken as an artist id, or else for the best search
    /// match of `input`.
    pub async fn resolve_artist_timing(&self, input: &str) -> Result<Option<TrackTiming>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        if let Some(timing) = self.get_artist_track_timing(input).await? {
            return Ok(Some(timing));
        }

        tracing::debug!("'{}' is not a known artist id, searching", input);
        match self.search_artists(input, 1).await?.into_iter().next() {
            Some(hit) => self.get_artist_track_timing(&hit.id).await,
            None => Ok(None),
        }
    }

    /// Number of cached artists. Fails if the store is unreachable.
    pub async fn health(&self) -> Result<u64> {
        self.db.artist_count().await
    }

    fn is_stale(&self, artist: &Artist) -> bool {
        artist
            .last_updated
            .and_then(|updated| Utc::now().signed_duration_since(updated).to_std().ok())
            .is_some_and(|age| age > self.retention)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::sea_query::Expr;
    use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

    use super::*;
    use crate::entities;
    use crate::ports::catalog::{CatalogAlbum, CatalogCredit, CatalogTrack, MockCatalogClient};
    use crate::test_utils::test_db;

    const RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    fn catalog_artist(id: &str, name: &str) -> CatalogArtist {
        CatalogArtist {
            id: id.into(),
            name: name.into(),
            image: Some(format!("https://img/{id}")),
        }
    }

    fn catalog_album(id: &str, name: &str) -> CatalogAlbum {
        CatalogAlbum {
            id: id.into(),
            name: name.into(),
            image: None,
        }
    }

    fn catalog_track(id: &str, duration_ms: i64, credits: &[&str]) -> CatalogTrack {
        CatalogTrack {
            id: id.into(),
            name: format!("Track {id}"),
            duration_ms,
            artists: credits
                .iter()
                .map(|artist| CatalogCredit {
                    id: artist.to_string(),
                    name: format!("Artist {artist}"),
                })
                .collect(),
        }
    }

    /// Catalog with artist `a1`, two albums, and a guest credit on one track.
    fn make_mock_client() -> MockCatalogClient {
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .withf(|id| id == "a1")
            .times(1)
            .returning(|_| Ok(ApiResponse::success(catalog_artist("a1", "Artist One"))));
        client
            .expect_artist_albums()
            .withf(|id| id == "a1")
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::success(vec![
                    catalog_album("al1", "First"),
                    catalog_album("al2", "Second"),
                ]))
            });
        client
            .expect_album_tracks()
            .withf(|id| id == "al1")
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::success(vec![
                    catalog_track("t1", 100_000, &["a1"]),
                    catalog_track("t2", 200_000, &["a1", "guest"]),
                ]))
            });
        client
            .expect_album_tracks()
            .withf(|id| id == "al2")
            .times(1)
            .returning(|_| Ok(ApiResponse::success(vec![catalog_track("t3", 50_000, &["a1"])])));
        client
    }

    async fn artist_rows(db: &Database) -> u64 {
        entities::artist::Entity::find().count(&db.conn).await.unwrap()
    }

    async fn track_rows(db: &Database) -> u64 {
        entities::track::Entity::find().count(&db.conn).await.unwrap()
    }

    // ---- get_artist_by_id tests ----

    #[tokio::test]
    async fn test_get_artist_by_id_cache_hit_skips_catalog() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("a1", "Cached")).await.unwrap();
        let service = ListenTimeService::new(db, MockCatalogClient::new(), RETENTION);

        let artist = service.get_artist_by_id("a1").await.unwrap().unwrap();

        assert_eq!(artist.name, "Cached");
    }

    #[tokio::test]
    async fn test_get_artist_by_id_miss_is_fetched_and_cached() {
        let db = test_db().await;
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .times(1)
            .returning(|_| Ok(ApiResponse::success(catalog_artist("a1", "Remote"))));
        let service = ListenTimeService::new(db.clone(), client, RETENTION);

        let first = service.get_artist_by_id("a1").await.unwrap().unwrap();
        let second = service.get_artist_by_id("a1").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.total_runtime_ms, None);
        assert_eq!(db.get_artist("a1").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_get_artist_by_id_remote_failure_is_none() {
        let db = test_db().await;
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .returning(|_| Ok(ApiResponse::Failure { status: 404 }));
        let service = ListenTimeService::new(db.clone(), client, RETENTION);

        assert_eq!(service.get_artist_by_id("nope").await.unwrap(), None);
        assert_eq!(artist_rows(&db).await, 0);
    }

    #[tokio::test]
    async fn test_get_artist_by_id_refreshes_stub() {
        let db = test_db().await;
        db.bulk_insert_artist_stubs(&[crate::database::ArtistStub {
            id: "guest".into(),
            name: "Guest".into(),
        }])
        .await
        .unwrap();
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .times(1)
            .returning(|_| Ok(ApiResponse::success(catalog_artist("guest", "Guest Star"))));
        let service = ListenTimeService::new(db, client, RETENTION);

        let artist = service.get_artist_by_id("guest").await.unwrap().unwrap();

        assert_eq!(artist.name, "Guest Star");
        assert!(artist.last_updated.is_some());
        assert!(artist.image.is_some());
    }

    #[tokio::test]
    async fn test_get_artist_by_id_keeps_stub_when_refresh_fails() {
        let db = test_db().await;
        db.bulk_insert_artist_stubs(&[crate::database::ArtistStub {
            id: "guest".into(),
            name: "Guest".into(),
        }])
        .await
        .unwrap();
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .returning(|_| Ok(ApiResponse::Failure { status: 503 }));
        let service = ListenTimeService::new(db, client, RETENTION);

        let artist = service.get_artist_by_id("guest").await.unwrap().unwrap();

        assert_eq!(artist.name, "Guest");
        assert_eq!(artist.last_updated, None);
    }

    // ---- get_artist_albums tests ----

    #[tokio::test]
    async fn test_get_artist_albums_fetches_and_persists_discography() {
        let db = test_db().await;
        let service = ListenTimeService::new(db.clone(), make_mock_client(), RETENTION);

        let albums = service.get_artist_albums("a1").await.unwrap();

        assert_eq!(
            albums
                .iter()
                .map(|album| (album.id.as_str(), album.total_runtime_ms))
                .collect::<Vec<_>>(),
            vec![("al1", Some(300_000)), ("al2", Some(50_000))]
        );
        assert_eq!(track_rows(&db).await, 3);
        // Credited guest exists as a stub
        let guest = db.get_artist("guest").await.unwrap().unwrap();
        assert_eq!(guest.last_updated, None);

        // Second call is served from the cache, the mock allows one fetch only
        assert_eq!(service.get_artist_albums("a1").await.unwrap(), albums);
    }

    #[tokio::test]
    async fn test_get_artist_albums_one_failed_listing_persists_nothing() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("a1", "Artist One")).await.unwrap();
        let mut client = MockCatalogClient::new();
        client.expect_artist_albums().returning(|_| {
            Ok(ApiResponse::success(vec![
                catalog_album("al1", "First"),
                catalog_album("al2", "Second"),
                catalog_album("al3", "Third"),
            ]))
        });
        client
            .expect_album_tracks()
            .withf(|id| id == "al2")
            .returning(|_| Ok(ApiResponse::Failure { status: 500 }));
        client
            .expect_album_tracks()
            .returning(|id| Ok(ApiResponse::success(vec![catalog_track(&format!("{id}-t"), 1_000, &["a1"])])));
        let service = ListenTimeService::new(db.clone(), client, RETENTION);

        let albums = service.get_artist_albums("a1").await.unwrap();

        assert!(albums.is_empty());
        assert_eq!(
            entities::album::Entity::find().count(&db.conn).await.unwrap(),
            0
        );
        assert_eq!(track_rows(&db).await, 0);
        assert_eq!(artist_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn test_get_artist_albums_discography_failure_is_empty() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("a1", "Artist One")).await.unwrap();
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_albums()
            .returning(|_| Ok(ApiResponse::Failure { status: 429 }));
        let service = ListenTimeService::new(db, client, RETENTION);

        assert!(service.get_artist_albums("a1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_artist_albums_unknown_artist_is_empty() {
        let db = test_db().await;
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .returning(|_| Ok(ApiResponse::Failure { status: 404 }));
        let service = ListenTimeService::new(db, client, RETENTION);

        assert!(service.get_artist_albums("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_album_tracks_after_discography_fetch() {
        let db = test_db().await;
        let service = ListenTimeService::new(db, make_mock_client(), RETENTION);
        service.get_artist_albums("a1").await.unwrap();

        let tracks = service.get_album_tracks("al1").await.unwrap();

        assert_eq!(
            tracks.iter().map(|track| track.id.as_str()).collect::<Vec<_>>(),
            vec!["t1", "t2"]
        );
        assert!(service.get_album_tracks("unknown").await.unwrap().is_empty());
    }

    // ---- get_artist_track_timing tests ----

    #[tokio::test]
    async fn test_timing_aggregates_once_then_uses_cache() {
        let db = test_db().await;
        let service = ListenTimeService::new(db.clone(), make_mock_client(), RETENTION);

        let first = service.get_artist_track_timing("a1").await.unwrap().unwrap();

        assert_eq!(first.total_time_ms, 350_000);
        assert_eq!(first.time.string, "5 minutes, 50 seconds");
        assert_eq!(first.artist.name, "Artist One");
        assert_eq!(first.albums.len(), 2);
        assert_eq!(
            db.get_artist("a1").await.unwrap().unwrap().total_runtime_ms,
            Some(350_000)
        );

        // Every catalog expectation is `times(1)`
        let second = service.get_artist_track_timing("a1").await.unwrap().unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_timing_fast_path_makes_no_catalog_calls() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("a1", "Artist One")).await.unwrap();
        db.persist_discography_batch(
            &[Album {
                id: "al1".into(),
                name: "First".into(),
                artist_id: "a1".into(),
                image: None,
                total_runtime_ms: Some(4_000),
            }],
            &[AlbumTrack {
                album_id: "al1".into(),
                track: catalog_track("t1", 4_000, &["a1"]),
            }],
        )
        .await
        .unwrap();
        db.aggregate_artist_runtime("a1").await.unwrap();
        let service = ListenTimeService::new(db, MockCatalogClient::new(), RETENTION);

        let timing = service.get_artist_track_timing("a1").await.unwrap().unwrap();

        assert_eq!(timing.total_time_ms, 4_000);
        assert_eq!(timing.albums[0].runtime_ms, 4_000);
    }

    #[tokio::test]
    async fn test_timing_counts_featured_tracks() {
        let db = test_db().await;
        let mut client = make_mock_client();
        client
            .expect_artist_by_id()
            .withf(|id| id == "guest")
            .returning(|_| Ok(ApiResponse::success(catalog_artist("guest", "Guest"))));
        client
            .expect_artist_albums()
            .withf(|id| id == "guest")
            .returning(|_| Ok(ApiResponse::success(vec![catalog_album("g1", "Solo")])));
        client
            .expect_album_tracks()
            .withf(|id| id == "g1")
            .returning(|_| Ok(ApiResponse::success(vec![catalog_track("gt1", 10_000, &["guest"])])));
        let service = ListenTimeService::new(db, client, RETENTION);

        service.get_artist_albums("a1").await.unwrap();
        let timing = service.get_artist_track_timing("guest").await.unwrap().unwrap();

        // Own album plus the credit on t2
        assert_eq!(timing.total_time_ms, 210_000);
        assert_eq!(timing.albums.len(), 1);
    }

    #[tokio::test]
    async fn test_timing_counts_guest_only_artist() {
        let db = test_db().await;
        let mut client = make_mock_client();
        client
            .expect_artist_by_id()
            .withf(|id| id == "guest")
            .returning(|_| Ok(ApiResponse::success(catalog_artist("guest", "Guest"))));
        client
            .expect_artist_albums()
            .withf(|id| id == "guest")
            .times(1)
            .returning(|_| Ok(ApiResponse::success(vec![])));
        let service = ListenTimeService::new(db.clone(), client, RETENTION);

        service.get_artist_albums("a1").await.unwrap();
        let timing = service.get_artist_track_timing("guest").await.unwrap().unwrap();

        // Only the credit on t2, the guest has no albums of its own
        assert_eq!(timing.total_time_ms, 200_000);
        assert!(timing.albums.is_empty());
        assert_eq!(
            db.get_artist("guest").await.unwrap().unwrap().total_runtime_ms,
            Some(200_000)
        );
    }

    #[tokio::test]
    async fn test_timing_refetches_stale_artist() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("a1", "Old Name")).await.unwrap();
        db.persist_discography_batch(
            &[Album {
                id: "old".into(),
                name: "Old Album".into(),
                artist_id: "a1".into(),
                image: None,
                total_runtime_ms: Some(1),
            }],
            &[AlbumTrack {
                album_id: "old".into(),
                track: catalog_track("old-t", 1, &["a1"]),
            }],
        )
        .await
        .unwrap();
        db.aggregate_artist_runtime("a1").await.unwrap();
        entities::artist::Entity::update_many()
            .col_expr(entities::artist::Column::LastUpdated, Expr::value(0i64))
            .filter(entities::artist::Column::Id.eq("a1"))
            .exec(&db.conn)
            .await
            .unwrap();
        let service = ListenTimeService::new(db.clone(), make_mock_client(), RETENTION);

        let timing = service.get_artist_track_timing("a1").await.unwrap().unwrap();

        assert_eq!(timing.artist.name, "Artist One");
        assert_eq!(timing.total_time_ms, 350_000);
        assert!(timing.albums.iter().all(|album| album.id != "old"));
        assert!(db.get_album_tracks("old").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timing_unknown_artist_is_none() {
        let db = test_db().await;
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .returning(|_| Ok(ApiResponse::Failure { status: 400 }));
        let service = ListenTimeService::new(db, client, RETENTION);

        assert_eq!(service.get_artist_track_timing("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_timing_without_albums_leaves_runtime_open() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("a1", "Artist One")).await.unwrap();
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_albums()
            .returning(|_| Ok(ApiResponse::Failure { status: 502 }));
        let service = ListenTimeService::new(db.clone(), client, RETENTION);

        let timing = service.get_artist_track_timing("a1").await.unwrap().unwrap();

        assert_eq!(timing.total_time_ms, 0);
        assert_eq!(
            db.get_artist("a1").await.unwrap().unwrap().total_runtime_ms,
            None
        );
    }

    // ---- search tests ----

    #[tokio::test]
    async fn test_search_short_query_skips_catalog() {
        let db = test_db().await;
        let service = ListenTimeService::new(db, MockCatalogClient::new(), RETENTION);

        assert!(service.search_artists("ab", 5).await.unwrap().is_empty());
        assert!(service.search_artists("  ab  ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_uses_catalog() {
        let db = test_db().await;
        let mut client = MockCatalogClient::new();
        client
            .expect_search_artists()
            .withf(|query, limit| query == "beatles" && *limit == 5)
            .returning(|_, _| Ok(ApiResponse::success(vec![catalog_artist("b1", "The Beatles")])));
        let service = ListenTimeService::new(db, client, RETENTION);

        let results = service.search_artists("  beatles ", 5).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b1");
    }

    #[tokio::test]
    async fn test_search_falls_back_to_cache() {
        let db = test_db().await;
        db.upsert_artist(&catalog_artist("b1", "The Beatles")).await.unwrap();
        db.upsert_artist(&catalog_artist("r1", "Radiohead")).await.unwrap();
        let mut client = MockCatalogClient::new();
        client
            .expect_search_artists()
            .returning(|_, _| Ok(ApiResponse::Failure { status: 503 }));
        let service = ListenTimeService::new(db, client, RETENTION);

        let results = service.search_artists("beat", 5).await.unwrap();

        assert_eq!(
            results,
            vec![ArtistSummary {
                id: "b1".into(),
                name: "The Beatles".into(),
                image: Some("https://img/b1".into()),
            }]
        );
    }

    // ---- resolve_artist_timing / health tests ----

    #[tokio::test]
    async fn test_resolve_artist_timing_falls_back_to_search() {
        let db = test_db().await;
        let mut client = make_mock_client();
        client
            .expect_artist_by_id()
            .withf(|id| id == "artist one")
            .returning(|_| Ok(ApiResponse::Failure { status: 400 }));
        client
            .expect_search_artists()
            .withf(|query, limit| query == "artist one" && *limit == 1)
            .returning(|_, _| Ok(ApiResponse::success(vec![catalog_artist("a1", "Artist One")])));
        let service = ListenTimeService::new(db, client, RETENTION);

        let timing = service
            .resolve_artist_timing(" artist one ")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(timing.artist.id, "a1");
        assert_eq!(timing.total_time_ms, 350_000);
    }

    #[tokio::test]
    async fn test_resolve_artist_timing_no_match() {
        let db = test_db().await;
        let mut client = MockCatalogClient::new();
        client
            .expect_artist_by_id()
            .returning(|_| Ok(ApiResponse::Failure { status: 400 }));
        client
            .expect_search_artists()
            .returning(|_, _| Ok(ApiResponse::success(vec![])));
        let service = ListenTimeService::new(db, client, RETENTION);

        assert_eq!(service.resolve_artist_timing("nobody").await.unwrap(), None);
        assert_eq!(service.resolve_artist_timing("   ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_health_counts_artists() {
        let db = test_db().await;
        let service = ListenTimeService::new(db.clone(), MockCatalogClient::new(), RETENTION);
        assert_eq!(service.health().await.unwrap(), 0);

        db.upsert_artist(&catalog_artist("a1", "One")).await.unwrap();
        assert_eq!(service.health().await.unwrap(), 1);
    }
}
