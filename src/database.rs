#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::{Result, eyre::Context};
use migration::MigratorTrait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectOptions, ConnectionTrait,
    Database as SeaDatabase, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use serde::Serialize;

use crate::entities::{album, artist, artist_track, track};
use crate::ports::catalog::{CatalogArtist, CatalogTrack};

/// Stored in runtime columns until the runtime has been computed
const NOT_AGGREGATED: i64 = -1;

/// Keeps `IN (...)` lists and multi-row inserts under SQLite's variable limit
const CHUNK_SIZE: usize = 300;

pub struct Database {
    pub(crate) conn: DatabaseConnection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    /// `None` until the artist's runtime has been aggregated
    pub total_runtime_ms: Option<i64>,
    /// `None` for stubs created from track credits
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist_id: String,
    pub image: Option<String>,
    pub total_runtime_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub runtime_ms: i64,
    pub album_id: String,
}

/// Placeholder row for an artist only known from a track credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistStub {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtistTrackMapping {
    pub track_id: String,
    pub artist_id: String,
}

/// A fetched track together with the album it was listed on
#[derive(Debug, Clone)]
pub struct AlbumTrack {
    pub album_id: String,
    pub track: CatalogTrack,
}

fn runtime_from_column(value: i64) -> Option<i64> {
    (value >= 0).then_some(value)
}

fn runtime_to_column(value: Option<i64>) -> i64 {
    value.unwrap_or(NOT_AGGREGATED)
}

impl From<artist::Model> for Artist {
    fn from(model: artist::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            image: model.image,
            total_runtime_ms: runtime_from_column(model.total_runtime_ms),
            last_updated: model
                .last_updated
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }
}

impl From<album::Model> for Album {
    fn from(model: album::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            artist_id: model.artist_id,
            image: model.image,
            total_runtime_ms: runtime_from_column(model.total_runtime_ms),
        }
    }
}

impl From<track::Model> for Track {
    fn from(model: track::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            runtime_ms: model.runtime_ms,
            album_id: model.album_id,
        }
    }
}

impl Database {
    /// Open or create a database at the given path
    pub async fn open(path: &Path) -> Result<Self> {
        tracing::debug!("Opening database at: {}", path.display());

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create database directory: {}",
                parent.display()
            ))?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(8)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt)
            .await
            .context(format!("Failed to open database: {}", path.display()))?;

        tracing::debug!("Running database migrations");
        migration::Migrator::up(&conn, None)
            .await
            .context("Failed to run database migrations")?;

        tracing::info!("Database ready at: {}", path.display());
        Ok(Database { conn })
    }

    // ========== Artist Methods ==========

    pub async fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        let artist = artist::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to get artist")?;

        Ok(artist.map(Artist::from))
    }

    /// Case-insensitive substring match on the name, alphabetical.
    pub async fn search_artists_by_name(&self, query: &str, limit: usize) -> Result<Vec<Artist>> {
        // SQLite's LIKE ignores ASCII case
        let mut artists: Vec<Artist> = artist::Entity::find()
            .filter(artist::Column::Name.contains(query.trim()))
            .all(&self.conn)
            .await
            .context("Failed to search artists by name")?
            .into_iter()
            .map(Artist::from)
            .collect();

        artists.sort_by_cached_key(|artist| (artist.name.to_lowercase(), artist.id.clone()));
        artists.truncate(limit);
        Ok(artists)
    }

    /// Create the artist, or refresh its name and image.
    ///
    /// An already aggregated runtime is kept as is.
    pub async fn upsert_artist(&self, remote: &CatalogArtist) -> Result<Artist> {
        let now = Utc::now().timestamp();

        let existing = artist::Entity::find_by_id(remote.id.clone())
            .one(&self.conn)
            .await
            .context("Failed to find artist")?;

        let model = match existing {
            Some(existing) => {
                tracing::debug!("Updating artist '{}' ({})", remote.name, remote.id);
                let mut active: artist::ActiveModel = existing.into();
                active.name = ActiveValue::Set(remote.name.clone());
                active.image = ActiveValue::Set(remote.image.clone());
                active.last_updated = ActiveValue::Set(Some(now));
                active
                    .update(&self.conn)
                    .await
                    .context("Failed to update artist")?
            }
            None => {
                tracing::info!("Caching new artist '{}' ({})", remote.name, remote.id);
                artist::ActiveModel {
                    id: ActiveValue::Set(remote.id.clone()),
                    name: ActiveValue::Set(remote.name.clone()),
                    image: ActiveValue::Set(remote.image.clone()),
                    total_runtime_ms: ActiveValue::Set(NOT_AGGREGATED),
                    last_updated: ActiveValue::Set(Some(now)),
                }
                .insert(&self.conn)
                .await
                .context("Failed to insert artist")?
            }
        };

        Ok(model.into())
    }

    pub async fn bulk_insert_artist_stubs(&self, stubs: &[ArtistStub]) -> Result<u64> {
        insert_artist_stubs(&self.conn, stubs).await
    }

    /// Sums the runtime of every track credited to the artist and stores it.
    pub async fn aggregate_artist_runtime(&self, artist_id: &str) -> Result<i64> {
        let total = artist_track::Entity::find()
            .join(JoinType::InnerJoin, artist_track::Relation::Track.def())
            .filter(artist_track::Column::ArtistId.eq(artist_id))
            .select_only()
            .column_as(track::Column::RuntimeMs.sum(), "total")
            .into_tuple::<Option<i64>>()
            .one(&self.conn)
            .await
            .context("Failed to sum artist track runtimes")?
            .flatten()
            .unwrap_or(0);

        artist::Entity::update_many()
            .col_expr(artist::Column::TotalRuntimeMs, Expr::value(total))
            .col_expr(
                artist::Column::LastUpdated,
                Expr::value(Utc::now().timestamp()),
            )
            .filter(artist::Column::Id.eq(artist_id))
            .exec(&self.conn)
            .await
            .context("Failed to store artist runtime")?;

        tracing::info!("Aggregated runtime for artist {}: {} ms", artist_id, total);
        Ok(total)
    }

    pub async fn artist_count(&self) -> Result<u64> {
        artist::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count artists")
    }

    /// Removes the artist with its albums, their tracks and every mapping
    /// touching either, so the next lookup starts from scratch.
    pub async fn clear_artist_cache(&self, artist_id: &str) -> Result<()> {
        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let album_ids: Vec<String> = album::Entity::find()
            .select_only()
            .column(album::Column::Id)
            .filter(album::Column::ArtistId.eq(artist_id))
            .into_tuple()
            .all(&txn)
            .await
            .context("Failed to list cached albums")?;

        for album_ids in album_ids.chunks(CHUNK_SIZE) {
            let track_ids: Vec<String> = track::Entity::find()
                .select_only()
                .column(track::Column::Id)
                .filter(track::Column::AlbumId.is_in(album_ids.iter().cloned()))
                .into_tuple()
                .all(&txn)
                .await
                .context("Failed to list cached tracks")?;

            for track_ids in track_ids.chunks(CHUNK_SIZE) {
                artist_track::Entity::delete_many()
                    .filter(artist_track::Column::TrackId.is_in(track_ids.iter().cloned()))
                    .exec(&txn)
                    .await
                    .context("Failed to delete track mappings")?;
            }

            track::Entity::delete_many()
                .filter(track::Column::AlbumId.is_in(album_ids.iter().cloned()))
                .exec(&txn)
                .await
                .context("Failed to delete tracks")?;
        }

        artist_track::Entity::delete_many()
            .filter(artist_track::Column::ArtistId.eq(artist_id))
            .exec(&txn)
            .await
            .context("Failed to delete artist mappings")?;

        album::Entity::delete_many()
            .filter(album::Column::ArtistId.eq(artist_id))
            .exec(&txn)
            .await
            .context("Failed to delete albums")?;

        artist::Entity::delete_by_id(artist_id.to_string())
            .exec(&txn)
            .await
            .context("Failed to delete artist")?;

        txn.commit()
            .await
            .context("Failed to commit transaction")?;

        tracing::info!(
            "Cleared cache for artist {} ({} albums)",
            artist_id,
            album_ids.len()
        );
        Ok(())
    }

    // ========== Album Methods ==========

    /// The artist's albums, one per distinct name, longest runtime first.
    ///
    /// When several editions share a name only the longest one is kept.
    pub async fn get_artist_albums(&self, artist_id: &str) -> Result<Vec<Album>> {
        let albums = album::Entity::find()
            .filter(album::Column::ArtistId.eq(artist_id))
            .order_by_desc(album::Column::TotalRuntimeMs)
            .order_by_asc(album::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to get artist albums")?;

        let mut seen_names = HashSet::new();
        Ok(albums
            .into_iter()
            .filter(|album| seen_names.insert(album.name.clone()))
            .map(Album::from)
            .collect())
    }

    pub async fn bulk_insert_albums(&self, albums: &[Album]) -> Result<u64> {
        insert_albums(&self.conn, albums).await
    }

    // ========== Track Methods ==========

    pub async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        let tracks = track::Entity::find()
            .filter(track::Column::AlbumId.eq(album_id))
            .order_by_asc(track::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to get album tracks")?;

        Ok(tracks.into_iter().map(Track::from).collect())
    }

    pub async fn bulk_insert_tracks(&self, tracks: &[Track]) -> Result<u64> {
        insert_tracks(&self.conn, tracks).await
    }

    pub async fn bulk_insert_artist_track_mappings(
        &self,
        mappings: &[ArtistTrackMapping],
    ) -> Result<u64> {
        insert_artist_track_mappings(&self.conn, mappings).await
    }

    /// Stores fetched albums, their tracks, stub rows for every credited
    /// artist and the credits themselves in one transaction. Either all of it
    /// lands or none.
    pub async fn persist_discography_batch(
        &self,
        albums: &[Album],
        tracks: &[AlbumTrack],
    ) -> Result<()> {
        let rows: Vec<Track> = tracks
            .iter()
            .map(|entry| Track {
                id: entry.track.id.clone(),
                name: entry.track.name.clone(),
                runtime_ms: entry.track.duration_ms,
                album_id: entry.album_id.clone(),
            })
            .collect();

        let stubs: Vec<ArtistStub> = tracks
            .iter()
            .flat_map(|entry| &entry.track.artists)
            .map(|credit| ArtistStub {
                id: credit.id.clone(),
                name: credit.name.clone(),
            })
            .collect();

        let mappings: Vec<ArtistTrackMapping> = tracks
            .iter()
            .flat_map(|entry| {
                entry.track.artists.iter().map(|credit| ArtistTrackMapping {
                    track_id: entry.track.id.clone(),
                    artist_id: credit.id.clone(),
                })
            })
            .collect();

        let txn = self
            .conn
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let inserted_albums = insert_albums(&txn, albums).await?;
        let inserted_tracks = insert_tracks(&txn, &rows).await?;
        let inserted_stubs = insert_artist_stubs(&txn, &stubs).await?;
        let inserted_mappings = insert_artist_track_mappings(&txn, &mappings).await?;

        txn.commit()
            .await
            .context("Failed to commit discography batch")?;

        tracing::info!(
            "Persisted {} albums, {} tracks, {} new artists, {} credits",
            inserted_albums,
            inserted_tracks,
            inserted_stubs,
            inserted_mappings
        );
        Ok(())
    }
}

async fn insert_albums(conn: &impl ConnectionTrait, albums: &[Album]) -> Result<u64> {
    let mut seen = HashSet::new();
    let albums: Vec<&Album> = albums
        .iter()
        .filter(|album| seen.insert(album.id.as_str()))
        .collect();

    let mut inserted = 0;
    for chunk in albums.chunks(CHUNK_SIZE) {
        let existing: HashSet<String> = album::Entity::find()
            .select_only()
            .column(album::Column::Id)
            .filter(album::Column::Id.is_in(chunk.iter().map(|album| album.id.clone())))
            .into_tuple::<String>()
            .all(conn)
            .await
            .context("Failed to look up existing albums")?
            .into_iter()
            .collect();

        let models: Vec<album::ActiveModel> = chunk
            .iter()
            .filter(|album| !existing.contains(&album.id))
            .map(|album| album::ActiveModel {
                id: ActiveValue::Set(album.id.clone()),
                name: ActiveValue::Set(album.name.clone()),
                artist_id: ActiveValue::Set(album.artist_id.clone()),
                image: ActiveValue::Set(album.image.clone()),
                total_runtime_ms: ActiveValue::Set(runtime_to_column(album.total_runtime_ms)),
            })
            .collect();

        if models.is_empty() {
            continue;
        }
        inserted += album::Entity::insert_many(models)
            .exec_without_returning(conn)
            .await
            .context("Failed to insert albums")?;
    }

    tracing::debug!("Inserted {} of {} albums", inserted, albums.len());
    Ok(inserted)
}

async fn insert_tracks(conn: &impl ConnectionTrait, tracks: &[Track]) -> Result<u64> {
    let mut seen = HashSet::new();
    let tracks: Vec<&Track> = tracks
        .iter()
        .filter(|track| seen.insert(track.id.as_str()))
        .collect();

    let mut inserted = 0;
    for chunk in tracks.chunks(CHUNK_SIZE) {
        let existing: HashSet<String> = track::Entity::find()
            .select_only()
            .column(track::Column::Id)
            .filter(track::Column::Id.is_in(chunk.iter().map(|track| track.id.clone())))
            .into_tuple::<String>()
            .all(conn)
            .await
            .context("Failed to look up existing tracks")?
            .into_iter()
            .collect();

        let models: Vec<track::ActiveModel> = chunk
            .iter()
            .filter(|track| !existing.contains(&track.id))
            .map(|track| track::ActiveModel {
                id: ActiveValue::Set(track.id.clone()),
                name: ActiveValue::Set(track.name.clone()),
                runtime_ms: ActiveValue::Set(track.runtime_ms),
                album_id: ActiveValue::Set(track.album_id.clone()),
            })
            .collect();

        if models.is_empty() {
            continue;
        }
        inserted += track::Entity::insert_many(models)
            .exec_without_returning(conn)
            .await
            .context("Failed to insert tracks")?;
    }

    Ok(inserted)
}

async fn insert_artist_stubs(conn: &impl ConnectionTrait, stubs: &[ArtistStub]) -> Result<u64> {
    let mut seen = HashSet::new();
    let stubs: Vec<&ArtistStub> = stubs
        .iter()
        .filter(|stub| seen.insert(stub.id.as_str()))
        .collect();

    let mut inserted = 0;
    for chunk in stubs.chunks(CHUNK_SIZE) {
        let existing: HashSet<String> = artist::Entity::find()
            .select_only()
            .column(artist::Column::Id)
            .filter(artist::Column::Id.is_in(chunk.iter().map(|stub| stub.id.clone())))
            .into_tuple::<String>()
            .all(conn)
            .await
            .context("Failed to look up existing artists")?
            .into_iter()
            .collect();

        let models: Vec<artist::ActiveModel> = chunk
            .iter()
            .filter(|stub| !existing.contains(&stub.id))
            .map(|stub| artist::ActiveModel {
                id: ActiveValue::Set(stub.id.clone()),
                name: ActiveValue::Set(stub.name.clone()),
                image: ActiveValue::Set(None),
                total_runtime_ms: ActiveValue::Set(NOT_AGGREGATED),
                last_updated: ActiveValue::Set(None),
            })
            .collect();

        if models.is_empty() {
            continue;
        }
        inserted += artist::Entity::insert_many(models)
            .exec_without_returning(conn)
            .await
            .context("Failed to insert artist stubs")?;
    }

    Ok(inserted)
}

async fn insert_artist_track_mappings(
    conn: &impl ConnectionTrait,
    mappings: &[ArtistTrackMapping],
) -> Result<u64> {
    let mut seen = HashSet::new();
    let mappings: Vec<&ArtistTrackMapping> = mappings
        .iter()
        .filter(|mapping| seen.insert(*mapping))
        .collect();

    let mut inserted = 0;
    for chunk in mappings.chunks(CHUNK_SIZE) {
        let existing: HashSet<(String, String)> = artist_track::Entity::find()
            .select_only()
            .column(artist_track::Column::TrackId)
            .column(artist_track::Column::ArtistId)
            .filter(
                artist_track::Column::TrackId
                    .is_in(chunk.iter().map(|mapping| mapping.track_id.clone())),
            )
            .into_tuple::<(String, String)>()
            .all(conn)
            .await
            .context("Failed to look up existing credits")?
            .into_iter()
            .collect();

        let models: Vec<artist_track::ActiveModel> = chunk
            .iter()
            .filter(|mapping| {
                !existing.contains(&(mapping.track_id.clone(), mapping.artist_id.clone()))
            })
            .map(|mapping| artist_track::ActiveModel {
                track_id: ActiveValue::Set(mapping.track_id.clone()),
                artist_id: ActiveValue::Set(mapping.artist_id.clone()),
            })
            .collect();

        if models.is_empty() {
            continue;
        }
        inserted += artist_track::Entity::insert_many(models)
            .exec_without_returning(conn)
            .await
            .context("Failed to insert credits")?;
    }

    Ok(inserted)
}
