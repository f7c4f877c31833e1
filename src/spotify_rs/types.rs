use serde::Deserialize;

use crate::ports::catalog::{CatalogAlbum, CatalogArtist, CatalogCredit, CatalogTrack};

/// Client-credentials token response
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    #[allow(dead_code)]
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

/// Full artist object, as returned by `/artists/{id}` and `/search`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

/// Artist credit embedded in a track listing
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySimplifiedArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    pub name: String,
    pub duration_ms: i64,
    #[serde(default)]
    pub artists: Vec<SpotifySimplifiedArtist>,
}

/// One page of a paged listing. Spotify omits `items` on some empty pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default)]
    pub items: Option<Vec<T>>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub artists: Page<SpotifyArtist>,
}

/// Spotify lists images largest first, the last one is the thumbnail.
fn thumbnail(images: &[SpotifyImage]) -> Option<String> {
    images.last().map(|image| image.url.clone())
}

impl From<SpotifyArtist> for CatalogArtist {
    fn from(artist: SpotifyArtist) -> Self {
        Self {
            image: thumbnail(&artist.images),
            id: artist.id,
            name: artist.name,
        }
    }
}

impl From<SpotifyAlbum> for CatalogAlbum {
    fn from(album: SpotifyAlbum) -> Self {
        Self {
            image: thumbnail(&album.images),
            id: album.id,
            name: album.name,
        }
    }
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            id: track.id,
            name: track.name,
            duration_ms: track.duration_ms,
            artists: track
                .artists
                .into_iter()
                .map(|artist| CatalogCredit {
                    id: artist.id,
                    name: artist.name,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_uses_smallest_image() {
        let artist: SpotifyArtist = serde_json::from_value(serde_json::json!({
            "id": "4Z8W4fKeB5YxbusRsdQVPb",
            "name": "Radiohead",
            "images": [
                { "url": "https://i.scdn.co/640", "height": 640, "width": 640 },
                { "url": "https://i.scdn.co/160", "height": 160, "width": 160 }
            ],
            "popularity": 79
        }))
        .unwrap();

        let artist = CatalogArtist::from(artist);
        assert_eq!(artist.image.as_deref(), Some("https://i.scdn.co/160"));
    }

    #[test]
    fn test_artist_without_images() {
        let artist: SpotifyArtist =
            serde_json::from_value(serde_json::json!({ "id": "a1", "name": "Nobody" })).unwrap();
        assert_eq!(CatalogArtist::from(artist).image, None);
    }

    #[test]
    fn test_page_without_items_or_next() {
        let page: Page<SpotifyTrack> =
            serde_json::from_value(serde_json::json!({ "total": 0, "next": null })).unwrap();
        assert!(page.items.is_none());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_track_keeps_all_credits() {
        let track: SpotifyTrack = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "name": "Feature",
            "duration_ms": 215000,
            "artists": [
                { "id": "a1", "name": "Main" },
                { "id": "a2", "name": "Guest" }
            ]
        }))
        .unwrap();

        let track = CatalogTrack::from(track);
        assert_eq!(track.duration_ms, 215000);
        assert_eq!(
            track.artists.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            vec!["a1", "a2"]
        );
    }
}
