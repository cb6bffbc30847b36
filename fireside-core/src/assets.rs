//! Optional scene decoration fetched from public APIs.
//!
//! Images come from Unsplash's random-photo endpoint, music from the
//! iTunes search API. Both are pure decoration: callers show what they
//! get and shrug at what they don't. No retries, no caching.

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

const UNSPLASH_RANDOM_URL: &str = "https://api.unsplash.com/photos/random";
const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";

/// Errors from asset fetches.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("UNSPLASH_ACCESS_KEY not configured")]
    NoAccessKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Asset API error (status {0})")]
    Api(u16),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No results for '{0}'")]
    NoResults(String),
}

/// A scene illustration with its attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneImage {
    pub url: String,
    pub author: String,
}

/// A background-music pick.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeTrack {
    pub title: String,
    pub artist: String,
    pub preview_url: Option<String>,
}

/// Client for the decoration endpoints.
#[derive(Clone)]
pub struct AssetClient {
    client: reqwest::Client,
    unsplash_key: Option<String>,
}

impl AssetClient {
    /// Create a client, reading `UNSPLASH_ACCESS_KEY` from the
    /// environment. Image fetches fail cleanly without the key.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            unsplash_key: std::env::var("UNSPLASH_ACCESS_KEY").ok(),
        }
    }

    pub fn with_unsplash_key(mut self, key: impl Into<String>) -> Self {
        self.unsplash_key = Some(key.into());
        self
    }

    pub fn has_unsplash_key(&self) -> bool {
        self.unsplash_key.is_some()
    }

    /// Fetch one random landscape photo for `query`.
    pub async fn fetch_scene_image(&self, query: &str) -> Result<SceneImage, AssetError> {
        let key = self
            .unsplash_key
            .as_deref()
            .ok_or(AssetError::NoAccessKey)?;

        let response = self
            .client
            .get(UNSPLASH_RANDOM_URL)
            .query(&[("query", query), ("orientation", "landscape")])
            .header("Authorization", format!("Client-ID {}", key))
            .send()
            .await
            .map_err(|e| AssetError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AssetError::Api(response.status().as_u16()));
        }

        let photo: ApiPhoto = response
            .json()
            .await
            .map_err(|e| AssetError::Parse(e.to_string()))?;

        Ok(SceneImage {
            url: photo.urls.regular,
            author: photo.user.name,
        })
    }

    /// Search iTunes for `term` and pick one of the first ten hits at
    /// random.
    pub async fn fetch_theme_track(&self, term: &str) -> Result<ThemeTrack, AssetError> {
        let response = self
            .client
            .get(ITUNES_SEARCH_URL)
            .query(&[("term", term), ("media", "music"), ("limit", "10")])
            .send()
            .await
            .map_err(|e| AssetError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AssetError::Api(response.status().as_u16()));
        }

        let results: ApiSearchResults = response
            .json()
            .await
            .map_err(|e| AssetError::Parse(e.to_string()))?;

        let track = pick_track(&results.results)
            .ok_or_else(|| AssetError::NoResults(term.to_string()))?;

        Ok(ThemeTrack {
            title: track.track_name.clone(),
            artist: track.artist_name.clone(),
            preview_url: track.preview_url.clone(),
        })
    }
}

impl Default for AssetClient {
    fn default() -> Self {
        Self::new()
    }
}

fn pick_track(tracks: &[ApiTrack]) -> Option<&ApiTrack> {
    if tracks.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..tracks.len());
    tracks.get(index)
}

#[derive(Debug, Deserialize)]
struct ApiPhoto {
    urls: ApiPhotoUrls,
    user: ApiPhotoUser,
}

#[derive(Debug, Deserialize)]
struct ApiPhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct ApiPhotoUser {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiSearchResults {
    #[serde(default)]
    results: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTrack {
    track_name: String,
    artist_name: String,
    #[serde(default)]
    preview_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_image_fetch_needs_a_key() {
        let client = AssetClient {
            client: reqwest::Client::new(),
            unsplash_key: None,
        };

        let error = client.fetch_scene_image("campfire").await.unwrap_err();
        assert!(matches!(error, AssetError::NoAccessKey));
    }

    #[test]
    fn test_photo_response_decodes() {
        let json = r#"{
            "id": "abc123",
            "urls": { "raw": "u1", "full": "u2", "regular": "u3" },
            "user": { "name": "A. Photographer", "username": "ap" }
        }"#;

        let photo: ApiPhoto = serde_json::from_str(json).unwrap();
        assert_eq!(photo.urls.regular, "u3");
        assert_eq!(photo.user.name, "A. Photographer");
    }

    #[test]
    fn test_search_response_decodes() {
        let json = r#"{
            "resultCount": 2,
            "results": [
                { "trackName": "Embers", "artistName": "The Hearth", "previewUrl": "p1" },
                { "trackName": "Rain on Tin", "artistName": "Neon Div.", "collectionName": "x" }
            ]
        }"#;

        let results: ApiSearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].track_name, "Embers");
        assert_eq!(results.results[0].preview_url.as_deref(), Some("p1"));
        assert_eq!(results.results[1].preview_url, None);
    }

    #[test]
    fn test_pick_track_bounds() {
        assert!(pick_track(&[]).is_none());

        let tracks = vec![
            ApiTrack {
                track_name: "a".into(),
                artist_name: "b".into(),
                preview_url: None,
            },
            ApiTrack {
                track_name: "c".into(),
                artist_name: "d".into(),
                preview_url: None,
            },
        ];
        for _ in 0..50 {
            assert!(pick_track(&tracks).is_some());
        }
    }
}
