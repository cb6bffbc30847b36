//! User preferences persisted between sessions.
//!
//! Settings are stored as pretty-printed JSON with a version stamp so
//! future layouts can migrate old files instead of silently misreading
//! them. Writes go through a temp file and a rename, so an interrupted
//! write never truncates the previous settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from settings persistence.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current settings file version.
const SETTINGS_VERSION: u32 = 1;

/// Default settings file name, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "fireside-settings.json";

/// Preferred narrative text size for the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// User-adjustable preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Whether finished sentences are sent to the narrator.
    pub narration_enabled: bool,

    /// Whether a theme track is fetched when a story begins.
    pub music_enabled: bool,

    /// Genre preselected on the tavern screen, if any.
    pub default_genre: Option<String>,

    /// Narrative text size.
    #[serde(default)]
    pub text_size: TextSize,

    /// External command used to speak narration, if overridden.
    pub narrator_command: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            narration_enabled: true,
            music_enabled: true,
            default_genre: None,
            text_size: TextSize::Medium,
            narrator_command: None,
        }
    }
}

/// On-disk envelope carrying the version stamp.
#[derive(Debug, Serialize, Deserialize)]
struct SettingsFile {
    version: u32,
    settings: AppSettings,
}

/// Save settings as pretty JSON. The content lands in a temp file next
/// to the target and is renamed into place.
pub async fn save_settings(
    settings: &AppSettings,
    path: impl AsRef<Path>,
) -> Result<(), SettingsError> {
    let file = SettingsFile {
        version: SETTINGS_VERSION,
        settings: settings.clone(),
    };
    let content = serde_json::to_string_pretty(&file)?;

    let path = path.as_ref();
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Load settings from a JSON file. A missing file is not an error and
/// yields the defaults.
pub async fn load_settings(path: impl AsRef<Path>) -> Result<AppSettings, SettingsError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppSettings::default());
        }
        Err(error) => return Err(error.into()),
    };

    let file: SettingsFile = serde_json::from_str(&content)?;

    if file.version != SETTINGS_VERSION {
        return Err(SettingsError::VersionMismatch {
            expected: SETTINGS_VERSION,
            found: file.version,
        });
    }

    Ok(file.settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("fireside-settings-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();

        assert!(settings.narration_enabled);
        assert!(settings.music_enabled);
        assert!(settings.default_genre.is_none());
        assert_eq!(settings.text_size, TextSize::Medium);
        assert!(settings.narrator_command.is_none());
    }

    #[test]
    fn test_text_size_serializes_lowercase() {
        let json = serde_json::to_string(&TextSize::Large).unwrap();
        assert_eq!(json, "\"large\"");

        let parsed: TextSize = serde_json::from_str("\"small\"").unwrap();
        assert_eq!(parsed, TextSize::Small);
    }

    #[test]
    fn test_missing_text_size_falls_back_to_medium() {
        let json = r#"{
            "narration_enabled": false,
            "music_enabled": true,
            "default_genre": "horror",
            "narrator_command": null
        }"#;

        let settings: AppSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.text_size, TextSize::Medium);
        assert!(!settings.narration_enabled);
        assert_eq!(settings.default_genre.as_deref(), Some("horror"));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let path = scratch_path();

        let settings = AppSettings {
            narration_enabled: false,
            music_enabled: true,
            default_genre: Some("fantasy".to_string()),
            text_size: TextSize::Large,
            narrator_command: Some("say".to_string()),
        };

        save_settings(&settings, &path)
            .await
            .expect("Save should succeed");

        let loaded = load_settings(&path).await.expect("Load should succeed");
        assert_eq!(loaded, settings);

        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_defaults() {
        let path = scratch_path();

        let loaded = load_settings(&path).await.expect("Load should succeed");
        assert_eq!(loaded, AppSettings::default());
    }

    #[tokio::test]
    async fn test_load_rejects_future_version() {
        let path = scratch_path();

        let content = r#"{
            "version": 99,
            "settings": {
                "narration_enabled": true,
                "music_enabled": true,
                "default_genre": null,
                "text_size": "medium",
                "narrator_command": null
            }
        }"#;
        fs::write(&path, content).await.expect("Write should succeed");

        let error = load_settings(&path).await.expect_err("Load should fail");
        assert!(matches!(
            error,
            SettingsError::VersionMismatch {
                expected: 1,
                found: 99
            }
        ));

        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let path = scratch_path();

        save_settings(&AppSettings::default(), &path)
            .await
            .expect("Save should succeed");

        let tmp = path.with_extension("json.tmp");
        assert!(!tmp.exists());
        assert!(path.exists());

        let _ = fs::remove_file(&path).await;
    }
}
