//! Per-vault persisted settings.

use crate::error::{ErrorKind, Result};
use crate::store::SettingsStore;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use serde::{Deserialize, Serialize};

/// Destination folder used when the stored settings don't name one.
pub const DEFAULT_FOLDER: &str = "_images";

/// The record persisted for each vault.
///
/// Stored as JSON with camelCase keys:
///
/// ```json
/// { "folderName": "_images", "hasOrganizedExisting": false }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Vault-relative folder every image ends up in. Empty disables moving.
    pub folder_name: String,
    /// Whether the one-time startup sweep has been offered already.
    pub has_organized_existing: bool,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_FOLDER.to_string(),
            has_organized_existing: false,
        }
    }
}

impl Settings {
    /// Loads the stored record merged over [`Settings::default()`].
    ///
    /// Stored fields win; fields the stored record lacks keep their default;
    /// an empty store yields the defaults.
    ///
    /// # Errors
    /// [`ErrorKind::Load`] if the store can't be read,
    /// [`ErrorKind::Invalid`] if the stored record isn't valid JSON or has
    /// fields of the wrong type.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(raw) = store.load().await? {
            figment = figment.merge(Json::string(&raw));
        }
        figment.extract().or_raise(|| ErrorKind::Invalid("stored settings".to_string()))
    }

    /// Persists the full record.
    pub async fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).or_raise(|| ErrorKind::Save)?;
        store.save(&raw).await?;
        tracing::debug!(store = store.describe(), settings = ?self, "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rstest::rstest;

    #[tokio::test]
    async fn test_empty_store_yields_defaults() {
        let store = MemoryStore::default();
        let settings = Settings::load(&store).await.unwrap();
        assert_eq!(settings.folder_name, "_images");
        assert!(!settings.has_organized_existing);
    }

    #[rstest]
    #[case(r#"{"folderName": "pics"}"#, "pics", false)]
    #[case(r#"{"hasOrganizedExisting": true}"#, "_images", true)]
    #[case(r#"{"folderName": "", "hasOrganizedExisting": true}"#, "", true)]
    #[case(r#"{"folderName": "media/img", "somethingElse": 1}"#, "media/img", false)]
    #[tokio::test]
    async fn test_stored_fields_win(#[case] stored: &str, #[case] folder: &str, #[case] organized: bool) {
        let store = MemoryStore::with_contents(stored);
        let settings = Settings::load(&store).await.unwrap();
        assert_eq!(settings.folder_name, folder);
        assert_eq!(settings.has_organized_existing, organized);
    }

    #[tokio::test]
    async fn test_invalid_record() {
        let store = MemoryStore::with_contents(r#"{"hasOrganizedExisting": "maybe"}"#);
        let err = Settings::load(&store).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[tokio::test]
    async fn test_save_writes_full_record() {
        let store = MemoryStore::default();
        let settings = Settings {
            has_organized_existing: true,
            ..Settings::default()
        };
        settings.save(&store).await.unwrap();
        let raw: serde_json::Value = serde_json::from_str(&store.contents().await.unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "folderName": "_images", "hasOrganizedExisting": true }));
        assert_eq!(Settings::load(&store).await.unwrap(), settings);
    }
}
