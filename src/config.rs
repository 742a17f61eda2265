//! Configuration file handling for pocketplan.
//!
//! The configuration file is stored at `$POCKETPLAN_HOME/config.json`. It names the user whose
//! documents the app reads and writes, tunes the goal transfer, and points at the completion
//! service. The SQLite document store lives next to it.

use crate::error::{ErrorType, IntoResult, Res};
use crate::store::{DocumentStore, SqliteStore};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "pocketplan";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const POCKETPLAN_SQLITE: &str = "pocketplan.sqlite";
const TRANSFER_ATTEMPTS: u32 = 5;
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const GEMINI_MODEL: &str = "gemini-2.0-flash";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$POCKETPLAN_HOME` and from there it loads `$POCKETPLAN_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    sqlite_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, writes an initial `config.json` for `user_id` and initializes
    /// the SQLite document store.
    ///
    /// # Errors
    /// - Returns an error if the store already exists or any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, user_id: &str) -> Result<Self> {
        Self::create_inner(dir.into(), user_id)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf, user_id: &str) -> Res<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            bail!("The user id must not be empty");
        }
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the pocketplan home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A configuration already exists at '{}'",
                config_path.display()
            );
        }
        let config_file = ConfigFile {
            user_id: user_id.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        let sqlite_path = root.join(POCKETPLAN_SQLITE);
        let store = SqliteStore::init(&sqlite_path)
            .await
            .context("Unable to create the SQLite document store")?;
        store.close().await;

        Ok(Self {
            root,
            config_path,
            sqlite_path,
            config_file,
        })
    }

    /// Validates that `home` and its config file exist and loads the config file.
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The pocketplan home directory is missing, run 'pocketplan init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let sqlite_path = root.join(POCKETPLAN_SQLITE);
        if !sqlite_path.is_file() {
            bail!("The document store is missing '{}'", sqlite_path.display())
        }

        Ok(Self {
            root,
            config_path,
            sqlite_path,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// The owner id written on and matched against every document.
    pub fn user_id(&self) -> &str {
        &self.config_file.user_id
    }

    /// How many times a goal transfer is attempted when it loses a race with another writer.
    pub fn transfer_attempts(&self) -> u32 {
        self.config_file.transfer_attempts
    }

    pub fn ai(&self) -> &AiSettings {
        &self.config_file.ai
    }
}

/// Settings for the completion service.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AiSettings {
    /// The API root of the service.
    pub provider_url: String,

    pub model: String,

    /// The environment variable that holds the API key. The key itself is never written to the
    /// config file.
    pub api_key_env: String,

    /// Optional request timeout in seconds. No timeout when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl AiSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider_url: GEMINI_URL.to_string(),
            model: GEMINI_MODEL.to_string(),
            api_key_env: API_KEY_ENV.to_string(),
            timeout_secs: None,
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "pocketplan",
///   "config_version": 1,
///   "user_id": "alice",
///   "transfer_attempts": 5,
///   "ai": {
///     "provider_url": "https://generativelanguage.googleapis.com/v1beta/",
///     "model": "gemini-2.0-flash",
///     "api_key_env": "GEMINI_API_KEY",
///     "timeout_secs": 30
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "pocketplan"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    user_id: String,

    #[serde(default = "default_transfer_attempts")]
    transfer_attempts: u32,

    #[serde(default)]
    ai: AiSettings,
}

fn default_transfer_attempts() -> u32 {
    TRANSFER_ATTEMPTS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            user_id: String::new(),
            transfer_attempts: TRANSFER_ATTEMPTS,
            ai: AiSettings::default(),
        }
    }
}

impl ConfigFile {
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.user_id.trim().is_empty(),
            "The config file at {} has no user_id",
            path.display()
        );
        anyhow::ensure!(
            config.transfer_attempts > 0,
            "transfer_attempts must be at least 1"
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("pocketplan_home");

        let created = Config::create(&home, "alice").await.unwrap();
        assert_eq!(created.user_id(), "alice");
        assert_eq!(created.transfer_attempts(), TRANSFER_ATTEMPTS);
        assert!(created.config_path().is_file());
        assert!(created.sqlite_path().is_file());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.user_id(), "alice");
        assert_eq!(loaded.ai(), &AiSettings::default());
        assert_eq!(loaded.root(), created.root());
    }

    #[tokio::test]
    async fn test_config_create_refuses_existing_home() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), "alice").await.unwrap();
        let e = Config::create(dir.path(), "bob").await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Config);
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let e = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Config);
        assert!(e.to_string().contains("pocketplan init"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        utils::write(
            &path,
            r#"{"app_name": "pocketplan", "config_version": 1, "user_id": "u1"}"#,
        )
        .await
        .unwrap();
        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.transfer_attempts, TRANSFER_ATTEMPTS);
        assert_eq!(config.ai.timeout(), None);
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        utils::write(
            &path,
            r#"{"app_name": "budgetbook", "config_version": 1, "user_id": "u1"}"#,
        )
        .await
        .unwrap();
        let result = ConfigFile::load(&path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let original = ConfigFile {
            user_id: "carol".into(),
            transfer_attempts: 2,
            ai: AiSettings {
                timeout_secs: Some(15),
                ..AiSettings::default()
            },
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        let loaded = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, loaded);
        assert_eq!(loaded.ai.timeout(), Some(Duration::from_secs(15)));
    }
}
