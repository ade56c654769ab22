//! Runtime configuration, layered with [`figment`].

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix for environment variable overrides, e.g. `IMGSHELF_DRY_RUN=true`.
pub const ENV_PREFIX: &str = "IMGSHELF_";
/// File name of the user-level config file inside the platform config dir.
const CONFIG_FILE: &str = "imgshelf.toml";
/// Folder (inside the vault) holding the persisted settings by default.
const SETTINGS_DIR: &str = ".imgshelf";
const SETTINGS_FILE: &str = "settings.json";

/// What happens to pre-existing images when the program starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartupMode {
    /// Ask once, ever. The answer is remembered in the vault's settings
    /// whether it was yes or no.
    #[default]
    Gated,
    /// Sweep on every startup without asking.
    Always,
}

/// How a sweep reacts when moving one image fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure.
    #[default]
    FailFast,
    /// Record the failure, skip the image, keep going.
    BestEffort,
}

impl FromStr for StartupMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gated" | "once" => Ok(Self::Gated),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown startup mode `{other}` (expected `gated` or `always`)")),
        }
    }
}
impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gated => "gated",
            Self::Always => "always",
        })
    }
}

impl FromStr for FailurePolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(Self::FailFast),
            "best-effort" => Ok(Self::BestEffort),
            other => Err(format!("unknown failure policy `{other}` (expected `fail-fast` or `best-effort`)")),
        }
    }
}
impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FailFast => "fail-fast",
            Self::BestEffort => "best-effort",
        })
    }
}

/// How the program runs.
///
/// Sources, lowest priority first:
/// 1. [`Config::default()`]
/// 2. `imgshelf.toml` in the platform config directory
/// 3. an explicitly given config file
/// 4. `IMGSHELF_*` environment variables
/// 5. overrides passed to [`Config::load`] (command-line flags)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root folder of the vault.
    pub vault: PathBuf,
    pub startup: StartupMode,
    pub on_error: FailurePolicy,
    /// Log moves instead of performing them.
    pub dry_run: bool,
    /// Where the vault's [`Settings`](crate::Settings) are persisted. Defaults
    /// to `<vault>/.imgshelf/settings.json`.
    pub settings_file: Option<PathBuf>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            vault: PathBuf::from("."),
            startup: StartupMode::default(),
            on_error: FailurePolicy::default(),
            dry_run: false,
            settings_file: None,
        }
    }
}

impl Config {
    /// Location of the user-level config file, if the platform has a config
    /// directory at all.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "imgshelf").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads the layered configuration.
    ///
    /// `overrides` is merged last; serialize only the fields that were
    /// actually given (e.g. `#[serde(skip_serializing_if = "Option::is_none")]`).
    ///
    /// # Errors
    /// [`ErrorKind::Invalid`] if `file` is given but doesn't exist,
    /// [`ErrorKind::Load`] if any source can't be parsed into a [`Config`].
    pub fn load(file: Option<&Path>, overrides: impl Serialize) -> Result<Self> {
        Self::layered(Self::default_path(), file, overrides)
    }

    fn layered(user: Option<PathBuf>, file: Option<&Path>, overrides: impl Serialize) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(user) = user {
            // Missing user-level file is fine; figment skips it.
            figment = figment.merge(Toml::file(user));
        }
        if let Some(file) = file {
            if !file.is_file() {
                exn::bail!(ErrorKind::Invalid(format!("config file not found: {}", file.display())));
            }
            figment = figment.merge(Toml::file(file));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Where the vault's settings record lives.
    pub fn settings_path(&self) -> PathBuf {
        self.settings_file.clone().unwrap_or_else(|| self.vault.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }
}
