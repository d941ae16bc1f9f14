// Configuration loading and parsing (medivision.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding `api.base_url`.
pub const BASE_URL_ENV: &str = "MEDIVISION_API_BASE_URL";

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "medivision.toml";

pub const DEFAULT_BASE_URL: &str = "http://192.168.21.101:3000";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("could not determine a configuration directory for this platform")]
    NoConfigDir,
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub search: SearchConfig,
    pub history: HistoryConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Base for medicine image URLs. Defaults to
    /// `<base_url>/uploads/medicines` when unset.
    pub image_base_url: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            image_base_url: None,
            connect_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn image_base(&self) -> String {
        match &self.image_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/uploads/medicines", self.base_url.trim_end_matches('/')),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub max_suggestions: usize,
    /// Route a single image-search hit straight to the detail view.
    pub single_result_to_detail: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_suggestions: 5,
            single_result_to_detail: true,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite key-value store. Defaults to `store.db` in the
    /// platform data directory.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse and validate a config file. Fields absent from the file take
/// their defaults. The base-URL environment override is not applied here.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration for the binary.
///
/// An explicit `path` must exist. Without one, the platform config file is
/// used when present and defaults otherwise. `MEDIVISION_API_BASE_URL`
/// overrides the base URL in every case.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => load_config_from(&p)?,
            _ => Config::default(),
        },
    };

    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        if !url.trim().is_empty() {
            config.api.base_url = url.trim().to_string();
        }
    }

    validate(&config)?;
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "medivision", "medivision")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join(CONFIG_FILE_NAME))
}

/// Platform data directory (store and logs live here).
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

impl Config {
    /// Resolved location of the key-value store.
    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join("store.db")),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let base = &config.api.base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "api.base_url".into(),
            message: format!("must start with http:// or https://, got `{base}`"),
        });
    }

    if config.api.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "api.connect_timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.search.debounce_ms == 0 {
        return Err(ConfigError::ValidationError {
            field: "search.debounce_ms".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.search.max_suggestions == 0 {
        return Err(ConfigError::ValidationError {
            field: "search.max_suggestions".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.history.limit == 0 {
        return Err(ConfigError::ValidationError {
            field: "history.limit".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.search.debounce(), Duration::from_millis(300));
        assert_eq!(config.search.max_suggestions, 5);
        assert_eq!(config.history.limit, 20);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let (_dir, path) = write_config(
            r#"
            [api]
            base_url = "https://api.example.com/"

            [search]
            debounce_ms = 150
            "#,
        );
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com/");
        assert_eq!(config.search.debounce_ms, 150);
        assert_eq!(config.search.max_suggestions, 5);
        assert_eq!(config.history.limit, 20);
    }

    #[test]
    fn image_base_derives_from_base_url() {
        let mut api = ApiConfig {
            base_url: "https://api.example.com/".into(),
            ..ApiConfig::default()
        };
        assert_eq!(api.image_base(), "https://api.example.com/uploads/medicines");

        api.image_base_url = Some("https://cdn.example.com/img/".into());
        assert_eq!(api.image_base(), "https://cdn.example.com/img");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        match load_config_from(&path) {
            Err(ConfigError::FileNotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let (_dir, path) = write_config("[api\nbase_url = ");
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let (_dir, path) = write_config("[api]\nbase_url = \"ftp://example.com\"\n");
        match load_config_from(&path) {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "api.base_url"),
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_debounce_and_limits() {
        for (body, field) in [
            ("[search]\ndebounce_ms = 0\n", "search.debounce_ms"),
            ("[search]\nmax_suggestions = 0\n", "search.max_suggestions"),
            ("[history]\nlimit = 0\n", "history.limit"),
            ("[api]\nconnect_timeout_secs = 0\n", "api.connect_timeout_secs"),
        ] {
            let (_dir, path) = write_config(body);
            match load_config_from(&path) {
                Err(ConfigError::ValidationError { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected ValidationError for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn explicit_store_path_wins() {
        let (_dir, path) = write_config("[storage]\npath = \"/tmp/medivision-test.db\"\n");
        let config = load_config_from(&path).unwrap();
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/tmp/medivision-test.db")
        );
    }
}
