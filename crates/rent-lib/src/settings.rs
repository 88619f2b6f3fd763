//! Pipeline settings
//!
//! Loaded once at process start from an optional settings file and `RENT_`
//! environment variables, then passed by reference to each component.

use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit settings file
pub const CONFIG_FILE_ENV: &str = "RENT_CONFIG_FILE";

/// Settings file looked up when [`CONFIG_FILE_ENV`] is unset
const DEFAULT_CONFIG_FILE: &str = "config/settings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing required option {0}")]
    MissingOption(&'static str),

    #[error("invalid option {option}: {reason}")]
    Invalid { option: &'static str, reason: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Where raw training rows come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    Csv { path: PathBuf },
    Database { conn_str: String, table_name: String },
}

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// CSV file with raw apartment rows
    pub data_file_name: Option<PathBuf>,
    /// Database connection string, used together with `table_name`
    pub db_conn_str: Option<String>,
    pub table_name: Option<String>,
    /// Directory holding the model artifact
    pub model_path: PathBuf,
    /// Artifact file name inside `model_path`
    pub model_name: String,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Seed for the split and the forest; drawn per run when absent
    pub random_seed: Option<u64>,
    /// How long to wait for another process's training lock
    pub lock_timeout_secs: u64,
}

/// Settings as they appear in the file/environment, before required options are checked
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    data_file_name: Option<PathBuf>,
    #[serde(default)]
    db_conn_str: Option<String>,
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    model_path: Option<PathBuf>,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_format: LogFormat,
    #[serde(default)]
    random_seed: Option<u64>,
    #[serde(default = "default_lock_timeout")]
    lock_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lock_timeout() -> u64 {
    600
}

impl Settings {
    /// Load settings from the settings file and `RENT_*` environment variables
    pub fn load() -> Result<Self, SettingsError> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix("RENT").try_parsing(true));
        Self::from_config(builder.build()?)
    }

    /// Deserialize and validate an already-built config
    pub fn from_config(config: config::Config) -> Result<Self, SettingsError> {
        let raw: RawSettings = config.try_deserialize()?;

        let model_path = raw
            .model_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(SettingsError::MissingOption("model_path"))?;
        let model_name = raw
            .model_name
            .filter(|n| !n.trim().is_empty())
            .ok_or(SettingsError::MissingOption("model_name"))?;
        if Path::new(&model_name).file_name() != Some(OsStr::new(&model_name)) {
            return Err(SettingsError::Invalid {
                option: "model_name",
                reason: format!("{:?} must be a bare file name", model_name),
            });
        }

        let settings = Settings {
            data_file_name: raw.data_file_name,
            db_conn_str: raw.db_conn_str,
            table_name: raw.table_name,
            model_path,
            model_name,
            log_level: raw.log_level,
            log_format: raw.log_format,
            random_seed: raw.random_seed,
            lock_timeout_secs: raw.lock_timeout_secs,
        };
        settings.source()?;
        Ok(settings)
    }

    /// Resolve the data source; a database takes precedence over a CSV file
    pub fn source(&self) -> Result<SourceConfig, SettingsError> {
        match (&self.db_conn_str, &self.table_name, &self.data_file_name) {
            (Some(conn_str), Some(table_name), _) => Ok(SourceConfig::Database {
                conn_str: conn_str.clone(),
                table_name: table_name.clone(),
            }),
            (Some(_), None, _) => Err(SettingsError::MissingOption("table_name")),
            (None, _, Some(path)) => Ok(SourceConfig::Csv { path: path.clone() }),
            (None, _, None) => Err(SettingsError::MissingOption("data_file_name")),
        }
    }

    /// Full path of the persisted model artifact
    pub fn model_file(&self) -> PathBuf {
        self.model_path.join(&self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        Settings::from_config(builder.build().unwrap())
    }

    #[test]
    fn test_csv_source() {
        let settings = build(&[
            ("data_file_name", "data/rent_apartments.csv"),
            ("model_path", "models"),
            ("model_name", "rf_v1.bin"),
        ])
        .unwrap();
        assert_eq!(
            settings.source().unwrap(),
            SourceConfig::Csv {
                path: PathBuf::from("data/rent_apartments.csv")
            }
        );
        assert_eq!(settings.model_file(), PathBuf::from("models/rf_v1.bin"));
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.lock_timeout_secs, 600);
    }

    #[test]
    fn test_database_wins_over_csv() {
        let settings = build(&[
            ("data_file_name", "rent.csv"),
            ("db_conn_str", "sqlite://db.sqlite"),
            ("table_name", "rent_apartments"),
            ("model_path", "models"),
            ("model_name", "rf.bin"),
        ])
        .unwrap();
        assert!(matches!(
            settings.source().unwrap(),
            SourceConfig::Database { .. }
        ));
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let err = build(&[("model_path", "models"), ("model_name", "rf.bin")]).unwrap_err();
        assert!(matches!(err, SettingsError::MissingOption("data_file_name")));

        let err = build(&[
            ("db_conn_str", "sqlite://db.sqlite"),
            ("model_path", "models"),
            ("model_name", "rf.bin"),
        ])
        .unwrap_err();
        assert!(matches!(err, SettingsError::MissingOption("table_name")));
    }

    #[test]
    fn test_missing_model_options_are_fatal() {
        let err = build(&[("data_file_name", "rent.csv"), ("model_name", "rf.bin")]).unwrap_err();
        assert!(matches!(err, SettingsError::MissingOption("model_path")));
    }

    #[test]
    fn test_model_name_must_be_bare() {
        let err = build(&[
            ("data_file_name", "rent.csv"),
            ("model_path", "models"),
            ("model_name", "nested/rf.bin"),
        ])
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { option: "model_name", .. }));
    }
}
