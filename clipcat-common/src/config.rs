//! Configuration loading and resolution
//!
//! Every setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error; a malformed one is.

use crate::catalog::registry::default_mappings;
use crate::ingest::DEFAULT_NEW_CLIP_DAY_THRESHOLD;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_CONFIG_FILE: &str = "CLIPCAT_CONFIG";
pub const ENV_DATABASE: &str = "CLIPCAT_DATABASE";
pub const ENV_STAGING_DIR: &str = "CLIPCAT_STAGING_DIR";
pub const ENV_CLIPS_DIR: &str = "CLIPCAT_CLIPS_DIR";
pub const ENV_NEW_CLIP_DAYS: &str = "CLIPCAT_NEW_CLIP_DAYS";
pub const ENV_BIND: &str = "CLIPCAT_BIND";
pub const ENV_JWKS_URL: &str = "CLIPCAT_JWKS_URL";
pub const ENV_JWT_ISSUER: &str = "CLIPCAT_JWT_ISSUER";
pub const ENV_JWT_AUDIENCE: &str = "CLIPCAT_JWT_AUDIENCE";

pub const DEFAULT_STAGING_DIR: &str = "audio/new";
pub const DEFAULT_CLIPS_DIR: &str = "audio";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5730";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub clips_dir: Option<PathBuf>,
    pub new_clip_day_threshold: Option<i64>,
    pub bind_address: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Prefix mapping table used by `clipcat-admin setup`
    #[serde(default)]
    pub prefixes: Vec<PrefixConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixConfig {
    pub file_prefix: String,
    pub identifier_prefix: String,
}

/// Default config file location: `~/.config/clipcat/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clipcat").join("config.toml"))
}

/// Default database location: `~/.local/share/clipcat/clips.db` (platform equivalent)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("clipcat").join("clips.db"))
        .unwrap_or_else(|| PathBuf::from("./clipcat_data/clips.db"))
}

/// A parsed config file and where it came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedConfig {
    pub toml: TomlConfig,
    /// `None` when no file was found and defaults apply
    pub path: Option<PathBuf>,
}

/// Load the TOML config.
///
/// An explicitly named file (argument or `CLIPCAT_CONFIG`) must exist. The
/// default location is optional. Nothing is logged here: binaries load the
/// config before the subscriber is installed and report the source afterwards.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| env_var(ENV_CONFIG_FILE).map(PathBuf::from));

    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(LoadedConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let toml = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    Ok(LoadedConfig {
        toml,
        path: Some(path),
    })
}

/// Parse config text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_path: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub clips_dir: Option<PathBuf>,
    pub new_clip_day_threshold: Option<i64>,
    pub bind_address: Option<String>,
    pub jwks_url: Option<String>,
}

/// Bearer-token validation settings. `jwks_url = None` disables authentication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSettings {
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub staging_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub new_clip_day_threshold: i64,
    pub bind_address: SocketAddr,
    pub auth: AuthSettings,
    pub log_level: String,
    pub prefix_mappings: Vec<(String, String)>,
}

impl Settings {
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let database_path = cli
            .database_path
            .clone()
            .or_else(|| env_var(ENV_DATABASE).map(PathBuf::from))
            .or_else(|| toml.database_path.clone())
            .unwrap_or_else(default_database_path);

        let staging_dir = cli
            .staging_dir
            .clone()
            .or_else(|| env_var(ENV_STAGING_DIR).map(PathBuf::from))
            .or_else(|| toml.staging_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR));

        let clips_dir = cli
            .clips_dir
            .clone()
            .or_else(|| env_var(ENV_CLIPS_DIR).map(PathBuf::from))
            .or_else(|| toml.clips_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIPS_DIR));

        let new_clip_day_threshold = match cli.new_clip_day_threshold {
            Some(days) => days,
            None => match env_parse::<i64>(ENV_NEW_CLIP_DAYS)? {
                Some(days) => days,
                None => toml
                    .new_clip_day_threshold
                    .unwrap_or(DEFAULT_NEW_CLIP_DAY_THRESHOLD),
            },
        };
        if new_clip_day_threshold < 0 {
            return Err(Error::Config(format!(
                "new_clip_day_threshold must be >= 0, got {}",
                new_clip_day_threshold
            )));
        }

        let bind_text = cli
            .bind_address
            .clone()
            .or_else(|| env_var(ENV_BIND))
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = SocketAddr::from_str(&bind_text)
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_text, e)))?;

        let auth = AuthSettings {
            jwks_url: cli
                .jwks_url
                .clone()
                .or_else(|| env_var(ENV_JWKS_URL))
                .or_else(|| toml.auth.jwks_url.clone()),
            issuer: env_var(ENV_JWT_ISSUER).or_else(|| toml.auth.issuer.clone()),
            audience: env_var(ENV_JWT_AUDIENCE).or_else(|| toml.auth.audience.clone()),
        };

        let prefix_mappings = if toml.prefixes.is_empty() {
            default_mappings()
        } else {
            toml.prefixes
                .iter()
                .map(|p| (p.file_prefix.clone(), p.identifier_prefix.clone()))
                .collect()
        };

        Ok(Self {
            database_path,
            staging_dir,
            clips_dir,
            new_clip_day_threshold,
            bind_address,
            auth,
            log_level: toml.logging.level.clone(),
            prefix_mappings,
        })
    }
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}='{}': {}", name, raw, e))),
    }
}
