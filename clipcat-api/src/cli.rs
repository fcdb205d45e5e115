//! Command-line plumbing shared by `clipcat-api` and `clipcat-admin`

use std::path::PathBuf;

use clap::Args;
use clipcat_common::config::{load_toml_config, CliOverrides, LoadedConfig, Settings};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Options every binary accepts. Unset options fall back to
/// environment variables, then the config file, then defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file (default: ~/.config/clipcat/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Drop folder scanned by ingestion
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Permanent clip directory
    #[arg(long)]
    pub clips_dir: Option<PathBuf>,

    /// Clips younger than this many days are tagged "new" on ingestion
    #[arg(long)]
    pub new_clip_days: Option<i64>,
}

impl ConfigArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            database_path: self.database.clone(),
            staging_dir: self.staging_dir.clone(),
            clips_dir: self.clips_dir.clone(),
            new_clip_day_threshold: self.new_clip_days,
            ..Default::default()
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load the config file, resolve settings, start logging.
pub fn bootstrap(args: &ConfigArgs, overrides: CliOverrides) -> anyhow::Result<Settings> {
    let loaded: LoadedConfig = load_toml_config(args.config.as_deref())?;
    let settings = Settings::resolve(&overrides, &loaded.toml)?;

    init_tracing(&settings.log_level);

    match &loaded.path {
        Some(path) => info!("Loaded config file: {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }
    Ok(settings)
}
