use anyhow::{Context, Result};
use clap::Parser;
use lib_marketsync::configs::SyncConfig;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "quote_sync.json5";

#[derive(Parser, Debug, Clone, Default)]
#[clap(about = "Keeps an in-memory quote snapshot in step with a REST feed", version)]
pub struct Cli {
    #[clap(long, env = "MARKETSYNC_CONFIG_PATH", help = "Path to the JSON / JSON5 configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "MARKETSYNC_BASE_URL", help = "Absolute base URL of the quote API.")]
    pub base_url: Option<String>,

    #[clap(long, env = "MARKETSYNC_AUTH_TOKEN", help = "Bearer token sent with every request.")]
    pub auth_token: Option<String>,

    #[clap(long, env = "MARKETSYNC_TIMEOUT_MS", help = "Per-request timeout in milliseconds.")]
    pub timeout_ms: Option<u64>,

    #[clap(long, env = "MARKETSYNC_MARKET_ENDPOINT", help = "Endpoint of the live quotes.")]
    pub market_endpoint: Option<String>,

    #[clap(long, env = "MARKETSYNC_CURRENCY_ENDPOINT", help = "Endpoint of the currency configuration.")]
    pub currency_endpoint: Option<String>,

    #[clap(long, env = "MARKETSYNC_INTERVAL_MS", allow_negative_numbers = true, help = "Polling interval in milliseconds.")]
    pub interval_ms: Option<i64>,

    #[clap(long, env = "MARKETSYNC_MAX_RETRIES", help = "Consecutive polling failures before polling stops.")]
    pub max_retries: Option<u32>,

    #[clap(long, env = "MARKETSYNC_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "MARKETSYNC_LOG_LEVEL", help = "Logging level (silly, trace, debug, info, warn, error, fatal).")]
    pub log_level: Option<String>,

    #[clap(long, env = "MARKETSYNC_LOCAL_LOGGER", help = "Log through the JSON-lines local logger instead of fern.")]
    pub local_logger: bool,
}

impl Cli {
    /// The CLI and environment values as a configuration layer.
    fn layer(&self) -> SyncConfig {
        SyncConfig {
            base_url: self.base_url.clone(),
            auth_token: self.auth_token.clone(),
            timeout_ms: self.timeout_ms,
            market_endpoint: self.market_endpoint.clone(),
            currency_endpoint: self.currency_endpoint.clone(),
            interval_ms: self.interval_ms,
            max_retries: self.max_retries,
            log_dir: self.log_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

/// Defaults, then the config file, then environment and CLI.
///
/// An explicitly named config file must exist; the default one is optional.
pub fn load_config(cli: &Cli) -> Result<SyncConfig> {
    let mut config = SyncConfig::defaults().merge(SyncConfig {
        log_dir: Some(PathBuf::from("./logs")),
        ..SyncConfig::default()
    });

    match &cli.config_path {
        Some(path) => {
            let file = SyncConfig::load_file(path)
                .with_context(|| format!("Loading config file {}", path.display()))?;
            config = config.merge(file);
        }
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if path.exists() {
                config = config.merge(SyncConfig::load_file(&path)?);
            }
        }
    }

    config = config.merge(cli.layer());
    config.validate()?;
    Ok(config)
}
