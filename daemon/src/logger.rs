use anyhow::Result;
use lib_marketsync::loggers::{LogLevel, LoggerLocal};
use std::fs;
use std::path::{Path, PathBuf};

/// Installs fern as the `log` backend: stdout plus a fresh `<app>-<timestamp>.log`
/// file. Files are named and rotated the way `LoggerLocal` does it, so both sinks
/// can share one log directory.
pub fn setup_logging(app_name: &str, log_dir: &Path, log_level: &str) -> Result<PathBuf> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    LoggerLocal::rotate_logs(app_name, log_dir);

    let log_path = log_dir.join(format!(
        "{}-{}.log",
        app_name,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level_filter(log_level))
        .chain(std::io::stdout())
        .chain(fern::log_file(&log_path)?)
        .apply()?;

    Ok(log_path)
}

/// Unknown names fall back to `info`.
pub fn level_filter(log_level: &str) -> log::LevelFilter {
    log_level
        .parse::<LogLevel>()
        .map(|level| level.to_log_level().to_level_filter())
        .unwrap_or(log::LevelFilter::Info)
}
