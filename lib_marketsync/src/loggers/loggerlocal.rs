use super::logrecord::Logrecord;
use super::logsink::{LogLevel, LogSink};
use chrono::Local;
use colored::*;
use glob::glob;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
/// # Logger Local Options
///
/// Configuration options for the `LoggerLocal` instance, controlling where and how
/// log messages are output.
pub struct LoggerLocalOptions {
    /// Levels that should be printed to the TTY (console).
    pub use_tty: Option<Vec<LogLevel>>,
    /// Levels that should be written to a log file.
    pub use_file: Option<Vec<LogLevel>>,
    /// The directory where log files should be stored. If `None`, defaults to the current directory.
    pub log_dir: Option<PathBuf>,
}

/// # Logger Local
///
/// A `LogSink` that prints colored lines to the console and appends JSON
/// `Logrecord` lines to a per-run log file.
pub struct LoggerLocal {
    /// The name of the application associated with this logger instance.
    app_name: String,
    /// Configuration options determining logging behavior.
    options: LoggerLocalOptions,
    /// Serializes file appends so concurrent entries never interleave.
    write_mutex: Mutex<()>,
    /// The path to the currently active log file, if file logging is enabled.
    current_log_file: Option<PathBuf>,
}

impl LoggerLocal {
    /// Rotates log files for a given application and log directory.
    ///
    /// Keeps only the most recent `<app_name>-<timestamp>.log` file (based on the
    /// timestamp in the filename) and deletes the older ones. Other processes
    /// writing the same naming scheme, such as a `fern` backend, can share it.
    pub fn rotate_logs(app_name: &str, log_dir: &Path) {
        let pattern = format!("{}/{}-*.log", log_dir.display(), app_name);
        let mut log_files: Vec<PathBuf> = match glob(&pattern) {
            Ok(paths) => paths.flatten().collect(),
            Err(e) => {
                eprintln!("Invalid log rotation pattern {}: {}", pattern, e);
                return;
            }
        };

        // Newest first.
        log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

        for old_file in log_files.iter().skip(1) {
            if let Err(e) = std::fs::remove_file(old_file) {
                eprintln!("Error deleting old log file {}: {}", old_file.display(), e);
            }
        }
    }

    /// Creates a new `LoggerLocal` instance.
    ///
    /// If file logging is enabled, it ensures the log directory exists,
    /// rotates old logs, and sets up the current log file path.
    ///
    /// # Arguments
    /// * `app_name` - The name of the application using this logger.
    /// * `options` - Optional `LoggerLocalOptions`. If `None`, every level goes to
    ///   the TTY and nothing is written to disk.
    pub fn new(app_name: impl Into<String>, options: Option<LoggerLocalOptions>) -> Self {
        let app_name = app_name.into();
        let opts = options.unwrap_or(LoggerLocalOptions {
            use_tty: Some(LogLevel::ALL.to_vec()),
            use_file: None,
            log_dir: None,
        });

        let mut logger = Self {
            app_name: app_name.clone(),
            options: opts,
            write_mutex: Mutex::new(()),
            current_log_file: None,
        };

        if logger.options.use_file.is_some() {
            let log_base_dir = logger
                .options
                .log_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));

            if let Err(e) = std::fs::create_dir_all(&log_base_dir) {
                eprintln!("Error creating log directory {}: {}", log_base_dir.display(), e);
            }

            // Rotate before creating the new file so the new file is the one kept next time.
            LoggerLocal::rotate_logs(&app_name, &log_base_dir);

            let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
            let current_log_filename = format!("{}-{}.log", app_name, timestamp);
            logger.current_log_file = Some(log_base_dir.join(current_log_filename));
        }

        logger
    }

    /// The file entries are appended to, if file logging is enabled.
    pub fn current_log_file(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }

    fn print_tty(&self, record: &Logrecord, level: LogLevel) {
        let ts = record.rfc9557.as_str().truecolor(128, 128, 128);
        let app_name_colored = format!("[{}]", self.app_name).truecolor(128, 128, 128);
        let message = record.message.as_str();

        let colored_message = match level {
            LogLevel::Fatal => message.bright_white().on_bright_red(),
            LogLevel::Error => message.bright_red(),
            LogLevel::Warn => message.bright_yellow(),
            LogLevel::Info => message.bright_green(),
            LogLevel::Debug => message.bright_white(),
            LogLevel::Trace => message.bright_cyan(),
            LogLevel::Silly => message.blue(),
        };

        println!("{}{}\n{}", ts, app_name_colored, colored_message);
        if record.has_tags() {
            if let Ok(tags_str) = serde_json::to_string(&record.tags) {
                println!("{}{}{}", ts, app_name_colored, tags_str.truecolor(128, 128, 128));
            }
        }
    }

    fn append_file(&self, record: &Logrecord, path: &Path) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Error serializing log record: {}", e);
                return;
            }
        };

        let _guard = self.write_mutex.lock().unwrap_or_else(|p| p.into_inner());
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = written {
            eprintln!("Error writing log file {}: {}", path.display(), e);
        }
    }
}

impl LogSink for LoggerLocal {
    fn log(&self, level: LogLevel, message: &str, details: Option<Value>) {
        let record = Logrecord::new(&self.app_name, level, message, details);

        if let Some(tty_levels) = &self.options.use_tty {
            if tty_levels.contains(&level) {
                self.print_tty(&record, level);
            }
        }

        if let Some(file_levels) = &self.options.use_file {
            if file_levels.contains(&level) {
                if let Some(log_file_path) = &self.current_log_file {
                    self.append_file(&record, log_file_path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_json_lines_for_enabled_levels_only() {
        let dir = tempfile::tempdir().unwrap();
        let logger = LoggerLocal::new(
            "quotes",
            Some(LoggerLocalOptions {
                use_tty: None,
                use_file: Some(LogLevel::Warn.and_above()),
                log_dir: Some(dir.path().to_path_buf()),
            }),
        );

        logger.debug("ignored", None);
        logger.error("Polling error", Some(json!({"failures": 1})));

        let path = logger.current_log_file().unwrap().to_path_buf();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);

        let record: Logrecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.message, "Polling error");
        assert_eq!(record.loglevel, 5);
        assert_eq!(record.app, "quotes");
        assert_eq!(record.tags, json!({"failures": 1}));
    }

    #[test]
    fn rotation_keeps_only_the_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quotes-20240101_000000.log"), "old").unwrap();
        std::fs::write(dir.path().join("quotes-20240102_000000.log"), "newer").unwrap();
        std::fs::write(dir.path().join("other-20240101_000000.log"), "unrelated").unwrap();

        LoggerLocal::rotate_logs("quotes", dir.path());

        assert!(!dir.path().join("quotes-20240101_000000.log").exists());
        assert!(dir.path().join("quotes-20240102_000000.log").exists());
        assert!(dir.path().join("other-20240101_000000.log").exists());
    }
}
