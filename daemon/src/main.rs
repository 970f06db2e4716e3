use anyhow::Result;
use clap::Parser;
use lib_marketsync::loggers::{FacadeLogger, LogLevel, LogSink, LoggerLocal, LoggerLocalOptions};
use lib_marketsync::markets::{quote_store, QuoteStore, QuoteStoreOptions};
use lib_marketsync::retrieve::ApiClient;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

mod config;
mod logger;

const APP_NAME: &str = "quote_sync";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = config::Cli::parse();
    let config = config::load_config(&cli)?;
    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./logs"));

    let sink: Arc<dyn LogSink> = if cli.local_logger {
        let min_level = config
            .log_level()
            .parse::<LogLevel>()
            .unwrap_or(LogLevel::Info);
        Arc::new(LoggerLocal::new(
            APP_NAME,
            Some(LoggerLocalOptions {
                use_tty: Some(min_level.and_above()),
                use_file: Some(min_level.and_above()),
                log_dir: Some(log_dir),
            }),
        ))
    } else {
        let log_file = logger::setup_logging(APP_NAME, &log_dir, config.log_level())?;
        log::info!(target: APP_NAME, "Logging to {}", log_file.display());
        Arc::new(FacadeLogger::new(APP_NAME))
    };

    sink.info("Starting quote sync", Some(json!({ "config": config.to_string() })));

    let client = ApiClient::new(
        config.base_url(),
        config.auth_token.clone(),
        Duration::from_millis(config.timeout_ms()),
    )?;

    let store = quote_store(
        Arc::new(client),
        QuoteStoreOptions {
            market_endpoint: config.market_endpoint().to_string(),
            currency_endpoint: config.currency_endpoint().to_string(),
            interval_ms: config.interval_ms(),
            max_retries: config.max_retries(),
        },
        sink.clone(),
    );

    let watcher = watch_diffs(&store, sink.clone());

    store.initial_load().await;
    if let Some(error) = store.last_error() {
        sink.warn(
            "Initial quote load failed, polling will keep trying",
            Some(json!({ "error": error.message, "cause": error.cause.message })),
        );
    }
    sink.info(
        "Initial quote load finished",
        Some(json!({ "quotes": store.len(), "currencies": store.references().len() })),
    );

    store.start_polling();

    wait_for_shutdown(sink.as_ref()).await;

    store.stop_polling();
    watcher.abort();

    sink.info("Shutdown complete", Some(store.status()));
    Ok(())
}

/// Logs every non-empty merge published by the store.
fn watch_diffs(store: &QuoteStore, sink: Arc<dyn LogSink>) -> JoinHandle<()> {
    let mut diffs = store.subscribe();
    tokio::spawn(async move {
        loop {
            match diffs.recv().await {
                Ok(diff) => sink.info(
                    "Quotes changed",
                    Some(json!({
                        "added": diff.added,
                        "updated": diff.updated,
                        "removed": diff.removed,
                    })),
                ),
                Err(RecvError::Lagged(skipped)) => {
                    sink.warn("Diff watcher lagged", Some(json!({ "skipped": skipped })))
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn wait_for_shutdown(sink: &dyn LogSink) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            sink.error(
                "Failed to listen for Ctrl-C",
                Some(json!({ "error": e.to_string() })),
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                sink.error(
                    "Failed to install SIGTERM handler",
                    Some(json!({ "error": e.to_string() })),
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => sink.info("Ctrl-C received, initiating shutdown.", None),
        _ = terminate => sink.info("SIGTERM received, initiating shutdown.", None),
    }
}
