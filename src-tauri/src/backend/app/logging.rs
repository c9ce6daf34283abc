use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::RuntimeConfig;
use crate::backend::core::models::Platform;

pub fn session_log_name() -> String {
    format!("redbutton-{}.log", Local::now().format("%Y-%m-%dT%H-%M-%S"))
}

fn open_session_log(dir: &Path) -> std::io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(session_log_name());
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Logs to stderr and, when `log_dir` is usable, to a per-session file.
/// Returns the session file path.
pub fn init_logging(log_dir: Option<&Path>) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let session = log_dir.and_then(|dir| match open_session_log(dir) {
        Ok(session) => Some(session),
        Err(err) => {
            eprintln!("session log unavailable in {}: {err}", dir.display());
            None
        }
    });
    let (log_path, file) = match session {
        Some((path, file)) => (Some(path), Some(Arc::new(file))),
        None => (None, None),
    };

    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(file)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        warn!("a tracing subscriber was already installed");
    }

    log_path
}

pub fn log_startup(version: &str, platform: Platform, config: &RuntimeConfig, log: Option<&Path>) {
    info!("RedButton {version} starting");
    info!(
        "platform: {platform} ({}), dev mode: {}",
        std::env::consts::ARCH,
        config.dev_mode
    );
    match log {
        Some(path) => info!("session log: {}", path.display()),
        None => info!("session log disabled"),
    }
    if let Some(dir) = &config.frontend_dir {
        info!("frontend bundle directory: {}", dir.display());
    } else if config.dev_mode {
        info!("frontend dev server: {}", config.dev_server);
    }
}
