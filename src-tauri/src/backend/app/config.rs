use std::path::PathBuf;

use tracing::warn;
use url::Url;

use crate::backend::core::models::Platform;
use crate::backend::features::windows::FrontendSource;

pub const DEV_FLAG_VAR: &str = "REDBUTTON_DEV";
pub const DEV_SERVER_VAR: &str = "REDBUTTON_DEV_SERVER";
pub const FRONTEND_DIR_VAR: &str = "REDBUTTON_FRONTEND_DIR";
pub const DEFAULT_DEV_SERVER: &str = "http://localhost:3000";

/// Process-level settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub dev_mode: bool,
    pub dev_server: Url,
    pub frontend_dir: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(cfg!(debug_assertions), |key| std::env::var(key).ok())
    }

    pub fn from_lookup(debug_build: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dev_flag = lookup(DEV_FLAG_VAR)
            .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let dev_server = lookup(DEV_SERVER_VAR)
            .and_then(|raw| match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!("ignoring {DEV_SERVER_VAR}={raw}: {err}");
                    None
                }
            })
            .unwrap_or_else(|| static_url(DEFAULT_DEV_SERVER));

        Self {
            dev_mode: debug_build || dev_flag,
            dev_server,
            frontend_dir: lookup(FRONTEND_DIR_VAR)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Where route resolution should point the windows.
    pub fn frontend_source(&self, platform: Platform) -> FrontendSource {
        if let Some(dir) = &self.frontend_dir {
            return FrontendSource::Bundle(bundle_candidates(dir));
        }
        if self.dev_mode {
            return FrontendSource::DevServer(self.dev_server.clone());
        }
        FrontendSource::Embedded(embedded_origin(platform))
    }
}

fn static_url(raw: &'static str) -> Url {
    Url::parse(raw).expect("built-in URL constants are absolute")
}

pub fn bundle_candidates(dir: &std::path::Path) -> Vec<PathBuf> {
    vec![
        dir.join("index.html"),
        dir.join("out").join("index.html"),
        dir.join("dist").join("index.html"),
    ]
}

/// Origin Tauri serves embedded assets from.
pub fn embedded_origin(platform: Platform) -> Url {
    let origin = match platform {
        Platform::Windows => "http://tauri.localhost/",
        Platform::MacOs | Platform::Linux => "tauri://localhost/",
    };
    static_url(origin)
}
