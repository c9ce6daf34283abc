use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::core::error::CoordinatorError;
use crate::backend::core::models::{Platform, TrayBounds, WindowLabel, WindowSize};

/// Operations the coordinator needs from the windowing system.
pub trait WindowSurface: Send + Sync {
    fn exists(&self, label: WindowLabel) -> bool;
    fn emit(
        &self,
        label: WindowLabel,
        channel: &str,
        payload: &serde_json::Value,
    ) -> Result<(), CoordinatorError>;
    fn show(&self, label: WindowLabel) -> Result<(), CoordinatorError>;
    fn hide(&self, label: WindowLabel) -> Result<(), CoordinatorError>;
    /// Restores from minimized and gives keyboard focus.
    fn focus(&self, label: WindowLabel) -> Result<(), CoordinatorError>;
    fn is_visible(&self, label: WindowLabel) -> Result<bool, CoordinatorError>;
    fn navigate(&self, label: WindowLabel, url: &Url) -> Result<(), CoordinatorError>;
    fn size(&self, label: WindowLabel) -> Result<WindowSize, CoordinatorError>;
    fn set_size(&self, label: WindowLabel, size: WindowSize) -> Result<(), CoordinatorError>;
    fn set_position(&self, label: WindowLabel, x: f64, y: f64) -> Result<(), CoordinatorError>;
    /// Dock icon and focus stealing on platforms that need it.
    fn bring_app_to_front(&self) -> Result<(), CoordinatorError>;
    /// Recreates the main window with its default content.
    fn create_main(&self) -> Result<(), CoordinatorError>;
}

/// Where the renderer bundle is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendSource {
    DevServer(Url),
    /// App origin of the embedded assets.
    Embedded(Url),
    /// Candidate `index.html` paths, first existing one wins.
    Bundle(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct RouteResolver {
    source: FrontendSource,
}

impl RouteResolver {
    pub fn new(source: FrontendSource) -> Self {
        Self { source }
    }

    /// Resolves an in-app route such as `journal` or `register?token=..`
    /// into a hash-routed URL.
    pub fn resolve(&self, route: &str) -> Result<Url, CoordinatorError> {
        let mut url = match &self.source {
            FrontendSource::DevServer(base) | FrontendSource::Embedded(base) => base.clone(),
            FrontendSource::Bundle(candidates) => {
                let index = candidates
                    .iter()
                    .inspect(|path| debug!("checking frontend bundle at {}", path.display()))
                    .find(|path| path.is_file())
                    .ok_or_else(|| {
                        CoordinatorError::ResourceLoad(format!(
                            "index.html not found in any of {} locations",
                            candidates.len()
                        ))
                    })?;
                Url::from_file_path(index).map_err(|_| {
                    CoordinatorError::ResourceLoad(format!(
                        "bundle path is not absolute: {}",
                        index.display()
                    ))
                })?
            }
        };

        let route = route.trim_start_matches('/');
        url.set_fragment(Some(&format!("/{route}")));
        Ok(url)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub platform: String,
    pub dev_mode: bool,
    pub log_file: Option<PathBuf>,
}

/// Inline page shown instead of a blank window when navigation fails.
pub fn fallback_page(
    error: &CoordinatorError,
    diagnostics: &Diagnostics,
) -> Result<Url, CoordinatorError> {
    let log_file = diagnostics
        .log_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "unavailable".to_string());
    let html = format!(
        r#"<html>
  <head>
    <title>RedButton - Error</title>
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; padding: 20px; background: #111827; color: white; line-height: 1.5; }}
      h1 {{ color: #f43f5e; }}
      pre {{ background: #1F2937; padding: 15px; border-radius: 4px; overflow: auto; font-size: 13px; }}
    </style>
  </head>
  <body>
    <h1>Failed to load the application</h1>
    <p>Error: {error}</p>
    <p>Please try restarting the application.</p>
    <pre>
Platform: {platform}
Dev mode: {dev_mode}
Log file: {log_file}
    </pre>
  </body>
</html>"#,
        error = escape_html(&error.to_string()),
        platform = escape_html(&diagnostics.platform),
        dev_mode = diagnostics.dev_mode,
        log_file = escape_html(&log_file),
    );

    let encoded = STANDARD.encode(html.as_bytes());
    Url::parse(&format!("data:text/html;base64,{encoded}"))
        .map_err(|err| CoordinatorError::ResourceLoad(format!("fallback page: {err}")))
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Top-left corner for the widget so it hangs centred off the tray icon:
/// below the menu bar on macOS, above the taskbar elsewhere.
pub fn widget_position(platform: Platform, tray: TrayBounds, widget: WindowSize) -> (f64, f64) {
    let x = tray.x - widget.width / 2.0 + tray.width / 2.0;
    let y = match platform {
        Platform::MacOs => tray.y + tray.height,
        Platform::Windows | Platform::Linux => tray.y - widget.height,
    };
    (x, y)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Readiness {
    Loading,
    /// Page finished loading; navigation is safe.
    Loaded,
    /// Renderer subscribed to events; broadcasts will be seen.
    Ready,
}

pub struct WindowCoordinator {
    surface: Arc<dyn WindowSurface>,
    platform: Platform,
    resolver: RouteResolver,
    diagnostics: Diagnostics,
    readiness: Mutex<HashMap<WindowLabel, Readiness>>,
}

impl WindowCoordinator {
    pub fn new(
        surface: Arc<dyn WindowSurface>,
        platform: Platform,
        resolver: RouteResolver,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            surface,
            platform,
            resolver,
            diagnostics,
            readiness: Mutex::new(HashMap::new()),
        }
    }

    /// Sends to every window that currently exists. Missing windows are
    /// skipped.
    pub fn broadcast<T: Serialize>(&self, channel: &str, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!("could not serialize {channel} payload: {err}");
                return;
            }
        };
        for label in WindowLabel::ALL {
            self.emit_value(label, channel, &value);
        }
    }

    pub fn send<T: Serialize>(&self, label: WindowLabel, channel: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.emit_value(label, channel, &value),
            Err(err) => warn!("could not serialize {channel} payload: {err}"),
        }
    }

    fn emit_value(&self, label: WindowLabel, channel: &str, value: &serde_json::Value) {
        if !self.surface.exists(label) {
            debug!("skipping {channel} for {label}: window does not exist");
            return;
        }
        if let Err(err) = self.surface.emit(label, channel, value) {
            warn!("failed to send {channel} to {label}: {err}");
        }
    }

    pub fn show_main(&self, route: Option<&str>) -> Result<(), CoordinatorError> {
        if !self.surface.exists(WindowLabel::Main) {
            return Err(CoordinatorError::missing_window(WindowLabel::Main));
        }

        if let Some(route) = route.filter(|r| !r.trim().is_empty()) {
            info!("navigating main window to {route}");
            self.navigate(WindowLabel::Main, route);
        }

        self.surface.show(WindowLabel::Main)?;
        self.surface.focus(WindowLabel::Main)?;
        self.bring_to_front();
        Ok(())
    }

    /// Navigates to an in-app route, or to the diagnostic page when the
    /// route cannot be resolved or loaded.
    pub fn navigate(&self, label: WindowLabel, route: &str) {
        let resolved = self.resolver.resolve(route).or_else(|err| {
            warn!("could not resolve route {route}: {err}; loading fallback page");
            fallback_page(&err, &self.diagnostics)
        });
        let url = match resolved {
            Ok(url) => url,
            Err(err) => {
                warn!("fallback page unavailable: {err}");
                return;
            }
        };
        self.forget(label);
        let Err(err) = self.surface.navigate(label, &url) else {
            return;
        };
        if url.scheme() == "data" {
            warn!("fallback page failed to load in {label}: {err}");
            return;
        }

        warn!("navigation of {label} failed: {err}; loading fallback page");
        let loaded = fallback_page(&err, &self.diagnostics)
            .and_then(|page| self.surface.navigate(label, &page));
        if let Err(err) = loaded {
            warn!("fallback page failed to load in {label}: {err}");
        }
    }

    /// Shows the main window, or recreates it when it has been closed.
    pub fn open_main(&self) -> Result<(), CoordinatorError> {
        if self.surface.exists(WindowLabel::Main) {
            self.surface.focus(WindowLabel::Main)?;
            self.surface.show(WindowLabel::Main)?;
            self.bring_to_front();
            return Ok(());
        }
        info!("main window is gone, recreating it");
        self.surface.create_main()
    }

    fn bring_to_front(&self) {
        if self.platform != Platform::MacOs {
            return;
        }
        if let Err(err) = self.surface.bring_app_to_front() {
            debug!("could not bring app to front: {err}");
        }
    }

    pub fn toggle_widget(&self, tray: Option<TrayBounds>) -> Result<(), CoordinatorError> {
        let widget = WindowLabel::Widget;
        if !self.surface.exists(widget) {
            return Err(CoordinatorError::missing_window(widget));
        }

        if self.surface.is_visible(widget)? {
            debug!("hiding widget on tray click");
            return self.surface.hide(widget);
        }

        if let Some(tray) = tray {
            let size = self.surface.size(widget)?;
            let (x, y) = widget_position(self.platform, tray, size);
            self.surface.set_position(widget, x, y)?;
        }
        self.surface.show(widget)?;
        self.surface.focus(widget)?;
        debug!("showing widget on tray click");
        Ok(())
    }

    pub fn hide_widget(&self) {
        let widget = WindowLabel::Widget;
        if !self.surface.exists(widget) {
            return;
        }
        if let Err(err) = self.surface.hide(widget) {
            debug!("could not hide widget: {err}");
        }
    }

    pub fn resize_widget(
        &self,
        size: WindowSize,
        tray: Option<TrayBounds>,
    ) -> Result<(), CoordinatorError> {
        if size.width <= 0.0 || size.height <= 0.0 {
            return Err(CoordinatorError::MalformedInput(format!(
                "widget size must be positive, got {}x{}",
                size.width, size.height
            )));
        }
        let widget = WindowLabel::Widget;
        if !self.surface.exists(widget) {
            return Err(CoordinatorError::missing_window(widget));
        }

        self.surface.set_size(widget, size)?;
        debug!("resized widget to {}x{}", size.width, size.height);
        if self.surface.is_visible(widget)? {
            if let Some(tray) = tray {
                let (x, y) = widget_position(self.platform, tray, size);
                self.surface.set_position(widget, x, y)?;
            }
        }
        Ok(())
    }

    /// Forwards a widget emotion pick to the main window and brings it up.
    pub fn relay_emotion(&self, payload: &serde_json::Value) {
        if self.surface.exists(WindowLabel::Main) {
            self.emit_value(WindowLabel::Main, crate::backend::EMOTION_SELECTED, payload);
            if let Err(err) = self.show_main(None) {
                warn!("could not show main window for selected emotion: {err}");
            }
        } else {
            warn!("emotion selected but the main window does not exist");
        }
        self.hide_widget();
    }

    pub fn mark(&self, label: WindowLabel, readiness: Readiness) -> Option<Readiness> {
        match self.readiness.lock() {
            Ok(mut map) => map.insert(label, readiness),
            Err(err) => {
                warn!("window readiness lock poisoned: {err}");
                None
            }
        }
    }

    pub fn forget(&self, label: WindowLabel) {
        if let Ok(mut map) = self.readiness.lock() {
            map.remove(&label);
        }
    }

    pub fn readiness(&self, label: WindowLabel) -> Option<Readiness> {
        self.readiness
            .lock()
            .ok()
            .and_then(|map| map.get(&label).copied())
    }

    pub fn is_loaded(&self, label: WindowLabel) -> bool {
        self.surface.exists(label)
            && self
                .readiness(label)
                .is_some_and(|r| r >= Readiness::Loaded)
    }
}
