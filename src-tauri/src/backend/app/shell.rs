use std::sync::Mutex;

use tauri::image::Image;
use tauri::path::BaseDirectory;
use tauri::{
    AppHandle, Emitter, LogicalPosition, LogicalSize, Manager, Rect, WebviewWindow,
    WebviewWindowBuilder,
};
use tauri_plugin_notification::NotificationExt;
use tracing::{debug, warn};
use url::Url;

use crate::backend::core::error::CoordinatorError;
use crate::backend::core::models::{Platform, TrayBounds, TrayIcon, WindowLabel, WindowSize};
use crate::backend::core::tray::{TrayAppearance, TrayHandle};
use crate::backend::features::notification::{CompletionNotice, Notifier};
use crate::backend::features::windows::WindowSurface;
use crate::backend::TRAY_ID;

pub const MENUBAR_ICON: &str = "icons/menubar-icon.png";

fn window_error(label: WindowLabel, err: tauri::Error) -> CoordinatorError {
    CoordinatorError::MissingTarget(format!("{label} window: {err}"))
}

/// Windows managed by the Tauri runtime, addressed by label.
pub struct TauriWindows {
    app: AppHandle,
}

impl TauriWindows {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn window(&self, label: WindowLabel) -> Result<WebviewWindow, CoordinatorError> {
        self.app
            .get_webview_window(label.as_str())
            .ok_or_else(|| CoordinatorError::missing_window(label))
    }
}

impl WindowSurface for TauriWindows {
    fn exists(&self, label: WindowLabel) -> bool {
        self.app.get_webview_window(label.as_str()).is_some()
    }

    fn emit(
        &self,
        label: WindowLabel,
        channel: &str,
        payload: &serde_json::Value,
    ) -> Result<(), CoordinatorError> {
        self.app
            .emit_to(label.as_str(), channel, payload)
            .map_err(|err| window_error(label, err))
    }

    fn show(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        self.window(label)?
            .show()
            .map_err(|err| window_error(label, err))
    }

    fn hide(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        self.window(label)?
            .hide()
            .map_err(|err| window_error(label, err))
    }

    fn focus(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        let window = self.window(label)?;
        window.unminimize().map_err(|err| window_error(label, err))?;
        window.set_focus().map_err(|err| window_error(label, err))
    }

    fn is_visible(&self, label: WindowLabel) -> Result<bool, CoordinatorError> {
        self.window(label)?
            .is_visible()
            .map_err(|err| window_error(label, err))
    }

    fn navigate(&self, label: WindowLabel, url: &Url) -> Result<(), CoordinatorError> {
        self.window(label)?
            .navigate(url.clone())
            .map_err(|err| window_error(label, err))
    }

    fn size(&self, label: WindowLabel) -> Result<WindowSize, CoordinatorError> {
        let window = self.window(label)?;
        let scale = window
            .scale_factor()
            .map_err(|err| window_error(label, err))?;
        let size = window
            .outer_size()
            .map_err(|err| window_error(label, err))?
            .to_logical::<f64>(scale);
        Ok(WindowSize {
            width: size.width,
            height: size.height,
        })
    }

    fn set_size(&self, label: WindowLabel, size: WindowSize) -> Result<(), CoordinatorError> {
        self.window(label)?
            .set_size(LogicalSize::new(size.width, size.height))
            .map_err(|err| window_error(label, err))
    }

    fn set_position(&self, label: WindowLabel, x: f64, y: f64) -> Result<(), CoordinatorError> {
        self.window(label)?
            .set_position(LogicalPosition::new(x, y))
            .map_err(|err| window_error(label, err))
    }

    fn bring_app_to_front(&self) -> Result<(), CoordinatorError> {
        #[cfg(target_os = "macos")]
        self.app
            .show()
            .map_err(|err| CoordinatorError::PlatformUnsupported(err.to_string()))?;
        Ok(())
    }

    fn create_main(&self) -> Result<(), CoordinatorError> {
        let label = WindowLabel::Main;
        let config = self
            .app
            .config()
            .app
            .windows
            .iter()
            .find(|window| window.label == label.as_str())
            .cloned()
            .ok_or_else(|| {
                CoordinatorError::ResourceLoad("no main window in app config".to_string())
            })?;

        WebviewWindowBuilder::from_config(&self.app, &config)
            .and_then(|builder| builder.build())
            .map_err(|err| window_error(label, err))?;
        Ok(())
    }
}

/// Converts a tray rectangle reported by the OS into logical pixels.
pub fn logical_bounds(app: &AppHandle, rect: &Rect) -> TrayBounds {
    let scale = app
        .primary_monitor()
        .ok()
        .flatten()
        .map(|monitor| monitor.scale_factor())
        .unwrap_or(1.0);
    let position = rect.position.to_logical::<f64>(scale);
    let size = rect.size.to_logical::<f64>(scale);
    TrayBounds {
        x: position.x,
        y: position.y,
        width: size.width,
        height: size.height,
    }
}

/// Loads the bundled menubar icon, falling back to the app icon.
pub fn load_bundled_icon(app: &AppHandle) -> Option<Image<'static>> {
    let from_resources = app
        .path()
        .resolve(MENUBAR_ICON, BaseDirectory::Resource)
        .map_err(|err| err.to_string())
        .and_then(|path| Image::from_path(&path).map_err(|err| err.to_string()));

    match from_resources {
        Ok(image) => Some(image),
        Err(err) => {
            warn!("menubar icon unavailable ({err}), using the app icon");
            app.default_window_icon().map(|icon| icon.clone().to_owned())
        }
    }
}

/// The tray icon created at startup under `TRAY_ID`.
pub struct TauriTray {
    app: AppHandle,
    platform: Platform,
    bundled: Option<Image<'static>>,
    shown_icon: Mutex<Option<TrayIcon>>,
}

impl TauriTray {
    pub fn new(app: AppHandle, platform: Platform, bundled: Option<Image<'static>>) -> Self {
        Self {
            app,
            platform,
            bundled,
            // The builder already set the bundled icon.
            shown_icon: Mutex::new(Some(TrayIcon::Bundled)),
        }
    }

    fn tray(&self) -> Result<tauri::tray::TrayIcon, CoordinatorError> {
        self.app
            .tray_by_id(TRAY_ID)
            .ok_or_else(|| CoordinatorError::MissingTarget("tray icon".to_string()))
    }

    fn image_for(&self, icon: &TrayIcon) -> Result<Option<Image<'static>>, CoordinatorError> {
        match icon {
            TrayIcon::Bundled => Ok(self.bundled.clone()),
            TrayIcon::Custom(bytes) => Image::from_bytes(bytes)
                .map(|image| Some(image.to_owned()))
                .map_err(|err| CoordinatorError::MalformedInput(format!("tray image: {err}"))),
        }
    }
}

impl TrayHandle for TauriTray {
    fn is_available(&self) -> bool {
        self.app.tray_by_id(TRAY_ID).is_some()
    }

    fn apply(&self, appearance: &TrayAppearance) -> Result<(), CoordinatorError> {
        let tray = self.tray()?;
        let tray_err = |err: tauri::Error| CoordinatorError::MissingTarget(format!("tray: {err}"));

        let mut shown = self.shown_icon.lock()?;
        if shown.as_ref() != Some(&appearance.icon) {
            let image = self.image_for(&appearance.icon)?;
            tray.set_icon(image).map_err(tray_err)?;
            *shown = Some(appearance.icon.clone());
        }
        drop(shown);

        if let Some(title) = &appearance.title {
            if self.platform == Platform::MacOs {
                let title = (!title.is_empty()).then_some(title.as_str());
                tray.set_title(title).map_err(tray_err)?;
            }
        }
        tray.set_tooltip(Some(appearance.tooltip.as_str()))
            .map_err(tray_err)
    }

    fn bounds(&self) -> Result<Option<TrayBounds>, CoordinatorError> {
        let Some(tray) = self.app.tray_by_id(TRAY_ID) else {
            return Ok(None);
        };
        let rect = tray
            .rect()
            .map_err(|err| CoordinatorError::ResourceLoad(format!("tray bounds: {err}")))?;
        Ok(rect.map(|rect| logical_bounds(&self.app, &rect)))
    }

    fn destroy(&self) {
        if self.app.remove_tray_by_id(TRAY_ID).is_some() {
            debug!("tray icon removed");
        }
    }
}

pub struct TauriNotifier {
    app: AppHandle,
    platform: Platform,
}

impl TauriNotifier {
    pub fn new(app: AppHandle, platform: Platform) -> Self {
        Self { app, platform }
    }
}

impl Notifier for TauriNotifier {
    fn supported(&self) -> bool {
        self.platform.supports_notifications()
    }

    fn show(&self, notice: &CompletionNotice) -> Result<(), CoordinatorError> {
        self.app
            .notification()
            .builder()
            .title(&notice.title)
            .body(&notice.body)
            .show()
            .map_err(|err| CoordinatorError::PlatformUnsupported(err.to_string()))
    }
}
