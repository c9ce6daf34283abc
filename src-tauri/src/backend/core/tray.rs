use super::error::CoordinatorError;
use super::models::{
    format_seconds, FlashState, Platform, TimerState, TrayBounds, TrayIcon, TrayIconStatus,
};

pub const TRAY_NOT_CREATED: &str = "TRAY_NOT_CREATED";
pub const TRAY_ZERO_SIZE: &str = "TRAY_ZERO_SIZE";
pub const TRAY_POSITION_UNEXPECTED: &str = "TRAY_POSITION_UNEXPECTED";
pub const TRAY_CHECK_ERROR: &str = "TRAY_CHECK_ERROR";

/// Icons further down than this are not sitting in the macOS menu bar.
const MENU_BAR_MAX_Y: f64 = 50.0;

/// Title and tooltip text for one tray frame. `title` is `None` on
/// platforms without a tray title; `Some("")` clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayText {
    pub title: Option<String>,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayAppearance {
    pub icon: TrayIcon,
    pub title: Option<String>,
    pub tooltip: String,
}

/// Per-platform wording of the tray.
pub trait TrayRenderer: Send + Sync {
    fn idle(&self, app_name: &str) -> TrayText;
    fn running(&self, timer: &TimerState) -> TrayText;
    fn flash_frame(&self, app_name: &str, activity: &str, icon_visible: bool) -> TrayText;
}

/// macOS: the menu bar shows a text title next to the icon.
#[derive(Debug, Default)]
pub struct MenuBarRenderer;

impl TrayRenderer for MenuBarRenderer {
    fn idle(&self, app_name: &str) -> TrayText {
        TrayText {
            title: Some(String::new()),
            tooltip: app_name.to_string(),
        }
    }

    fn running(&self, timer: &TimerState) -> TrayText {
        let time = format_seconds(timer.remaining_seconds);
        let glyph = if (timer.remaining_seconds / 2) % 2 == 0 {
            "⏱️"
        } else {
            "⏰"
        };
        TrayText {
            title: Some(format!("{glyph} {time}")),
            tooltip: format!("Timer: {time} - Activity: {}", timer.activity),
        }
    }

    fn flash_frame(&self, app_name: &str, activity: &str, icon_visible: bool) -> TrayText {
        if icon_visible {
            TrayText {
                title: Some(String::new()),
                tooltip: format!("{app_name} - Timer completed!"),
            }
        } else {
            TrayText {
                title: Some("✅ COMPLETED!".to_string()),
                tooltip: format!("Activity \"{activity}\" completed - Click to record in journal"),
            }
        }
    }
}

/// Windows and Linux: everything goes into the tooltip.
#[derive(Debug, Default)]
pub struct TooltipRenderer;

impl TrayRenderer for TooltipRenderer {
    fn idle(&self, app_name: &str) -> TrayText {
        TrayText {
            title: None,
            tooltip: app_name.to_string(),
        }
    }

    fn running(&self, timer: &TimerState) -> TrayText {
        TrayText {
            title: None,
            tooltip: format!(
                "⏱️ TIMER ({}) - {}",
                format_seconds(timer.remaining_seconds),
                timer.activity
            ),
        }
    }

    fn flash_frame(&self, app_name: &str, activity: &str, icon_visible: bool) -> TrayText {
        let tooltip = if icon_visible {
            format!("{app_name} - Timer completed!")
        } else {
            format!("✅ COMPLETED: {activity} - Click to record in journal")
        };
        TrayText {
            title: None,
            tooltip,
        }
    }
}

pub fn renderer_for(platform: Platform) -> Box<dyn TrayRenderer> {
    match platform {
        Platform::MacOs => Box::new(MenuBarRenderer),
        Platform::Windows | Platform::Linux => Box::new(TooltipRenderer),
    }
}

/// Turns timer and flash state into what the tray shows. Holds no state.
pub struct TrayPresenter {
    renderer: Box<dyn TrayRenderer>,
    app_name: String,
}

impl TrayPresenter {
    pub fn new(renderer: Box<dyn TrayRenderer>, app_name: impl Into<String>) -> Self {
        Self {
            renderer,
            app_name: app_name.into(),
        }
    }

    pub fn for_platform(platform: Platform, app_name: impl Into<String>) -> Self {
        Self::new(renderer_for(platform), app_name)
    }

    pub fn render(&self, timer: &TimerState, flash: &FlashState, base_icon: &TrayIcon) -> TrayAppearance {
        if flash.is_flashing() {
            let activity = flash
                .completion
                .as_ref()
                .map(|c| c.activity.as_str())
                .unwrap_or_default();
            let text = self
                .renderer
                .flash_frame(&self.app_name, activity, flash.icon_visible);
            let icon = flash.original_icon.clone().unwrap_or_else(|| base_icon.clone());
            return appearance(icon, text);
        }

        let text = if timer.is_running {
            self.renderer.running(timer)
        } else {
            self.renderer.idle(&self.app_name)
        };
        appearance(base_icon.clone(), text)
    }
}

fn appearance(icon: TrayIcon, text: TrayText) -> TrayAppearance {
    TrayAppearance {
        icon,
        title: text.title,
        tooltip: text.tooltip,
    }
}

/// The platform tray slot as seen by the coordinator.
pub trait TrayHandle: Send + Sync {
    fn is_available(&self) -> bool;
    fn apply(&self, appearance: &TrayAppearance) -> Result<(), CoordinatorError>;
    /// `Ok(None)` when no tray icon has been created.
    fn bounds(&self) -> Result<Option<TrayBounds>, CoordinatorError>;
    fn destroy(&self);
}

/// Best-effort guess whether the user can actually see the tray icon.
pub fn tray_visibility(
    bounds: Result<Option<TrayBounds>, CoordinatorError>,
    platform: Platform,
) -> TrayIconStatus {
    let bounds = match bounds {
        Ok(Some(bounds)) => bounds,
        Ok(None) => return TrayIconStatus::hidden(TRAY_NOT_CREATED),
        Err(err) => {
            tracing::warn!("tray bounds query failed: {err}");
            return TrayIconStatus::hidden(TRAY_CHECK_ERROR);
        }
    };

    if bounds.width == 0.0 || bounds.height == 0.0 {
        return TrayIconStatus::hidden(TRAY_ZERO_SIZE);
    }
    if platform == Platform::MacOs && bounds.y > MENU_BAR_MAX_Y {
        return TrayIconStatus::hidden(TRAY_POSITION_UNEXPECTED);
    }
    TrayIconStatus::visible()
}
