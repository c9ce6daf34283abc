use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::CoordinatorError;

/// Operating system family, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// Native completion notifications are only shown where the OS routes
    /// clicks back to the app.
    pub fn supports_notifications(self) -> bool {
        matches!(self, Platform::MacOs | Platform::Windows)
    }

    /// Background apps stay alive in the menu bar after their last window
    /// closes.
    pub fn keeps_running_without_windows(self) -> bool {
        self == Platform::MacOs
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub is_running: bool,
    pub remaining_seconds: i64,
    pub total_minutes: i64,
    pub activity: String,
    pub emotion_name: String,
}

impl TimerState {
    pub fn is_zero(&self) -> bool {
        *self == TimerState::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    pub activity: String,
    pub total_minutes: i64,
    #[serde(default)]
    pub emotion_name: String,
    // A missing or zero override falls back to the full duration.
    #[serde(default)]
    pub remaining_seconds: Option<i64>,
}

impl StartTimerRequest {
    pub fn initial_seconds(&self) -> i64 {
        self.remaining_seconds
            .filter(|seconds| *seconds > 0)
            .unwrap_or(self.total_minutes.saturating_mul(60))
    }

    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.total_minutes <= 0 {
            return Err(CoordinatorError::MalformedInput(format!(
                "timer duration must be positive, got {} minutes",
                self.total_minutes
            )));
        }
        if self.total_minutes.checked_mul(60).is_none() {
            return Err(CoordinatorError::MalformedInput(format!(
                "timer duration of {} minutes is too long",
                self.total_minutes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerStartedAck {
    pub success: bool,
}

/// Values of a timer captured right before it resets to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerCompletion {
    pub activity: String,
    pub minutes: i64,
    pub emotion_name: String,
}

impl TimerCompletion {
    pub fn capture(timer: &TimerState) -> Self {
        Self {
            activity: timer.activity.clone(),
            minutes: timer.total_minutes,
            emotion_name: timer.emotion_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerCompletedEvent {
    pub activity: String,
    pub minutes: i64,
    pub emotion_name: String,
    pub play_sound: bool,
}

impl TimerCompletedEvent {
    pub fn new(completion: &TimerCompletion, play_sound: bool) -> Self {
        Self {
            activity: completion.activity.clone(),
            minutes: completion.minutes,
            emotion_name: completion.emotion_name.clone(),
            play_sound,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayMode {
    #[default]
    Normal,
    Flashing,
}

/// Image shown in the tray slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrayIcon {
    #[default]
    Bundled,
    /// PNG bytes supplied by the renderer.
    Custom(Arc<[u8]>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashState {
    pub mode: TrayMode,
    pub flash_count: u32,
    pub max_flashes: u32,
    pub icon_visible: bool,
    pub completion: Option<TimerCompletion>,
    pub original_icon: Option<TrayIcon>,
}

impl FlashState {
    pub fn idle(max_flashes: u32) -> Self {
        Self {
            mode: TrayMode::Normal,
            flash_count: 0,
            max_flashes,
            icon_visible: true,
            completion: None,
            original_icon: None,
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.mode == TrayMode::Flashing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowLabel {
    Main,
    Widget,
}

impl WindowLabel {
    pub const ALL: [WindowLabel; 2] = [WindowLabel::Main, WindowLabel::Widget];

    pub fn as_str(self) -> &'static str {
        match self {
            WindowLabel::Main => "main",
            WindowLabel::Widget => "widget",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "main" => Some(WindowLabel::Main),
            "widget" => Some(WindowLabel::Widget),
            _ => None,
        }
    }
}

impl std::fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen rectangle of the tray icon, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrayBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrayIconStatus {
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrayIconStatus {
    pub fn visible() -> Self {
        Self {
            visible: true,
            error: None,
        }
    }

    pub fn hidden(reason: &str) -> Self {
        Self {
            visible: false,
            error: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    pub tray_check_delay_secs: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            sound_enabled: true,
            tray_check_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettingsPatch {
    pub notifications_enabled: Option<bool>,
    pub sound_enabled: Option<bool>,
    pub tray_check_delay_secs: Option<i64>,
}

impl AppSettings {
    pub fn apply(&mut self, patch: AppSettingsPatch) {
        if let Some(v) = patch.notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = patch.sound_enabled {
            self.sound_enabled = v;
        }
        if let Some(v) = patch.tray_check_delay_secs {
            self.tray_check_delay_secs = v;
        }
    }
}

pub type AppResult<T> = Result<T, String>;

pub fn format_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{minutes:02}:{secs:02}")
}
