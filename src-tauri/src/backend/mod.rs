pub mod app;
pub mod core;
pub mod data;
pub mod features;

pub use app::bootstrap::run;

pub const APP_NAME: &str = "RedButton";
pub const APP_SETTINGS_KEY: &str = "app_settings";
pub const TRAY_ID: &str = "redbutton-tray";

pub const TIMER_UPDATE: &str = "timer-update";
pub const TIMER_STARTED: &str = "timer-started";
pub const TIMER_COMPLETED: &str = "timer-completed";
pub const TIMER_JOURNAL_ENTRY: &str = "timer-journal-entry";
pub const EMOTION_SELECTED: &str = "emotion-selected";
pub const TRAY_STATUS_UPDATE: &str = "tray-icon-status-update";

#[cfg(test)]
mod tests;
