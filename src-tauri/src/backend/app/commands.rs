use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tauri::{AppHandle, Emitter, State, WebviewWindow};
use tracing::warn;

use super::controller::Controller;
use crate::backend::core::models::{
    AppResult, AppSettings, AppSettingsPatch, StartTimerRequest, TimerStartedAck, TimerState,
    TrayIconStatus, WindowLabel, WindowSize,
};
use crate::backend::data::storage::{normalize_settings, save_settings};
use crate::backend::TIMER_STARTED;

/// Managed by Tauri; shared by every command.
pub struct AppState {
    pub db: Mutex<Connection>,
    pub controller: Arc<Controller>,
}

fn lock_db(state: &AppState) -> AppResult<MutexGuard<'_, Connection>> {
    state.db.lock().map_err(|e| e.to_string())
}

fn caller_label(window: &WebviewWindow) -> AppResult<WindowLabel> {
    WindowLabel::from_label(window.label())
        .ok_or_else(|| format!("unknown window: {}", window.label()))
}

#[tauri::command]
pub fn start_timer(
    app: AppHandle,
    window: WebviewWindow,
    state: State<'_, AppState>,
    payload: StartTimerRequest,
) -> AppResult<TimerStartedAck> {
    let result = state.controller.start_timer(payload);
    let ack = TimerStartedAck {
        success: result.is_ok(),
    };
    if let Err(err) = app.emit_to(window.label(), TIMER_STARTED, &ack) {
        warn!("could not acknowledge timer start: {err}");
    }
    result.map(|_| ack).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn stop_timer(state: State<'_, AppState>) -> AppResult<TimerState> {
    state.controller.stop_timer().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_timer_state(state: State<'_, AppState>) -> AppResult<TimerState> {
    state.controller.timer_state().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn show_main_window(state: State<'_, AppState>, page: Option<String>) -> AppResult<()> {
    state
        .controller
        .show_main_requested(page)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn open_window(state: State<'_, AppState>) -> AppResult<()> {
    state.controller.open_main().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn select_emotion(state: State<'_, AppState>, payload: serde_json::Value) -> AppResult<()> {
    state.controller.select_emotion(payload);
    Ok(())
}

#[tauri::command]
pub fn resize_window(state: State<'_, AppState>, payload: WindowSize) -> AppResult<()> {
    state
        .controller
        .resize_widget(payload)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_emotion_image(state: State<'_, AppState>, image_data: String) -> AppResult<()> {
    state
        .controller
        .set_emotion_image(&image_data)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn reset_emotion_image(state: State<'_, AppState>) -> AppResult<()> {
    state
        .controller
        .reset_emotion_image()
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn check_tray_icon(state: State<'_, AppState>) -> TrayIconStatus {
    state.controller.check_tray_icon()
}

#[tauri::command]
pub fn window_ready(window: WebviewWindow, state: State<'_, AppState>) -> AppResult<()> {
    let label = caller_label(&window)?;
    state
        .controller
        .window_ready(label)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn settings_get(state: State<'_, AppState>) -> AppResult<AppSettings> {
    Ok(state.controller.settings())
}

#[tauri::command]
pub fn settings_update(
    state: State<'_, AppState>,
    payload: AppSettingsPatch,
) -> AppResult<AppSettings> {
    settings_update_inner(state.inner(), payload)
}

pub fn settings_update_inner(state: &AppState, patch: AppSettingsPatch) -> AppResult<AppSettings> {
    let mut settings = state.controller.settings();
    settings.apply(patch);
    let settings = normalize_settings(settings);

    {
        let conn = lock_db(state)?;
        save_settings(&conn, &settings).map_err(|e| e.to_string())?;
    }

    state.controller.apply_settings(settings.clone());
    Ok(settings)
}
