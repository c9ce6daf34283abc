use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::backend::core::error::CoordinatorError;
use crate::backend::core::models::AppSettings;
use crate::backend::APP_SETTINGS_KEY;

pub const DATABASE_FILE: &str = "redbutton.db";

pub fn init_database(conn: &Connection) -> Result<(), CoordinatorError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

pub fn save_json_setting<T: Serialize>(
    conn: &Connection,
    key: &str,
    value: &T,
) -> Result<(), CoordinatorError> {
    let json = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, json],
    )?;
    Ok(())
}

pub fn load_json_setting<T: for<'de> Deserialize<'de>>(
    conn: &Connection,
    key: &str,
) -> Result<Option<T>, CoordinatorError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(raw) => Ok(Some(serde_json::from_str::<T>(&raw)?)),
        None => Ok(None),
    }
}

pub fn normalize_settings(mut settings: AppSettings) -> AppSettings {
    settings.tray_check_delay_secs = settings.tray_check_delay_secs.clamp(1, 60);
    settings
}

pub fn load_or_create_settings(conn: &Connection) -> Result<AppSettings, CoordinatorError> {
    let settings = match load_json_setting::<AppSettings>(conn, APP_SETTINGS_KEY) {
        Ok(stored) => stored.unwrap_or_default(),
        Err(CoordinatorError::Serialization(err)) => {
            tracing::warn!("stored settings unreadable, using defaults: {err}");
            AppSettings::default()
        }
        Err(err) => return Err(err),
    };
    let settings = normalize_settings(settings);
    save_json_setting(conn, APP_SETTINGS_KEY, &settings)?;
    Ok(settings)
}

pub fn save_settings(conn: &Connection, settings: &AppSettings) -> Result<(), CoordinatorError> {
    save_json_setting(conn, APP_SETTINGS_KEY, settings)
}
