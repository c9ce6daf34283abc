use thiserror::Error;

/// Failures inside the timer, tray and window coordinator.
///
/// None of these cross an event-loop boundary: clock callbacks and event
/// handlers log them, commands turn them into strings for the renderer.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No window or tray to act on.
    #[error("missing target: {0}")]
    MissingTarget(String),

    /// An icon, bundle path or other resource could not be loaded.
    #[error("resource unavailable: {0}")]
    ResourceLoad(String),

    /// Input rejected at the boundary (bad duration, unparsable URL, bad image).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The running platform has no such capability.
    #[error("unsupported on this platform: {0}")]
    PlatformUnsupported(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("state lock poisoned: {0}")]
    Lock(String),
}

impl CoordinatorError {
    pub fn missing_window(label: impl std::fmt::Display) -> Self {
        CoordinatorError::MissingTarget(format!("{label} window does not exist"))
    }
}

impl<T> From<std::sync::PoisonError<T>> for CoordinatorError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        CoordinatorError::Lock(err.to_string())
    }
}
