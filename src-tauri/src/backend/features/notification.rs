use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::backend::core::error::CoordinatorError;
use crate::backend::core::models::TimerCompletion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub title: String,
    pub body: String,
}

impl CompletionNotice {
    pub fn for_completion(completion: &TimerCompletion) -> Self {
        let unit = if completion.minutes == 1 { "minute" } else { "minutes" };
        Self {
            title: "Timer Completed!".to_string(),
            body: format!(
                "You completed \"{}\" ({} {unit})",
                completion.activity, completion.minutes
            ),
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Whether native notifications are available on this system.
    fn supported(&self) -> bool;
    fn show(&self, notice: &CompletionNotice) -> Result<(), CoordinatorError>;
}

/// Posts completion notifications and remembers which completion the last
/// one was for, so a click can open the right journal entry.
pub struct NotificationBridge {
    notifier: Arc<dyn Notifier>,
    pending: Mutex<Option<TimerCompletion>>,
}

impl NotificationBridge {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            pending: Mutex::new(None),
        }
    }

    /// Returns true when a notification was actually posted.
    pub fn notify_completion(&self, completion: &TimerCompletion, enabled: bool) -> bool {
        if !enabled {
            debug!("completion notifications disabled in settings");
            return false;
        }
        if !self.notifier.supported() {
            debug!("native notifications unsupported, relying on the tray flash");
            return false;
        }

        let notice = CompletionNotice::for_completion(completion);
        match self.notifier.show(&notice) {
            Ok(()) => {
                info!("posted completion notification for {}", completion.activity);
                if let Ok(mut pending) = self.pending.lock() {
                    *pending = Some(completion.clone());
                }
                true
            }
            Err(err) => {
                warn!("completion notification failed: {err}");
                false
            }
        }
    }

    /// The completion the outstanding notification refers to, if any.
    pub fn take_pending(&self) -> Option<TimerCompletion> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }

    pub fn clear(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
    }
}
