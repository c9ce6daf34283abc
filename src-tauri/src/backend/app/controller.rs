use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};

use crate::backend::core::clock::{ClockHandle, Scheduler};
use crate::backend::core::error::CoordinatorError;
use crate::backend::core::flash::{FlashTick, TrayClick, FLASH_PERIOD};
use crate::backend::core::models::{
    AppSettings, Platform, StartTimerRequest, TimerCompletedEvent, TimerCompletion, TimerState,
    TrayBounds, TrayIcon, TrayIconStatus, WindowLabel, WindowSize,
};
use crate::backend::core::service::TimerService;
use crate::backend::core::timer::{TickOutcome, TICK_PERIOD};
use crate::backend::core::tray::{tray_visibility, TrayHandle, TrayPresenter};
use crate::backend::features::deep_link::{DeepLinkRequest, DeepLinkRouter};
use crate::backend::features::notification::{NotificationBridge, Notifier};
use crate::backend::features::windows::{Readiness, WindowCoordinator};
use crate::backend::{
    TIMER_COMPLETED, TIMER_JOURNAL_ENTRY, TIMER_UPDATE, TRAY_STATUS_UPDATE,
};

/// Everything the controller is wired to.
pub struct ControllerParts {
    pub platform: Platform,
    pub presenter: TrayPresenter,
    pub windows: WindowCoordinator,
    pub notifier: Arc<dyn Notifier>,
    pub deep_links: DeepLinkRouter,
    pub tray: Arc<dyn TrayHandle>,
    pub scheduler: Arc<dyn Scheduler>,
    pub settings: AppSettings,
}

/// Process-wide coordinator. State transitions happen under the service
/// lock; tray and window effects run after it is released, but still
/// inside the `effects` sequence so no broadcast overtakes a later one.
pub struct Controller {
    me: Weak<Controller>,
    platform: Platform,
    effects: Mutex<()>,
    service: Mutex<TimerService>,
    base_icon: Mutex<TrayIcon>,
    presenter: TrayPresenter,
    windows: WindowCoordinator,
    notifications: NotificationBridge,
    deep_links: DeepLinkRouter,
    tray: Arc<dyn TrayHandle>,
    scheduler: Arc<dyn Scheduler>,
    settings: Mutex<AppSettings>,
}

impl Controller {
    pub fn new(parts: ControllerParts) -> Arc<Self> {
        Arc::new_cyclic(|me| Controller {
            me: me.clone(),
            platform: parts.platform,
            effects: Mutex::new(()),
            service: Mutex::new(TimerService::default()),
            base_icon: Mutex::new(TrayIcon::Bundled),
            presenter: parts.presenter,
            windows: parts.windows,
            notifications: NotificationBridge::new(parts.notifier),
            deep_links: parts.deep_links,
            tray: parts.tray,
            scheduler: parts.scheduler,
            settings: Mutex::new(parts.settings),
        })
    }

    /// Held from a transition until its effects are out. Never taken twice
    /// on one call path.
    fn sequence(&self) -> MutexGuard<'_, ()> {
        self.effects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn service(&self) -> Result<MutexGuard<'_, TimerService>, CoordinatorError> {
        Ok(self.service.lock()?)
    }

    fn arm_tick(&self, generation: u64) -> ClockHandle {
        let me = self.me.clone();
        self.scheduler.every(
            TICK_PERIOD,
            Arc::new(move || {
                if let Some(controller) = me.upgrade() {
                    controller.on_tick(generation);
                }
            }),
        )
    }

    fn arm_flash(&self, generation: u64) -> ClockHandle {
        let me = self.me.clone();
        self.scheduler.every(
            FLASH_PERIOD,
            Arc::new(move || {
                if let Some(controller) = me.upgrade() {
                    controller.on_flash_tick(generation);
                }
            }),
        )
    }

    // Timer

    pub fn start_timer(&self, request: StartTimerRequest) -> Result<TimerState, CoordinatorError> {
        let _sequence = self.sequence();
        let started = {
            let mut service = self.service()?;
            service.start(request, |generation| self.arm_tick(generation))?
        };

        if let Some(dismissed) = &started.dismissed {
            debug!("new timer dismissed flashing for {}", dismissed.activity);
            self.notifications.clear();
        }
        info!(
            "timer started: {} for {} min ({}s)",
            started.state.activity, started.state.total_minutes, started.state.remaining_seconds
        );

        self.windows.broadcast(TIMER_UPDATE, &started.state);
        self.render_tray();
        Ok(started.state)
    }

    pub fn stop_timer(&self) -> Result<TimerState, CoordinatorError> {
        let _sequence = self.sequence();
        let stopped = self.service()?.stop();
        match stopped {
            Some(reset) => {
                info!("timer stopped");
                self.windows.broadcast(TIMER_UPDATE, &reset);
                self.render_tray();
                Ok(reset)
            }
            None => {
                debug!("stop requested while idle");
                Ok(TimerState::default())
            }
        }
    }

    pub fn timer_state(&self) -> Result<TimerState, CoordinatorError> {
        Ok(self.service()?.timer())
    }

    pub fn on_tick(&self, generation: u64) {
        let _sequence = self.sequence();
        let outcome = match self.service() {
            Ok(mut service) => service.tick(generation),
            Err(err) => {
                warn!("timer tick skipped: {err}");
                return;
            }
        };

        match outcome {
            TickOutcome::Stale => debug!("ignoring stale tick from generation {generation}"),
            TickOutcome::Updated(state) => {
                self.windows.broadcast(TIMER_UPDATE, &state);
                self.render_tray();
            }
            TickOutcome::Completed {
                last,
                completion,
                reset,
            } => self.complete(last, completion, reset),
        }
    }

    fn complete(&self, last: TimerState, completion: TimerCompletion, reset: TimerState) {
        info!(
            "timer completed: {} ({} min)",
            completion.activity, completion.minutes
        );
        let settings = self.settings();

        self.windows.broadcast(TIMER_UPDATE, &last);
        self.windows.broadcast(
            TIMER_COMPLETED,
            &TimerCompletedEvent::new(&completion, settings.sound_enabled),
        );
        self.windows.broadcast(TIMER_UPDATE, &reset);
        self.render_tray();

        self.notifications
            .notify_completion(&completion, settings.notifications_enabled);

        if !self.tray.is_available() {
            debug!("no tray icon, skipping completion flash");
            return;
        }
        let icon = self.base_icon();
        let began = match self.service() {
            Ok(mut service) => {
                service.begin_flashing(completion, icon, |generation| self.arm_flash(generation))
            }
            Err(err) => {
                warn!("could not start flashing: {err}");
                false
            }
        };
        if began {
            debug!("tray flashing started");
            self.render_tray();
        }
    }

    pub fn on_flash_tick(&self, generation: u64) {
        let _sequence = self.sequence();
        let tick = match self.service() {
            Ok(mut service) => service.flash_tick(generation),
            Err(err) => {
                warn!("flash tick skipped: {err}");
                return;
            }
        };

        match tick {
            FlashTick::Stale => {}
            FlashTick::Frame(_) => self.render_tray(),
            FlashTick::Finished(completion) => {
                debug!("flash limit reached for {}", completion.activity);
                self.render_tray();
            }
        }
    }

    // User input

    /// The one tray click handler; what it does depends on the tray mode.
    pub fn tray_clicked(&self, bounds: Option<TrayBounds>) {
        let _sequence = self.sequence();
        let click = match self.service() {
            Ok(mut service) => service.tray_click(),
            Err(err) => {
                warn!("tray click ignored: {err}");
                return;
            }
        };

        match click {
            TrayClick::OpenJournal(completion) => {
                info!("tray clicked while flashing, opening journal");
                self.notifications.clear();
                self.render_tray();
                self.open_journal(&completion);
            }
            TrayClick::ToggleWidget => {
                let bounds = bounds.or_else(|| self.tray_bounds());
                if let Err(err) = self.windows.toggle_widget(bounds) {
                    warn!("could not toggle widget: {err}");
                }
            }
        }
    }

    pub fn toggle_widget(&self) {
        if let Err(err) = self.windows.toggle_widget(self.tray_bounds()) {
            warn!("could not toggle widget: {err}");
        }
    }

    /// `show_main_window` from the renderer. While flashing this doubles
    /// as "record the completed timer".
    pub fn show_main_requested(&self, page: Option<String>) -> Result<(), CoordinatorError> {
        let _sequence = self.sequence();
        let dismissed = self.service()?.end_flashing();
        match dismissed {
            Some(completion) => {
                self.notifications.clear();
                self.render_tray();
                self.open_journal(&completion);
                Ok(())
            }
            None => self.windows.show_main(page.as_deref()),
        }
    }

    pub fn open_main(&self) -> Result<(), CoordinatorError> {
        self.windows.open_main()
    }

    /// A click on the completion notification.
    pub fn notification_clicked(&self, completion: TimerCompletion) {
        info!("completion notification clicked");
        let _sequence = self.sequence();
        match self.service() {
            Ok(mut service) => {
                service.end_flashing();
            }
            Err(err) => warn!("could not end flashing: {err}"),
        }
        self.render_tray();
        self.open_journal(&completion);
    }

    /// Dock icon or notification activation. A pending completion
    /// notification takes precedence.
    pub fn app_reactivated(&self) {
        if let Some(completion) = self.notifications.take_pending() {
            self.notification_clicked(completion);
            return;
        }
        if let Err(err) = self.windows.open_main() {
            warn!("could not reopen main window: {err}");
        }
    }

    fn open_journal(&self, completion: &TimerCompletion) {
        if let Err(err) = self.windows.show_main(None) {
            warn!("could not show main window for journal entry: {err}");
        }
        self.windows.broadcast(TIMER_JOURNAL_ENTRY, completion);
    }

    pub fn select_emotion(&self, payload: serde_json::Value) {
        self.windows.relay_emotion(&payload);
    }

    pub fn resize_widget(&self, size: WindowSize) -> Result<(), CoordinatorError> {
        self.windows.resize_widget(size, self.tray_bounds())
    }

    pub fn hide_widget(&self) {
        self.windows.hide_widget();
    }

    // Window lifecycle

    pub fn window_loading(&self, label: WindowLabel) {
        self.windows.mark(label, Readiness::Loading);
    }

    pub fn window_loaded(&self, label: WindowLabel) {
        self.windows.mark(label, Readiness::Loaded);
        debug!("{label} window finished loading");
        if label == WindowLabel::Main {
            if let Some(request) = self.deep_links.take_pending() {
                info!("flushing deferred deep link");
                self.open_deep_link(&request);
            }
        }
    }

    /// The renderer has subscribed to events; resend whatever it missed.
    pub fn window_ready(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        self.windows.mark(label, Readiness::Ready);
        let _sequence = self.sequence();
        let timer = self.service()?.timer();
        if timer.is_running {
            debug!("resyncing running timer to {label}");
            self.windows.send(label, TIMER_UPDATE, &timer);
        }
        Ok(())
    }

    pub fn window_closed(&self, label: WindowLabel) {
        self.windows.forget(label);
    }

    // Deep links

    pub fn handle_deep_link(&self, raw: &str) {
        let Some(request) = self.deep_links.accept(raw) else {
            return;
        };
        if self.windows.is_loaded(WindowLabel::Main) {
            self.open_deep_link(&request);
        } else {
            info!("main window not loaded yet, deferring deep link");
            self.deep_links.defer(request);
        }
    }

    pub fn handle_launch_args(&self, args: &[String]) {
        match self.deep_links.find_in_args(args) {
            Some(raw) => self.handle_deep_link(raw),
            None => debug!("no deep link in launch arguments"),
        }
    }

    fn open_deep_link(&self, request: &DeepLinkRequest) {
        let Some(route) = request.registration_route() else {
            return;
        };
        info!(
            "opening registration for token {}",
            request.redacted_token()
        );
        if let Err(err) = self.windows.show_main(Some(&route)) {
            warn!("could not open deep link: {err}");
        }
    }

    // Tray

    fn base_icon(&self) -> TrayIcon {
        self.base_icon
            .lock()
            .map(|icon| icon.clone())
            .unwrap_or_default()
    }

    fn tray_bounds(&self) -> Option<TrayBounds> {
        match self.tray.bounds() {
            Ok(bounds) => bounds,
            Err(err) => {
                debug!("tray bounds unavailable: {err}");
                None
            }
        }
    }

    fn apply_tray(&self) -> Result<(), CoordinatorError> {
        if !self.tray.is_available() {
            return Ok(());
        }
        let (timer, flash) = self.service()?.snapshot();
        let appearance = self.presenter.render(&timer, &flash, &self.base_icon());
        self.tray.apply(&appearance)
    }

    pub fn render_tray(&self) {
        if let Err(err) = self.apply_tray() {
            warn!("tray update failed: {err}");
        }
    }

    /// Replaces the tray icon with a renderer-supplied PNG.
    pub fn set_emotion_image(&self, data: &str) -> Result<(), CoordinatorError> {
        let bytes = decode_icon_data(data)?;
        let _sequence = self.sequence();
        let previous = {
            let mut icon = self.base_icon.lock()?;
            std::mem::replace(&mut *icon, TrayIcon::Custom(bytes.into()))
        };

        if let Err(err) = self.apply_tray() {
            if let Ok(mut icon) = self.base_icon.lock() {
                *icon = previous;
            }
            self.render_tray();
            return Err(err);
        }
        info!("tray icon set to emotion image");
        Ok(())
    }

    pub fn reset_emotion_image(&self) -> Result<(), CoordinatorError> {
        let _sequence = self.sequence();
        *self.base_icon.lock()? = TrayIcon::Bundled;
        self.apply_tray()
    }

    pub fn check_tray_icon(&self) -> TrayIconStatus {
        tray_visibility(self.tray.bounds(), self.platform)
    }

    pub fn report_tray_status(&self) {
        let status = self.check_tray_icon();
        if status.visible {
            info!("tray icon appears visible");
            return;
        }
        warn!(
            "tray icon may not be visible: {}",
            status.error.as_deref().unwrap_or("unknown")
        );
        self.windows.broadcast(TRAY_STATUS_UPDATE, &status);
    }

    pub fn schedule_tray_check(&self) {
        let delay = Duration::from_secs(self.settings().tray_check_delay_secs.max(1) as u64);
        let me = self.me.clone();
        self.scheduler.after(
            delay,
            Box::new(move || {
                if let Some(controller) = me.upgrade() {
                    controller.report_tray_status();
                }
            }),
        );
    }

    // Settings and lifecycle

    pub fn settings(&self) -> AppSettings {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    pub fn apply_settings(&self, settings: AppSettings) {
        if let Ok(mut current) = self.settings.lock() {
            *current = settings;
        }
    }

    /// Cancels both clocks and removes the tray icon.
    pub fn shutdown(&self) {
        let _sequence = self.sequence();
        match self.service() {
            Ok(mut service) => {
                service.stop();
                service.end_flashing();
            }
            Err(err) => warn!("shutdown could not reach timer state: {err}"),
        }
        self.tray.destroy();
        info!("coordinator shut down");
    }
}

/// Accepts raw base64 or a `data:image/...;base64,` URL.
pub fn decode_icon_data(data: &str) -> Result<Vec<u8>, CoordinatorError> {
    let data = data.trim();
    let encoded = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once("base64,")
            .map(|(_, payload)| payload)
            .ok_or_else(|| {
                CoordinatorError::MalformedInput("image data URL is not base64".to_string())
            })?,
        None => data,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| CoordinatorError::MalformedInput(format!("image data: {err}")))?;
    if bytes.is_empty() {
        return Err(CoordinatorError::MalformedInput(
            "image data is empty".to_string(),
        ));
    }
    Ok(bytes)
}
