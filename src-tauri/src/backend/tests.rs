use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use serde_json::{json, Value};
use url::Url;

use crate::backend::app::commands::{settings_update_inner, AppState};
use crate::backend::app::controller::{decode_icon_data, Controller, ControllerParts};
use crate::backend::core::clock::{ClockHandle, Scheduler, TickFn};
use crate::backend::core::error::CoordinatorError;
use crate::backend::core::flash::{FLASH_PERIOD, MAX_FLASHES};
use crate::backend::core::models::{
    AppSettings, AppSettingsPatch, Platform, StartTimerRequest, TrayBounds, TrayIcon,
    WindowLabel, WindowSize,
};
use crate::backend::core::timer::TICK_PERIOD;
use crate::backend::core::tray::{TrayAppearance, TrayHandle, TrayPresenter, TRAY_NOT_CREATED};
use crate::backend::data::storage::{
    init_database, load_json_setting, load_or_create_settings, save_json_setting, save_settings,
};
use crate::backend::features::deep_link::DeepLinkRouter;
use crate::backend::features::notification::{CompletionNotice, Notifier};
use crate::backend::features::windows::{
    Diagnostics, FrontendSource, RouteResolver, WindowCoordinator, WindowSurface,
};
use crate::backend::{
    APP_NAME, APP_SETTINGS_KEY, EMOTION_SELECTED, TIMER_COMPLETED, TIMER_JOURNAL_ENTRY,
    TIMER_UPDATE, TRAY_STATUS_UPDATE,
};

#[derive(Default)]
struct WindowLog {
    existing: HashSet<WindowLabel>,
    visible: HashSet<WindowLabel>,
    emitted: Vec<(WindowLabel, String, Value)>,
    navigations: Vec<(WindowLabel, String)>,
    positions: Vec<(WindowLabel, f64, f64)>,
    sizes: HashMap<WindowLabel, WindowSize>,
    created: usize,
    failing_navigations: usize,
}

/// Signals that an emit has started and waits for the release.
type EmitPause = (mpsc::Sender<()>, mpsc::Receiver<()>);

struct FakeWindows {
    log: Mutex<WindowLog>,
    pause: Mutex<Option<EmitPause>>,
}

impl FakeWindows {
    fn with_both() -> Self {
        let mut log = WindowLog::default();
        log.existing.insert(WindowLabel::Main);
        log.existing.insert(WindowLabel::Widget);
        log.sizes.insert(
            WindowLabel::Widget,
            WindowSize {
                width: 350.0,
                height: 450.0,
            },
        );
        Self {
            log: Mutex::new(log),
            pause: Mutex::new(None),
        }
    }

    /// Blocks the next emit until `release` receives a value.
    fn pause_next_emit(&self, entered: mpsc::Sender<()>, release: mpsc::Receiver<()>) {
        *self.pause.lock().unwrap() = Some((entered, release));
    }

    fn fail_next_navigation(&self) {
        self.log.lock().unwrap().failing_navigations += 1;
    }

    fn events(&self, label: WindowLabel, channel: &str) -> Vec<Value> {
        self.log
            .lock()
            .unwrap()
            .emitted
            .iter()
            .filter(|(to, name, _)| *to == label && name == channel)
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }

    fn clear_events(&self) {
        self.log.lock().unwrap().emitted.clear();
    }

    fn emitted_count(&self) -> usize {
        self.log.lock().unwrap().emitted.len()
    }

    fn navigations(&self) -> Vec<(WindowLabel, String)> {
        self.log.lock().unwrap().navigations.clone()
    }

    fn is_shown(&self, label: WindowLabel) -> bool {
        self.log.lock().unwrap().visible.contains(&label)
    }

    fn close(&self, label: WindowLabel) {
        let mut log = self.log.lock().unwrap();
        log.existing.remove(&label);
        log.visible.remove(&label);
    }

    fn check(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        if self.log.lock().unwrap().existing.contains(&label) {
            Ok(())
        } else {
            Err(CoordinatorError::missing_window(label))
        }
    }
}

impl WindowSurface for FakeWindows {
    fn exists(&self, label: WindowLabel) -> bool {
        self.log.lock().unwrap().existing.contains(&label)
    }

    fn emit(&self, label: WindowLabel, channel: &str, payload: &Value) -> Result<(), CoordinatorError> {
        self.check(label)?;
        let pause = self.pause.lock().unwrap().take();
        if let Some((entered, release)) = pause {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        self.log
            .lock()
            .unwrap()
            .emitted
            .push((label, channel.to_string(), payload.clone()));
        Ok(())
    }

    fn show(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        self.check(label)?;
        self.log.lock().unwrap().visible.insert(label);
        Ok(())
    }

    fn hide(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        self.check(label)?;
        self.log.lock().unwrap().visible.remove(&label);
        Ok(())
    }

    fn focus(&self, label: WindowLabel) -> Result<(), CoordinatorError> {
        self.check(label)
    }

    fn is_visible(&self, label: WindowLabel) -> Result<bool, CoordinatorError> {
        self.check(label)?;
        Ok(self.is_shown(label))
    }

    fn navigate(&self, label: WindowLabel, url: &Url) -> Result<(), CoordinatorError> {
        self.check(label)?;
        let mut log = self.log.lock().unwrap();
        if log.failing_navigations > 0 {
            log.failing_navigations -= 1;
            return Err(CoordinatorError::ResourceLoad(format!(
                "{url} did not load"
            )));
        }
        log.navigations.push((label, url.to_string()));
        Ok(())
    }

    fn size(&self, label: WindowLabel) -> Result<WindowSize, CoordinatorError> {
        self.check(label)?;
        Ok(self.log.lock().unwrap().sizes[&label])
    }

    fn set_size(&self, label: WindowLabel, size: WindowSize) -> Result<(), CoordinatorError> {
        self.check(label)?;
        self.log.lock().unwrap().sizes.insert(label, size);
        Ok(())
    }

    fn set_position(&self, label: WindowLabel, x: f64, y: f64) -> Result<(), CoordinatorError> {
        self.check(label)?;
        self.log.lock().unwrap().positions.push((label, x, y));
        Ok(())
    }

    fn bring_app_to_front(&self) -> Result<(), CoordinatorError> {
        Ok(())
    }

    fn create_main(&self) -> Result<(), CoordinatorError> {
        let mut log = self.log.lock().unwrap();
        log.existing.insert(WindowLabel::Main);
        log.visible.insert(WindowLabel::Main);
        log.created += 1;
        Ok(())
    }
}

struct FakeTray {
    available: bool,
    bounds: Option<TrayBounds>,
    applied: Mutex<Vec<TrayAppearance>>,
    destroyed: AtomicBool,
}

impl FakeTray {
    fn new(available: bool) -> Self {
        Self {
            available,
            bounds: available.then_some(TrayBounds {
                x: 1000.0,
                y: 0.0,
                width: 22.0,
                height: 24.0,
            }),
            applied: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    fn last(&self) -> TrayAppearance {
        self.applied.lock().unwrap().last().cloned().unwrap()
    }
}

impl TrayHandle for FakeTray {
    fn is_available(&self) -> bool {
        self.available
    }

    fn apply(&self, appearance: &TrayAppearance) -> Result<(), CoordinatorError> {
        self.applied.lock().unwrap().push(appearance.clone());
        Ok(())
    }

    fn bounds(&self) -> Result<Option<TrayBounds>, CoordinatorError> {
        Ok(self.bounds)
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeNotifier {
    shown: Mutex<Vec<CompletionNotice>>,
}

impl Notifier for FakeNotifier {
    fn supported(&self) -> bool {
        true
    }

    fn show(&self, notice: &CompletionNotice) -> Result<(), CoordinatorError> {
        self.shown.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

struct ManualClock {
    period: Duration,
    on_tick: TickFn,
    alive: Arc<AtomicBool>,
}

/// Clocks that only advance when the test fires them.
#[derive(Default)]
struct ManualScheduler {
    clocks: Mutex<Vec<ManualClock>>,
    delayed: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl ManualScheduler {
    fn live(&self, period: Duration) -> usize {
        self.clocks
            .lock()
            .unwrap()
            .iter()
            .filter(|clock| clock.period == period && clock.alive.load(Ordering::SeqCst))
            .count()
    }

    fn fire(&self, period: Duration) {
        let due: Vec<TickFn> = self
            .clocks
            .lock()
            .unwrap()
            .iter()
            .filter(|clock| clock.period == period && clock.alive.load(Ordering::SeqCst))
            .map(|clock| clock.on_tick.clone())
            .collect();
        for on_tick in due {
            on_tick();
        }
    }

    fn fire_n(&self, period: Duration, times: usize) {
        for _ in 0..times {
            self.fire(period);
        }
    }

    fn run_delayed(&self) {
        let tasks: Vec<_> = self.delayed.lock().unwrap().drain(..).collect();
        for task in tasks {
            task();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, on_tick: TickFn) -> ClockHandle {
        let alive = Arc::new(AtomicBool::new(true));
        let mut clocks = self.clocks.lock().unwrap();
        clocks.retain(|clock| clock.alive.load(Ordering::SeqCst));
        clocks.push(ManualClock {
            period,
            on_tick,
            alive: alive.clone(),
        });
        ClockHandle::new(move || alive.store(false, Ordering::SeqCst))
    }

    fn after(&self, _delay: Duration, task: Box<dyn FnOnce() + Send>) {
        self.delayed.lock().unwrap().push(task);
    }
}

struct Harness {
    controller: Arc<Controller>,
    windows: Arc<FakeWindows>,
    tray: Arc<FakeTray>,
    notifier: Arc<FakeNotifier>,
    scheduler: Arc<ManualScheduler>,
}

fn harness_with(platform: Platform, tray_available: bool, settings: AppSettings) -> Harness {
    let windows = Arc::new(FakeWindows::with_both());
    let tray = Arc::new(FakeTray::new(tray_available));
    let notifier = Arc::new(FakeNotifier::default());
    let scheduler = Arc::new(ManualScheduler::default());

    let coordinator = WindowCoordinator::new(
        windows.clone(),
        platform,
        RouteResolver::new(FrontendSource::DevServer(
            Url::parse("http://localhost:3000").unwrap(),
        )),
        Diagnostics::default(),
    );
    let controller = Controller::new(ControllerParts {
        platform,
        presenter: TrayPresenter::for_platform(platform, APP_NAME),
        windows: coordinator,
        notifier: notifier.clone(),
        deep_links: DeepLinkRouter::default(),
        tray: tray.clone(),
        scheduler: scheduler.clone(),
        settings,
    });

    Harness {
        controller,
        windows,
        tray,
        notifier,
        scheduler,
    }
}

fn harness() -> Harness {
    harness_with(Platform::Linux, true, AppSettings::default())
}

fn request(activity: &str, minutes: i64) -> StartTimerRequest {
    StartTimerRequest {
        activity: activity.to_string(),
        total_minutes: minutes,
        emotion_name: "Anxious".to_string(),
        remaining_seconds: None,
    }
}

/// A timer one tick away from completion.
fn almost_done(activity: &str) -> StartTimerRequest {
    StartTimerRequest {
        remaining_seconds: Some(1),
        ..request(activity, 25)
    }
}

fn complete_timer(h: &Harness, activity: &str) {
    h.controller.start_timer(almost_done(activity)).unwrap();
    h.scheduler.fire(TICK_PERIOD);
}

#[test]
fn restarting_keeps_a_single_tick_clock() {
    let h = harness();
    h.controller.start_timer(request("First", 5)).unwrap();
    h.controller.start_timer(request("Second", 5)).unwrap();
    assert_eq!(h.scheduler.live(TICK_PERIOD), 1);
}

#[test]
fn only_the_latest_activity_is_broadcast_after_restart() {
    let h = harness();
    h.controller.start_timer(request("First", 5)).unwrap();
    h.controller.start_timer(request("Second", 5)).unwrap();
    h.windows.clear_events();

    h.scheduler.fire_n(TICK_PERIOD, 3);
    // A late tick from the first clock carries a stale generation.
    h.controller.on_tick(1);

    let updates = h.windows.events(WindowLabel::Main, TIMER_UPDATE);
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|u| u["activity"] == "Second"));
    assert_eq!(updates[2]["remainingSeconds"], 297);
}

#[test]
fn one_minute_timer_completes_exactly_once() {
    let h = harness();
    h.controller.start_timer(request("Breathe", 1)).unwrap();
    h.windows.clear_events();

    h.scheduler.fire_n(TICK_PERIOD, 60);
    h.scheduler.fire_n(TICK_PERIOD, 5);

    let completed = h.windows.events(WindowLabel::Main, TIMER_COMPLETED);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["minutes"], 1);
    assert_eq!(completed[0]["activity"], "Breathe");
    assert_eq!(completed[0]["playSound"], true);

    let remaining: Vec<i64> = h
        .windows
        .events(WindowLabel::Main, TIMER_UPDATE)
        .iter()
        .map(|u| u["remainingSeconds"].as_i64().unwrap())
        .collect();
    let expected: Vec<i64> = (0..60).rev().collect();
    assert_eq!(&remaining[..60], expected.as_slice());

    let state = h.controller.timer_state().unwrap();
    assert!(!state.is_running);
    assert_eq!(state.remaining_seconds, 0);
    assert_eq!(h.scheduler.live(TICK_PERIOD), 0);
}

#[test]
fn completion_reaches_both_windows_and_the_notifier() {
    let h = harness_with(
        Platform::MacOs,
        true,
        AppSettings {
            sound_enabled: false,
            ..AppSettings::default()
        },
    );
    complete_timer(&h, "Walk");

    for label in WindowLabel::ALL {
        let completed = h.windows.events(label, TIMER_COMPLETED);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["playSound"], false);
    }
    let updates = h.windows.events(WindowLabel::Widget, TIMER_UPDATE);
    assert_eq!(updates.last().unwrap()["isRunning"], false);
    assert_eq!(updates.last().unwrap()["activity"], "");

    let shown = h.notifier.shown.lock().unwrap().clone();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].body, "You completed \"Walk\" (25 minutes)");
}

#[test]
fn disabled_notifications_still_flash() {
    let h = harness_with(
        Platform::Windows,
        true,
        AppSettings {
            notifications_enabled: false,
            ..AppSettings::default()
        },
    );
    complete_timer(&h, "Walk");
    assert!(h.notifier.shown.lock().unwrap().is_empty());
    assert_eq!(h.scheduler.live(FLASH_PERIOD), 1);
}

#[test]
fn stop_is_idempotent() {
    let h = harness();
    h.controller.stop_timer().unwrap();
    assert_eq!(h.windows.emitted_count(), 0);
    assert!(h.controller.timer_state().unwrap().is_zero());

    h.controller.start_timer(request("Read", 10)).unwrap();
    h.windows.clear_events();
    h.controller.stop_timer().unwrap();
    assert!(h.controller.timer_state().unwrap().is_zero());
    assert_eq!(h.scheduler.live(TICK_PERIOD), 0);
    assert_eq!(h.windows.events(WindowLabel::Main, TIMER_UPDATE).len(), 1);

    h.controller.stop_timer().unwrap();
    assert_eq!(h.windows.events(WindowLabel::Main, TIMER_UPDATE).len(), 1);
}

#[test]
fn stop_during_a_tick_broadcast_is_the_last_word() {
    let h = harness();
    h.controller.start_timer(request("Read", 5)).unwrap();
    h.windows.clear_events();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    h.windows.pause_next_emit(entered_tx, release_rx);

    let scheduler = h.scheduler.clone();
    let ticker = thread::spawn(move || scheduler.fire(TICK_PERIOD));
    entered_rx.recv().unwrap();

    let controller = h.controller.clone();
    let stopper = thread::spawn(move || controller.stop_timer().unwrap());
    thread::sleep(Duration::from_millis(50));
    release_tx.send(()).unwrap();

    ticker.join().unwrap();
    let stopped = stopper.join().unwrap();
    assert!(stopped.is_zero());

    let updates = h.windows.events(WindowLabel::Main, TIMER_UPDATE);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0]["isRunning"], true);
    assert_eq!(updates[0]["remainingSeconds"], 299);
    assert_eq!(updates[1]["isRunning"], false);
    assert_eq!(updates[1]["remainingSeconds"], 0);
    assert!(h.controller.timer_state().unwrap().is_zero());
}

#[test]
fn overlong_duration_is_rejected() {
    let h = harness();
    let err = h
        .controller
        .start_timer(request("Hibernate", i64::MAX / 10))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedInput(_)));
    assert_eq!(h.scheduler.live(TICK_PERIOD), 0);
    assert_eq!(h.windows.emitted_count(), 0);
}

#[test]
fn invalid_duration_changes_nothing() {
    let h = harness();
    let err = h.controller.start_timer(request("Nap", 0)).unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedInput(_)));
    assert_eq!(h.scheduler.live(TICK_PERIOD), 0);
    assert_eq!(h.windows.emitted_count(), 0);
}

#[test]
fn flashing_ends_by_itself_and_the_tray_click_returns_to_normal() {
    let h = harness();
    complete_timer(&h, "Stretch");
    assert_eq!(h.scheduler.live(FLASH_PERIOD), 1);

    h.scheduler.fire_n(FLASH_PERIOD, MAX_FLASHES as usize);
    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    assert_eq!(h.tray.last().tooltip, APP_NAME);

    h.windows.clear_events();
    h.controller.tray_clicked(None);
    assert!(h.windows.is_shown(WindowLabel::Widget));
    assert!(h.windows.events(WindowLabel::Main, TIMER_JOURNAL_ENTRY).is_empty());
}

#[test]
fn early_tray_click_stops_flashing_and_opens_the_journal() {
    let h = harness();
    complete_timer(&h, "Stretch");
    h.scheduler.fire_n(FLASH_PERIOD, 3);

    h.controller.tray_clicked(None);

    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    assert!(h.windows.is_shown(WindowLabel::Main));
    assert!(!h.windows.is_shown(WindowLabel::Widget));
    let entries = h.windows.events(WindowLabel::Main, TIMER_JOURNAL_ENTRY);
    assert_eq!(
        entries,
        vec![json!({"activity": "Stretch", "minutes": 25, "emotionName": "Anxious"})]
    );

    // The next click goes back to the widget.
    h.controller.tray_clicked(None);
    assert!(h.windows.is_shown(WindowLabel::Widget));
}

#[test]
fn flash_frames_alternate_in_the_tray() {
    let h = harness();
    complete_timer(&h, "Stretch");
    h.scheduler.fire(FLASH_PERIOD);
    assert_eq!(
        h.tray.last().tooltip,
        "✅ COMPLETED: Stretch - Click to record in journal"
    );
    h.scheduler.fire(FLASH_PERIOD);
    assert_eq!(h.tray.last().tooltip, "RedButton - Timer completed!");
}

#[test]
fn no_tray_means_no_flashing() {
    let h = harness_with(Platform::Linux, false, AppSettings::default());
    complete_timer(&h, "Stretch");
    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    assert!(h.tray.applied.lock().unwrap().is_empty());

    h.controller.tray_clicked(None);
    assert!(h.windows.is_shown(WindowLabel::Widget));
}

#[test]
fn starting_a_new_timer_dismisses_flashing() {
    let h = harness();
    complete_timer(&h, "Old");
    h.controller.start_timer(request("New", 5)).unwrap();
    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    assert_eq!(h.tray.last().tooltip, "⏱️ TIMER (05:00) - New");
}

#[test]
fn show_main_while_flashing_records_the_completion() {
    let h = harness();
    complete_timer(&h, "Draw");
    h.controller
        .show_main_requested(Some("goals".to_string()))
        .unwrap();

    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    assert!(h.windows.navigations().is_empty());
    let entries = h.windows.events(WindowLabel::Main, TIMER_JOURNAL_ENTRY);
    assert_eq!(entries[0]["activity"], "Draw");
}

#[test]
fn show_main_navigates_with_hash_routing() {
    let h = harness();
    h.controller
        .show_main_requested(Some("journal".to_string()))
        .unwrap();
    assert_eq!(
        h.windows.navigations(),
        vec![(WindowLabel::Main, "http://localhost:3000/#/journal".to_string())]
    );
    assert!(h.windows.is_shown(WindowLabel::Main));
}

#[test]
fn failed_navigation_loads_the_diagnostic_page() {
    let h = harness();
    h.windows.fail_next_navigation();
    h.controller
        .show_main_requested(Some("journal".to_string()))
        .unwrap();

    let navigations = h.windows.navigations();
    assert_eq!(navigations.len(), 1);
    assert_eq!(navigations[0].0, WindowLabel::Main);
    assert!(navigations[0].1.starts_with("data:text/html;base64,"));
    assert!(h.windows.is_shown(WindowLabel::Main));
}

#[test]
fn notification_click_opens_the_completed_entry() {
    let h = harness_with(Platform::MacOs, true, AppSettings::default());
    complete_timer(&h, "Paint");

    h.controller.app_reactivated();

    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    let entries = h.windows.events(WindowLabel::Main, TIMER_JOURNAL_ENTRY);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["activity"], "Paint");

    // A later dock click only brings the window back.
    h.controller.app_reactivated();
    assert_eq!(h.windows.events(WindowLabel::Main, TIMER_JOURNAL_ENTRY).len(), 1);
}

#[test]
fn deep_link_waits_for_the_main_window_to_load() {
    let h = harness();
    h.controller.window_loading(WindowLabel::Main);
    h.controller
        .handle_launch_args(&["app".to_string(), "redbutton://register?token=abc123".to_string()]);
    assert!(h.windows.navigations().is_empty());

    h.controller.window_loaded(WindowLabel::Main);
    assert_eq!(
        h.windows.navigations(),
        vec![(
            WindowLabel::Main,
            "http://localhost:3000/#/register?token=abc123".to_string()
        )]
    );
    assert!(h.windows.is_shown(WindowLabel::Main));

    // Nothing left to flush on the next load.
    h.controller.window_loaded(WindowLabel::Main);
    assert_eq!(h.windows.navigations().len(), 1);
}

#[test]
fn deep_link_navigates_immediately_once_loaded() {
    let h = harness();
    h.controller.window_loaded(WindowLabel::Main);
    h.controller.handle_deep_link("redbutton://journal?token=abc123");
    assert!(h.windows.navigations().is_empty());

    h.controller
        .handle_deep_link("http://localhost:3000/register?token=abc123");
    assert_eq!(h.windows.navigations().len(), 1);
}

#[test]
fn ready_window_receives_the_running_timer() {
    let h = harness();
    h.controller.start_timer(request("Yoga", 15)).unwrap();
    h.windows.clear_events();

    h.controller.window_ready(WindowLabel::Widget).unwrap();
    assert_eq!(h.windows.events(WindowLabel::Widget, TIMER_UPDATE).len(), 1);
    assert!(h.windows.events(WindowLabel::Main, TIMER_UPDATE).is_empty());

    h.controller.stop_timer().unwrap();
    h.windows.clear_events();
    h.controller.window_ready(WindowLabel::Main).unwrap();
    assert_eq!(h.windows.emitted_count(), 0);
}

#[test]
fn closed_window_is_skipped_by_broadcasts() {
    let h = harness();
    h.windows.close(WindowLabel::Widget);
    h.controller.start_timer(request("Yoga", 15)).unwrap();
    assert!(h.windows.events(WindowLabel::Widget, TIMER_UPDATE).is_empty());
    assert_eq!(h.windows.events(WindowLabel::Main, TIMER_UPDATE).len(), 1);
}

#[test]
fn open_window_recreates_a_closed_main_window() {
    let h = harness();
    h.windows.close(WindowLabel::Main);
    h.controller.open_main().unwrap();
    assert_eq!(h.windows.log.lock().unwrap().created, 1);
}

#[test]
fn selected_emotion_is_relayed_to_main() {
    let h = harness();
    h.controller.tray_clicked(None);
    assert!(h.windows.is_shown(WindowLabel::Widget));

    h.controller.select_emotion(json!({"name": "Calm"}));
    assert_eq!(
        h.windows.events(WindowLabel::Main, EMOTION_SELECTED),
        vec![json!({"name": "Calm"})]
    );
    assert!(h.windows.is_shown(WindowLabel::Main));
    assert!(!h.windows.is_shown(WindowLabel::Widget));
}

#[test]
fn widget_is_positioned_against_the_tray() {
    let h = harness_with(Platform::MacOs, true, AppSettings::default());
    h.controller.tray_clicked(None);
    let positions = h.windows.log.lock().unwrap().positions.clone();
    assert_eq!(positions, vec![(WindowLabel::Widget, 836.0, 24.0)]);

    h.controller
        .resize_widget(WindowSize {
            width: 300.0,
            height: 200.0,
        })
        .unwrap();
    let positions = h.windows.log.lock().unwrap().positions.clone();
    assert_eq!(positions.last(), Some(&(WindowLabel::Widget, 861.0, 24.0)));

    let err = h
        .controller
        .resize_widget(WindowSize {
            width: -1.0,
            height: 200.0,
        })
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedInput(_)));
}

#[test]
fn emotion_image_replaces_and_restores_the_tray_icon() {
    let h = harness();
    h.controller
        .set_emotion_image("data:image/png;base64,AQID")
        .unwrap();
    assert_eq!(h.tray.last().icon, TrayIcon::Custom(vec![1u8, 2, 3].into()));

    let err = h.controller.set_emotion_image("%%%").unwrap_err();
    assert!(matches!(err, CoordinatorError::MalformedInput(_)));
    assert_eq!(h.tray.last().icon, TrayIcon::Custom(vec![1u8, 2, 3].into()));

    // Flashing keeps showing the emotion icon it started with.
    complete_timer(&h, "Dance");
    h.scheduler.fire(FLASH_PERIOD);
    assert_eq!(h.tray.last().icon, TrayIcon::Custom(vec![1u8, 2, 3].into()));

    h.controller.reset_emotion_image().unwrap();
    h.controller.tray_clicked(None);
    assert_eq!(h.tray.last().icon, TrayIcon::Bundled);
}

#[test]
fn icon_data_accepts_raw_base64() {
    assert_eq!(decode_icon_data("AQID").unwrap(), vec![1u8, 2, 3]);
    assert!(decode_icon_data("").is_err());
    assert!(decode_icon_data("data:image/png,AQID").is_err());
}

#[test]
fn missing_tray_is_reported_after_startup_delay() {
    let h = harness_with(Platform::MacOs, false, AppSettings::default());
    assert_eq!(
        h.controller.check_tray_icon().error.as_deref(),
        Some(TRAY_NOT_CREATED)
    );

    h.controller.schedule_tray_check();
    assert!(h.windows.events(WindowLabel::Main, TRAY_STATUS_UPDATE).is_empty());
    h.scheduler.run_delayed();
    assert_eq!(
        h.windows.events(WindowLabel::Main, TRAY_STATUS_UPDATE),
        vec![json!({"visible": false, "error": TRAY_NOT_CREATED})]
    );
}

#[test]
fn visible_tray_reports_nothing() {
    let h = harness_with(Platform::MacOs, true, AppSettings::default());
    h.controller.report_tray_status();
    assert_eq!(h.windows.emitted_count(), 0);
}

#[test]
fn shutdown_cancels_clocks_and_removes_the_tray() {
    let h = harness();
    complete_timer(&h, "Rest");
    h.controller.start_timer(request("Again", 5)).unwrap();
    h.controller.shutdown();
    assert_eq!(h.scheduler.live(TICK_PERIOD), 0);
    assert_eq!(h.scheduler.live(FLASH_PERIOD), 0);
    assert!(h.tray.destroyed.load(Ordering::SeqCst));
}

fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_database(&conn).unwrap();
    conn
}

#[test]
fn settings_round_trip_through_sqlite() {
    let conn = memory_db();
    let settings = AppSettings {
        notifications_enabled: false,
        sound_enabled: true,
        tray_check_delay_secs: 12,
    };
    save_settings(&conn, &settings).unwrap();
    let loaded = load_or_create_settings(&conn).unwrap();
    assert!(!loaded.notifications_enabled);
    assert_eq!(loaded.tray_check_delay_secs, 12);
}

#[test]
fn stored_settings_are_normalized_on_load() {
    let conn = memory_db();
    save_json_setting(&conn, APP_SETTINGS_KEY, &json!({"trayCheckDelaySecs": 500})).unwrap();
    let loaded = load_or_create_settings(&conn).unwrap();
    assert_eq!(loaded.tray_check_delay_secs, 60);
    assert!(loaded.notifications_enabled);

    let stored: Value = load_json_setting(&conn, APP_SETTINGS_KEY).unwrap().unwrap();
    assert_eq!(stored["trayCheckDelaySecs"], 60);
}

#[test]
fn unreadable_settings_fall_back_to_defaults() {
    let conn = memory_db();
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, 'not json')",
        [APP_SETTINGS_KEY],
    )
    .unwrap();
    let loaded = load_or_create_settings(&conn).unwrap();
    assert_eq!(loaded.tray_check_delay_secs, 5);
}

#[test]
fn settings_update_persists_and_applies() {
    let h = harness();
    let state = AppState {
        db: Mutex::new(memory_db()),
        controller: h.controller.clone(),
    };

    let updated = settings_update_inner(
        &state,
        AppSettingsPatch {
            sound_enabled: Some(false),
            tray_check_delay_secs: Some(0),
            ..AppSettingsPatch::default()
        },
    )
    .unwrap();
    assert!(!updated.sound_enabled);
    assert_eq!(updated.tray_check_delay_secs, 1);
    assert!(!h.controller.settings().sound_enabled);

    let conn = state.db.lock().unwrap();
    let stored: AppSettings = load_json_setting(&conn, APP_SETTINGS_KEY).unwrap().unwrap();
    assert_eq!(stored.tray_check_delay_secs, 1);

    drop(conn);
    complete_timer(&h, "Quiet");
    assert_eq!(
        h.windows.events(WindowLabel::Main, TIMER_COMPLETED)[0]["playSound"],
        false
    );
}
