use std::error::Error;
use std::fs;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tauri::image::Image;
use tauri::menu::{Menu, MenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::webview::PageLoadEvent;
use tauri::{App, AppHandle, Manager, RunEvent, WindowEvent};
use tauri_plugin_deep_link::DeepLinkExt;
use tracing::{debug, info, warn};

use super::commands::{self, AppState};
use super::config::RuntimeConfig;
use super::controller::{Controller, ControllerParts};
use super::logging::{init_logging, log_startup};
use super::shell::{load_bundled_icon, logical_bounds, TauriNotifier, TauriTray, TauriWindows};
use crate::backend::core::clock::AsyncScheduler;
use crate::backend::core::models::{Platform, WindowLabel};
use crate::backend::core::tray::TrayPresenter;
use crate::backend::data::storage::{init_database, load_or_create_settings, DATABASE_FILE};
use crate::backend::features::deep_link::DeepLinkRouter;
use crate::backend::features::windows::{Diagnostics, RouteResolver, WindowCoordinator};
use crate::backend::{APP_NAME, TRAY_ID};

const MENU_OPEN: &str = "open";
const MENU_QUICK_ENTRY: &str = "quick-entry";
const MENU_STOP: &str = "stop";
const MENU_QUIT: &str = "quit";

fn with_controller(app: &AppHandle, f: impl FnOnce(&Controller)) {
    match app.try_state::<AppState>() {
        Some(state) => f(&state.controller),
        None => debug!("event before the coordinator was ready"),
    }
}

fn setup_tray(app: &AppHandle, icon: Option<Image<'static>>) -> Result<(), Box<dyn Error>> {
    let open = MenuItem::with_id(app, MENU_OPEN, "Open RedButton", true, None::<&str>)?;
    let quick = MenuItem::with_id(app, MENU_QUICK_ENTRY, "Quick entry", true, None::<&str>)?;
    let stop = MenuItem::with_id(app, MENU_STOP, "Stop timer", true, None::<&str>)?;
    let quit = MenuItem::with_id(app, MENU_QUIT, "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&open, &quick, &stop, &quit])?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .menu(&menu)
        .tooltip(APP_NAME)
        .show_menu_on_left_click(false)
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                rect,
                ..
            } = event
            {
                let app = tray.app_handle();
                let bounds = logical_bounds(app, &rect);
                with_controller(app, |controller| controller.tray_clicked(Some(bounds)));
            }
        })
        .on_menu_event(|app, event| match event.id().as_ref() {
            MENU_OPEN => with_controller(app, |controller| {
                if let Err(err) = controller.open_main() {
                    warn!("tray menu could not open main window: {err}");
                }
            }),
            MENU_QUICK_ENTRY => with_controller(app, Controller::toggle_widget),
            MENU_STOP => with_controller(app, |controller| {
                if let Err(err) = controller.stop_timer() {
                    warn!("tray menu could not stop timer: {err}");
                }
            }),
            MENU_QUIT => app.exit(0),
            _ => {}
        });
    if let Some(icon) = icon {
        builder = builder.icon(icon);
    }
    builder.build(app)?;
    Ok(())
}

fn open_database(app: &App) -> Result<Connection, Box<dyn Error>> {
    let app_dir = app.path().app_data_dir()?;
    fs::create_dir_all(&app_dir)?;
    let conn = Connection::open(app_dir.join(DATABASE_FILE))?;
    init_database(&conn)?;
    Ok(conn)
}

fn setup(app: &mut App, platform: Platform) -> Result<(), Box<dyn Error>> {
    let log_dir = app.path().app_log_dir().ok();
    let log_file = init_logging(log_dir.as_deref());
    let config = RuntimeConfig::from_env();
    log_startup(
        &app.package_info().version.to_string(),
        platform,
        &config,
        log_file.as_deref(),
    );

    let conn = open_database(app)?;
    let settings = load_or_create_settings(&conn)?;

    let handle = app.handle().clone();
    let bundled = load_bundled_icon(&handle);
    if let Err(err) = setup_tray(&handle, bundled.clone()) {
        warn!("tray icon could not be created: {err}");
    }

    let windows = WindowCoordinator::new(
        Arc::new(TauriWindows::new(handle.clone())),
        platform,
        RouteResolver::new(config.frontend_source(platform)),
        Diagnostics {
            platform: platform.to_string(),
            dev_mode: config.dev_mode,
            log_file,
        },
    );
    let controller = Controller::new(ControllerParts {
        platform,
        presenter: TrayPresenter::for_platform(platform, APP_NAME),
        windows,
        notifier: Arc::new(TauriNotifier::new(handle.clone(), platform)),
        deep_links: DeepLinkRouter::default(),
        tray: Arc::new(TauriTray::new(handle.clone(), platform, bundled)),
        scheduler: Arc::new(AsyncScheduler::new(handle.clone())),
        settings,
    });

    app.manage(AppState {
        db: Mutex::new(conn),
        controller: controller.clone(),
    });
    controller.render_tray();

    #[cfg(any(windows, target_os = "linux"))]
    {
        if config.dev_mode {
            if let Err(err) = app.deep_link().register_all() {
                warn!("could not register deep link scheme: {err}");
            }
        }
    }

    let listener = Arc::downgrade(&controller);
    app.deep_link().on_open_url(move |event| {
        let Some(controller) = listener.upgrade() else {
            return;
        };
        for url in event.urls() {
            controller.handle_deep_link(url.as_str());
        }
    });

    let args: Vec<String> = std::env::args().collect();
    debug!("launch arguments: {}", args.len());
    controller.handle_launch_args(&args);

    controller.schedule_tray_check();
    info!("coordinator ready");
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let platform = Platform::current();

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_deep_link::init())
        .setup(move |app| setup(app, platform))
        .on_page_load(|webview, payload| {
            let Some(label) = WindowLabel::from_label(webview.label()) else {
                return;
            };
            let app = webview.app_handle();
            match payload.event() {
                PageLoadEvent::Started => {
                    with_controller(app, |controller| controller.window_loading(label))
                }
                PageLoadEvent::Finished => {
                    with_controller(app, |controller| controller.window_loaded(label))
                }
            }
        })
        .on_window_event(|window, event| {
            let Some(label) = WindowLabel::from_label(window.label()) else {
                return;
            };
            match (label, event) {
                (WindowLabel::Widget, WindowEvent::Focused(false)) => {
                    with_controller(window.app_handle(), Controller::hide_widget)
                }
                (_, WindowEvent::Destroyed) => {
                    with_controller(window.app_handle(), |controller| {
                        controller.window_closed(label)
                    })
                }
                _ => {}
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::start_timer,
            commands::stop_timer,
            commands::get_timer_state,
            commands::show_main_window,
            commands::open_window,
            commands::select_emotion,
            commands::resize_window,
            commands::set_emotion_image,
            commands::reset_emotion_image,
            commands::check_tray_icon,
            commands::window_ready,
            commands::settings_get,
            commands::settings_update,
        ])
        .build(tauri::generate_context!())
        .expect("error while building RedButton");

    app.run(move |handle, event| match event {
        RunEvent::ExitRequested { code, api, .. } => {
            // `code` is only set for explicit exits; `None` means the last
            // window closed.
            if code.is_none() && platform.keeps_running_without_windows() {
                debug!("last window closed, staying in the menu bar");
                api.prevent_exit();
            }
        }
        RunEvent::Exit => with_controller(handle, Controller::shutdown),
        #[cfg(target_os = "macos")]
        RunEvent::Reopen { .. } => with_controller(handle, Controller::app_reactivated),
        _ => {}
    });
}
