pub mod clock;
pub mod error;
pub mod flash;
pub mod models;
pub mod service;
pub mod timer;
pub mod tray;
