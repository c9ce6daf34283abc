pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod controller;
pub mod logging;
pub mod shell;
