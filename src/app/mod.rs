pub mod adb;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod view;
