//! Core infrastructure: configuration, logging, web server

pub mod config;
pub mod logging;
pub mod web_server;

pub use config::Config;
