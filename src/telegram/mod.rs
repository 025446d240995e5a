//! Telegram bot surface

pub mod auth;
pub mod bot;
pub mod formatters;
pub mod handlers;
pub mod scene;
pub mod session;
pub mod webapp;

/// Bot type used across the handler tree.
pub type Bot = teloxide::Bot;

pub use handlers::{HandlerDeps, HandlerError};
