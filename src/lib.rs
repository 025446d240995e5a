//! Telegram bot and web form backend for submitting and tracking delivery
//! orders through the EcoTrack logistics API.

pub mod core;
pub mod ecotrack;
pub mod services;
pub mod telegram;

pub use crate::core::{config, Config};
