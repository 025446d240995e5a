//! EcoTrack delivery API integration

pub mod client;
pub mod endpoints;

pub use client::{EcoClient, EcoError};
pub use endpoints::{CreateOrderPayload, CreatedOrder, Wilaya};
