//! Caching service layer between the chat/web surfaces and EcoTrack

pub mod cache;
pub mod lookup;
pub mod track;

pub use lookup::LookupService;
pub use track::{TrackService, TrackingInfo};
