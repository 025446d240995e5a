//! Handler dependencies and error alias

use std::sync::Arc;

use url::Url;

use crate::ecotrack::EcoClient;
use crate::services::{LookupService, TrackService};
use crate::telegram::auth::AllowList;
use crate::telegram::session::SessionStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub eco: Arc<EcoClient>,
    pub lookup: Arc<LookupService>,
    pub track: Arc<TrackService>,
    pub sessions: Arc<SessionStore>,
    pub allow_list: Arc<AllowList>,
    pub web_app_url: Option<Url>,
}
