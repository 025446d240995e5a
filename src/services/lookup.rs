//! Read-through cache over the wilaya/commune reference endpoints
//!
//! Reference data changes rarely, so both lists are held for an hour. The
//! cache shields EcoTrack from the burst of lookups the order flow and the
//! web form generate.

use std::sync::Arc;

use crate::core::config;
use crate::ecotrack::{endpoints, EcoClient, EcoError, Wilaya};
use crate::services::cache::TtlCache;

/// Cached wilaya/commune lookups.
pub struct LookupService {
    client: Arc<EcoClient>,
    wilayas: TtlCache<Vec<Wilaya>>,
    communes: TtlCache<Vec<String>>,
}

impl LookupService {
    pub fn new(client: Arc<EcoClient>) -> Self {
        Self {
            client,
            wilayas: TtlCache::new(config::cache::lookup_ttl()),
            communes: TtlCache::new(config::cache::lookup_ttl()),
        }
    }

    /// Returns the wilaya list, fetching from EcoTrack on cache miss.
    pub async fn wilayas(&self) -> Result<Vec<Wilaya>, EcoError> {
        if let Some(cached) = self.wilayas.get("wilayas").await {
            return Ok(cached);
        }
        let fetched = endpoints::get_wilayas(&self.client).await?;
        self.wilayas.insert("wilayas", fetched.clone()).await;
        log::info!("Loaded {} wilayas from API", fetched.len());
        Ok(fetched)
    }

    /// Returns the commune names of `wilaya_id`, fetching on cache miss.
    pub async fn communes(&self, wilaya_id: u32) -> Result<Vec<String>, EcoError> {
        let key = format!("communes_{}", wilaya_id);
        if let Some(cached) = self.communes.get(&key).await {
            return Ok(cached);
        }
        let fetched = endpoints::get_communes(&self.client, wilaya_id).await?;
        self.communes.insert(&key, fetched.clone()).await;
        log::info!("Loaded {} communes for wilaya {}", fetched.len(), wilaya_id);
        Ok(fetched)
    }

    /// Looks up a wilaya name by id from the cached list, if available.
    pub async fn wilaya_name(&self, wilaya_id: u32) -> Option<String> {
        let wilayas = self.wilayas().await.ok()?;
        wilayas.into_iter().find(|w| w.id == wilaya_id).map(|w| w.nom)
    }
}
