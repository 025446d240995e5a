//! Tracking queries over the EcoTrack API
//!
//! Upstream tracking payloads differ between deployments in both field names
//! and overall shape (array vs. map keyed by tracking id). This module
//! normalizes them into stable [`TrackingInfo`] / [`OrderListItem`] values.
//! Field-name variance is handled by ordered alias tables — declarative data,
//! shared with [`crate::ecotrack::endpoints`]'s resolver.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::config;
use crate::ecotrack::endpoints::{self, pick_array, pick_str};
use crate::ecotrack::{EcoClient, EcoError};
use crate::services::cache::TtlCache;

/// Aliases for the overall shipment status field.
const STATUS_ALIASES: &[&str] = &["current_status", "status", "etat"];
/// Aliases for the last-update timestamp field.
const LAST_UPDATE_ALIASES: &[&str] = &["last_update", "updated_at", "timestamp"];
/// Fields that may carry the status history array, in priority order.
const HISTORY_SOURCE_ALIASES: &[&str] = &["history", "timeline", "events", "activity"];
/// Aliases for the status of a single history entry.
const ITEM_STATUS_ALIASES: &[&str] = &["status", "state", "etat"];
/// Aliases for the timestamp of a single history entry.
const ITEM_AT_ALIASES: &[&str] = &["at", "date", "timestamp"];
/// Aliases for the tracking id of a list entry.
const ITEM_TRACKING_ALIASES: &[&str] = &["tracking", "code", "ref"];
/// Aliases for the commune of a list entry.
const ITEM_COMMUNE_ALIASES: &[&str] = &["commune", "city"];
/// Aliases for the last-activity timestamp of a list entry.
const ITEM_LAST_ACTIVITY_ALIASES: &[&str] = &["last_activity", "updated_at", "date"];

/// One entry of the normalized status history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingHistoryItem {
    pub status: String,
    pub at: String,
}

/// One entry of the raw activity feed (station scans).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityItem {
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    pub station: Option<String>,
    pub scan_location: Option<String>,
}

/// Normalized tracking snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingInfo {
    pub tracking: String,
    pub current_status: Option<String>,
    pub last_update: Option<String>,
    pub history: Vec<TrackingHistoryItem>,
    pub recipient_name: Option<String>,
    pub shipped_by: Option<String>,
    pub current_station: Option<String>,
    pub origin_city: Option<String>,
    pub dest_location_city: Option<String>,
    pub activity: Vec<ActivityItem>,
    pub reasons: Vec<String>,
}

/// Compact "latest movement" projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestActivity {
    pub station: Option<String>,
    pub driver: Option<String>,
    pub note: Option<String>,
    pub date: Option<String>,
}

impl LatestActivity {
    fn is_empty(&self) -> bool {
        self.station.is_none() && self.driver.is_none() && self.note.is_none() && self.date.is_none()
    }
}

/// Flattened, display-ready entry of the bulk status filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderListItem {
    pub tracking: String,
    pub status: Option<String>,
    pub commune: Option<String>,
    pub last_activity: Option<String>,
}

/// Errors of the tracking query surface.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("tracking id is required")]
    MissingTracking,
    #[error("note content is required")]
    EmptyNote,
    #[error("note must be {0} characters or fewer")]
    NoteTooLong(usize),
    #[error("at least one status is required")]
    NoStatuses,
    #[error(transparent)]
    Api(#[from] EcoError),
}

impl TrackError {
    /// Short message suitable for relaying to the chat user.
    pub fn user_message(&self) -> String {
        match self {
            TrackError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Validates note content for `/update`, returning the trimmed text.
pub fn validate_note(content: &str) -> Result<&str, TrackError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(TrackError::EmptyNote);
    }
    if trimmed.chars().count() > config::ui::MAX_NOTE_CHARS {
        return Err(TrackError::NoteTooLong(config::ui::MAX_NOTE_CHARS));
    }
    Ok(trimmed)
}

/// Joins a `date` / `time` pair into one display timestamp.
fn compose_date_time(date: Option<&str>, time: Option<&str>) -> Option<String> {
    let composed = format!("{} {}", date.unwrap_or(""), time.unwrap_or(""));
    let trimmed = composed.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Builds a [`TrackingInfo`] from whatever shape the deployment returned.
pub fn normalize_tracking_info(tracking: &str, raw: &Value) -> TrackingInfo {
    let activity: Vec<ActivityItem> = raw
        .get("activity")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| ActivityItem {
                    date: item.get("date").and_then(Value::as_str).map(str::to_owned),
                    time: item.get("time").and_then(Value::as_str).map(str::to_owned),
                    status: item.get("status").and_then(Value::as_str).map(str::to_owned),
                    station: item.get("station").and_then(Value::as_str).map(str::to_owned),
                    scan_location: item.get("scanLocation").and_then(Value::as_str).map(str::to_owned),
                })
                .collect()
        })
        .unwrap_or_default();

    let history: Vec<TrackingHistoryItem> = pick_array(raw, HISTORY_SOURCE_ALIASES)
        .map(|items| {
            items
                .iter()
                .map(|item| TrackingHistoryItem {
                    status: pick_str(item, ITEM_STATUS_ALIASES).unwrap_or_else(|| "unknown".to_string()),
                    at: pick_str(item, ITEM_AT_ALIASES)
                        .or_else(|| {
                            compose_date_time(
                                item.get("date").and_then(Value::as_str),
                                item.get("time").and_then(Value::as_str),
                            )
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let reasons: Vec<String> = raw
        .get("reasons")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();

    TrackingInfo {
        tracking: tracking.to_string(),
        current_status: pick_str(raw, STATUS_ALIASES),
        last_update: pick_str(raw, LAST_UPDATE_ALIASES),
        history,
        recipient_name: raw.get("recipientName").and_then(Value::as_str).map(str::to_owned),
        shipped_by: raw.get("shippedBy").and_then(Value::as_str).map(str::to_owned),
        current_station: raw.get("currentStation").and_then(Value::as_str).map(str::to_owned),
        origin_city: raw.get("originCity").map(value_to_display).unwrap_or_default(),
        dest_location_city: raw.get("destLocationCity").map(value_to_display).unwrap_or_default(),
        activity,
        reasons,
    }
}

/// Renders a scalar field that some deployments send as a number.
fn value_to_display(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flattens the bulk-filter payload, which is either an array of entries or
/// a map keyed by tracking id.
pub fn normalize_order_list(payload: &Value) -> Vec<OrderListItem> {
    if let Some(items) = payload.as_array() {
        return items
            .iter()
            .map(|item| OrderListItem {
                tracking: pick_str(item, ITEM_TRACKING_ALIASES).unwrap_or_default(),
                status: pick_str(item, ITEM_STATUS_ALIASES),
                commune: pick_str(item, ITEM_COMMUNE_ALIASES),
                last_activity: pick_str(item, ITEM_LAST_ACTIVITY_ALIASES),
            })
            .collect();
    }

    if let Some(map) = payload.as_object() {
        return map
            .iter()
            .map(|(tracking, entry)| {
                // Map entries report their movement through the activity
                // array; the first element is the most recent scan.
                let last_activity = entry.get("activity").and_then(Value::as_array).and_then(|acts| {
                    acts.first().and_then(|first| {
                        compose_date_time(
                            first.get("date").and_then(Value::as_str),
                            first.get("time").and_then(Value::as_str),
                        )
                    })
                });
                OrderListItem {
                    tracking: tracking.clone(),
                    status: pick_str(entry, ITEM_STATUS_ALIASES),
                    commune: pick_str(entry, ITEM_COMMUNE_ALIASES),
                    last_activity,
                }
            })
            .collect();
    }

    Vec::new()
}

/// Tracking query service with a short-TTL snapshot cache.
pub struct TrackService {
    client: Arc<EcoClient>,
    api_key: String,
    info_cache: TtlCache<TrackingInfo>,
}

impl TrackService {
    pub fn new(client: Arc<EcoClient>, api_key: String) -> Self {
        Self {
            client,
            api_key,
            info_cache: TtlCache::new(config::cache::tracking_ttl()),
        }
    }

    /// Fetches and normalizes the tracking snapshot, serving rapid re-queries
    /// from the 30-second cache.
    pub async fn fetch_tracking_info(&self, tracking: &str) -> Result<TrackingInfo, TrackError> {
        let tracking = tracking.trim();
        if tracking.is_empty() {
            return Err(TrackError::MissingTracking);
        }

        if let Some(cached) = self.info_cache.get(tracking).await {
            return Ok(cached);
        }

        let raw = endpoints::get_tracking_info(&self.client, tracking).await?;
        let info = normalize_tracking_info(tracking, &raw);
        self.info_cache.insert(tracking, info.clone()).await;
        Ok(info)
    }

    /// Returns the most recent activity entry, or `None` when the shipment
    /// has nothing to report yet.
    pub async fn fetch_latest_activity(&self, tracking: &str) -> Result<Option<LatestActivity>, TrackError> {
        let info = self.fetch_tracking_info(tracking).await?;

        let Some(last) = info.activity.last() else {
            return Ok(None);
        };

        let latest = LatestActivity {
            station: last.station.clone().or_else(|| info.current_station.clone()),
            driver: info.shipped_by.clone(),
            note: last.status.clone(),
            date: compose_date_time(last.date.as_deref(), last.time.as_deref()),
        };

        Ok((!latest.is_empty()).then_some(latest))
    }

    /// Appends a note to a shipment. Content is validated before any
    /// upstream call is made.
    pub async fn add_note(&self, tracking: &str, content: &str) -> Result<(), TrackError> {
        let tracking = tracking.trim();
        if tracking.is_empty() {
            return Err(TrackError::MissingTracking);
        }
        let content = validate_note(content)?;

        endpoints::add_maj_note(&self.client, tracking, content).await?;
        Ok(())
    }

    /// Queries orders matching any of `statuses`, optionally restricted to
    /// `trackings`. The upstream auth token defaults to the service's own
    /// API key when the caller supplies none.
    pub async fn filter_by_status(
        &self,
        statuses: &[String],
        trackings: Option<&[String]>,
        api_token: Option<&str>,
    ) -> Result<Vec<OrderListItem>, TrackError> {
        if statuses.is_empty() {
            return Err(TrackError::NoStatuses);
        }

        let token = api_token.unwrap_or(&self.api_key);
        let data = endpoints::get_orders_by_status(&self.client, statuses, trackings, Some(token)).await?;

        // Some deployments wrap the result in a `data` envelope.
        let payload = data.get("data").unwrap_or(&data);
        Ok(normalize_order_list(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_normalize_status_and_history_from_activity() {
        let raw = json!({
            "status": "livré",
            "activity": [
                {"date": "2024-01-01", "time": "10:00", "status": "Livré"}
            ]
        });
        let info = normalize_tracking_info("ABC123", &raw);

        assert_eq!(info.tracking, "ABC123");
        assert_eq!(info.current_status.as_deref(), Some("livré"));
        assert_eq!(info.history.len(), 1);
        assert_eq!(info.history[0].status, "Livré");
        assert_eq!(info.history[0].at, "2024-01-01");
        assert_eq!(info.activity.len(), 1);
    }

    #[test]
    fn test_normalize_prefers_history_over_activity() {
        let raw = json!({
            "current_status": "en_cours",
            "history": [{"state": "Enregistré", "at": "2024-02-02 09:00"}],
            "activity": [{"date": "2024-02-03", "time": "11:00", "status": "Sorti"}]
        });
        let info = normalize_tracking_info("TRK9", &raw);

        assert_eq!(info.history.len(), 1);
        assert_eq!(info.history[0].status, "Enregistré");
        assert_eq!(info.history[0].at, "2024-02-02 09:00");
    }

    #[test]
    fn test_normalize_unknown_status_and_numeric_cities() {
        let raw = json!({
            "etat": "retour",
            "originCity": 16,
            "destLocationCity": "Oran",
            "events": [{"at": "hier"}]
        });
        let info = normalize_tracking_info("TRK2", &raw);

        assert_eq!(info.current_status.as_deref(), Some("retour"));
        assert_eq!(info.origin_city.as_deref(), Some("16"));
        assert_eq!(info.dest_location_city.as_deref(), Some("Oran"));
        assert_eq!(info.history[0].status, "unknown");
    }

    #[test]
    fn test_normalize_order_list_array_shape() {
        let payload = json!([
            {"tracking": "TRK1", "status": "en_cours", "commune": "Alger Centre"},
            {"code": "TRK2", "etat": "livré", "city": "Oran", "updated_at": "2024-03-01"}
        ]);
        let items = normalize_order_list(&payload);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tracking, "TRK1");
        assert_eq!(items[0].status.as_deref(), Some("en_cours"));
        assert_eq!(items[1].tracking, "TRK2");
        assert_eq!(items[1].commune.as_deref(), Some("Oran"));
        assert_eq!(items[1].last_activity.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_normalize_order_list_map_shape() {
        let payload = json!({
            "TRK1": {
                "status": "en_cours",
                "activity": [{"date": "01/01", "time": "10:00"}]
            }
        });
        let items = normalize_order_list(&payload);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tracking, "TRK1");
        assert_eq!(items[0].status.as_deref(), Some("en_cours"));
        assert_eq!(items[0].last_activity.as_deref(), Some("01/01 10:00"));
    }

    #[test]
    fn test_normalize_order_list_scalar_is_empty() {
        assert!(normalize_order_list(&json!("nope")).is_empty());
        assert!(normalize_order_list(&json!(null)).is_empty());
    }

    #[test]
    fn test_validate_note_bounds() {
        assert!(matches!(validate_note("   "), Err(TrackError::EmptyNote)));
        let long = "x".repeat(256);
        assert!(matches!(validate_note(&long), Err(TrackError::NoteTooLong(255))));
        assert_eq!(validate_note("  ok  ").ok(), Some("ok"));
        let exact = "y".repeat(255);
        assert!(validate_note(&exact).is_ok());
    }

    #[test]
    fn test_compose_date_time() {
        assert_eq!(compose_date_time(Some("01/01"), Some("10:00")).as_deref(), Some("01/01 10:00"));
        assert_eq!(compose_date_time(Some("01/01"), None).as_deref(), Some("01/01"));
        assert_eq!(compose_date_time(None, None), None);
    }

    #[test]
    fn test_latest_activity_empty_detection() {
        assert!(LatestActivity::default().is_empty());
        let some = LatestActivity {
            note: Some("Livré".to_string()),
            ..Default::default()
        };
        assert!(!some.is_empty());
    }
}
