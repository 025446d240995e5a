//! Chat rendering of tracking data
//!
//! Everything user-facing goes through here so the Arabic strings and the
//! message-length ceiling lives in one place. Telegram caps messages at 4096
//! characters; long order lists are split into chunks well under that.

use crate::core::config;
use crate::services::track::{LatestActivity, OrderListItem, TrackingInfo};

/// Icon for a status string, matched on well-known fragments.
fn status_icon(status: &str) -> &'static str {
    let lowered = status.to_lowercase();
    if lowered.contains("livr") {
        "🧍"
    } else if lowered.contains("hub") {
        "🏢"
    } else if lowered.contains("recup") || lowered.contains("récup") {
        "🚚"
    } else if lowered.contains("enreg") {
        "✅"
    } else {
        "📦"
    }
}

/// Renders the latest-movement summary for `/track`.
pub fn format_latest_activity(tracking: &str, latest: Option<&LatestActivity>) -> String {
    let Some(latest) = latest else {
        return format!("📦 {}\nلا توجد تحديثات لهذه الطلبية بعد", tracking);
    };

    let mut lines = vec![format!("📦 آخر تحديث للطلبية {}", tracking)];
    if let Some(note) = &latest.note {
        lines.push(format!("{} الحالة: {}", status_icon(note), note));
    }
    if let Some(station) = &latest.station {
        lines.push(format!("🏢 المحطة: {}", station));
    }
    if let Some(driver) = &latest.driver {
        lines.push(format!("🚚 الناقل: {}", driver));
    }
    if let Some(date) = &latest.date {
        lines.push(format!("🕒 التاريخ: {}", date));
    }
    lines.join("\n")
}

/// Renders the full tracking snapshot for `/status`.
pub fn format_tracking_info(info: &TrackingInfo) -> String {
    let mut lines = vec![format!("📦 الطلبية {}", info.tracking)];

    if let Some(status) = &info.current_status {
        lines.push(format!("{} الحالة الحالية: {}", status_icon(status), status));
    }
    if let Some(recipient) = &info.recipient_name {
        lines.push(format!("👤 المستلم: {}", recipient));
    }
    if let Some(origin) = &info.origin_city {
        lines.push(format!("🏠 من: {}", origin));
    }
    if let Some(dest) = &info.dest_location_city {
        lines.push(format!("📍 إلى: {}", dest));
    }
    if let Some(station) = &info.current_station {
        lines.push(format!("🏢 المحطة الحالية: {}", station));
    }
    if let Some(shipped_by) = &info.shipped_by {
        lines.push(format!("🚚 الناقل: {}", shipped_by));
    }
    if let Some(updated) = &info.last_update {
        lines.push(format!("🕒 آخر تحديث: {}", updated));
    }

    if !info.history.is_empty() {
        lines.push(String::new());
        lines.push("📋 سجل الحالات:".to_string());
        for item in &info.history {
            if item.at.is_empty() {
                lines.push(format!("{} {}", status_icon(&item.status), item.status));
            } else {
                lines.push(format!("{} {} — {}", status_icon(&item.status), item.status, item.at));
            }
        }
    }

    if !info.reasons.is_empty() {
        lines.push(String::new());
        lines.push("⚠️ أسباب:".to_string());
        for reason in &info.reasons {
            lines.push(format!("• {}", reason));
        }
    }

    lines.join("\n")
}

/// Renders one order list entry as a block of lines.
fn format_order_entry(item: &OrderListItem) -> String {
    let mut lines = vec![format!("📦 {}", item.tracking)];
    if let Some(status) = &item.status {
        lines.push(format!("{} {}", status_icon(status), status));
    }
    if let Some(commune) = &item.commune {
        lines.push(format!("📍 {}", commune));
    }
    if let Some(last) = &item.last_activity {
        lines.push(format!("🕒 {}", last));
    }
    lines.join("\n")
}

/// Renders a filtered order list as one or more messages, each within the
/// length ceiling. Entries stay in input order and are never split across
/// messages.
pub fn format_order_list(items: &[OrderListItem]) -> Vec<String> {
    if items.is_empty() {
        return vec!["لا توجد طلبيات مطابقة".to_string()];
    }

    let header = format!("📋 النتائج: {} طلبية", items.len());
    let mut messages = Vec::new();
    let mut current = header;

    for item in items {
        let entry = format_order_entry(item);
        // +2 for the blank line separating entries
        if current.chars().count() + entry.chars().count() + 2 > config::ui::MAX_MESSAGE_CHARS {
            messages.push(current);
            current = entry;
        } else {
            current.push_str("\n\n");
            current.push_str(&entry);
        }
    }
    messages.push(current);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(n: usize) -> OrderListItem {
        OrderListItem {
            tracking: format!("TRK{:04}", n),
            status: Some("en_cours".to_string()),
            commune: Some("Alger Centre".to_string()),
            last_activity: Some("2024-01-01 10:00".to_string()),
        }
    }

    #[test]
    fn test_status_icons() {
        assert_eq!(status_icon("Livré"), "🧍");
        assert_eq!(status_icon("Vers hub"), "🏢");
        assert_eq!(status_icon("Récupéré"), "🚚");
        assert_eq!(status_icon("Enregistré"), "✅");
        assert_eq!(status_icon("autre chose"), "📦");
    }

    #[test]
    fn test_latest_activity_without_updates() {
        let text = format_latest_activity("TRK1", None);
        assert!(text.contains("TRK1"));
        assert!(text.contains("لا توجد تحديثات"));
    }

    #[test]
    fn test_latest_activity_fields() {
        let latest = LatestActivity {
            station: Some("Hub Alger".to_string()),
            driver: Some("EcoTrack Express".to_string()),
            note: Some("Livré".to_string()),
            date: Some("01/01 10:00".to_string()),
        };
        let text = format_latest_activity("TRK1", Some(&latest));
        assert!(text.contains("Hub Alger"));
        assert!(text.contains("EcoTrack Express"));
        assert!(text.contains("01/01 10:00"));
    }

    #[test]
    fn test_order_list_empty() {
        assert_eq!(format_order_list(&[]), vec!["لا توجد طلبيات مطابقة".to_string()]);
    }

    #[test]
    fn test_order_list_stays_within_limit() {
        let items: Vec<OrderListItem> = (0..500).map(item).collect();
        let messages = format_order_list(&items);

        assert!(messages.len() > 1);
        for message in &messages {
            assert!(message.chars().count() <= config::ui::MAX_MESSAGE_CHARS);
        }
    }

    #[test]
    fn test_order_list_preserves_order() {
        let items: Vec<OrderListItem> = (0..500).map(item).collect();
        let joined = format_order_list(&items).join("\n\n");

        let first = joined.find("TRK0000").unwrap();
        let mid = joined.find("TRK0250").unwrap();
        let last = joined.find("TRK0499").unwrap();
        assert!(first < mid && mid < last);
    }
}
