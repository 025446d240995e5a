//! Command implementations
//!
//! `/start` is the only registered command; the tracking commands
//! (`/track`, `/update`, `/status`, `/filter`) are hidden text commands
//! matched by prefix in the schema, so they stay out of the Telegram
//! command menu.

use teloxide::prelude::*;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::main_keyboard;
use crate::telegram::formatters;
use crate::telegram::Bot;

const WELCOME: &str = "👋 أهلا بك في بوت الطلبيات\n\n\
    🟢 رفع طلبية — لإنشاء طلبية جديدة\n\
    /track رقم_التتبع — آخر تحديث\n\
    /status رقم_التتبع — الحالة الكاملة\n\
    /update رقم_التتبع ملاحظة — إضافة ملاحظة\n\
    /filter الحالات — تصفية الطلبيات حسب الحالة";

const TRACK_USAGE: &str = "الاستعمال: /track رقم_التتبع";
const STATUS_USAGE: &str = "الاستعمال: /status رقم_التتبع";
const UPDATE_USAGE: &str = "الاستعمال: /update رقم_التتبع الملاحظة";
const FILTER_USAGE: &str = "الاستعمال: /filter حالة1,حالة2 [أرقام_التتبع] [رمز_API]";

/// `/start` — greets and shows the persistent keyboard.
pub async fn handle_start_command(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    bot.send_message(chat_id, WELCOME)
        .reply_markup(main_keyboard(deps.web_app_url.as_ref()))
        .await?;
    Ok(())
}

/// `/track <tracking>` — latest movement summary.
pub async fn handle_track_command(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    let Some(tracking) = single_arg(text) else {
        bot.send_message(chat_id, TRACK_USAGE).await?;
        return Ok(());
    };

    match deps.track.fetch_latest_activity(tracking).await {
        Ok(latest) => {
            bot.send_message(chat_id, formatters::format_latest_activity(tracking, latest.as_ref()))
                .await?;
        }
        Err(e) => {
            log::error!("/track failed for {}: {}", tracking, e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
        }
    }
    Ok(())
}

/// `/status <tracking>` — full normalized snapshot.
pub async fn handle_status_command(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    let Some(tracking) = single_arg(text) else {
        bot.send_message(chat_id, STATUS_USAGE).await?;
        return Ok(());
    };

    match deps.track.fetch_tracking_info(tracking).await {
        Ok(info) => {
            bot.send_message(chat_id, formatters::format_tracking_info(&info)).await?;
        }
        Err(e) => {
            log::error!("/status failed for {}: {}", tracking, e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
        }
    }
    Ok(())
}

/// `/update <tracking> <note...>` — appends a note to the shipment.
pub async fn handle_update_command(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    let Some((tracking, note)) = parse_update_args(text) else {
        bot.send_message(chat_id, UPDATE_USAGE).await?;
        return Ok(());
    };

    match deps.track.add_note(tracking, note).await {
        Ok(()) => {
            bot.send_message(chat_id, format!("✅ تمت إضافة الملاحظة للطلبية {}", tracking))
                .await?;
        }
        Err(e) => {
            log::error!("/update failed for {}: {}", tracking, e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
        }
    }
    Ok(())
}

/// `/filter <statuses> [trackings] [api_token]` — lists orders by status.
/// Statuses and trackings are comma-separated.
pub async fn handle_filter_command(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    let mut parts = text.split_whitespace();
    let _cmd = parts.next();
    let statuses: Vec<String> = parts
        .next()
        .map(|s| s.split(',').filter(|p| !p.is_empty()).map(str::to_owned).collect())
        .unwrap_or_default();
    let trackings: Option<Vec<String>> = parts
        .next()
        .map(|s| s.split(',').filter(|p| !p.is_empty()).map(str::to_owned).collect());
    let api_token = parts.next();

    if statuses.is_empty() {
        bot.send_message(chat_id, FILTER_USAGE).await?;
        return Ok(());
    }

    match deps.track.filter_by_status(&statuses, trackings.as_deref(), api_token).await {
        Ok(items) => {
            for message in formatters::format_order_list(&items) {
                bot.send_message(chat_id, message).await?;
            }
        }
        Err(e) => {
            log::error!("/filter failed: {}", e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
        }
    }
    Ok(())
}

/// Extracts the single argument of a `/cmd arg` message.
fn single_arg(text: &str) -> Option<&str> {
    let mut parts = text.split_whitespace();
    let _cmd = parts.next();
    parts.next()
}

/// Splits `/update <tracking> <note...>` into the tracking token and the
/// note. The note keeps its internal whitespace and newlines; only the ends
/// are trimmed.
fn parse_update_args(text: &str) -> Option<(&str, &str)> {
    let rest = text.split_once(char::is_whitespace)?.1.trim_start();
    let (tracking, note) = rest.split_once(char::is_whitespace)?;
    let note = note.trim();
    if tracking.is_empty() || note.is_empty() {
        return None;
    }
    Some((tracking, note))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_arg() {
        assert_eq!(single_arg("/track TRK123"), Some("TRK123"));
        assert_eq!(single_arg("/track   TRK123  "), Some("TRK123"));
        assert_eq!(single_arg("/track"), None);
        assert_eq!(single_arg("/track TRK123 extra"), Some("TRK123"));
    }

    #[test]
    fn test_parse_update_args() {
        assert_eq!(parse_update_args("/update TRK1 note"), Some(("TRK1", "note")));
        assert_eq!(
            parse_update_args("/update   TRK1   left the hub  "),
            Some(("TRK1", "left the hub"))
        );
        assert_eq!(parse_update_args("/update TRK1"), None);
        assert_eq!(parse_update_args("/update"), None);
        assert_eq!(parse_update_args("/update TRK1   "), None);
    }

    #[test]
    fn test_parse_update_args_keeps_note_verbatim() {
        let (tracking, note) = parse_update_args("/update TRK1 ligne 1\nligne 2\n\nligne 3").unwrap();
        assert_eq!(tracking, "TRK1");
        assert_eq!(note, "ligne 1\nligne 2\n\nligne 3");

        let (_, note) = parse_update_args("/update TRK1\nnote après saut de ligne").unwrap();
        assert_eq!(note, "note après saut de ligne");
    }
}
