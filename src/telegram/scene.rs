//! Order entry conversation flow
//!
//! Drives a chat through the order steps: type, service, client details,
//! wilaya/commune selection, amounts, then a confirmation card. Selection
//! steps use inline keyboards whose callback data is parsed by
//! [`SceneAction::parse`]; free-text steps re-prompt on invalid input
//! without advancing.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::handlers::types::{HandlerDeps, HandlerError};
use super::session::{self, Order, OrderType, ServiceKind, Session, Step};
use super::Bot;
use crate::core::config;
use crate::ecotrack::endpoints;

const PROMPT_TYPE: &str = "🚚 اختر نوع الطلبية:";
const PROMPT_SERVICE: &str = "📍 اختر نوع التوصيل:";
const PROMPT_NAME: &str = "👤 أدخل اسم العميل الكامل:";
const PROMPT_PHONE: &str = "📞 أدخل رقم هاتف العميل:";
const PROMPT_WILAYA: &str = "🗺️ اختر الولاية:";
const PROMPT_COMMUNE: &str = "🏘️ اختر البلدية أو اكتب اسمها:";
const PROMPT_ADDRESS: &str = "🏠 أدخل العنوان الكامل:";
const PROMPT_AMOUNT: &str = "💰 أدخل مبلغ التحصيل:";
const PROMPT_PRODUCT: &str = "📦 أدخل رمز المنتج:";
const PROMPT_QUANTITY: &str = "🔢 أدخل الكمية:";
const USE_BUTTONS: &str = "استخدم الأزرار للاختيار 👆";
const CANCELLED: &str = "تم إلغاء الطلبية ❌";

/// Parsed callback data of the order flow keyboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneAction {
    SelectType(u8),
    SelectService(u8),
    SelectWilaya(u32),
    WilayaPage(usize),
    SelectCommune(String),
    Confirm,
    Restart,
    Cancel,
}

impl SceneAction {
    /// Parses callback data. Returns `None` for data this flow does not own.
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(rest) = data.strip_prefix("type_") {
            return rest.parse().ok().map(SceneAction::SelectType);
        }
        if let Some(rest) = data.strip_prefix("stopdesk_") {
            return rest.parse().ok().map(SceneAction::SelectService);
        }
        if let Some(rest) = data.strip_prefix("wilaya_") {
            return rest.parse().ok().map(SceneAction::SelectWilaya);
        }
        if let Some(rest) = data.strip_prefix("page_") {
            return rest.parse().ok().map(SceneAction::WilayaPage);
        }
        if let Some(rest) = data.strip_prefix("commune_") {
            return Some(SceneAction::SelectCommune(rest.to_string()));
        }
        match data {
            "confirm_send" | "send_order_now" => Some(SceneAction::Confirm),
            "restart_order" => Some(SceneAction::Restart),
            "cancel_order" => Some(SceneAction::Cancel),
            _ => None,
        }
    }
}

/// Computes the slice of the wilaya list shown on `page`, clamping past-end
/// pages to the last one.
pub fn wilaya_page(total: usize, page: usize) -> (std::ops::Range<usize>, bool, bool) {
    let size = config::ui::WILAYA_PAGE_SIZE;
    let pages = total.div_ceil(size).max(1);
    let page = page.min(pages - 1);
    let start = page * size;
    let end = (start + size).min(total);
    (start..end, page > 0, page + 1 < pages)
}

fn type_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(OrderType::Delivery.label(), "type_1"),
        InlineKeyboardButton::callback(OrderType::Exchange.label(), "type_2"),
    ]])
}

fn service_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(ServiceKind::Home.label(), "stopdesk_0"),
        InlineKeyboardButton::callback(ServiceKind::StopDesk.label(), "stopdesk_1"),
    ]])
}

fn wilaya_keyboard(wilayas: &[crate::ecotrack::Wilaya], page: usize) -> InlineKeyboardMarkup {
    let (range, has_prev, has_next) = wilaya_page(wilayas.len(), page);

    let mut rows: Vec<Vec<InlineKeyboardButton>> = wilayas[range]
        .iter()
        .map(|w| {
            vec![InlineKeyboardButton::callback(
                format!("{} - {}", w.id, w.nom),
                format!("wilaya_{}", w.id),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if has_prev {
        nav.push(InlineKeyboardButton::callback("⬅️", format!("page_{}", page - 1)));
    }
    if has_next {
        nav.push(InlineKeyboardButton::callback("➡️", format!("page_{}", page + 1)));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    InlineKeyboardMarkup::new(rows)
}

fn commune_keyboard(communes: &[String]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = communes
        .iter()
        .take(config::ui::COMMUNE_BUTTON_LIMIT)
        .map(|name| {
            vec![InlineKeyboardButton::callback(
                name.clone(),
                format!("commune_{}", name),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn confirmation_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✅ إرسال الطلبية", "confirm_send")],
        vec![
            InlineKeyboardButton::callback("✏️ تعديل", "restart_order"),
            InlineKeyboardButton::callback("❌ إلغاء", "cancel_order"),
        ],
    ])
}

/// Renders the confirmation card for `order`.
pub fn build_summary(order: &Order) -> String {
    let unset = "غير محدد";
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| unset.to_string());

    let wilaya = match (&order.wilaya_name, order.code_wilaya) {
        (Some(name), Some(code)) => format!("{} ({})", name, code),
        (None, Some(code)) => code.to_string(),
        _ => unset.to_string(),
    };

    let mut lines = vec![
        "📋 ملخص الطلبية".to_string(),
        format!("🚚 النوع: {}", order.order_type.map(OrderType::label).unwrap_or(unset)),
        format!("📍 التوصيل: {}", order.service.map(ServiceKind::label).unwrap_or(unset)),
        format!("👤 العميل: {}", field(&order.nom_client)),
        format!("📞 الهاتف: {}", field(&order.telephone)),
        format!("🗺️ الولاية: {}", wilaya),
        format!("🏘️ البلدية: {}", field(&order.commune)),
        format!("🏠 العنوان: {}", field(&order.adresse)),
        format!("💰 المبلغ: {}", field(&order.montant)),
        format!("📦 المنتج: {}", field(&order.produit)),
        format!("🔢 الكمية: {}", field(&order.quantite)),
    ];
    if let Some(remarque) = &order.remarque {
        lines.push(format!("📝 ملاحظة: {}", remarque));
    }
    lines.push(String::new());
    lines.push("هل تريد إرسال الطلبية؟".to_string());
    lines.join("\n")
}

/// Starts the order flow. With a prefilled order (from the web form) the
/// chat lands directly on the confirmation card.
pub async fn enter_scene(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    prefilled: Option<Order>,
) -> Result<(), HandlerError> {
    match prefilled {
        Some(order) => {
            let summary = build_summary(&order);
            deps.sessions.put(
                chat_id,
                Session {
                    order,
                    step: Some(Step::Confirmation),
                },
            );
            bot.send_message(chat_id, summary)
                .reply_markup(confirmation_keyboard())
                .await?;
        }
        None => {
            deps.sessions.put(
                chat_id,
                Session {
                    order: Order::default(),
                    step: Some(Step::TypeSelection),
                },
            );
            bot.send_message(chat_id, PROMPT_TYPE)
                .reply_markup(type_keyboard())
                .await?;
        }
    }
    Ok(())
}

/// Sends the wilaya selection prompt for `page`.
async fn prompt_wilayas(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, page: usize) -> Result<(), HandlerError> {
    match deps.lookup.wilayas().await {
        Ok(wilayas) if !wilayas.is_empty() => {
            bot.send_message(chat_id, PROMPT_WILAYA)
                .reply_markup(wilaya_keyboard(&wilayas, page))
                .await?;
        }
        Ok(_) => {
            bot.send_message(chat_id, "⚠️ تعذر جلب قائمة الولايات. حاول لاحقا").await?;
        }
        Err(e) => {
            log::error!("Failed to load wilayas: {}", e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
        }
    }
    Ok(())
}

/// Sends the commune selection prompt for the chosen wilaya.
async fn prompt_communes(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps, wilaya_id: u32) -> Result<(), HandlerError> {
    match deps.lookup.communes(wilaya_id).await {
        Ok(communes) => {
            bot.send_message(chat_id, PROMPT_COMMUNE)
                .reply_markup(commune_keyboard(&communes))
                .await?;
        }
        Err(e) => {
            log::error!("Failed to load communes for wilaya {}: {}", wilaya_id, e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
        }
    }
    Ok(())
}

async fn show_confirmation(bot: &Bot, chat_id: ChatId, order: &Order) -> Result<(), HandlerError> {
    bot.send_message(chat_id, build_summary(order))
        .reply_markup(confirmation_keyboard())
        .await?;
    Ok(())
}

/// Resolves a commune choice against the wilaya's list, case-insensitively.
/// Returns the canonical spelling from the list.
fn resolve_commune<'a>(communes: &'a [String], candidate: &str) -> Option<&'a String> {
    communes.iter().find(|c| c.eq_ignore_ascii_case(candidate))
}

/// Stores a commune choice and advances to the address step. The choice must
/// belong to the selected wilaya's commune list, whether it arrived as typed
/// text or as callback data.
async fn select_commune(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    candidate: &str,
) -> Result<(), HandlerError> {
    let Some(wilaya_id) = deps.sessions.get(chat_id).and_then(|s| s.order.code_wilaya) else {
        bot.send_message(chat_id, USE_BUTTONS).await?;
        return Ok(());
    };
    let communes = match deps.lookup.communes(wilaya_id).await {
        Ok(communes) => communes,
        Err(e) => {
            log::error!("Failed to load communes for wilaya {}: {}", wilaya_id, e);
            bot.send_message(chat_id, format!("⚠️ {}", e.user_message())).await?;
            return Ok(());
        }
    };
    let Some(commune) = resolve_commune(&communes, candidate) else {
        bot.send_message(chat_id, "⚠️ هذه البلدية لا تنتمي للولاية المختارة. اختر من القائمة")
            .reply_markup(commune_keyboard(&communes))
            .await?;
        return Ok(());
    };
    let commune = commune.clone();
    deps.sessions.update(chat_id, |s| {
        s.order.commune = Some(commune);
        s.step = Some(Step::Adresse);
    });
    bot.send_message(chat_id, PROMPT_ADDRESS).await?;
    Ok(())
}

/// Handles free text while a session is active.
pub async fn handle_scene_text(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    text: &str,
) -> Result<(), HandlerError> {
    let Some(step) = deps.sessions.step(chat_id) else {
        return Ok(());
    };

    // Selection steps only react to buttons, except commune entry where a
    // typed name is also accepted. Free-text steps validate, store, advance;
    // invalid input re-prompts without advancing.
    let outcome: Result<(Step, &str), session::FieldError> = match step {
        Step::TypeSelection | Step::ServiceSelection | Step::WilayaSelection | Step::Confirmation => {
            bot.send_message(chat_id, USE_BUTTONS).await?;
            return Ok(());
        }
        Step::CommuneSelection => {
            return select_commune(bot, chat_id, deps, text.trim()).await;
        }
        Step::NomClient => session::validate_name(text).map(|v| {
            deps.sessions.update(chat_id, |s| s.order.nom_client = Some(v));
            (Step::Telephone, PROMPT_PHONE)
        }),
        Step::Telephone => session::validate_phone(text).map(|v| {
            deps.sessions.update(chat_id, |s| s.order.telephone = Some(v));
            (Step::WilayaSelection, PROMPT_WILAYA)
        }),
        Step::Adresse => session::validate_address(text).map(|v| {
            deps.sessions.update(chat_id, |s| s.order.adresse = Some(v));
            (Step::Montant, PROMPT_AMOUNT)
        }),
        Step::Montant => session::validate_amount(text).map(|v| {
            deps.sessions.update(chat_id, |s| s.order.montant = Some(v));
            (Step::Produit, PROMPT_PRODUCT)
        }),
        Step::Produit => session::validate_product(text).map(|v| {
            deps.sessions.update(chat_id, |s| s.order.produit = Some(v));
            (Step::Quantite, PROMPT_QUANTITY)
        }),
        Step::Quantite => session::validate_quantity(text).map(|v| {
            deps.sessions.update(chat_id, |s| s.order.quantite = Some(v));
            (Step::Confirmation, "")
        }),
    };

    match outcome {
        Ok((next, prompt)) => {
            deps.sessions.update(chat_id, |s| s.step = Some(next));
            match next {
                Step::WilayaSelection => prompt_wilayas(bot, chat_id, deps, 0).await?,
                Step::Confirmation => {
                    let order = deps.sessions.get(chat_id).map(|s| s.order).unwrap_or_default();
                    show_confirmation(bot, chat_id, &order).await?;
                }
                _ => {
                    bot.send_message(chat_id, prompt).await?;
                }
            }
        }
        Err(e) => {
            bot.send_message(chat_id, format!("⚠️ {}", e)).await?;
        }
    }
    Ok(())
}

/// Handles a parsed keyboard action for the chat's session.
pub async fn handle_scene_action(
    bot: &Bot,
    chat_id: ChatId,
    deps: &HandlerDeps,
    action: SceneAction,
) -> Result<(), HandlerError> {
    let step = deps.sessions.step(chat_id);

    match (action, step) {
        (SceneAction::SelectType(code), Some(Step::TypeSelection)) => {
            let Some(order_type) = OrderType::from_code(code) else {
                bot.send_message(chat_id, USE_BUTTONS).await?;
                return Ok(());
            };
            deps.sessions.update(chat_id, |s| {
                s.order.order_type = Some(order_type);
                s.step = Some(Step::ServiceSelection);
            });
            bot.send_message(chat_id, PROMPT_SERVICE)
                .reply_markup(service_keyboard())
                .await?;
        }
        (SceneAction::SelectService(code), Some(Step::ServiceSelection)) => {
            let Some(service) = ServiceKind::from_code(code) else {
                bot.send_message(chat_id, USE_BUTTONS).await?;
                return Ok(());
            };
            deps.sessions.update(chat_id, |s| {
                s.order.service = Some(service);
                s.step = Some(Step::NomClient);
            });
            bot.send_message(chat_id, PROMPT_NAME).await?;
        }
        (SceneAction::WilayaPage(page), Some(Step::WilayaSelection)) => {
            prompt_wilayas(bot, chat_id, deps, page).await?;
        }
        (SceneAction::SelectWilaya(wilaya_id), Some(Step::WilayaSelection)) => {
            let wilaya_name = deps.lookup.wilaya_name(wilaya_id).await;
            // A new wilaya invalidates any previously chosen commune.
            deps.sessions.update(chat_id, |s| {
                s.order.code_wilaya = Some(wilaya_id);
                s.order.wilaya_name = wilaya_name.clone();
                s.order.commune = None;
                s.step = Some(Step::CommuneSelection);
            });
            prompt_communes(bot, chat_id, deps, wilaya_id).await?;
        }
        (SceneAction::SelectCommune(name), Some(Step::CommuneSelection)) => {
            // Callback data can outlive a wilaya change; re-check membership
            // just like the typed path.
            select_commune(bot, chat_id, deps, &name).await?;
        }
        (SceneAction::Confirm, Some(Step::Confirmation)) => {
            submit_order(bot, chat_id, deps).await?;
        }
        (SceneAction::Restart, _) => {
            enter_scene(bot, chat_id, deps, None).await?;
        }
        (SceneAction::Cancel, _) => {
            deps.sessions.clear(chat_id);
            bot.send_message(chat_id, CANCELLED).await?;
        }
        (_, _) => {
            // Stale button from an earlier step; ignore quietly.
            log::debug!("Ignoring out-of-step scene action for chat {}", chat_id);
        }
    }
    Ok(())
}

/// Submits the confirmed order. On upstream failure the session stays at
/// confirmation so the user can retry or cancel.
async fn submit_order(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(session) = deps.sessions.get(chat_id) else {
        return Ok(());
    };

    let payload = match session.order.into_payload() {
        Ok(payload) => payload,
        Err(missing) => {
            log::warn!("Order for chat {} incomplete at confirmation: {}", chat_id, missing);
            bot.send_message(chat_id, "⚠️ الطلبية غير مكتملة. ابدأ من جديد بـ ✏️ تعديل")
                .reply_markup(confirmation_keyboard())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, "⏳ جاري إرسال الطلبية...").await?;

    match endpoints::create_order(&deps.eco, &payload).await {
        Ok(created) => {
            deps.sessions.clear(chat_id);
            let mut text = format!("✅ تم إنشاء الطلبية بنجاح\n📦 رقم التتبع: {}", created.tracking);
            if created.is_validated {
                text.push_str("\n☑️ الطلبية مفعلة");
            }
            bot.send_message(chat_id, text).await?;
        }
        Err(e) => {
            log::error!("Order submission failed for chat {}: {}", chat_id, e);
            bot.send_message(chat_id, format!("❌ فشل إرسال الطلبية:\n{}", e.user_message()))
                .reply_markup(confirmation_keyboard())
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_actions() {
        assert_eq!(SceneAction::parse("type_1"), Some(SceneAction::SelectType(1)));
        assert_eq!(SceneAction::parse("stopdesk_0"), Some(SceneAction::SelectService(0)));
        assert_eq!(SceneAction::parse("wilaya_16"), Some(SceneAction::SelectWilaya(16)));
        assert_eq!(SceneAction::parse("page_3"), Some(SceneAction::WilayaPage(3)));
        assert_eq!(
            SceneAction::parse("commune_Bab El Oued"),
            Some(SceneAction::SelectCommune("Bab El Oued".to_string()))
        );
        assert_eq!(SceneAction::parse("confirm_send"), Some(SceneAction::Confirm));
        assert_eq!(SceneAction::parse("send_order_now"), Some(SceneAction::Confirm));
        assert_eq!(SceneAction::parse("restart_order"), Some(SceneAction::Restart));
        assert_eq!(SceneAction::parse("cancel_order"), Some(SceneAction::Cancel));
        assert_eq!(SceneAction::parse("wilaya_abc"), None);
        assert_eq!(SceneAction::parse("unrelated"), None);
    }

    #[test]
    fn test_wilaya_page_bounds() {
        // 58 wilayas, 10 per page -> 6 pages
        let (range, prev, next) = wilaya_page(58, 0);
        assert_eq!(range, 0..10);
        assert!(!prev);
        assert!(next);

        let (range, prev, next) = wilaya_page(58, 5);
        assert_eq!(range, 50..58);
        assert!(prev);
        assert!(!next);

        // Past-end page clamps to the last page
        let (range, _, next) = wilaya_page(58, 99);
        assert_eq!(range, 50..58);
        assert!(!next);

        // Exactly one page
        let (range, prev, next) = wilaya_page(10, 0);
        assert_eq!(range, 0..10);
        assert!(!prev);
        assert!(!next);

        let (range, prev, next) = wilaya_page(0, 0);
        assert_eq!(range, 0..0);
        assert!(!prev);
        assert!(!next);
    }

    #[test]
    fn test_resolve_commune_membership() {
        let communes = vec!["Bab El Oued".to_string(), "Alger Centre".to_string()];

        // Case-insensitive match returns the canonical spelling.
        assert_eq!(
            resolve_commune(&communes, "bab el oued"),
            Some(&"Bab El Oued".to_string())
        );
        assert_eq!(
            resolve_commune(&communes, "Alger Centre"),
            Some(&"Alger Centre".to_string())
        );
        // A name from another wilaya is rejected, even when it arrives as
        // callback data from an older keyboard.
        assert_eq!(resolve_commune(&communes, "Oran"), None);
        assert_eq!(resolve_commune(&communes, ""), None);
    }

    #[test]
    fn test_summary_shows_placeholders() {
        let summary = build_summary(&Order::default());
        assert!(summary.contains("غير محدد"));
        assert!(summary.contains("ملخص الطلبية"));
    }

    #[test]
    fn test_summary_includes_note_when_set() {
        let order = Order {
            remarque: Some("fragile".to_string()),
            ..Default::default()
        };
        assert!(build_summary(&order).contains("fragile"));
    }
}
