//! Order entry sessions
//!
//! One session per chat, held in memory. The session walks the order through
//! a fixed sequence of steps; every answer is validated before it is stored,
//! so a completed [`Order`] is submittable by construction. The web form
//! bypasses the walk entirely and lands directly on confirmation.

use std::fmt;

use dashmap::DashMap;
use lazy_regex::regex_is_match;
use teloxide::types::ChatId;
use thiserror::Error;

use crate::core::config;
use crate::ecotrack::CreateOrderPayload;

/// Order type selected at the first step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Delivery,
    Exchange,
}

impl OrderType {
    pub fn code(self) -> u8 {
        match self {
            OrderType::Delivery => 1,
            OrderType::Exchange => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(OrderType::Delivery),
            2 => Some(OrderType::Exchange),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderType::Delivery => "توصيل",
            OrderType::Exchange => "تبديل",
        }
    }
}

/// Delivery destination kind (home vs. stop-desk office).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Home,
    StopDesk,
}

impl ServiceKind {
    pub fn code(self) -> u8 {
        match self {
            ServiceKind::Home => 0,
            ServiceKind::StopDesk => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ServiceKind::Home),
            1 => Some(ServiceKind::StopDesk),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServiceKind::Home => "إلى المنزل",
            ServiceKind::StopDesk => "إلى المكتب",
        }
    }
}

/// Order under construction. Fields fill in step order; `montant` and
/// `quantite` are kept as validated strings since that is how they travel
/// upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub order_type: Option<OrderType>,
    pub service: Option<ServiceKind>,
    pub nom_client: Option<String>,
    pub telephone: Option<String>,
    pub code_wilaya: Option<u32>,
    pub wilaya_name: Option<String>,
    pub commune: Option<String>,
    pub adresse: Option<String>,
    pub montant: Option<String>,
    pub produit: Option<String>,
    pub quantite: Option<String>,
    pub remarque: Option<String>,
}

/// Validation failure for one field, with the Arabic prompt to re-ask.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("الاسم قصير جدا. أدخل الاسم الكامل (3 أحرف على الأقل)")]
    Name,
    #[error("رقم الهاتف غير صالح. أدخل رقما من 8 إلى 15 خانة")]
    Phone,
    #[error("العنوان قصير جدا. أدخل عنوانا كاملا (6 أحرف على الأقل)")]
    Address,
    #[error("المبلغ غير صالح. أدخل رقما أكبر من صفر")]
    Amount,
    #[error("رمز المنتج غير صالح. أحرف وأرقام و . _ - فقط (من 2 إلى 64)")]
    Product,
    #[error("الكمية غير صالحة. أدخل عددا صحيحا أكبر من صفر")]
    Quantity,
    #[error("الملاحظة طويلة جدا. 255 حرفا كحد أقصى")]
    Note,
}

/// Validates and normalizes the client name.
pub fn validate_name(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if trimmed.chars().count() < 3 {
        return Err(FieldError::Name);
    }
    Ok(trimmed.to_string())
}

/// Validates a phone number: optional `+`, 8 to 15 digits.
pub fn validate_phone(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if !regex_is_match!(r"^\+?[0-9]{8,15}$", trimmed) {
        return Err(FieldError::Phone);
    }
    Ok(trimmed.to_string())
}

/// Validates the delivery address.
pub fn validate_address(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if trimmed.chars().count() < 6 {
        return Err(FieldError::Address);
    }
    Ok(trimmed.to_string())
}

/// Validates the amount: a positive number, up to two decimals.
pub fn validate_amount(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if !regex_is_match!(r"^[0-9]+(\.[0-9]{1,2})?$", trimmed) {
        return Err(FieldError::Amount);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v > 0.0 => Ok(trimmed.to_string()),
        _ => Err(FieldError::Amount),
    }
}

/// Validates the product code.
pub fn validate_product(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if !regex_is_match!(r"^[A-Za-z0-9._-]{2,64}$", trimmed) {
        return Err(FieldError::Product);
    }
    Ok(trimmed.to_string())
}

/// Validates the quantity: a positive integer without leading zeros.
pub fn validate_quantity(input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if !regex_is_match!(r"^[1-9][0-9]*$", trimmed) {
        return Err(FieldError::Quantity);
    }
    Ok(trimmed.to_string())
}

/// Validates an optional note; empty input means no note.
pub fn validate_note(input: &str) -> Result<Option<String>, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > config::ui::MAX_NOTE_CHARS {
        return Err(FieldError::Note);
    }
    Ok(Some(trimmed.to_string()))
}

/// A required field was still unset at submission time.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing required field: {0}")]
pub struct IncompleteOrder(pub &'static str);

impl Order {
    /// Converts a completed order into the upstream payload.
    ///
    /// Every required field must be set; the session flow guarantees this,
    /// but the check runs again here so an incomplete order can never reach
    /// the API.
    pub fn into_payload(self) -> Result<CreateOrderPayload, IncompleteOrder> {
        let order_type = self.order_type.ok_or(IncompleteOrder("type"))?;
        Ok(CreateOrderPayload {
            nom_client: self.nom_client.ok_or(IncompleteOrder("nom_client"))?,
            telephone: self.telephone.ok_or(IncompleteOrder("telephone"))?,
            adresse: self.adresse.ok_or(IncompleteOrder("adresse"))?,
            code_wilaya: self.code_wilaya.ok_or(IncompleteOrder("code_wilaya"))?,
            commune: self.commune.ok_or(IncompleteOrder("commune"))?,
            montant: self.montant.ok_or(IncompleteOrder("montant"))?,
            type_code: order_type.code(),
            stop_desk: self.service.map(ServiceKind::code).unwrap_or(0),
            stock: 1,
            produit: self.produit.ok_or(IncompleteOrder("produit"))?,
            quantite: self.quantite.ok_or(IncompleteOrder("quantite"))?,
            remarque: self.remarque,
        })
    }
}

/// Current position in the order entry walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    TypeSelection,
    ServiceSelection,
    NomClient,
    Telephone,
    WilayaSelection,
    CommuneSelection,
    Adresse,
    Montant,
    Produit,
    Quantite,
    Confirmation,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::TypeSelection => "type_selection",
            Step::ServiceSelection => "service_selection",
            Step::NomClient => "nom_client",
            Step::Telephone => "telephone",
            Step::WilayaSelection => "wilaya_selection",
            Step::CommuneSelection => "commune_selection",
            Step::Adresse => "adresse",
            Step::Montant => "montant",
            Step::Produit => "produit",
            Step::Quantite => "quantite",
            Step::Confirmation => "confirmation",
        };
        f.write_str(name)
    }
}

/// One chat's order entry state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub order: Order,
    pub step: Option<Step>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.step.is_some()
    }
}

/// In-memory session store, one slot per chat.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<ChatId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat_id: ChatId) -> Option<Session> {
        self.sessions.get(&chat_id).map(|s| s.clone())
    }

    /// Returns the current step, if a walk is in progress.
    pub fn step(&self, chat_id: ChatId) -> Option<Step> {
        self.sessions.get(&chat_id).and_then(|s| s.step)
    }

    pub fn put(&self, chat_id: ChatId, session: Session) {
        self.sessions.insert(chat_id, session);
    }

    /// Applies `f` to the chat's session, creating a fresh one if absent.
    pub fn update<F>(&self, chat_id: ChatId, f: F)
    where
        F: FnOnce(&mut Session),
    {
        let mut entry = self.sessions.entry(chat_id).or_default();
        f(&mut entry);
    }

    pub fn clear(&self, chat_id: ChatId) {
        self.sessions.remove(&chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete_order() -> Order {
        Order {
            order_type: Some(OrderType::Delivery),
            service: Some(ServiceKind::Home),
            nom_client: Some("Ahmed Benali".to_string()),
            telephone: Some("0550123456".to_string()),
            code_wilaya: Some(16),
            wilaya_name: Some("Alger".to_string()),
            commune: Some("Bab El Oued".to_string()),
            adresse: Some("Cité 20 Août, Bt 5".to_string()),
            montant: Some("2500".to_string()),
            produit: Some("PROD001".to_string()),
            quantite: Some("2".to_string()),
            remarque: None,
        }
    }

    #[test]
    fn test_phone_rules() {
        assert!(validate_phone("0550123456").is_ok());
        assert!(validate_phone("+213550123456").is_ok());
        assert!(validate_phone("1234567").is_err());
        assert!(validate_phone("05 50 12 34 56").is_err());
        assert!(validate_phone("+").is_err());
    }

    #[test]
    fn test_amount_rejects_zero_and_junk() {
        assert!(validate_amount("2500").is_ok());
        assert!(validate_amount("2500.50").is_ok());
        assert!(validate_amount("0").is_err());
        assert!(validate_amount("0.00").is_err());
        assert!(validate_amount("-5").is_err());
        assert!(validate_amount("abc").is_err());
        assert!(validate_amount("2500.123").is_err());
    }

    #[test]
    fn test_product_charset() {
        assert!(validate_product("PROD_001.v2-x").is_ok());
        assert!(validate_product("a").is_err());
        assert!(validate_product("has space").is_err());
        assert!(validate_product(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_quantity_no_leading_zero() {
        assert!(validate_quantity("2").is_ok());
        assert!(validate_quantity("10").is_ok());
        assert!(validate_quantity("0").is_err());
        assert!(validate_quantity("02").is_err());
        assert!(validate_quantity("1.5").is_err());
    }

    #[test]
    fn test_note_optional_and_bounded() {
        assert_eq!(validate_note("  "), Ok(None));
        assert_eq!(validate_note("fragile"), Ok(Some("fragile".to_string())));
        assert!(validate_note(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_into_payload_complete() {
        let payload = complete_order().into_payload().unwrap();
        assert_eq!(payload.type_code, 1);
        assert_eq!(payload.stop_desk, 0);
        assert_eq!(payload.stock, 1);
        assert_eq!(payload.montant, "2500");
    }

    #[test]
    fn test_into_payload_missing_field() {
        let mut order = complete_order();
        order.commune = None;
        assert_eq!(order.into_payload(), Err(IncompleteOrder("commune")));
    }

    #[test]
    fn test_store_roundtrip() {
        let store = SessionStore::new();
        let chat = ChatId(42);
        assert!(store.get(chat).is_none());

        store.update(chat, |s| s.step = Some(Step::NomClient));
        assert_eq!(store.step(chat), Some(Step::NomClient));

        store.clear(chat);
        assert!(store.get(chat).is_none());
    }
}
