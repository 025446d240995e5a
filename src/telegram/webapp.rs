//! Web form payload intake
//!
//! The order form served by the web server submits its result through
//! Telegram's `web_app_data` mechanism as a JSON envelope. The payload is
//! parsed with serde and re-validated with the same rules as the chat flow;
//! a rejected payload never touches the chat's session.

use serde::Deserialize;
use thiserror::Error;

use super::session::{self, FieldError, Order, OrderType, ServiceKind};

/// Envelope discriminated by `kind`. Only order creation is defined today.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum WebAppPayload {
    #[serde(rename = "create-order")]
    CreateOrder { data: WebAppOrder },
}

/// Raw order fields as the form sends them. Numeric fields arrive as JSON
/// numbers and are range-checked in [`WebAppOrder::validate`].
#[derive(Debug, Deserialize)]
pub struct WebAppOrder {
    pub nom_client: String,
    pub telephone: String,
    pub adresse: String,
    pub code_wilaya: u32,
    pub commune: String,
    pub montant: f64,
    #[serde(rename = "type")]
    pub order_type: u8,
    pub stop_desk: u8,
    pub produit: String,
    pub quantite: u32,
    #[serde(default)]
    pub remarque: Option<String>,
}

/// Why a web form payload was rejected.
#[derive(Debug, Error)]
pub enum WebAppPayloadError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0}")]
    Field(#[from] FieldError),
    #[error("نوع الطلبية غير صالح")]
    OrderType,
    #[error("نوع التوصيل غير صالح")]
    Service,
    #[error("ولاية غير صالحة")]
    Wilaya,
    #[error("البلدية مطلوبة")]
    Commune,
}

impl WebAppPayloadError {
    /// Arabic message shown in chat when the form payload is rejected.
    pub fn user_message(&self) -> String {
        match self {
            WebAppPayloadError::Malformed(_) => "تعذر قراءة بيانات النموذج. أعد المحاولة".to_string(),
            WebAppPayloadError::Field(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Renders the form's amount the way the API expects: integral values
/// without a decimal point, fractions with up to two places.
fn format_amount(montant: f64) -> String {
    if montant.fract() == 0.0 {
        format!("{}", montant as u64)
    } else {
        let s = format!("{:.2}", montant);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

impl WebAppOrder {
    /// Applies the chat flow's field rules and converts into an [`Order`]
    /// already positioned at confirmation.
    pub fn validate(self) -> Result<Order, WebAppPayloadError> {
        let order_type = OrderType::from_code(self.order_type).ok_or(WebAppPayloadError::OrderType)?;
        let service = ServiceKind::from_code(self.stop_desk).ok_or(WebAppPayloadError::Service)?;
        if self.code_wilaya == 0 {
            return Err(WebAppPayloadError::Wilaya);
        }
        let commune = self.commune.trim();
        if commune.is_empty() {
            return Err(WebAppPayloadError::Commune);
        }
        if !(self.montant > 0.0 && self.montant.is_finite()) {
            return Err(FieldError::Amount.into());
        }
        if self.quantite == 0 {
            return Err(FieldError::Quantity.into());
        }

        Ok(Order {
            order_type: Some(order_type),
            service: Some(service),
            nom_client: Some(session::validate_name(&self.nom_client)?),
            telephone: Some(session::validate_phone(&self.telephone)?),
            code_wilaya: Some(self.code_wilaya),
            wilaya_name: None,
            commune: Some(commune.to_string()),
            adresse: Some(session::validate_address(&self.adresse)?),
            montant: Some(format_amount(self.montant)),
            produit: Some(session::validate_product(&self.produit)?),
            quantite: Some(self.quantite.to_string()),
            remarque: session::validate_note(self.remarque.as_deref().unwrap_or(""))?,
        })
    }
}

/// Parses and validates a raw `web_app_data` string into an [`Order`].
pub fn parse_web_app_payload(raw: &str) -> Result<Order, WebAppPayloadError> {
    let payload: WebAppPayload = serde_json::from_str(raw)?;
    let WebAppPayload::CreateOrder { data } = payload;
    data.validate()
}
