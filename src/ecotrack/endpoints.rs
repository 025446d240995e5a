//! Typed wrappers over the EcoTrack endpoints
//!
//! Real EcoTrack deployments are not consistent about field names, so every
//! wrapper that interprets a response probes an ordered alias list instead of
//! hardcoding one spelling. The alias tables are plain data; supporting a new
//! deployment shape means extending a table, not adding branches.

use serde::Serialize;
use serde_json::Value;

use super::client::{EcoClient, EcoError};

/// Field names under which a commune object may expose its name.
const COMMUNE_NAME_ALIASES: &[&str] = &["nom", "name", "commune_name", "libelle"];

/// Resolves the first present, non-null string field from `aliases`.
pub(crate) fn pick_str(value: &Value, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Resolves the first present array field from `aliases`.
pub(crate) fn pick_array<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a Vec<Value>> {
    aliases.iter().filter_map(|key| value.get(*key)).find_map(Value::as_array)
}

/// A wilaya (province) reference entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wilaya {
    pub id: u32,
    pub nom: String,
}

/// Fetches the wilaya reference list (`/api/v1/get/wilayas`).
///
/// # Errors
/// `EcoError::UnexpectedShape` when the response is not an array.
pub async fn get_wilayas(client: &EcoClient) -> Result<Vec<Wilaya>, EcoError> {
    let data = client.get_json("/api/v1/get/wilayas", &[]).await?;
    let items = data
        .as_array()
        .ok_or_else(|| EcoError::UnexpectedShape("wilaya list is not an array".to_string()))?;

    let wilayas: Vec<Wilaya> = items
        .iter()
        .filter_map(|item| {
            let id = item.get("wilaya_id").and_then(Value::as_u64)?;
            let nom = item.get("wilaya_name").and_then(Value::as_str)?;
            Some(Wilaya {
                id: u32::try_from(id).ok()?,
                nom: nom.to_string(),
            })
        })
        .collect();

    log::info!("Retrieved {} wilayas from API", wilayas.len());
    Ok(wilayas)
}

/// Fetches the commune names of one wilaya (`/api/v1/get/communes`).
///
/// An empty or all-blank list is a hard failure: the order flow cannot
/// continue without a commune to select.
pub async fn get_communes(client: &EcoClient, wilaya_id: u32) -> Result<Vec<String>, EcoError> {
    let data = client
        .get_json("/api/v1/get/communes", &[("wilaya_id", wilaya_id.to_string())])
        .await?;

    let items = data
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| EcoError::Empty("Empty commune list".to_string()))?;

    let communes: Vec<String> = items
        .iter()
        .filter_map(|item| pick_str(item, COMMUNE_NAME_ALIASES))
        .collect();

    if communes.is_empty() {
        return Err(EcoError::Empty("No valid commune names received from API".to_string()));
    }

    log::info!("Retrieved {} communes for wilaya {}", communes.len(), wilaya_id);
    Ok(communes)
}

/// Finalized create-order parameters.
///
/// `type_code` (1 = delivery, 2 = exchange) and `stop_desk` (0 = home,
/// 1 = office) are the integer codes the API expects; `stock` is always 1 in
/// this deployment. Amounts and quantities travel as strings, matching the
/// query-string transport.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderPayload {
    pub nom_client: String,
    pub telephone: String,
    pub adresse: String,
    pub code_wilaya: u32,
    pub commune: String,
    pub montant: String,
    pub type_code: u8,
    pub stop_desk: u8,
    pub stock: u8,
    pub produit: String,
    pub quantite: String,
    pub remarque: Option<String>,
}

impl CreateOrderPayload {
    /// Query parameters in API spelling, empty values omitted.
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("nom_client", self.nom_client.clone()),
            ("telephone", self.telephone.clone()),
            ("adresse", self.adresse.clone()),
            ("code_wilaya", self.code_wilaya.to_string()),
            ("commune", self.commune.clone()),
            ("montant", self.montant.clone()),
            ("type", self.type_code.to_string()),
            ("stop_desk", self.stop_desk.to_string()),
            ("stock", self.stock.to_string()),
            ("produit", self.produit.clone()),
            ("quantite", self.quantite.clone()),
        ];
        if let Some(remarque) = &self.remarque {
            if !remarque.is_empty() {
                params.push(("remarque", remarque.clone()));
            }
        }
        params.retain(|(_, v)| !v.is_empty());
        params
    }
}

/// Successful create-order result.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub tracking: String,
    pub is_validated: bool,
}

/// Submits an order (`/api/v1/create/order`).
///
/// # Errors
/// * `EcoError::Rejected` — upstream 422-style `errors` map, rendered as
///   `field: msg, msg` lines.
/// * `EcoError::UnexpectedShape` — 2xx body with neither `success` nor
///   `errors`.
pub async fn create_order(client: &EcoClient, payload: &CreateOrderPayload) -> Result<CreatedOrder, EcoError> {
    let data = client.post_json("/api/v1/create/order", &payload.to_params()).await?;

    if data.get("success").and_then(Value::as_bool) == Some(true) {
        let tracking = data
            .get("tracking")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string();
        let is_validated = data.get("is_validated").and_then(Value::as_bool).unwrap_or(false);
        log::info!("Order created successfully -> {}", tracking);
        return Ok(CreatedOrder { tracking, is_validated });
    }

    if let Some(errors) = data.get("errors").and_then(Value::as_object) {
        let lines: Vec<String> = errors
            .iter()
            .map(|(field, msgs)| {
                let joined = match msgs {
                    Value::Array(list) => list
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => other.to_string(),
                };
                format!("{}: {}", field, joined)
            })
            .collect();
        return Err(EcoError::Rejected(lines.join("\n")));
    }

    Err(EcoError::UnexpectedShape(data.to_string()))
}

/// Appends a note to a shipment (`/api/v1/add/maj`).
pub async fn add_maj_note(client: &EcoClient, tracking: &str, content: &str) -> Result<Value, EcoError> {
    client
        .post_json(
            "/api/v1/add/maj",
            &[("tracking", tracking.to_string()), ("content", content.to_string())],
        )
        .await
}

/// Fetches the full tracking payload (`/api/v1/get/tracking/info`).
pub async fn get_tracking_info(client: &EcoClient, tracking: &str) -> Result<Value, EcoError> {
    client
        .get_json("/api/v1/get/tracking/info", &[("tracking", tracking.to_string())])
        .await
}

/// Queries orders by status (`/api/v1/get/orders/status`).
pub async fn get_orders_by_status(
    client: &EcoClient,
    statuses: &[String],
    trackings: Option<&[String]>,
    api_token: Option<&str>,
) -> Result<Value, EcoError> {
    let mut params = Vec::new();
    if !statuses.is_empty() {
        params.push(("status", statuses.join(",")));
    }
    if let Some(trackings) = trackings {
        if !trackings.is_empty() {
            params.push(("trackings", trackings.join(",")));
        }
    }
    if let Some(token) = api_token {
        params.push(("api_token", token.to_string()));
    }
    client.get_json("/api/v1/get/orders/status", &params).await
}
