use crate::config::PurchaseConfig;
use crate::domain::order::{AppId, OrderId, TransactionId};
use crate::domain::ports::{Confirmed, InitPurchaseRequest, PurchaseApi};
use crate::error::{ApiError, PurchaseError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const INIT_PURCHASE: &str = "InitPurchase";
pub const FINALIZE_PURCHASE: &str = "FinalizePurchase";
pub const CHECK_PURCHASE_STATUS: &str = "CheckPurchaseStatus";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitPurchaseBody<'a> {
    item_id: &'a str,
    steam_id: &'a str,
    order_id: String,
    item_description: &'a str,
    category: &'a str,
    app_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizePurchaseBody {
    order_id: String,
    app_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckPurchaseStatusBody<'a> {
    app_id: String,
    order_id: String,
    trans_id: &'a str,
}

#[derive(Deserialize)]
struct InitPurchaseReply {
    transid: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct FinalizePurchaseReply {
    success: Option<bool>,
    error: Option<String>,
}

/// Backend view of a transaction, as returned by `CheckPurchaseStatus`.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseStatus {
    /// Steam transaction status, e.g. `Init`, `Approved`, `Succeeded`.
    pub status: Option<String>,
    /// Remaining transaction parameters reported by Steam.
    pub params: Map<String, Value>,
}

/// [`PurchaseApi`] over the purchase-verification backend's JSON HTTP interface.
#[derive(Debug, Clone)]
pub struct HttpPurchaseApi {
    client: Client,
    base_url: String,
    app_id: AppId,
}

impl HttpPurchaseApi {
    pub fn new(config: &PurchaseConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| PurchaseError::Config(format!("HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            app_id: config.app_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Asks the backend where a transaction stands. Used for diagnosing attempts
    /// that failed after the platform authorized them.
    pub async fn check_purchase_status(
        &self,
        order_id: OrderId,
        transaction_id: &TransactionId,
    ) -> std::result::Result<PurchaseStatus, ApiError> {
        let body = CheckPurchaseStatusBody {
            app_id: self.app_id.to_string(),
            order_id: order_id.to_string(),
            trans_id: transaction_id.as_str(),
        };
        let text = self.post(CHECK_PURCHASE_STATUS, &body).await?;
        parse_status_reply(&text)
    }

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> std::result::Result<String, ApiError> {
        let url = self.endpoint_url(endpoint);
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                warn!(%url, error = %err, "Backend request failed");
                ApiError::from(err)
            })?;

        // Error replies come back as 4xx with a JSON body, so the body is read
        // regardless of status and classified by its fields.
        let status = response.status();
        let text = response.text().await?;
        debug!(%url, %status, "Backend responded");
        Ok(text)
    }
}

#[async_trait]
impl PurchaseApi for HttpPurchaseApi {
    async fn init_purchase(
        &self,
        request: &InitPurchaseRequest,
    ) -> std::result::Result<TransactionId, ApiError> {
        let body = InitPurchaseBody {
            item_id: &request.item_id,
            steam_id: &request.steam_id,
            order_id: request.order_id.to_string(),
            item_description: &request.item_description,
            category: &request.category,
            app_id: request.app_id.to_string(),
        };
        let text = self.post(INIT_PURCHASE, &body).await?;
        parse_init_reply(&text)
    }

    async fn finalize_purchase(
        &self,
        order_id: OrderId,
        app_id: AppId,
    ) -> std::result::Result<Confirmed, ApiError> {
        let body = FinalizePurchaseBody {
            order_id: order_id.to_string(),
            app_id: app_id.to_string(),
        };
        let text = self.post(FINALIZE_PURCHASE, &body).await?;
        parse_finalize_reply(&text)
    }
}

fn parse_init_reply(text: &str) -> std::result::Result<TransactionId, ApiError> {
    let reply: InitPurchaseReply = serde_json::from_str(text)
        .map_err(|err| ApiError::InvalidResponse(format!("{err}: {}", excerpt(text))))?;
    match (reply.transid, reply.error) {
        (Some(transid), _) if !transid.is_empty() => Ok(TransactionId(transid)),
        (_, Some(error)) => Err(ApiError::Backend(error)),
        _ => Err(ApiError::InvalidResponse(format!(
            "neither transid nor error in {}",
            excerpt(text)
        ))),
    }
}

fn parse_finalize_reply(text: &str) -> std::result::Result<Confirmed, ApiError> {
    let reply: FinalizePurchaseReply = serde_json::from_str(text)
        .map_err(|err| ApiError::InvalidResponse(format!("{err}: {}", excerpt(text))))?;
    match (reply.success, reply.error) {
        (Some(true), _) => Ok(Confirmed),
        (_, Some(error)) => Err(ApiError::Backend(error)),
        (Some(false), None) => Err(ApiError::Backend(
            "backend did not confirm the purchase".to_string(),
        )),
        (None, None) => Err(ApiError::InvalidResponse(format!(
            "neither success nor error in {}",
            excerpt(text)
        ))),
    }
}

fn parse_status_reply(text: &str) -> std::result::Result<PurchaseStatus, ApiError> {
    let mut fields: Map<String, Value> = serde_json::from_str(text)
        .map_err(|err| ApiError::InvalidResponse(format!("{err}: {}", excerpt(text))))?;
    if let Some(error) = fields.remove("error") {
        let message = match error {
            Value::String(message) => message,
            other => other.to_string(),
        };
        return Err(ApiError::Backend(message));
    }
    fields.remove("success");
    let status = match fields.remove("status") {
        Some(Value::String(status)) => Some(status),
        _ => None,
    };
    Ok(PurchaseStatus {
        status,
        params: fields,
    })
}

fn excerpt(text: &str) -> &str {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
