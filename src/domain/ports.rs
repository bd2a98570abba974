use super::events::AuthorizationEvent;
use super::order::{AppId, OrderId, TransactionId};
use crate::error::ApiError;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything the backend needs to open a transaction for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPurchaseRequest {
    pub order_id: OrderId,
    pub app_id: AppId,
    pub item_id: String,
    pub steam_id: String,
    pub item_description: String,
    pub category: String,
}

/// The backend accepted the finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmed;

/// Purchase-verification backend.
#[async_trait]
pub trait PurchaseApi: Send + Sync {
    async fn init_purchase(&self, request: &InitPurchaseRequest)
    -> Result<TransactionId, ApiError>;
    async fn finalize_purchase(&self, order_id: OrderId, app_id: AppId)
    -> Result<Confirmed, ApiError>;
}

pub type PurchaseApiRef = Arc<dyn PurchaseApi>;

pub type AuthorizationHandler = Box<dyn Fn(AuthorizationEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Bound,
    /// No platform store integration; purchases cannot be authorized.
    Unavailable,
}

/// Source of platform authorization callbacks.
pub trait AuthorizationGateway: Send + Sync {
    fn subscribe(&self, handler: AuthorizationHandler) -> GatewayStatus;
}
