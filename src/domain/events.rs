use super::order::{AppId, OrderId, TransactionId};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// User consent (or refusal) reported by the platform for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationEvent {
    pub app_id: AppId,
    pub order_id: OrderId,
    pub authorized: bool,
}

/// Terminal result of one purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Completed {
        order_id: OrderId,
        transaction_id: Option<TransactionId>,
        coins_awarded: i64,
    },
    Failed {
        order_id: OrderId,
        error: ApiError,
    },
    Cancelled {
        order_id: OrderId,
    },
}

impl PurchaseOutcome {
    pub fn order_id(&self) -> OrderId {
        match self {
            PurchaseOutcome::Completed { order_id, .. }
            | PurchaseOutcome::Failed { order_id, .. }
            | PurchaseOutcome::Cancelled { order_id } => *order_id,
        }
    }
}
