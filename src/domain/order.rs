use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Order ids are drawn from this range so that ids from different players or
/// sessions are unlikely to collide at the backend.
pub const ORDER_ID_RANGE: Range<u64> = 1_000_000..100_000_000;

/// Process-local identifier of one purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-assigned identifier correlating the init and finalize calls of one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric Steam application identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the in-flight order currently sits in the purchase flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchasePhase {
    #[default]
    Idle,
    AwaitingApiInit,
    AwaitingPlatformAuthorization,
    AwaitingApiFinalize,
}

/// One purchase attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrder {
    pub order_id: OrderId,
    pub transaction_id: Option<TransactionId>,
    pub item_id: String,
    pub app_id: AppId,
    pub phase: PurchasePhase,
}

impl PurchaseOrder {
    pub fn new(order_id: OrderId, item_id: impl Into<String>, app_id: AppId) -> Self {
        Self {
            order_id,
            transaction_id: None,
            item_id: item_id.into(),
            app_id,
            phase: PurchasePhase::AwaitingApiInit,
        }
    }
}

/// Source of order ids for new purchase attempts.
pub trait OrderIdGenerator: Send {
    fn next(&mut self) -> OrderId;
}

/// Draws order ids uniformly from [`ORDER_ID_RANGE`].
pub struct RandomOrderIdGenerator {
    rng: StdRng,
}

impl RandomOrderIdGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence, handy for demos and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomOrderIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderIdGenerator for RandomOrderIdGenerator {
    fn next(&mut self) -> OrderId {
        OrderId(self.rng.gen_range(ORDER_ID_RANGE))
    }
}

/// Counts up from a fixed start. Deterministic ids for tests.
pub struct SequentialOrderIdGenerator {
    next: u64,
}

impl SequentialOrderIdGenerator {
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }
}

impl OrderIdGenerator for SequentialOrderIdGenerator {
    fn next(&mut self) -> OrderId {
        let id = OrderId(self.next);
        self.next += 1;
        id
    }
}
