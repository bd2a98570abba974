use super::order::OrderId;
use serde::Serialize;
use std::collections::HashSet;

/// Coin balance of the local player.
///
/// Credits are keyed by order id: a second credit for the same order is a no-op,
/// which keeps duplicate finalize confirmations from paying out twice.
///
/// The credited set only grows. It holds one id per completed purchase of this
/// session, which stays small for a single player; a long-lived process would
/// have to persist or window it together with the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    coin_balance: i64,
    #[serde(skip)]
    credited_orders: HashSet<OrderId>,
}

impl Wallet {
    pub fn new(initial_balance: i64) -> Self {
        Self {
            coin_balance: initial_balance,
            credited_orders: HashSet::new(),
        }
    }

    pub fn coin_balance(&self) -> i64 {
        self.coin_balance
    }

    pub fn is_credited(&self, order_id: OrderId) -> bool {
        self.credited_orders.contains(&order_id)
    }

    /// Credits `amount` coins for `order_id`. Returns `false` if the order was
    /// already credited.
    pub fn credit(&mut self, order_id: OrderId, amount: i64) -> bool {
        if !self.credited_orders.insert(order_id) {
            return false;
        }
        self.coin_balance += amount;
        true
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new(0)
    }
}
