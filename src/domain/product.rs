use serde::{Deserialize, Serialize};

/// Catalog entry sold through the purchase flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub item_id: String,
    pub description: String,
    pub category: String,
    /// Coins credited to the wallet once the purchase is finalized.
    pub reward_coins: i64,
}

impl Product {
    pub fn new(
        item_id: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        reward_coins: i64,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            description: description.into(),
            category: category.into(),
            reward_coins,
        }
    }
}

impl Default for Product {
    fn default() -> Self {
        Self::new("1001", "1000 Coins", "Gold", 1000)
    }
}
