use crate::domain::order::AppId;
use crate::domain::product::Product;
use crate::error::{PurchaseError, Result};
use std::time::Duration;

/// Static settings of the purchase flow.
#[derive(Debug, Clone)]
pub struct PurchaseConfig {
    /// Steam application id (Spacewar, `480`, by default).
    pub app_id: AppId,
    /// Root URL of the purchase-verification backend.
    pub base_url: String,
    /// Upper bound on any single backend call.
    pub request_timeout: Duration,
    /// How long an initialized order waits for the platform's authorization callback
    /// before it is abandoned.
    pub authorization_timeout: Duration,
    pub product: Product,
    /// Coins the wallet starts with.
    pub initial_coins: i64,
}

impl PurchaseConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            app_id: AppId(480),
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            authorization_timeout: Duration::from_secs(300),
            product: Product::default(),
            initial_coins: 100,
        }
    }

    pub fn with_app_id(mut self, app_id: AppId) -> Self {
        self.app_id = app_id;
        self
    }

    /// Parses a textual app id, as found in settings files and environment variables.
    pub fn with_app_id_str(mut self, app_id: &str) -> Result<Self> {
        let parsed = app_id
            .trim()
            .parse::<u32>()
            .map_err(|_| PurchaseError::Config(format!("invalid app id '{app_id}'")))?;
        self.app_id = AppId(parsed);
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.product = product;
        self
    }

    pub fn with_initial_coins(mut self, coins: i64) -> Self {
        self.initial_coins = coins;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PurchaseError::Config(format!(
                "base url must be http(s), got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(PurchaseError::Config(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if self.authorization_timeout.is_zero() {
            return Err(PurchaseError::Config(
                "authorization timeout must be non-zero".to_string(),
            ));
        }
        if self.product.item_id.is_empty() {
            return Err(PurchaseError::Config("product item id is empty".to_string()));
        }
        if self.product.reward_coins <= 0 {
            return Err(PurchaseError::Config(
                "product reward must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
