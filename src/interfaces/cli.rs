use crate::config::PurchaseConfig;
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Steam microtransaction purchase client", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Root URL of the purchase-verification backend
    #[arg(long, env = "MICROTXN_BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Steam application id
    #[arg(long, env = "MICROTXN_APP_ID", default_value = "480")]
    pub app_id: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Seconds to wait for the player to answer the purchase dialog
    #[arg(long, default_value_t = 300)]
    pub authorization_timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one purchase attempt, confirming it on the console in place of the Steam overlay
    Purchase {
        /// SteamID64 of the purchasing player
        #[arg(long)]
        steam_id: String,

        /// Coins in the wallet before the purchase
        #[arg(long, default_value_t = 100)]
        initial_coins: i64,
    },
    /// Ask the backend for the status of a transaction
    Status {
        #[arg(long)]
        order_id: u64,

        #[arg(long)]
        transaction_id: String,
    },
}

impl Cli {
    pub fn config(&self) -> Result<PurchaseConfig> {
        let mut config = PurchaseConfig::new(self.backend.base_url.clone())
            .with_app_id_str(&self.backend.app_id)?
            .with_request_timeout(Duration::from_secs(self.backend.timeout_secs))
            .with_authorization_timeout(Duration::from_secs(
                self.backend.authorization_timeout_secs,
            ));
        if let Command::Purchase { initial_coins, .. } = &self.command {
            config = config.with_initial_coins(*initial_coins);
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::AppId;
    use crate::error::PurchaseError;

    #[test]
    fn test_purchase_args_build_config() {
        let cli = Cli::try_parse_from([
            "microtxn",
            "--base-url",
            "http://api.example.com/",
            "--app-id",
            "1234",
            "--timeout-secs",
            "5",
            "--authorization-timeout-secs",
            "90",
            "purchase",
            "--steam-id",
            "76561197960287930",
            "--initial-coins",
            "250",
        ])
        .unwrap();

        let config = cli.config().unwrap();
        assert_eq!(config.app_id, AppId(1234));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.authorization_timeout, Duration::from_secs(90));
        assert_eq!(config.initial_coins, 250);
    }

    #[test]
    fn test_invalid_app_id_is_a_config_error() {
        let cli = Cli::try_parse_from([
            "microtxn",
            "--app-id",
            "spacewar",
            "status",
            "--order-id",
            "1",
            "--transaction-id",
            "T1",
        ])
        .unwrap();
        assert!(matches!(cli.config(), Err(PurchaseError::Config(_))));
    }

    #[test]
    fn test_purchase_requires_steam_id() {
        assert!(Cli::try_parse_from(["microtxn", "purchase"]).is_err());
    }
}
