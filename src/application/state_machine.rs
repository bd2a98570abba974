use crate::config::PurchaseConfig;
use crate::domain::events::{AuthorizationEvent, PurchaseOutcome};
use crate::domain::order::{
    AppId, OrderId, OrderIdGenerator, PurchaseOrder, PurchasePhase, TransactionId,
};
use crate::domain::ports::{Confirmed, InitPurchaseRequest};
use crate::domain::product::Product;
use crate::domain::wallet::Wallet;
use crate::error::{ApiError, PurchaseError, Result};
use tracing::{debug, info, warn};

/// Backend call the driver must issue on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartInit(InitPurchaseRequest),
    StartFinalize { order_id: OrderId, app_id: AppId },
    /// Arm the deadline for the platform's authorization callback.
    AwaitAuthorization { order_id: OrderId },
}

/// What a single input produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub effect: Option<Effect>,
    pub outcome: Option<PurchaseOutcome>,
}

impl Step {
    fn none() -> Self {
        Self::default()
    }

    fn effect(effect: Effect) -> Self {
        Self {
            effect: Some(effect),
            outcome: None,
        }
    }

    fn outcome(outcome: PurchaseOutcome) -> Self {
        Self {
            effect: None,
            outcome: Some(outcome),
        }
    }
}

/// Point-in-time view of the purchase flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseSnapshot {
    pub phase: PurchasePhase,
    pub current_order: Option<PurchaseOrder>,
    pub coin_balance: i64,
    pub last_outcome: Option<PurchaseOutcome>,
}

/// The purchase flow as a synchronous state machine.
///
/// Inputs are user commands, backend completions and platform authorization events.
/// Outputs are [`Step`]s: the backend call to issue next, if any, and the terminal
/// outcome of the attempt, if one was reached. The machine performs no I/O, so a
/// driver (see [`crate::application::orchestrator`]) must feed it inputs one at a time.
pub struct PurchaseStateMachine {
    app_id: AppId,
    product: Product,
    order_ids: Box<dyn OrderIdGenerator>,
    current: Option<PurchaseOrder>,
    // Authorization for the current order that arrived before init completed.
    early_authorization: Option<AuthorizationEvent>,
    wallet: Wallet,
    last_outcome: Option<PurchaseOutcome>,
}

impl PurchaseStateMachine {
    pub fn new(config: &PurchaseConfig, order_ids: Box<dyn OrderIdGenerator>) -> Self {
        Self {
            app_id: config.app_id,
            product: config.product.clone(),
            order_ids,
            current: None,
            early_authorization: None,
            wallet: Wallet::new(config.initial_coins),
            last_outcome: None,
        }
    }

    pub fn phase(&self) -> PurchasePhase {
        self.current
            .as_ref()
            .map(|order| order.phase)
            .unwrap_or_default()
    }

    pub fn current_order(&self) -> Option<&PurchaseOrder> {
        self.current.as_ref()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn snapshot(&self) -> PurchaseSnapshot {
        PurchaseSnapshot {
            phase: self.phase(),
            current_order: self.current.clone(),
            coin_balance: self.wallet.coin_balance(),
            last_outcome: self.last_outcome.clone(),
        }
    }

    /// Starts a new attempt for `user_id`. Rejected while another attempt is in flight.
    pub fn initiate(&mut self, user_id: &str) -> Result<(OrderId, Step)> {
        if let Some(order) = &self.current {
            warn!(
                order_id = %order.order_id,
                phase = ?order.phase,
                "Rejecting purchase: another purchase is in progress"
            );
            return Err(PurchaseError::AlreadyInProgress(order.order_id));
        }

        let order = PurchaseOrder::new(
            self.order_ids.next(),
            self.product.item_id.clone(),
            self.app_id,
        );
        let order_id = order.order_id;
        let request = InitPurchaseRequest {
            order_id,
            app_id: self.app_id,
            item_id: self.product.item_id.clone(),
            steam_id: user_id.to_string(),
            item_description: self.product.description.clone(),
            category: self.product.category.clone(),
        };

        info!(%order_id, item_id = %order.item_id, "Initializing purchase");
        self.current = Some(order);
        self.early_authorization = None;
        Ok((order_id, Step::effect(Effect::StartInit(request))))
    }

    pub fn on_init_completed(
        &mut self,
        order_id: OrderId,
        result: std::result::Result<TransactionId, ApiError>,
    ) -> Step {
        if !self.is_current(order_id, PurchasePhase::AwaitingApiInit) {
            debug!(%order_id, "Ignoring init response for an order that is not awaiting init");
            return Step::none();
        }

        match result {
            Ok(transaction_id) => {
                info!(%order_id, %transaction_id, "Transaction initiated");
                if let Some(order) = self.current.as_mut() {
                    order.transaction_id = Some(transaction_id);
                    order.phase = PurchasePhase::AwaitingPlatformAuthorization;
                }
                match self.early_authorization.take() {
                    Some(event) => self.on_authorization(event),
                    None => Step::effect(Effect::AwaitAuthorization { order_id }),
                }
            }
            Err(error) => {
                warn!(%order_id, %error, "Error initializing purchase");
                self.fail(order_id, error)
            }
        }
    }

    pub fn on_authorization(&mut self, event: AuthorizationEvent) -> Step {
        info!(
            app_id = %event.app_id,
            order_id = %event.order_id,
            authorized = event.authorized,
            "Authorization response received"
        );

        let Some(order) = self.current.as_mut() else {
            debug!(order_id = %event.order_id, "Ignoring authorization: no purchase in progress");
            return Step::none();
        };
        if order.order_id != event.order_id || order.app_id != event.app_id {
            debug!(
                order_id = %event.order_id,
                current = %order.order_id,
                "Ignoring authorization for a foreign order"
            );
            return Step::none();
        }

        match order.phase {
            PurchasePhase::AwaitingApiInit => {
                debug!(order_id = %event.order_id, "Holding authorization until init completes");
                self.early_authorization.get_or_insert(event);
                Step::none()
            }
            PurchasePhase::AwaitingPlatformAuthorization if event.authorized => {
                order.phase = PurchasePhase::AwaitingApiFinalize;
                Step::effect(Effect::StartFinalize {
                    order_id: order.order_id,
                    app_id: order.app_id,
                })
            }
            PurchasePhase::AwaitingPlatformAuthorization => {
                let order_id = order.order_id;
                warn!(%order_id, "Purchase was not authorized by the user");
                self.finish(PurchaseOutcome::Cancelled { order_id })
            }
            PurchasePhase::AwaitingApiFinalize | PurchasePhase::Idle => {
                debug!(order_id = %event.order_id, "Ignoring repeated authorization");
                Step::none()
            }
        }
    }

    /// The authorization deadline armed by [`Effect::AwaitAuthorization`] has passed.
    /// Abandons the order if it is still waiting on the platform.
    pub fn on_authorization_expired(&mut self, order_id: OrderId) -> Step {
        if !self.is_current(order_id, PurchasePhase::AwaitingPlatformAuthorization) {
            debug!(%order_id, "Authorization deadline passed for a settled order");
            return Step::none();
        }
        warn!(%order_id, "No authorization received from the platform, abandoning purchase");
        self.finish(PurchaseOutcome::Cancelled { order_id })
    }

    pub fn on_finalize_completed(
        &mut self,
        order_id: OrderId,
        result: std::result::Result<Confirmed, ApiError>,
    ) -> Step {
        if !self.is_current(order_id, PurchasePhase::AwaitingApiFinalize) {
            if result.is_ok() && self.wallet.is_credited(order_id) {
                warn!(%order_id, "Duplicate finalize confirmation, reward already applied");
            } else {
                debug!(%order_id, "Ignoring finalize response for an order not awaiting finalize");
            }
            return Step::none();
        }

        match result {
            Ok(Confirmed) => {
                let reward = self.product.reward_coins;
                let coins_awarded = if self.wallet.credit(order_id, reward) {
                    reward
                } else {
                    0
                };
                let transaction_id = self
                    .current
                    .as_ref()
                    .and_then(|order| order.transaction_id.clone());
                info!(
                    %order_id,
                    coins_awarded,
                    balance = self.wallet.coin_balance(),
                    "Transaction finished"
                );
                self.finish(PurchaseOutcome::Completed {
                    order_id,
                    transaction_id,
                    coins_awarded,
                })
            }
            Err(error) => {
                warn!(%order_id, %error, "Error finalizing purchase");
                self.fail(order_id, error)
            }
        }
    }

    fn is_current(&self, order_id: OrderId, phase: PurchasePhase) -> bool {
        self.current
            .as_ref()
            .is_some_and(|order| order.order_id == order_id && order.phase == phase)
    }

    fn fail(&mut self, order_id: OrderId, error: ApiError) -> Step {
        self.finish(PurchaseOutcome::Failed { order_id, error })
    }

    fn finish(&mut self, outcome: PurchaseOutcome) -> Step {
        self.current = None;
        self.early_authorization = None;
        self.last_outcome = Some(outcome.clone());
        Step::outcome(outcome)
    }
}
