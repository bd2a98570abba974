use super::state_machine::{Effect, PurchaseSnapshot, PurchaseStateMachine, Step};
use crate::config::PurchaseConfig;
use crate::domain::events::{AuthorizationEvent, PurchaseOutcome};
use crate::domain::order::{OrderId, OrderIdGenerator, TransactionId};
use crate::domain::ports::{AuthorizationGateway, Confirmed, GatewayStatus, PurchaseApiRef};
use crate::error::{ApiError, PurchaseError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const OUTCOME_CAPACITY: usize = 16;

enum Message {
    Initiate {
        user_id: String,
        reply: oneshot::Sender<Result<OrderId>>,
    },
    InitCompleted {
        order_id: OrderId,
        result: std::result::Result<TransactionId, ApiError>,
    },
    Authorization(AuthorizationEvent),
    AuthorizationExpired {
        order_id: OrderId,
    },
    FinalizeCompleted {
        order_id: OrderId,
        result: std::result::Result<Confirmed, ApiError>,
    },
    Snapshot {
        reply: oneshot::Sender<PurchaseSnapshot>,
    },
    Shutdown,
}

/// Owns the purchase state machine and drives it from a single task.
///
/// Backend calls run on their own tasks and platform callbacks may fire on any
/// thread; both only enqueue a [`Message`], so every state change happens on the
/// orchestrator task in arrival order.
pub struct PurchaseOrchestrator {
    machine: PurchaseStateMachine,
    api: PurchaseApiRef,
    request_timeout: Duration,
    authorization_timeout: Duration,
    platform_available: bool,
    inbox: mpsc::UnboundedReceiver<Message>,
    // Weak so that dropping every handle stops the actor.
    loopback: mpsc::WeakUnboundedSender<Message>,
    outcomes: broadcast::Sender<PurchaseOutcome>,
}

impl PurchaseOrchestrator {
    /// Subscribes to `gateway` and starts the orchestrator on the current tokio runtime.
    pub fn spawn(
        config: &PurchaseConfig,
        api: PurchaseApiRef,
        gateway: &dyn AuthorizationGateway,
        order_ids: Box<dyn OrderIdGenerator>,
    ) -> OrchestratorHandle {
        let (sender, inbox) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);

        let callback_sender = sender.downgrade();
        let status = gateway.subscribe(Box::new(move |event: AuthorizationEvent| {
            match callback_sender.upgrade() {
                Some(sender) => {
                    let _ = sender.send(Message::Authorization(event));
                }
                None => {
                    debug!(order_id = %event.order_id, "Orchestrator gone, dropping authorization")
                }
            }
        }));
        let platform_available = match status {
            GatewayStatus::Bound => {
                info!("Platform authorization callback bound successfully");
                true
            }
            GatewayStatus::Unavailable => {
                warn!("Platform store integration unavailable, purchases are disabled");
                false
            }
        };

        let orchestrator = Self {
            machine: PurchaseStateMachine::new(config, order_ids),
            api,
            request_timeout: config.request_timeout,
            authorization_timeout: config.authorization_timeout,
            platform_available,
            inbox,
            loopback: sender.downgrade(),
            outcomes: outcomes.clone(),
        };
        tokio::spawn(orchestrator.run());

        OrchestratorHandle { sender, outcomes }
    }

    async fn run(mut self) {
        while let Some(message) = self.inbox.recv().await {
            match message {
                Message::Initiate { user_id, reply } => {
                    let result = self.initiate(&user_id);
                    let _ = reply.send(result);
                }
                Message::InitCompleted { order_id, result } => {
                    let step = self.machine.on_init_completed(order_id, result);
                    self.apply(step);
                }
                Message::Authorization(event) => {
                    let step = self.machine.on_authorization(event);
                    self.apply(step);
                }
                Message::AuthorizationExpired { order_id } => {
                    let step = self.machine.on_authorization_expired(order_id);
                    self.apply(step);
                }
                Message::FinalizeCompleted { order_id, result } => {
                    let step = self.machine.on_finalize_completed(order_id, result);
                    self.apply(step);
                }
                Message::Snapshot { reply } => {
                    let _ = reply.send(self.machine.snapshot());
                }
                Message::Shutdown => break,
            }
        }
        debug!("Purchase orchestrator stopped");
    }

    fn initiate(&mut self, user_id: &str) -> Result<OrderId> {
        if !self.platform_available {
            warn!("Purchase requested but the platform store integration is unavailable");
            return Err(PurchaseError::PlatformUnavailable);
        }
        let (order_id, step) = self.machine.initiate(user_id)?;
        self.apply(step);
        Ok(order_id)
    }

    fn apply(&self, step: Step) {
        if let Some(effect) = step.effect {
            self.execute(effect);
        }
        if let Some(outcome) = step.outcome {
            // No subscribers is fine; the outcome is still in the snapshot.
            let _ = self.outcomes.send(outcome);
        }
    }

    fn execute(&self, effect: Effect) {
        let Some(sender) = self.loopback.upgrade() else {
            debug!("No handles left, skipping backend call");
            return;
        };
        let api = Arc::clone(&self.api);
        let limit = self.request_timeout;

        match effect {
            Effect::StartInit(request) => {
                tokio::spawn(async move {
                    let order_id = request.order_id;
                    let result = bounded(limit, api.init_purchase(&request)).await;
                    let _ = sender.send(Message::InitCompleted { order_id, result });
                });
            }
            Effect::StartFinalize { order_id, app_id } => {
                info!(%order_id, "Finalizing purchase");
                tokio::spawn(async move {
                    let result = bounded(limit, api.finalize_purchase(order_id, app_id)).await;
                    let _ = sender.send(Message::FinalizeCompleted { order_id, result });
                });
            }
            Effect::AwaitAuthorization { order_id } => {
                let deadline = self.authorization_timeout;
                // Weak: a pending deadline must not keep the actor alive.
                let loopback = sender.downgrade();
                tokio::spawn(async move {
                    tokio::time::sleep(deadline).await;
                    if let Some(sender) = loopback.upgrade() {
                        let _ = sender.send(Message::AuthorizationExpired { order_id });
                    }
                });
            }
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = std::result::Result<T, ApiError>>,
) -> std::result::Result<T, ApiError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ApiError::Timeout(limit)))
}

/// Cloneable front door to a running [`PurchaseOrchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    sender: mpsc::UnboundedSender<Message>,
    outcomes: broadcast::Sender<PurchaseOutcome>,
}

impl OrchestratorHandle {
    /// Starts a purchase for `user_id` and returns its order id once the init call
    /// has been issued. The outcome arrives later through [`Self::subscribe_outcomes`].
    pub async fn initiate_purchase(&self, user_id: impl Into<String>) -> Result<OrderId> {
        let (reply, response) = oneshot::channel();
        self.send(Message::Initiate {
            user_id: user_id.into(),
            reply,
        })?;
        response
            .await
            .map_err(|_| PurchaseError::OrchestratorClosed)?
    }

    pub async fn snapshot(&self) -> Result<PurchaseSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Message::Snapshot { reply })?;
        response.await.map_err(|_| PurchaseError::OrchestratorClosed)
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<PurchaseOutcome> {
        self.outcomes.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown);
    }

    fn send(&self, message: Message) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| PurchaseError::OrchestratorClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{AppId, PurchasePhase, SequentialOrderIdGenerator};
    use crate::domain::ports::{AuthorizationHandler, InitPurchaseRequest, PurchaseApi};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct NoPlatform;

    impl AuthorizationGateway for NoPlatform {
        fn subscribe(&self, _handler: AuthorizationHandler) -> GatewayStatus {
            GatewayStatus::Unavailable
        }
    }

    #[derive(Default)]
    struct CapturingGateway {
        handler: Mutex<Option<AuthorizationHandler>>,
    }

    impl AuthorizationGateway for CapturingGateway {
        fn subscribe(&self, handler: AuthorizationHandler) -> GatewayStatus {
            *self.handler.lock().unwrap() = Some(handler);
            GatewayStatus::Bound
        }
    }

    struct HangingApi;

    #[async_trait]
    impl PurchaseApi for HangingApi {
        async fn init_purchase(
            &self,
            _request: &InitPurchaseRequest,
        ) -> std::result::Result<TransactionId, ApiError> {
            std::future::pending().await
        }

        async fn finalize_purchase(
            &self,
            _order_id: OrderId,
            _app_id: AppId,
        ) -> std::result::Result<Confirmed, ApiError> {
            std::future::pending().await
        }
    }

    /// Opens every transaction and never answers finalize.
    struct OpenOnlyApi;

    #[async_trait]
    impl PurchaseApi for OpenOnlyApi {
        async fn init_purchase(
            &self,
            request: &InitPurchaseRequest,
        ) -> std::result::Result<TransactionId, ApiError> {
            Ok(TransactionId::new(format!("T{}", request.order_id)))
        }

        async fn finalize_purchase(
            &self,
            _order_id: OrderId,
            _app_id: AppId,
        ) -> std::result::Result<Confirmed, ApiError> {
            std::future::pending().await
        }
    }

    fn ids() -> Box<dyn OrderIdGenerator> {
        Box::new(SequentialOrderIdGenerator::starting_at(1_000_000))
    }

    #[tokio::test]
    async fn test_unavailable_platform_rejects_purchase() {
        let handle = PurchaseOrchestrator::spawn(
            &PurchaseConfig::default(),
            Arc::new(HangingApi),
            &NoPlatform,
            ids(),
        );

        let result = handle.initiate_purchase("user").await;
        assert!(matches!(result, Err(PurchaseError::PlatformUnavailable)));
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.current_order.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_init_times_out() {
        let config = PurchaseConfig::default().with_request_timeout(Duration::from_secs(5));
        let gateway = CapturingGateway::default();
        let handle = PurchaseOrchestrator::spawn(&config, Arc::new(HangingApi), &gateway, ids());
        let mut outcomes = handle.subscribe_outcomes();

        let order_id = handle.initiate_purchase("user").await.unwrap();
        let outcome = outcomes.recv().await.unwrap();

        assert_eq!(
            outcome,
            PurchaseOutcome::Failed {
                order_id,
                error: ApiError::Timeout(Duration::from_secs(5)),
            }
        );
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.coin_balance, 100);
        assert!(snapshot.current_order.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_authorization_frees_the_flow() {
        let config =
            PurchaseConfig::default().with_authorization_timeout(Duration::from_secs(60));
        let gateway = CapturingGateway::default();
        let handle = PurchaseOrchestrator::spawn(&config, Arc::new(OpenOnlyApi), &gateway, ids());
        let mut outcomes = handle.subscribe_outcomes();

        let order_id = handle.initiate_purchase("user").await.unwrap();
        let started = tokio::time::Instant::now();
        let outcome = outcomes.recv().await.unwrap();

        assert_eq!(outcome, PurchaseOutcome::Cancelled { order_id });
        assert!(started.elapsed() >= Duration::from_secs(60));
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.current_order.is_none());
        assert_eq!(snapshot.coin_balance, 100);

        let retry = handle.initiate_purchase("user").await.unwrap();
        assert_ne!(retry, order_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorization_deadline_does_not_touch_finalizing_order() {
        let config = PurchaseConfig::default()
            .with_authorization_timeout(Duration::from_secs(10))
            .with_request_timeout(Duration::from_secs(30));
        let gateway = CapturingGateway::default();
        let handle = PurchaseOrchestrator::spawn(&config, Arc::new(OpenOnlyApi), &gateway, ids());
        let mut outcomes = handle.subscribe_outcomes();

        let order_id = handle.initiate_purchase("user").await.unwrap();
        let waiting = PurchasePhase::AwaitingPlatformAuthorization;
        while handle.snapshot().await.unwrap().phase != waiting {
            tokio::task::yield_now().await;
        }
        let event = AuthorizationEvent {
            app_id: AppId(480),
            order_id,
            authorized: true,
        };
        if let Some(handler) = gateway.handler.lock().unwrap().as_ref() {
            handler(event);
        }

        // Finalize hangs, so the request timeout decides the outcome, not the deadline
        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(
            outcome,
            PurchaseOutcome::Failed {
                order_id,
                error: ApiError::Timeout(Duration::from_secs(30)),
            }
        );
    }

    #[tokio::test]
    async fn test_closed_orchestrator_reports_error() {
        let gateway = CapturingGateway::default();
        let handle = PurchaseOrchestrator::spawn(
            &PurchaseConfig::default(),
            Arc::new(HangingApi),
            &gateway,
            ids(),
        );
        handle.shutdown();

        // Shutdown is queued ahead of the snapshot request, which is dropped unanswered.
        let result = handle.snapshot().await;
        assert!(matches!(result, Err(PurchaseError::OrchestratorClosed)));
        assert!(matches!(
            handle.initiate_purchase("user").await,
            Err(PurchaseError::OrchestratorClosed)
        ));
    }
}
