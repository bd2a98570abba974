use crate::domain::events::AuthorizationEvent;
use crate::domain::ports::{AuthorizationGateway, AuthorizationHandler, GatewayStatus};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

type Slot = Arc<RwLock<Option<AuthorizationHandler>>>;

/// In-process platform gateway.
///
/// The platform side holds a [`PlatformPublisher`] and reports authorization results
/// through it; the subscriber registered via [`AuthorizationGateway::subscribe`]
/// receives them on the publishing thread.
pub struct ChannelAuthorizationGateway {
    available: bool,
    handler: Slot,
}

impl ChannelAuthorizationGateway {
    pub fn new() -> Self {
        Self {
            available: true,
            handler: Arc::default(),
        }
    }

    /// A gateway standing in for a missing platform integration.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            handler: Arc::default(),
        }
    }

    pub fn publisher(&self) -> PlatformPublisher {
        PlatformPublisher {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl Default for ChannelAuthorizationGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationGateway for ChannelAuthorizationGateway {
    fn subscribe(&self, handler: AuthorizationHandler) -> GatewayStatus {
        if !self.available {
            return GatewayStatus::Unavailable;
        }
        match self.handler.write() {
            Ok(mut slot) => {
                if slot.is_some() {
                    warn!("Replacing existing authorization subscriber");
                }
                *slot = Some(handler);
                GatewayStatus::Bound
            }
            Err(_) => {
                warn!("Authorization handler slot poisoned");
                GatewayStatus::Unavailable
            }
        }
    }
}

/// Platform-side handle delivering authorization results to the subscriber.
#[derive(Clone)]
pub struct PlatformPublisher {
    handler: Slot,
}

impl PlatformPublisher {
    pub fn is_bound(&self) -> bool {
        self.handler
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Delivers `event`. Returns `false` if nobody is subscribed.
    pub fn publish(&self, event: AuthorizationEvent) -> bool {
        let Ok(slot) = self.handler.read() else {
            return false;
        };
        match slot.as_ref() {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                debug!(order_id = %event.order_id, "No authorization subscriber, event dropped");
                false
            }
        }
    }
}
