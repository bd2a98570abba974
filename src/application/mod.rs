//! Application layer containing the purchase flow orchestration.
//!
//! `PurchaseStateMachine` holds the transition rules and performs no I/O.
//! `PurchaseOrchestrator` drives it with an actor-like pattern: a single `tokio` task
//! owns the machine and the wallet, and every input arrives through one channel.

pub mod orchestrator;
pub mod state_machine;
