//! Domain types and the ports the purchase flow depends on.

pub mod events;
pub mod order;
pub mod ports;
pub mod product;
pub mod wallet;
