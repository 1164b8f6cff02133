//! Price provider implementations

pub mod birdeye;
pub mod failover;

pub use birdeye::{BirdeyeProvider, BirdeyeSettings, Endpoint};
pub use failover::FailoverRunner;
