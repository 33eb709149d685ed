//! # Workload Identity ADAL Bridge
//!
//! Emulates the instance metadata service identity endpoints for clients that
//! only speak the legacy ADAL protocol, vending tokens obtained through AKS
//! Workload Identity federated credentials.
//!
//! Modules:
//! - `config`: config file and resolved listener settings
//! - `identity`: token request resolution and the federated token exchange
//! - `metadata`: static `/metadata/endpoints` snapshots and an IMDS client
//! - `server`: IMDS routes and the listener lifecycle
//! - `observability`: prometheus metrics

pub mod config;
pub mod errors;
pub mod helpers;
pub mod identity;
pub mod metadata;
pub mod observability;
pub mod server;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use crate::errors::BridgeError;
pub use crate::identity::exchange::{TokenExchangeClient, TokenResponse};
pub use crate::server::listener::ListenerManager;
