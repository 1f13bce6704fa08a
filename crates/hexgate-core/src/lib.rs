//! hexgate Core Library
//!
//! Shared functionality for the hexgate gateway:
//! - Policy engine (grant evaluation, hot reload)
//! - Circuit breaker driven by external admission signals
//! - JSON-RPC 2.0 wire types and line framing for the backend protocol
//! - Inbound call envelope and usage event types
//! - Configuration resolution and common error types

pub mod circuit;
pub mod config;
pub mod envelope;
pub mod error;
pub mod jsonrpc;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod policy;
pub mod tracing_init;
pub mod usage;

pub use circuit::CircuitBreaker;
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use policy::{Decision, PolicyEngine};
