//! hexgate Gateway Library
//!
//! Core functionality for the hexgate gateway:
//! - Backend bridge to the stdio JSON-RPC tool process
//! - HTTP call pipeline (policy, circuit breaker, usage accounting)
//! - Credential broker over env, sops, kdbx and setec sources
//! - Bounded usage recording towards the metering service

pub mod bridge;
pub mod credentials;
pub mod http;
pub mod server;
pub mod telemetry;
pub mod usage;
