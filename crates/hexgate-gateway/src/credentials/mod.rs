//! Credential brokering for the backend.
//!
//! Secrets are looked up through an ordered chain of sources: environment,
//! SOPS-encrypted file, KeePass via the adapter sidecar, and Setec. Values
//! are never logged; the source that produced them is.

mod broker;
mod env;
mod kdbx;
mod resolver;
mod setec;
mod sops;

pub use broker::{BrokerConfig, CredentialBroker, CredentialError};
pub use env::{EnvResolver, env_var_name};
pub use kdbx::KdbxResolver;
pub use resolver::{RESOLVER_TIMEOUT, Resolver, ResolverError};
pub use setec::SetecResolver;
pub use sops::SopsResolver;
