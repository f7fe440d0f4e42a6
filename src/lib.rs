//! Device Communication Server registry and command dispatch
//!
//! This crate loads the set of protocol-adapter servers (DCS) a fleet-tracking
//! platform knows about, indexes them by name and port, and delivers remote
//! commands to a running adapter over its line-oriented control endpoint.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod loader;
pub mod properties;
pub mod registry;
pub mod server;
pub mod sms;
pub mod utils;

pub use config::RuntimeConfig;
pub use dispatch::{CommandDispatchClient, CommandRequest, CommandResponse, ResultCode};
pub use properties::{PropertyResolver, PropertyStore};
pub use registry::{RegistryOptions, ServerRegistry};
pub use server::ServerConfig;
pub use utils::error::{DcsError, Result};
