//! HTTP server for the custody ledger.
//!
//! Exposes package creation, status updates and the read projections as a
//! JSON REST API. The ledger itself lives in `custody-ledger`; this crate
//! only authenticates callers and translates requests and errors.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AuthProvider, Credentials, OperatorAuth, TokenAuth};
pub use config::{AuthConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{CustodyServer, ShutdownSignal};
pub use state::AppState;
