//! Foundation types for the custody ledger.
//!
//! Every other custody crate depends on `custody-types`.
//!
//! # Key Types
//!
//! - [`PackageId`]: Opaque, immutable package identifier
//! - [`Identity`]: Account address of a caller, derived from an ed25519 key
//! - [`Timestamp`]: Ledger-assigned time, whole seconds since the UNIX epoch

pub mod error;
pub mod identity;
pub mod package;
pub mod temporal;

pub use error::TypeError;
pub use identity::{Identity, KeyPair};
pub use package::PackageId;
pub use temporal::Timestamp;
