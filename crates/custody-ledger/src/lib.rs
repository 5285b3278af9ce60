//! Append-only package custody ledger.
//!
//! This crate is the heart of the custody service. It provides:
//! - `Package` records and their `HistoryEvent` sequences
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - `PackageLedger`, the single-writer in-memory ledger
//! - Injectable `Clock` and `EventSink` seams
//! - Projection builders (tracking summary, custody trail)
//! - History validation and snapshot export/restore

pub mod clock;
pub mod error;
pub mod memory;
pub mod projection;
pub mod records;
pub mod sink;
pub mod snapshot;
pub mod traits;
pub mod validation;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use error::LedgerError;
pub use memory::PackageLedger;
pub use projection::{CustodyTrail, ProjectionBuilder, TrackingProjection};
pub use records::{HistoryEvent, LedgerEvent, LedgerEventKind, Package, CREATED_STATUS};
pub use sink::{BroadcastSink, EventSink, EventStream, MemorySink, NoOpSink};
pub use snapshot::{LedgerSnapshot, PackageEntry, SNAPSHOT_VERSION};
pub use traits::{LedgerReader, LedgerWriter};
pub use validation::{HistoryValidator, ValidationReport, Violation, ViolationKind};
