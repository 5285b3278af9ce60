use custody_types::{Identity, PackageId};

use crate::error::LedgerError;
use crate::records::{HistoryEvent, Package};

/// Write boundary for ledger mutations.
///
/// Every mutation is gated on `caller` being the ledger's authorized writer.
pub trait LedgerWriter: Send + Sync {
    /// Register a new package and record its `CREATED` event at `origin`.
    fn create(
        &self,
        caller: &Identity,
        id: &PackageId,
        origin: &str,
        destination: &str,
    ) -> Result<Package, LedgerError>;

    /// Append a status event to an existing package.
    fn update_status(
        &self,
        caller: &Identity,
        id: &PackageId,
        status: &str,
        location: &str,
    ) -> Result<HistoryEvent, LedgerError>;
}

/// Read boundary for ledger queries.
pub trait LedgerReader: Send + Sync {
    /// The authorized writer.
    fn owner(&self) -> Identity;

    fn get(&self, id: &PackageId) -> Result<Package, LedgerError>;

    /// Full history in insertion order.
    fn history(&self, id: &PackageId) -> Result<Vec<HistoryEvent>, LedgerError>;

    /// The tail of [`history`](Self::history).
    fn last_status(&self, id: &PackageId) -> Result<HistoryEvent, LedgerError>;

    fn contains(&self, id: &PackageId) -> Result<bool, LedgerError>;

    /// All package identifiers, sorted.
    fn package_ids(&self) -> Result<Vec<PackageId>, LedgerError>;

    fn package_count(&self) -> Result<u64, LedgerError>;

    fn event_count(&self, id: &PackageId) -> Result<u64, LedgerError>;
}
