use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use custody_types::{Identity, PackageId};
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock, SystemClock};
use crate::error::LedgerError;
use crate::records::{HistoryEvent, LedgerEvent, Package};
use crate::sink::{EventSink, NoOpSink};
use crate::snapshot::{LedgerSnapshot, PackageEntry, SNAPSHOT_VERSION};
use crate::traits::{LedgerReader, LedgerWriter};
use crate::validation::HistoryValidator;

/// In-memory, single-writer package ledger.
///
/// Records and histories live behind one `RwLock`. Every mutation holds the
/// write guard from its existence check through timestamp assignment and
/// event publication, so two creates of the same identifier can never both
/// succeed and no reader ever sees a record without its `CREATED` event.
pub struct PackageLedger {
    owner: Identity,
    clock: MonotonicClock,
    sink: Arc<dyn EventSink>,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    packages: HashMap<PackageId, Package>,
    histories: HashMap<PackageId, Vec<HistoryEvent>>,
}

impl PackageLedger {
    /// An empty ledger writable only by `owner`, on wall-clock time, with no
    /// event sink.
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            clock: MonotonicClock::new(Arc::new(SystemClock)),
            sink: Arc::new(NoOpSink),
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Replace the timestamp source. Readings stay at or above anything the
    /// ledger has already issued.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let floor = self.clock.last();
        self.clock = MonotonicClock::new(clock);
        self.clock.raise_floor(floor);
        self
    }

    /// Replace the notification sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// Every package history is validated first; the first violation found is
    /// reported as [`LedgerError::Corrupt`] and nothing is loaded.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::UnsupportedSnapshot {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        for report in HistoryValidator::validate_snapshot(&snapshot) {
            if let Some(violation) = report.violations.first() {
                return Err(LedgerError::Corrupt {
                    id: report.package,
                    reason: violation.description.clone(),
                });
            }
        }

        let ledger = Self::new(snapshot.owner);
        let mut newest = None;
        {
            let mut state = ledger.write_state()?;
            for entry in snapshot.packages {
                let id = entry.package.id.clone();
                if let Some(last) = entry.history.last() {
                    newest = newest.max(Some(last.timestamp));
                }
                state.histories.insert(id.clone(), entry.history);
                state.packages.insert(id, entry.package);
            }
            info!(
                owner = %ledger.owner,
                packages = state.packages.len(),
                "ledger restored from snapshot"
            );
        }
        if let Some(newest) = newest {
            ledger.clock.raise_floor(newest);
        }

        Ok(ledger)
    }

    /// Export every package and its history, ordered by identifier.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let state = self.read_state()?;
        let mut packages: Vec<PackageEntry> = state
            .packages
            .values()
            .map(|package| PackageEntry {
                package: package.clone(),
                history: state
                    .histories
                    .get(&package.id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        packages.sort_by(|a, b| a.package.id.cmp(&b.package.id));

        Ok(LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            owner: self.owner,
            packages,
        })
    }

    fn authorize(&self, caller: &Identity, op: &str, id: &PackageId) -> Result<(), LedgerError> {
        if *caller != self.owner {
            warn!(
                caller = %caller.short_id(),
                op,
                package = %id,
                "rejected mutation from unauthorized caller"
            );
            return Err(LedgerError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Internal("ledger read lock poisoned".into()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Internal("ledger write lock poisoned".into()))
    }
}

impl LedgerWriter for PackageLedger {
    fn create(
        &self,
        caller: &Identity,
        id: &PackageId,
        origin: &str,
        destination: &str,
    ) -> Result<Package, LedgerError> {
        self.authorize(caller, "create", id)?;
        require_text("origin", origin)?;
        require_text("destination", destination)?;

        let mut state = self.write_state()?;
        if state.packages.contains_key(id) {
            warn!(package = %id, "package already exists");
            return Err(LedgerError::AlreadyExists(id.clone()));
        }

        let timestamp = self.clock.now();
        let package = Package {
            id: id.clone(),
            origin: origin.to_string(),
            destination: destination.to_string(),
        };
        state
            .histories
            .insert(id.clone(), vec![HistoryEvent::created(&package, timestamp)]);
        state.packages.insert(id.clone(), package.clone());

        self.sink.publish(&LedgerEvent::PackageCreated {
            id: id.clone(),
            origin: package.origin.clone(),
            destination: package.destination.clone(),
            timestamp,
        });
        info!(package = %id, origin, destination, %timestamp, "package created");

        Ok(package)
    }

    fn update_status(
        &self,
        caller: &Identity,
        id: &PackageId,
        status: &str,
        location: &str,
    ) -> Result<HistoryEvent, LedgerError> {
        self.authorize(caller, "update_status", id)?;

        let mut state = self.write_state()?;
        let Some(history) = state.histories.get_mut(id) else {
            warn!(package = %id, "status update for unknown package");
            return Err(LedgerError::NotFound(id.clone()));
        };
        require_text("status", status)?;
        require_text("location", location)?;

        let event = HistoryEvent {
            status: status.to_string(),
            location: location.to_string(),
            timestamp: self.clock.now(),
        };
        history.push(event.clone());

        self.sink.publish(&LedgerEvent::PackageUpdated {
            id: id.clone(),
            status: event.status.clone(),
            location: event.location.clone(),
            timestamp: event.timestamp,
        });
        info!(
            package = %id,
            status,
            location,
            timestamp = %event.timestamp,
            seq = history.len(),
            "package status updated"
        );

        Ok(event)
    }
}

impl LedgerReader for PackageLedger {
    fn owner(&self) -> Identity {
        self.owner
    }

    fn get(&self, id: &PackageId) -> Result<Package, LedgerError> {
        debug!(package = %id, "get package");
        let state = self.read_state()?;
        state
            .packages
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    fn history(&self, id: &PackageId) -> Result<Vec<HistoryEvent>, LedgerError> {
        debug!(package = %id, "get history");
        let state = self.read_state()?;
        state
            .histories
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    fn last_status(&self, id: &PackageId) -> Result<HistoryEvent, LedgerError> {
        debug!(package = %id, "get last status");
        let state = self.read_state()?;
        state
            .histories
            .get(id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    fn contains(&self, id: &PackageId) -> Result<bool, LedgerError> {
        Ok(self.read_state()?.packages.contains_key(id))
    }

    fn package_ids(&self) -> Result<Vec<PackageId>, LedgerError> {
        let state = self.read_state()?;
        let mut ids: Vec<_> = state.packages.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn package_count(&self) -> Result<u64, LedgerError> {
        Ok(self.read_state()?.packages.len() as u64)
    }

    fn event_count(&self, id: &PackageId) -> Result<u64, LedgerError> {
        let state = self.read_state()?;
        state
            .histories
            .get(id)
            .map(|history| history.len() as u64)
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }
}

/// Reject empty or whitespace-only text.
fn require_text(field: &'static str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        warn!(field, "rejected empty field");
        return Err(LedgerError::Validation { field });
    }
    Ok(())
}
