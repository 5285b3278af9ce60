use custody_types::{PackageId, Timestamp};
use serde::Serialize;

use crate::error::LedgerError;
use crate::records::{HistoryEvent, Package};
use crate::traits::LedgerReader;

/// Summary of where a package is and how it got there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackingProjection {
    pub package: Package,
    pub last: HistoryEvent,
    pub event_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Last known location equals the destination.
    pub at_destination: bool,
}

/// Locations a package has passed through, consecutive repeats collapsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustodyTrail {
    pub id: PackageId,
    pub locations: Vec<String>,
}

/// Deterministic projection builders.
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    pub fn tracking<R: LedgerReader>(
        reader: &R,
        id: &PackageId,
    ) -> Result<TrackingProjection, LedgerError> {
        let package = reader.get(id)?;
        // One history read; first and last come from the same copy.
        let history = reader.history(id)?;
        let (Some(first), Some(last)) = (history.first(), history.last()) else {
            return Err(LedgerError::Corrupt {
                id: id.clone(),
                reason: "history has no events".into(),
            });
        };

        Ok(TrackingProjection {
            at_destination: last.location == package.destination,
            created_at: first.timestamp,
            updated_at: last.timestamp,
            event_count: history.len() as u64,
            last: last.clone(),
            package,
        })
    }

    pub fn custody_trail<R: LedgerReader>(
        reader: &R,
        id: &PackageId,
    ) -> Result<CustodyTrail, LedgerError> {
        let history = reader.history(id)?;
        let mut locations: Vec<String> = history.into_iter().map(|e| e.location).collect();
        locations.dedup();
        Ok(CustodyTrail {
            id: id.clone(),
            locations,
        })
    }
}
