use std::sync::Arc;

use axum::http::HeaderMap;
use custody_ledger::{LedgerError, LedgerReader, PackageLedger};
use custody_types::Identity;
use tracing::warn;

use crate::auth::{AuthProvider, Credentials};
use crate::error::ServerResult;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<PackageLedger>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn new(ledger: Arc<PackageLedger>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { ledger, auth }
    }

    /// Identity the ledger should see for a request carrying `headers`.
    pub async fn caller(&self, headers: &HeaderMap) -> ServerResult<Identity> {
        self.auth
            .authenticate(&Credentials::from_headers(headers))
            .await
    }

    /// Like [`caller`](Self::caller), but rejects anyone other than the
    /// ledger's writer. Mutating handlers call this before looking at the
    /// request body, so a stranger sees `Unauthorized` rather than a field
    /// error.
    pub async fn writer(&self, headers: &HeaderMap) -> ServerResult<Identity> {
        let caller = self.caller(headers).await?;
        if caller != self.ledger.owner() {
            warn!(caller = %caller.short_id(), "rejected request from unauthorized caller");
            return Err(LedgerError::Unauthorized { caller }.into());
        }
        Ok(caller)
    }
}
