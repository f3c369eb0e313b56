use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenMaker;
use crate::ledger::store::LedgerStore;
use crate::transfer::TransferOrchestrator;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Ledger storage (PostgreSQL or in-memory)
    pub store: Arc<dyn LedgerStore>,
    /// Transfer orchestrator over the same store
    pub orchestrator: TransferOrchestrator,
    pub token_maker: Arc<TokenMaker>,
    /// Lifetime of issued access tokens
    pub token_duration: chrono::Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        token_maker: TokenMaker,
        token_duration: chrono::Duration,
    ) -> Self {
        Self {
            orchestrator: TransferOrchestrator::new(store.clone()),
            store,
            token_maker: Arc::new(token_maker),
            token_duration,
        }
    }

    /// Roll back transfers still running after `limit`
    pub fn with_transfer_timeout(mut self, limit: Duration) -> Self {
        self.orchestrator = self.orchestrator.with_unit_timeout(limit);
        self
    }
}
