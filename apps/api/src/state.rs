use std::sync::Arc;

use crate::engine::{ApplicationEngine, Catalog};
use crate::ledger::Ledger;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ApplicationEngine>,
    /// Posting and profile snapshots registered over HTTP; the engine reads the same catalog.
    pub catalog: Arc<Catalog>,
    pub ledger: Arc<dyn Ledger>,
}
