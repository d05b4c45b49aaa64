use std::sync::Arc;

use vestnik_store::Store;

/// Shared state for the health/metrics router. Deliberately read-only and
/// DB-derived: this process does not share the orchestrator's in-memory
/// `CircuitBreaker`/`UsageLedger` (SPEC_FULL.md §5 keeps those process-local
/// to the orchestrator), so breaker state here is reconstructed from the
/// persisted usage ledger rather than read off a live struct.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub timezone: chrono_tz::Tz,
}

impl AppState {
    pub fn new(store: Store, timezone: chrono_tz::Tz) -> Self {
        Self {
            store: Arc::new(store),
            timezone,
        }
    }
}
