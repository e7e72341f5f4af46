use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::domain::{Lga, LgaId, VehicleCategory};
use super::tariff::TariffTable;

/// Source of truth for gazette fee schedules, typically backed by the
/// administration database. The registry refetches through this seam when
/// its cached table expires.
pub trait TariffSource: Send + Sync {
    fn load(&self) -> Result<TariffTable, TariffSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TariffSourceError {
    #[error("tariff source unavailable: {0}")]
    Unavailable(String),
}

struct CachedTariff {
    table: Arc<TariffTable>,
    loaded_at: Instant,
}

/// Process-wide cache of LGA boundary geometry and fee schedules.
///
/// Boundaries are read-mostly: scans read an `Arc` snapshot per state, and
/// an LGA edit swaps the state's snapshot wholesale. Fee rates control
/// money and expire on a short explicit TTL instead.
pub struct LgaRegistry {
    boundaries: RwLock<HashMap<String, Arc<Vec<Lga>>>>,
    tariff: RwLock<Option<CachedTariff>>,
    source: Arc<dyn TariffSource>,
    fee_ttl: Duration,
}

impl LgaRegistry {
    pub fn new(source: Arc<dyn TariffSource>, fee_ttl: Duration) -> Self {
        Self {
            boundaries: RwLock::new(HashMap::new()),
            tariff: RwLock::new(None),
            source,
            fee_ttl,
        }
    }

    /// Replace the boundary set for one state. Ring integrity was already
    /// enforced when each `Lga` was constructed.
    pub fn replace_state(&self, state: impl Into<String>, lgas: Vec<Lga>) {
        let mut guard = self
            .boundaries
            .write()
            .expect("boundary cache lock poisoned");
        guard.insert(state.into(), Arc::new(lgas));
    }

    /// Drop a state's boundary snapshot; the next scan against it resolves
    /// no jurisdiction until the state is reloaded.
    pub fn invalidate_state(&self, state: &str) {
        let mut guard = self
            .boundaries
            .write()
            .expect("boundary cache lock poisoned");
        guard.remove(state);
    }

    /// Candidate set for a scan, scoped to the vehicle's jurisdictional
    /// state to bound containment-test cost.
    pub fn candidates(&self, state: &str) -> Arc<Vec<Lga>> {
        let guard = self
            .boundaries
            .read()
            .expect("boundary cache lock poisoned");
        guard
            .get(state)
            .cloned()
            .unwrap_or_else(|| Arc::new(Vec::new()))
    }

    /// Quote the daily rate for (LGA, category), refetching the fee table
    /// when the cached copy is older than the TTL.
    pub fn daily_rate(
        &self,
        lga: &LgaId,
        category: VehicleCategory,
    ) -> Result<Option<u64>, TariffSourceError> {
        let table = self.current_tariff()?;
        Ok(table.daily_rate(lga, category))
    }

    /// Force the next rate lookup to refetch, e.g. after a gazette edit.
    pub fn invalidate_tariff(&self) {
        let mut guard = self.tariff.write().expect("tariff cache lock poisoned");
        *guard = None;
    }

    fn current_tariff(&self) -> Result<Arc<TariffTable>, TariffSourceError> {
        {
            let guard = self.tariff.read().expect("tariff cache lock poisoned");
            if let Some(cached) = guard.as_ref() {
                if cached.loaded_at.elapsed() < self.fee_ttl {
                    return Ok(cached.table.clone());
                }
            }
        }

        let table = Arc::new(self.source.load()?);
        let mut guard = self.tariff.write().expect("tariff cache lock poisoned");
        *guard = Some(CachedTariff {
            table: table.clone(),
            loaded_at: Instant::now(),
        });
        Ok(table)
    }
}
