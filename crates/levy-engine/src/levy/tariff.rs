use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::domain::{LgaId, VehicleCategory};

/// Configured charge amounts consumed by the orchestrator. Policy input,
/// never hard-coded at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargePolicy {
    pub off_route_surcharge: u64,
    pub device_fee_daily: u64,
}

/// Daily levy rates keyed by (LGA, vehicle category).
///
/// Rates control money, so this table is never consulted directly by scans;
/// it flows through the registry's TTL cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TariffTable {
    rates: BTreeMap<(LgaId, VehicleCategory), u64>,
}

impl TariffTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, lga: LgaId, category: VehicleCategory, daily_rate: u64) {
        self.rates.insert((lga, category), daily_rate);
    }

    /// `None` means the category requires configuration for this LGA; a
    /// zero rate is stored as configured-but-free and also returned as-is.
    pub fn daily_rate(&self, lga: &LgaId, category: VehicleCategory) -> Option<u64> {
        self.rates.get(&(lga.clone(), category)).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Import a gazette fee schedule published as CSV with `lga`, `category`
    /// and `daily_rate` columns. Malformed rows reject the whole import so a
    /// partial schedule can never go live.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TariffImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = TariffTable::new();
        for (index, record) in csv_reader.deserialize::<TariffRow>().enumerate() {
            let row = record?;
            let line = index + 2;

            let category = VehicleCategory::from_label(&row.category).ok_or_else(|| {
                TariffImportError::UnknownCategory {
                    line,
                    value: row.category.clone(),
                }
            })?;

            let daily_rate =
                row.daily_rate
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| TariffImportError::InvalidRate {
                        line,
                        value: row.daily_rate.clone(),
                    })?;

            if row.lga.is_empty() {
                return Err(TariffImportError::MissingLga { line });
            }

            table.set_rate(LgaId(row.lga), category, daily_rate);
        }

        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct TariffRow {
    lga: String,
    category: String,
    daily_rate: String,
}

/// Row-level defects detected while ingesting a fee schedule.
#[derive(Debug, thiserror::Error)]
pub enum TariffImportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("line {line}: unknown vehicle category '{value}'")]
    UnknownCategory { line: usize, value: String },
    #[error("line {line}: daily rate '{value}' is not a whole amount")]
    InvalidRate { line: usize, value: String },
    #[error("line {line}: missing LGA identifier")]
    MissingLga { line: usize },
}
