use chrono::{Duration, NaiveDate};

/// Why a due date could not be projected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("category has no configured daily rate")]
    RateNotConfigured,
    #[error("balance funds {funded_days} days, beyond the calendar horizon")]
    HorizonTooFar { funded_days: i64 },
}

/// Project the next date a payment becomes due for one stream.
///
/// Pure and deterministic. A stream already carrying owing is due now
/// regardless of balance. A zero or absent daily rate is a configuration
/// gap surfaced as an error, never a division or a silently computed date.
pub fn project_due_date(
    today: NaiveDate,
    balance: u64,
    owing: u64,
    daily_rate: Option<u64>,
) -> Result<NaiveDate, ProjectionError> {
    let rate = match daily_rate {
        Some(rate) if rate > 0 => rate,
        _ => return Err(ProjectionError::RateNotConfigured),
    };

    if owing > 0 {
        return Ok(today);
    }

    let funded_days = (balance / rate) as i64;
    today
        .checked_add_signed(Duration::days(funded_days))
        .ok_or(ProjectionError::HorizonTooFar { funded_days })
}
