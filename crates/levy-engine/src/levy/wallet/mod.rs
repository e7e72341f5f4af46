pub mod schedule;

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{VehicleId, VehicleStatus};

/// The three independent fee streams carried by every vehicle wallet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStream {
    Operational,
    DeviceMaintenance,
    RouteSurcharge,
}

impl LedgerStream {
    pub const ALL: [LedgerStream; 3] = [
        LedgerStream::Operational,
        LedgerStream::DeviceMaintenance,
        LedgerStream::RouteSurcharge,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LedgerStream::Operational => "operational",
            LedgerStream::DeviceMaintenance => "device_maintenance",
            LedgerStream::RouteSurcharge => "route_surcharge",
        }
    }
}

/// Credit available and amount past due for one stream.
///
/// Amounts are whole naira; both fields are non-negative by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBalance {
    pub balance: u64,
    pub owing: u64,
}

impl StreamBalance {
    pub const ZERO: StreamBalance = StreamBalance {
        balance: 0,
        owing: 0,
    };

    pub fn is_settled(&self) -> bool {
        self.owing == 0
    }
}

/// Idempotency key for a ledger debit.
///
/// Scheduled ticks key on (stream, period) so a re-run scheduler cannot
/// double-charge a day; scan surcharges key on the scan timestamp so a
/// retried scan cannot double-charge while two distinct violations on the
/// same day both post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LedgerEntryKey {
    DailyAccrual {
        stream: LedgerStream,
        period: NaiveDate,
    },
    ScanSurcharge {
        at: DateTime<Utc>,
    },
}

/// Result of one accrual attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccrualOutcome {
    /// The tick landed: funded days debit the balance, unfunded shortfall
    /// converts to owing. Never both a credit and a debit in one tick.
    Applied {
        debited_balance: u64,
        added_owing: u64,
    },
    /// The entry key was seen before; state is untouched.
    AlreadyApplied,
}

impl AccrualOutcome {
    pub fn charged(&self) -> u64 {
        match self {
            AccrualOutcome::Applied {
                debited_balance,
                added_owing,
            } => debited_balance + added_owing,
            AccrualOutcome::AlreadyApplied => 0,
        }
    }
}

/// How a confirmed payment landed across debt and credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub cleared_owing: u64,
    pub credited_balance: u64,
}

/// The closed command set a wallet store applies under the per-vehicle lock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LedgerMutation {
    Accrue {
        stream: LedgerStream,
        amount: u64,
        period: NaiveDate,
    },
    Payment {
        stream: LedgerStream,
        amount: u64,
    },
    Surcharge {
        amount: u64,
        at: DateTime<Utc>,
    },
}

/// What a `LedgerMutation` did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MutationOutcome {
    Accrued(AccrualOutcome),
    Paid(PaymentReceipt),
    Surcharged(AccrualOutcome),
}

/// Per-vehicle multi-stream ledger.
///
/// Created at vehicle registration with every stream zero; mutated by the
/// daily tick, payment confirmations, and surcharge postings; never deleted.
/// Waiver freezing is the orchestrator's concern — the wallet itself only
/// guarantees arithmetic invariants and entry-key idempotency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    vehicle_id: VehicleId,
    operational: StreamBalance,
    device_maintenance: StreamBalance,
    route_surcharge: StreamBalance,
    applied_entries: BTreeSet<LedgerEntryKey>,
}

impl Wallet {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self {
            vehicle_id,
            operational: StreamBalance::ZERO,
            device_maintenance: StreamBalance::ZERO,
            route_surcharge: StreamBalance::ZERO,
            applied_entries: BTreeSet::new(),
        }
    }

    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    pub fn stream(&self, stream: LedgerStream) -> &StreamBalance {
        match stream {
            LedgerStream::Operational => &self.operational,
            LedgerStream::DeviceMaintenance => &self.device_maintenance,
            LedgerStream::RouteSurcharge => &self.route_surcharge,
        }
    }

    fn stream_mut(&mut self, stream: LedgerStream) -> &mut StreamBalance {
        match stream {
            LedgerStream::Operational => &mut self.operational,
            LedgerStream::DeviceMaintenance => &mut self.device_maintenance,
            LedgerStream::RouteSurcharge => &mut self.route_surcharge,
        }
    }

    /// Debit one tick: consume balance first, convert any shortfall to owing.
    ///
    /// Prepaid-with-overflow-to-debt: an unfunded day becomes debt rather
    /// than a failure. A repeated entry key leaves the wallet untouched.
    pub fn accrue(
        &mut self,
        stream: LedgerStream,
        amount: u64,
        key: LedgerEntryKey,
    ) -> AccrualOutcome {
        if !self.applied_entries.insert(key) {
            return AccrualOutcome::AlreadyApplied;
        }

        let entry = self.stream_mut(stream);
        if entry.balance >= amount {
            entry.balance -= amount;
            AccrualOutcome::Applied {
                debited_balance: amount,
                added_owing: 0,
            }
        } else {
            let debited = entry.balance;
            let shortfall = amount - entry.balance;
            entry.balance = 0;
            entry.owing += shortfall;
            AccrualOutcome::Applied {
                debited_balance: debited,
                added_owing: shortfall,
            }
        }
    }

    /// Apply a confirmed payment: debt clearance strictly before credit
    /// accumulation.
    pub fn apply_payment(&mut self, stream: LedgerStream, amount: u64) -> PaymentReceipt {
        let entry = self.stream_mut(stream);
        let cleared = entry.owing.min(amount);
        entry.owing -= cleared;
        let credited = amount - cleared;
        entry.balance += credited;

        PaymentReceipt {
            cleared_owing: cleared,
            credited_balance: credited,
        }
    }

    /// Route-violation charge, routed through `accrue` on the surcharge
    /// stream keyed by the scan timestamp.
    pub fn post_surcharge(&mut self, amount: u64, at: DateTime<Utc>) -> AccrualOutcome {
        self.accrue(
            LedgerStream::RouteSurcharge,
            amount,
            LedgerEntryKey::ScanSurcharge { at },
        )
    }

    pub fn apply(&mut self, mutation: LedgerMutation) -> MutationOutcome {
        match mutation {
            LedgerMutation::Accrue {
                stream,
                amount,
                period,
            } => MutationOutcome::Accrued(self.accrue(
                stream,
                amount,
                LedgerEntryKey::DailyAccrual { stream, period },
            )),
            LedgerMutation::Payment { stream, amount } => {
                MutationOutcome::Paid(self.apply_payment(stream, amount))
            }
            LedgerMutation::Surcharge { amount, at } => {
                MutationOutcome::Surcharged(self.post_surcharge(amount, at))
            }
        }
    }

    pub fn total_balance(&self) -> u64 {
        LedgerStream::ALL
            .into_iter()
            .map(|stream| self.stream(stream).balance)
            .sum()
    }

    pub fn total_owing(&self) -> u64 {
        LedgerStream::ALL
            .into_iter()
            .map(|stream| self.stream(stream).owing)
            .sum()
    }

    /// Net position across all streams, for privileged reporting only.
    pub fn net_position(&self) -> i64 {
        self.total_balance() as i64 - self.total_owing() as i64
    }

    pub fn has_outstanding(&self) -> bool {
        self.total_owing() > 0
    }

    /// Clearance gates on the operational stream specifically; owing on any
    /// stream only affects display standing.
    pub fn is_clear(&self, status: VehicleStatus) -> bool {
        status == VehicleStatus::Active && self.operational.is_settled()
    }

    pub fn balances(&self) -> StreamAmounts {
        StreamAmounts {
            operational: self.operational.balance,
            device_maintenance: self.device_maintenance.balance,
            route_surcharge: self.route_surcharge.balance,
        }
    }

    pub fn owings(&self) -> StreamAmounts {
        StreamAmounts {
            operational: self.operational.owing,
            device_maintenance: self.device_maintenance.owing,
            route_surcharge: self.route_surcharge.owing,
        }
    }

    pub fn status_view(&self, status: VehicleStatus, waived: bool) -> WalletStatusView {
        WalletStatusView {
            vehicle_id: self.vehicle_id.clone(),
            clear: !waived && self.is_clear(status),
            waived,
            balances: self.balances(),
            owings: self.owings(),
        }
    }
}

/// Per-stream amounts flattened for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAmounts {
    pub operational: u64,
    pub device_maintenance: u64,
    pub route_surcharge: u64,
}

/// Wallet standing as exposed to callers; net position is deliberately
/// omitted (privileged roles read it through `Wallet::net_position`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStatusView {
    pub vehicle_id: VehicleId,
    pub clear: bool,
    pub waived: bool,
    pub balances: StreamAmounts,
    pub owings: StreamAmounts,
}
