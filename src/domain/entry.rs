use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;
use crate::ledger::period::PeriodKey;

/// One collection round of a watermark scheme: the collector walks the
/// neighborhood on `date` and records who paid cash and who was already
/// covered by prepayment. `total_cash_received` is derived and kept in sync
/// by the services; entries are never partially edited except through the
/// symmetric toggle path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub collector_name: String,
    /// Unit price in force when the round was recorded.
    pub unit_amount: i64,
    #[serde(default)]
    pub cash_paid_residents: Vec<Uuid>,
    #[serde(default)]
    pub prepaid_residents: Vec<Uuid>,
    pub total_cash_received: i64,
}

impl CollectionEntry {
    pub fn new(
        date: NaiveDate,
        collector_name: impl Into<String>,
        unit_amount: i64,
        cash_paid_residents: Vec<Uuid>,
        prepaid_residents: Vec<Uuid>,
    ) -> Self {
        let total_cash_received = cash_paid_residents.len() as i64 * unit_amount;
        Self {
            id: Uuid::new_v4(),
            date,
            collector_name: collector_name.into(),
            unit_amount,
            cash_paid_residents,
            prepaid_residents,
            total_cash_received,
        }
    }

    /// Recomputes the derived cash total after a membership change.
    pub fn refresh_total(&mut self) {
        self.total_cash_received = self.cash_paid_residents.len() as i64 * self.unit_amount;
    }

    pub fn is_empty(&self) -> bool {
        self.cash_paid_residents.is_empty() && self.prepaid_residents.is_empty()
    }
}

impl Identifiable for CollectionEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// One payment event of a paid-set scheme. A single entry may settle several
/// periods at once (back-payment); `total_paid` is derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEntry {
    pub id: Uuid,
    pub resident_id: Uuid,
    /// Name snapshot so history survives registry deletions.
    pub resident_name: String,
    pub amount_per_period: i64,
    pub periods: Vec<PeriodKey>,
    pub total_paid: i64,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentEntry {
    pub fn new(
        resident_id: Uuid,
        resident_name: impl Into<String>,
        amount_per_period: i64,
        periods: Vec<PeriodKey>,
    ) -> Self {
        let total_paid = periods.len() as i64 * amount_per_period;
        Self {
            id: Uuid::new_v4(),
            resident_id,
            resident_name: resident_name.into(),
            amount_per_period,
            periods,
            total_paid,
            recorded_at: Utc::now(),
        }
    }

    pub fn refresh_total(&mut self) {
        self.total_paid = self.periods.len() as i64 * self.amount_per_period;
    }

    /// Most recent period this entry settles, used for recency ordering.
    pub fn latest_period(&self) -> Option<&PeriodKey> {
        self.periods.iter().max()
    }
}

impl Identifiable for PaymentEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}
