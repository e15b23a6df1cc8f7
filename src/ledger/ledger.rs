use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entry::{CollectionEntry, PaymentEntry},
    resident::Resident,
    scheme::{DuesScheme, SchemeSettings},
    treasury::TreasuryTransaction,
};

use super::period::PeriodKey;

const CURRENT_SCHEMA_VERSION: u8 = 1;

/// The persisted aggregate for one dues scheme: registry, entry logs,
/// treasury rows, and the derived settlement state (watermarks and
/// paid-sets). Persisted as a single document so multi-part mutations
/// commit in one storage write.
///
/// `dues_income_total` is a running counter maintained alongside every
/// append/removal instead of re-scanning history per read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeLedger {
    pub id: Uuid,
    pub scheme: DuesScheme,
    pub settings: SchemeSettings,
    /// Registration order is significant: report ties break by position.
    #[serde(default)]
    pub residents: Vec<Resident>,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
    #[serde(default)]
    pub payments: Vec<PaymentEntry>,
    #[serde(default)]
    pub treasury: Vec<TreasuryTransaction>,
    /// Paid-until date per resident, watermark schemes only. Only increases.
    #[serde(default)]
    pub watermarks: BTreeMap<Uuid, NaiveDate>,
    /// Settled period keys per resident, paid-set schemes only.
    #[serde(default)]
    pub paid_sets: BTreeMap<Uuid, BTreeSet<PeriodKey>>,
    #[serde(default)]
    pub dues_income_total: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "SchemeLedger::schema_version_default")]
    pub schema_version: u8,
}

impl SchemeLedger {
    pub fn new(scheme: DuesScheme, settings: SchemeSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scheme,
            settings,
            residents: Vec::new(),
            collections: Vec::new(),
            payments: Vec::new(),
            treasury: Vec::new(),
            watermarks: BTreeMap::new(),
            paid_sets: BTreeMap::new(),
            dues_income_total: 0,
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn add_resident(&mut self, resident: Resident) -> Uuid {
        let id = resident.id;
        self.residents.push(resident);
        self.touch();
        id
    }

    /// Removes a resident from the active registry. Historical entries that
    /// reference the id are left untouched; `scheme_warnings` reports them.
    pub fn remove_resident(&mut self, id: Uuid) -> Option<Resident> {
        let position = self.residents.iter().position(|r| r.id == id)?;
        let removed = self.residents.remove(position);
        self.touch();
        Some(removed)
    }

    pub fn resident(&self, id: Uuid) -> Option<&Resident> {
        self.residents.iter().find(|resident| resident.id == id)
    }

    pub fn has_resident(&self, id: Uuid) -> bool {
        self.resident(id).is_some()
    }

    pub fn collection_for_date(&self, date: NaiveDate) -> Option<&CollectionEntry> {
        self.collections.iter().find(|entry| entry.date == date)
    }

    pub fn collection_for_date_mut(&mut self, date: NaiveDate) -> Option<&mut CollectionEntry> {
        self.collections.iter_mut().find(|entry| entry.date == date)
    }

    pub fn payment(&self, id: Uuid) -> Option<&PaymentEntry> {
        self.payments.iter().find(|entry| entry.id == id)
    }

    pub fn watermark(&self, resident_id: Uuid) -> Option<NaiveDate> {
        self.watermarks.get(&resident_id).copied()
    }

    pub fn paid_set(&self, resident_id: Uuid) -> Option<&BTreeSet<PeriodKey>> {
        self.paid_sets.get(&resident_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}

/// Detects dangling references and derived-state anomalies within a scheme
/// snapshot. Findings are surfaced, never auto-repaired: a silent repair
/// could hide a double payment or a lost payment.
pub fn scheme_warnings(ledger: &SchemeLedger) -> Vec<String> {
    let resident_ids: HashSet<_> = ledger.residents.iter().map(|r| r.id).collect();
    let mut warnings = Vec::new();

    for entry in &ledger.payments {
        if !resident_ids.contains(&entry.resident_id) {
            warnings.push(format!(
                "payment {} references resident {} absent from the registry",
                entry.id, entry.resident_id
            ));
        }
        for period in &entry.periods {
            let covered = ledger
                .paid_sets
                .get(&entry.resident_id)
                .map(|set| set.contains(period))
                .unwrap_or(false);
            if !covered {
                warnings.push(format!(
                    "payment {} covers period {} missing from the resident's paid-set",
                    entry.id, period
                ));
            }
        }
    }

    for (resident_id, periods) in &ledger.paid_sets {
        for period in periods {
            let backed = ledger.payments.iter().any(|entry| {
                entry.resident_id == *resident_id && entry.periods.contains(period)
            });
            if !backed {
                warnings.push(format!(
                    "paid-set period {} for resident {} has no ledger entry",
                    period, resident_id
                ));
            }
        }
    }

    for entry in &ledger.collections {
        for id in entry
            .cash_paid_residents
            .iter()
            .chain(entry.prepaid_residents.iter())
        {
            if !resident_ids.contains(id) {
                warnings.push(format!(
                    "collection {} references resident {} absent from the registry",
                    entry.id, id
                ));
            }
        }
        let expected = entry.cash_paid_residents.len() as i64 * entry.unit_amount;
        if entry.total_cash_received != expected {
            warnings.push(format!(
                "collection {} cash total {} does not match {} paid residents at {}",
                entry.id,
                entry.total_cash_received,
                entry.cash_paid_residents.len(),
                entry.unit_amount
            ));
        }
    }

    warnings
}
