use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::entry::{CollectionEntry, PaymentEntry};
use crate::domain::scheme::{SchemeSettings, SettlementRule};
use crate::errors::{DuesError, DuesResult};
use crate::ledger::ledger::SchemeLedger;
use crate::ledger::period::PeriodKey;

use super::status_service::StatusService;

/// Append/remove operations for the two entry logs. Removal rolls derived
/// status back in the same in-memory mutation; the aggregate persists as one
/// document, so callers get the two-step rollback atomically.
pub struct LedgerService;

impl LedgerService {
    /// Records one collection round for a watermark scheme. Residents listed
    /// as cash payers whose watermark already covers `date` are redundant;
    /// they are reclassified into the prepaid list rather than double
    /// counted.
    pub fn append_collection(
        ledger: &mut SchemeLedger,
        settings: &SchemeSettings,
        date: NaiveDate,
        collector_name: &str,
        cash_paid: Vec<Uuid>,
        prepaid: Vec<Uuid>,
    ) -> DuesResult<Uuid> {
        if ledger.scheme.settlement != SettlementRule::Watermark {
            return Err(DuesError::validation(
                "collection entries only apply to watermark schemes",
            ));
        }
        if cash_paid.is_empty() && prepaid.is_empty() {
            return Err(DuesError::validation(
                "a collection entry must list at least one resident",
            ));
        }
        if ledger.collection_for_date(date).is_some() {
            return Err(DuesError::validation(format!(
                "a collection entry already exists for {date}"
            )));
        }
        for id in cash_paid.iter().chain(prepaid.iter()) {
            if !ledger.has_resident(*id) {
                return Err(DuesError::validation(format!(
                    "resident {} is not in the active registry",
                    id
                )));
            }
        }

        let mut cash_list: Vec<Uuid> = Vec::new();
        let mut prepaid_list = dedupe(prepaid);
        for id in dedupe(cash_paid) {
            let covered = ledger
                .watermark(id)
                .map(|watermark| date <= watermark)
                .unwrap_or(false);
            if covered {
                warn!(
                    scheme = %ledger.scheme.name,
                    resident = %id,
                    %date,
                    "cash payment is redundant, resident already covered by prepayment"
                );
                if !prepaid_list.contains(&id) {
                    prepaid_list.push(id);
                }
            } else {
                cash_list.push(id);
            }
        }

        let entry = CollectionEntry::new(
            date,
            collector_name,
            settings.unit_amount,
            cash_list,
            prepaid_list,
        );
        let entry_id = entry.id;
        ledger.dues_income_total += entry.total_cash_received;
        info!(
            scheme = %ledger.scheme.name,
            %date,
            collector = collector_name,
            cash = entry.cash_paid_residents.len(),
            total = entry.total_cash_received,
            "collection round recorded"
        );
        ledger.collections.push(entry);
        ledger.touch();
        Ok(entry_id)
    }

    /// Deletes a collection entry and rolls the income counter back. Cash
    /// settlement is derived from entry membership, so removing the entry is
    /// already the full status rollback.
    pub fn remove_collection(ledger: &mut SchemeLedger, entry_id: Uuid) -> DuesResult<()> {
        let position = ledger
            .collections
            .iter()
            .position(|entry| entry.id == entry_id)
            .ok_or_else(|| {
                DuesError::validation(format!("collection entry {} not found", entry_id))
            })?;
        let removed = ledger.collections.remove(position);
        ledger.dues_income_total -= removed.total_cash_received;
        ledger.touch();
        Ok(())
    }

    /// Records one payment covering one or more periods for a paid-set
    /// scheme. Periods already satisfied are rejected before anything is
    /// mutated: accepting them would double count income.
    pub fn append_payment(
        ledger: &mut SchemeLedger,
        settings: &SchemeSettings,
        resident_id: Uuid,
        periods: Vec<PeriodKey>,
    ) -> DuesResult<Uuid> {
        if ledger.scheme.settlement != SettlementRule::PaidSet {
            return Err(DuesError::validation(
                "payment entries only apply to paid-set schemes",
            ));
        }
        if periods.is_empty() {
            return Err(DuesError::validation(
                "a payment entry must cover at least one period",
            ));
        }
        if !ledger.has_resident(resident_id) {
            return Err(DuesError::validation(format!(
                "resident {} is not in the active registry",
                resident_id
            )));
        }
        let periods = dedupe(periods);
        for period in &periods {
            if period.granularity() != Some(ledger.scheme.granularity) {
                return Err(DuesError::validation(format!(
                    "period `{}` does not match the scheme's {} granularity",
                    period,
                    ledger.scheme.granularity.label()
                )));
            }
            if StatusService::is_satisfied(ledger, resident_id, period) {
                return Err(DuesError::validation(format!(
                    "period `{}` is already settled for this resident",
                    period
                )));
            }
        }

        let name = ledger
            .resident(resident_id)
            .map(|resident| resident.display_name.clone())
            .unwrap_or_default();
        let entry = PaymentEntry::new(resident_id, name, settings.unit_amount, periods);
        let entry_id = entry.id;
        let set = ledger.paid_sets.entry(resident_id).or_default();
        for period in &entry.periods {
            set.insert(period.clone());
        }
        ledger.dues_income_total += entry.total_paid;
        info!(
            scheme = %ledger.scheme.name,
            resident = %resident_id,
            periods = entry.periods.len(),
            total = entry.total_paid,
            "payment recorded"
        );
        ledger.payments.push(entry);
        ledger.touch();
        Ok(entry_id)
    }

    /// Deletes a payment entry and symmetrically removes the covered periods
    /// from the resident's paid-set. All rollback preconditions are checked
    /// before anything is mutated, so a failed removal leaves the aggregate
    /// untouched.
    pub fn remove_payment(ledger: &mut SchemeLedger, entry_id: Uuid) -> DuesResult<()> {
        let position = ledger
            .payments
            .iter()
            .position(|entry| entry.id == entry_id)
            .ok_or_else(|| {
                DuesError::validation(format!("payment entry {} not found", entry_id))
            })?;
        let entry = &ledger.payments[position];
        let set = ledger.paid_sets.get(&entry.resident_id).ok_or_else(|| {
            DuesError::Inconsistent(format!(
                "payment {} exists but resident {} has no paid-set",
                entry.id, entry.resident_id
            ))
        })?;
        for period in &entry.periods {
            if !set.contains(period) {
                return Err(DuesError::Inconsistent(format!(
                    "payment {} covered period {} absent from the paid-set",
                    entry.id, period
                )));
            }
        }

        let removed = ledger.payments.remove(position);
        if let Some(set) = ledger.paid_sets.get_mut(&removed.resident_id) {
            for period in &removed.periods {
                set.remove(period);
            }
        }
        ledger.dues_income_total -= removed.total_paid;
        ledger.touch();
        Ok(())
    }

    /// Payment history for one resident, most recent period first.
    pub fn payments_by_resident(ledger: &SchemeLedger, resident_id: Uuid) -> Vec<&PaymentEntry> {
        let mut entries: Vec<&PaymentEntry> = ledger
            .payments
            .iter()
            .filter(|entry| entry.resident_id == resident_id)
            .collect();
        entries.sort_by(|a, b| b.latest_period().cmp(&a.latest_period()));
        entries
    }

    /// Collection rounds, most recent date first.
    pub fn collections_desc(ledger: &SchemeLedger) -> Vec<&CollectionEntry> {
        let mut entries: Vec<&CollectionEntry> = ledger.collections.iter().collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries
    }
}

fn dedupe<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
