use tracing::info;
use uuid::Uuid;

use crate::domain::entry::{CollectionEntry, PaymentEntry};
use crate::domain::scheme::{SchemeSettings, SettlementRule};
use crate::errors::{DuesError, DuesResult};
use crate::ledger::ledger::SchemeLedger;
use crate::ledger::period::PeriodKey;

/// Result of a matrix-click toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    MarkedPaid,
    MarkedUnpaid,
}

/// Answers and flips "is resident R settled for period P" under the
/// scheme's settlement rule.
pub struct StatusService;

impl StatusService {
    /// Whether the resident is settled for the period, regardless of how
    /// (cash collection vs. prepayment watermark).
    pub fn is_satisfied(ledger: &SchemeLedger, resident_id: Uuid, period: &PeriodKey) -> bool {
        match ledger.scheme.settlement {
            SettlementRule::Watermark => {
                let covered_by_watermark = match (ledger.watermark(resident_id), period.first_day())
                {
                    (Some(watermark), Some(day)) => day <= watermark,
                    _ => false,
                };
                if covered_by_watermark {
                    return true;
                }
                period
                    .first_day()
                    .and_then(|day| ledger.collection_for_date(day))
                    .map(|entry| entry.cash_paid_residents.contains(&resident_id))
                    .unwrap_or(false)
            }
            SettlementRule::PaidSet => ledger
                .paid_set(resident_id)
                .map(|set| set.contains(period))
                .unwrap_or(false),
        }
    }

    /// Compare-and-sets the settlement status for one resident and period.
    ///
    /// Unsatisfied periods gain a single-period entry; periods satisfied via
    /// a discrete entry lose it symmetrically (emptied entries are deleted).
    /// Periods covered only by a prepayment watermark cannot be un-toggled:
    /// there is no entry to remove and watermarks are never rolled back.
    /// Branching on current status makes rapid double-invocation idempotent.
    pub fn toggle(
        ledger: &mut SchemeLedger,
        settings: &SchemeSettings,
        resident_id: Uuid,
        period: &PeriodKey,
        recorded_by: &str,
    ) -> DuesResult<ToggleOutcome> {
        if !ledger.has_resident(resident_id) {
            return Err(DuesError::validation(format!(
                "resident {} is not in the active registry",
                resident_id
            )));
        }
        if period.granularity() != Some(ledger.scheme.granularity) {
            return Err(DuesError::validation(format!(
                "period `{}` does not match the scheme's {} granularity",
                period,
                ledger.scheme.granularity.label()
            )));
        }

        let outcome = match ledger.scheme.settlement {
            SettlementRule::Watermark => {
                Self::toggle_collection(ledger, settings, resident_id, period, recorded_by)?
            }
            SettlementRule::PaidSet => {
                Self::toggle_paid_set(ledger, settings, resident_id, period)?
            }
        };
        ledger.touch();
        info!(
            scheme = %ledger.scheme.name,
            resident = %resident_id,
            period = %period,
            ?outcome,
            "toggled settlement status"
        );
        Ok(outcome)
    }

    fn toggle_collection(
        ledger: &mut SchemeLedger,
        settings: &SchemeSettings,
        resident_id: Uuid,
        period: &PeriodKey,
        recorded_by: &str,
    ) -> DuesResult<ToggleOutcome> {
        let day = period
            .first_day()
            .ok_or_else(|| DuesError::validation(format!("unparseable period `{}`", period)))?;

        let covered_by_watermark = ledger
            .watermark(resident_id)
            .map(|watermark| day <= watermark)
            .unwrap_or(false);

        let in_cash_list = ledger
            .collection_for_date(day)
            .map(|entry| entry.cash_paid_residents.contains(&resident_id))
            .unwrap_or(false);

        if in_cash_list {
            let entry = ledger
                .collection_for_date_mut(day)
                .ok_or_else(|| DuesError::Inconsistent(format!("no collection entry for {day}")))?;
            entry.cash_paid_residents.retain(|id| *id != resident_id);
            entry.refresh_total();
            let amount = entry.unit_amount;
            if entry.is_empty() {
                ledger.collections.retain(|entry| entry.date != day);
            }
            ledger.dues_income_total -= amount;
            return Ok(ToggleOutcome::MarkedUnpaid);
        }

        if covered_by_watermark {
            return Err(DuesError::validation(format!(
                "period `{}` is covered by prepayment; the watermark is not rolled back",
                period
            )));
        }

        match ledger.collection_for_date_mut(day) {
            Some(entry) => {
                entry.cash_paid_residents.push(resident_id);
                entry.refresh_total();
                let amount = entry.unit_amount;
                ledger.dues_income_total += amount;
            }
            None => {
                let entry = CollectionEntry::new(
                    day,
                    recorded_by,
                    settings.unit_amount,
                    vec![resident_id],
                    Vec::new(),
                );
                ledger.dues_income_total += entry.total_cash_received;
                ledger.collections.push(entry);
            }
        }
        Ok(ToggleOutcome::MarkedPaid)
    }

    fn toggle_paid_set(
        ledger: &mut SchemeLedger,
        settings: &SchemeSettings,
        resident_id: Uuid,
        period: &PeriodKey,
    ) -> DuesResult<ToggleOutcome> {
        let currently_paid = ledger
            .paid_set(resident_id)
            .map(|set| set.contains(period))
            .unwrap_or(false);

        if currently_paid {
            let entry = ledger
                .payments
                .iter_mut()
                .find(|entry| entry.resident_id == resident_id && entry.periods.contains(period))
                .ok_or_else(|| {
                    DuesError::Inconsistent(format!(
                        "paid-set period {} for resident {} has no ledger entry",
                        period, resident_id
                    ))
                })?;
            entry.periods.retain(|p| p != period);
            entry.refresh_total();
            let amount = entry.amount_per_period;
            let emptied = entry.periods.is_empty();
            let entry_id = entry.id;
            if emptied {
                ledger.payments.retain(|entry| entry.id != entry_id);
            }
            if let Some(set) = ledger.paid_sets.get_mut(&resident_id) {
                set.remove(period);
            }
            ledger.dues_income_total -= amount;
            Ok(ToggleOutcome::MarkedUnpaid)
        } else {
            let name = ledger
                .resident(resident_id)
                .map(|resident| resident.display_name.clone())
                .unwrap_or_default();
            let entry = PaymentEntry::new(
                resident_id,
                name,
                settings.unit_amount,
                vec![period.clone()],
            );
            ledger.dues_income_total += entry.total_paid;
            ledger.payments.push(entry);
            ledger
                .paid_sets
                .entry(resident_id)
                .or_default()
                .insert(period.clone());
            Ok(ToggleOutcome::MarkedPaid)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::resident::Resident;
    use crate::domain::scheme::DuesScheme;
    use crate::ledger::period::Granularity;

    fn paid_set_ledger() -> (SchemeLedger, Uuid) {
        let mut ledger = SchemeLedger::new(
            DuesScheme::new(
                "solidarity",
                "SOL",
                Granularity::Monthly,
                SettlementRule::PaidSet,
            ),
            SchemeSettings::new(50_000),
        );
        let id = ledger.add_resident(Resident::new("Citra"));
        (ledger, id)
    }

    fn watermark_ledger() -> (SchemeLedger, Uuid) {
        let mut ledger = SchemeLedger::new(
            DuesScheme::new(
                "jimpitan",
                "JMP",
                Granularity::Daily,
                SettlementRule::Watermark,
            ),
            SchemeSettings::new(1_000),
        );
        let id = ledger.add_resident(Resident::new("Agus"));
        (ledger, id)
    }

    fn month(m: u32) -> PeriodKey {
        PeriodKey::of(
            NaiveDate::from_ymd_opt(2024, m, 1).unwrap(),
            Granularity::Monthly,
        )
    }

    #[test]
    fn toggle_creates_then_removes_single_period_entry() {
        let (mut ledger, resident) = paid_set_ledger();
        let settings = ledger.settings.clone();
        let period = month(3);

        let outcome = StatusService::toggle(&mut ledger, &settings, resident, &period, "admin")
            .expect("first toggle");
        assert_eq!(outcome, ToggleOutcome::MarkedPaid);
        assert!(StatusService::is_satisfied(&ledger, resident, &period));
        assert_eq!(ledger.payments.len(), 1);
        assert_eq!(ledger.dues_income_total, 50_000);

        let outcome = StatusService::toggle(&mut ledger, &settings, resident, &period, "admin")
            .expect("second toggle");
        assert_eq!(outcome, ToggleOutcome::MarkedUnpaid);
        assert!(!StatusService::is_satisfied(&ledger, resident, &period));
        assert!(ledger.payments.is_empty(), "emptied entry must be deleted");
        assert_eq!(ledger.dues_income_total, 0);
    }

    #[test]
    fn toggle_rejects_unknown_resident() {
        let (mut ledger, _) = paid_set_ledger();
        let settings = ledger.settings.clone();
        let err = StatusService::toggle(&mut ledger, &settings, Uuid::new_v4(), &month(1), "admin")
            .expect_err("unknown resident must fail");
        assert!(matches!(err, DuesError::Validation(_)));
    }

    #[test]
    fn toggle_rejects_mismatched_granularity() {
        let (mut ledger, resident) = watermark_ledger();
        let settings = ledger.settings.clone();
        let err = StatusService::toggle(&mut ledger, &settings, resident, &month(1), "admin")
            .expect_err("monthly key on a daily scheme must fail");
        assert!(matches!(err, DuesError::Validation(_)));
    }

    #[test]
    fn watermark_covered_period_cannot_be_untoggled() {
        let (mut ledger, resident) = watermark_ledger();
        let settings = ledger.settings.clone();
        ledger
            .watermarks
            .insert(resident, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let period = PeriodKey::of(
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            Granularity::Daily,
        );
        assert!(StatusService::is_satisfied(&ledger, resident, &period));
        let err = StatusService::toggle(&mut ledger, &settings, resident, &period, "admin")
            .expect_err("watermark coverage must reject the toggle");
        assert!(matches!(err, DuesError::Validation(_)));
    }

    #[test]
    fn cash_toggle_tracks_collection_entries() {
        let (mut ledger, resident) = watermark_ledger();
        let settings = ledger.settings.clone();
        let period = PeriodKey::of(
            NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            Granularity::Daily,
        );

        StatusService::toggle(&mut ledger, &settings, resident, &period, "pak rt")
            .expect("mark paid");
        assert_eq!(ledger.collections.len(), 1);
        assert_eq!(ledger.collections[0].total_cash_received, 1_000);
        assert!(StatusService::is_satisfied(&ledger, resident, &period));

        StatusService::toggle(&mut ledger, &settings, resident, &period, "pak rt")
            .expect("mark unpaid");
        assert!(ledger.collections.is_empty());
        assert_eq!(ledger.dues_income_total, 0);
    }
}
