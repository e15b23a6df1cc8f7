use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;
use uuid::Uuid;

use crate::domain::scheme::{SchemeSettings, SettlementRule};
use crate::domain::treasury::{PoolTag, TransactionKind, TreasuryTransaction};
use crate::errors::{DuesError, DuesResult};
use crate::ledger::ledger::SchemeLedger;
use crate::ledger::period::{periods_of_year, PeriodKey};

use super::status_service::StatusService;

/// Outstanding debt for one resident up to a reference period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deficiency {
    pub count: usize,
    pub amount_owed: i64,
}

/// One row of the cross-resident deficiency report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeficiencyRow {
    pub resident_id: Uuid,
    pub display_name: String,
    pub count: usize,
    pub amount_owed: i64,
}

/// The two named sub-balances of a shared pool. The dues pool accumulates
/// from periodic collections and is what a lottery payout may debit; manual
/// untagged treasury rows move the operational pool only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolBalances {
    pub dues_pool: i64,
    pub operational_pool: i64,
}

impl PoolBalances {
    pub fn total(&self) -> i64 {
        self.dues_pool + self.operational_pool
    }
}

/// Turns raw entries into money figures: watermark advancement, debt
/// reports, and pool balances.
pub struct ReconciliationService;

impl ReconciliationService {
    /// Advances a resident's paid-until watermark by the whole number of
    /// period units covered by `amount`. The new watermark stacks onto the
    /// later of the current watermark and `reference_date`; it never moves
    /// backwards and no ledger entry is written by this path.
    pub fn advance_prepayment(
        ledger: &mut SchemeLedger,
        settings: &SchemeSettings,
        resident_id: Uuid,
        amount: i64,
        reference_date: NaiveDate,
    ) -> DuesResult<NaiveDate> {
        if ledger.scheme.settlement != SettlementRule::Watermark {
            return Err(DuesError::validation(
                "prepayment only applies to watermark schemes",
            ));
        }
        if settings.unit_amount <= 0 {
            return Err(DuesError::validation("unit amount must be positive"));
        }
        if !ledger.has_resident(resident_id) {
            return Err(DuesError::validation(format!(
                "resident {} is not in the active registry",
                resident_id
            )));
        }
        let days = amount / settings.unit_amount;
        if days <= 0 {
            return Err(DuesError::validation(format!(
                "amount {} is below one unit price of {}",
                amount, settings.unit_amount
            )));
        }

        let base = match ledger.watermark(resident_id) {
            Some(watermark) => watermark.max(reference_date),
            None => reference_date,
        };
        let new_watermark = Duration::try_days(days)
            .and_then(|span| base.checked_add_signed(span))
            .ok_or_else(|| {
                DuesError::validation(format!(
                    "amount {} covers {} days, past the representable date range",
                    amount, days
                ))
            })?;
        ledger.watermarks.insert(resident_id, new_watermark);
        ledger.touch();
        info!(
            scheme = %ledger.scheme.name,
            resident = %resident_id,
            amount,
            days,
            watermark = %new_watermark,
            "prepayment advanced watermark"
        );
        Ok(new_watermark)
    }

    /// Counts unsatisfied periods from the start of the through-period's
    /// year up to and including `through`.
    pub fn compute_deficiency(
        ledger: &SchemeLedger,
        settings: &SchemeSettings,
        resident_id: Uuid,
        through: &PeriodKey,
    ) -> DuesResult<Deficiency> {
        if !ledger.has_resident(resident_id) {
            return Err(DuesError::validation(format!(
                "resident {} is not in the active registry",
                resident_id
            )));
        }
        if through.granularity() != Some(ledger.scheme.granularity) {
            return Err(DuesError::validation(format!(
                "period `{}` does not match the scheme's {} granularity",
                through,
                ledger.scheme.granularity.label()
            )));
        }
        let year = through
            .year()
            .ok_or_else(|| DuesError::validation(format!("unparseable period `{}`", through)))?;

        let count = periods_of_year(year, ledger.scheme.granularity)
            .into_iter()
            .filter(|period| period <= through)
            .filter(|period| !StatusService::is_satisfied(ledger, resident_id, period))
            .count();
        Ok(Deficiency {
            count,
            amount_owed: count as i64 * settings.unit_amount,
        })
    }

    /// Deficiency across the whole registry, largest debtors first. Ties
    /// keep registration order (stable sort over the registry sequence).
    pub fn deficiency_report(
        ledger: &SchemeLedger,
        settings: &SchemeSettings,
        through: &PeriodKey,
    ) -> DuesResult<Vec<DeficiencyRow>> {
        let mut rows = Vec::with_capacity(ledger.residents.len());
        for resident in &ledger.residents {
            let deficiency = Self::compute_deficiency(ledger, settings, resident.id, through)?;
            rows.push(DeficiencyRow {
                resident_id: resident.id,
                display_name: resident.display_name.clone(),
                count: deficiency.count,
                amount_owed: deficiency.amount_owed,
            });
        }
        rows.sort_by(|a, b| b.amount_owed.cmp(&a.amount_owed));
        Ok(rows)
    }

    /// Derives the pool sub-balances. Dues income comes exclusively from the
    /// entry logs (via the running counter); treasury rows only ever adjust
    /// the side their tag names, so nothing is counted twice.
    pub fn pool_balances(ledger: &SchemeLedger) -> PoolBalances {
        let mut dues_pool = ledger.dues_income_total;
        let mut operational_pool = 0;
        for row in &ledger.treasury {
            let signed = match row.kind {
                TransactionKind::In => row.amount,
                TransactionKind::Out => -row.amount,
            };
            match row.pool {
                PoolTag::Dues => dues_pool += signed,
                PoolTag::Operational => operational_pool += signed,
            }
        }
        PoolBalances {
            dues_pool,
            operational_pool,
        }
    }

    /// Records a manual treasury row. A dues-tagged debit is checked against
    /// the freshly derived dues pool so the sub-balance never goes negative.
    pub fn record_treasury(
        ledger: &mut SchemeLedger,
        kind: TransactionKind,
        pool: PoolTag,
        amount: i64,
        description: &str,
        date: NaiveDate,
        evidence_ref: Option<String>,
    ) -> DuesResult<Uuid> {
        if amount <= 0 {
            return Err(DuesError::validation("treasury amount must be positive"));
        }
        if kind == TransactionKind::Out && pool == PoolTag::Dues {
            let available = Self::pool_balances(ledger).dues_pool;
            if amount > available {
                return Err(DuesError::InsufficientPool {
                    requested: amount,
                    available,
                });
            }
        }

        let code = Self::generate_transaction_code(ledger, kind, date);
        let mut row = TreasuryTransaction::new(code, kind, pool, amount, description, date);
        if let Some(evidence) = evidence_ref {
            row = row.with_evidence(evidence);
        }
        let id = row.id;
        info!(
            scheme = %ledger.scheme.name,
            code = %row.code,
            ?kind,
            amount,
            "treasury transaction recorded"
        );
        ledger.treasury.push(row);
        ledger.touch();
        Ok(id)
    }

    /// Deletes a manual treasury row by id.
    pub fn remove_treasury(ledger: &mut SchemeLedger, id: Uuid) -> DuesResult<()> {
        let position = ledger
            .treasury
            .iter()
            .position(|row| row.id == id)
            .ok_or_else(|| DuesError::validation(format!("treasury row {} not found", id)))?;
        ledger.treasury.remove(position);
        ledger.touch();
        Ok(())
    }

    /// Human-readable audit code `{seq}/{category}/{type}/{month}/{year}`
    /// where `seq` counts same-category rows within the year. Display
    /// convenience only; the row id is the real identity.
    pub fn generate_transaction_code(
        ledger: &SchemeLedger,
        kind: TransactionKind,
        date: NaiveDate,
    ) -> String {
        let seq = ledger
            .treasury
            .iter()
            .filter(|row| row.date.year() == date.year())
            .count()
            + 1;
        format!(
            "{:02}/{}/{}/{:02}/{}",
            seq,
            ledger.scheme.category_label,
            kind.code_label(),
            date.month(),
            date.year()
        )
    }

    /// Cross-checks the incremental income counter against a full re-scan of
    /// both entry logs. A mismatch is surfaced as corruption, not repaired.
    pub fn verify_income_total(ledger: &SchemeLedger) -> DuesResult<()> {
        let scanned: i64 = ledger
            .collections
            .iter()
            .map(|entry| entry.total_cash_received)
            .chain(ledger.payments.iter().map(|entry| entry.total_paid))
            .sum();
        if scanned != ledger.dues_income_total {
            return Err(DuesError::Inconsistent(format!(
                "running dues income {} disagrees with entry logs ({})",
                ledger.dues_income_total, scanned
            )));
        }
        Ok(())
    }
}
