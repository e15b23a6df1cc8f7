use chrono::NaiveDate;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::domain::treasury::{PoolTag, TransactionKind};
use crate::errors::{DuesError, DuesResult};
use crate::ledger::ledger::SchemeLedger;

use super::reconciliation_service::ReconciliationService;

/// Rotating-fund lottery: one drawn member receives the entire accumulated
/// dues pool per cycle.
pub struct LotteryService;

impl LotteryService {
    /// Uniform draw over the active registry. Presentation-only: nothing is
    /// persisted until the payout is confirmed separately.
    pub fn draw_winner<R: Rng>(ledger: &SchemeLedger, rng: &mut R) -> DuesResult<Uuid> {
        if ledger.residents.is_empty() {
            return Err(DuesError::EmptyRoster);
        }
        let index = rng.gen_range(0..ledger.residents.len());
        Ok(ledger.residents[index].id)
    }

    /// Disburses the whole dues pool to the confirmed winner as a dues-tagged
    /// treasury debit. The pool balance is re-derived here, never reused from
    /// the draw animation, so concurrent entries recorded in between are
    /// reflected.
    pub fn confirm_payout(
        ledger: &mut SchemeLedger,
        winner_id: Uuid,
        date: NaiveDate,
    ) -> DuesResult<Uuid> {
        let winner_name = ledger
            .resident(winner_id)
            .map(|resident| resident.display_name.clone())
            .ok_or_else(|| {
                DuesError::validation(format!(
                    "winner {} is not in the active registry",
                    winner_id
                ))
            })?;

        let available = ReconciliationService::pool_balances(ledger).dues_pool;
        if available <= 0 {
            return Err(DuesError::InsufficientPool {
                requested: available.max(0),
                available,
            });
        }

        let id = ReconciliationService::record_treasury(
            ledger,
            TransactionKind::Out,
            PoolTag::Dues,
            available,
            &format!("Arisan payout to {}", winner_name),
            date,
            None,
        )?;
        info!(
            scheme = %ledger.scheme.name,
            winner = %winner_id,
            amount = available,
            "lottery payout confirmed"
        );
        Ok(id)
    }
}
