use chrono::NaiveDate;
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::core::services::{
    Deficiency, DeficiencyRow, LedgerService, LotteryService, PoolBalances,
    ReconciliationService, StatusService, ToggleOutcome,
};
use crate::domain::entry::PaymentEntry;
use crate::domain::resident::Resident;
use crate::domain::scheme::{DuesScheme, SchemeSettings};
use crate::domain::treasury::{PoolTag, TransactionKind};
use crate::errors::{DuesError, DuesResult};
use crate::ledger::ledger::{scheme_warnings, SchemeLedger};
use crate::ledger::period::PeriodKey;
use crate::storage::{KeyValueStore, StoreError};
use crate::utils::canonical_slug;

/// Summary payload forwarded to the notification side-channel after a
/// collection round is saved.
#[derive(Debug, Clone)]
pub struct CollectionRecorded {
    pub scheme: String,
    pub date: NaiveDate,
    pub collector_name: String,
    pub cash_paid_count: usize,
    pub total_cash_received: i64,
}

/// One-way, fire-and-forget hook for the surrounding application's email
/// collaborator. The engine never depends on delivery succeeding and never
/// rolls back on its account.
pub trait CollectionNotifier: Send + Sync {
    fn collection_recorded(&self, event: &CollectionRecorded);
}

/// Storage-coupled facade over the pure services. Every mutating operation
/// reads the freshest aggregate snapshot from the gateway, applies the
/// change, and writes the whole document back in one `set` (last-write-wins
/// per key; check-then-act narrows, not eliminates, concurrent-admin races).
pub struct DuesEngine<S: KeyValueStore> {
    store: S,
    notifier: Option<Box<dyn CollectionNotifier>>,
}

impl<S: KeyValueStore> DuesEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn CollectionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn scheme_key(name: &str) -> String {
        format!("scheme/{}", canonical_slug(name))
    }

    /// Creates and persists a fresh scheme ledger. Refuses to clobber an
    /// existing document of the same name.
    pub fn create_scheme(&self, scheme: DuesScheme, settings: SchemeSettings) -> DuesResult<()> {
        let key = Self::scheme_key(&scheme.name);
        if self.store.get(&key)?.is_some() {
            return Err(DuesError::validation(format!(
                "scheme `{}` already exists",
                scheme.name
            )));
        }
        let ledger = SchemeLedger::new(scheme, settings);
        self.persist(&key, &ledger)
    }

    pub fn load_scheme(&self, name: &str) -> DuesResult<SchemeLedger> {
        let key = Self::scheme_key(name);
        let value = self
            .store
            .get(&key)?
            .ok_or_else(|| DuesError::SchemeNotFound(name.to_string()))?;
        let ledger = serde_json::from_value(value).map_err(StoreError::from)?;
        Ok(ledger)
    }

    fn persist(&self, key: &str, ledger: &SchemeLedger) -> DuesResult<()> {
        let value = serde_json::to_value(ledger).map_err(StoreError::from)?;
        self.store.set(key, value)?;
        debug!(key, "scheme document persisted");
        Ok(())
    }

    /// Load-mutate-persist cycle shared by every mutating operation. If the
    /// closure fails nothing is written, so prior state stays untouched.
    fn mutate<T>(
        &self,
        name: &str,
        apply: impl FnOnce(&mut SchemeLedger) -> DuesResult<T>,
    ) -> DuesResult<T> {
        let mut ledger = self.load_scheme(name)?;
        let outcome = apply(&mut ledger)?;
        self.persist(&Self::scheme_key(name), &ledger)?;
        Ok(outcome)
    }

    // --- registry and settings -------------------------------------------

    pub fn add_resident(&self, scheme: &str, resident: Resident) -> DuesResult<Uuid> {
        self.mutate(scheme, |ledger| Ok(ledger.add_resident(resident)))
    }

    pub fn remove_resident(&self, scheme: &str, resident_id: Uuid) -> DuesResult<()> {
        self.mutate(scheme, |ledger| {
            ledger.remove_resident(resident_id).ok_or_else(|| {
                DuesError::validation(format!(
                    "resident {} is not in the active registry",
                    resident_id
                ))
            })?;
            Ok(())
        })
    }

    /// Replaces the rates in force. Past entries keep the amounts they were
    /// recorded with; only periods computed after this call see the change.
    pub fn update_settings(&self, scheme: &str, settings: SchemeSettings) -> DuesResult<()> {
        self.mutate(scheme, |ledger| {
            ledger.settings = settings;
            ledger.touch();
            Ok(())
        })
    }

    // --- settlement status -----------------------------------------------

    pub fn is_satisfied(
        &self,
        scheme: &str,
        resident_id: Uuid,
        period: &PeriodKey,
    ) -> DuesResult<bool> {
        let ledger = self.load_scheme(scheme)?;
        Ok(StatusService::is_satisfied(&ledger, resident_id, period))
    }

    pub fn toggle(
        &self,
        scheme: &str,
        resident_id: Uuid,
        period: &PeriodKey,
        recorded_by: &str,
    ) -> DuesResult<ToggleOutcome> {
        self.mutate(scheme, |ledger| {
            let settings = ledger.settings.clone();
            StatusService::toggle(ledger, &settings, resident_id, period, recorded_by)
        })
    }

    // --- entry logs -------------------------------------------------------

    pub fn record_collection(
        &self,
        scheme: &str,
        date: NaiveDate,
        collector_name: &str,
        cash_paid: Vec<Uuid>,
        prepaid: Vec<Uuid>,
    ) -> DuesResult<Uuid> {
        let mut ledger = self.load_scheme(scheme)?;
        let settings = ledger.settings.clone();
        let entry_id = LedgerService::append_collection(
            &mut ledger,
            &settings,
            date,
            collector_name,
            cash_paid,
            prepaid,
        )?;
        let event = ledger
            .collections
            .iter()
            .find(|entry| entry.id == entry_id)
            .map(|entry| CollectionRecorded {
                scheme: ledger.scheme.name.clone(),
                date: entry.date,
                collector_name: entry.collector_name.clone(),
                cash_paid_count: entry.cash_paid_residents.len(),
                total_cash_received: entry.total_cash_received,
            });
        self.persist(&Self::scheme_key(scheme), &ledger)?;
        if let (Some(notifier), Some(event)) = (self.notifier.as_ref(), event) {
            notifier.collection_recorded(&event);
        }
        Ok(entry_id)
    }

    pub fn remove_collection(&self, scheme: &str, entry_id: Uuid) -> DuesResult<()> {
        self.mutate(scheme, |ledger| {
            LedgerService::remove_collection(ledger, entry_id)
        })
    }

    pub fn record_payment(
        &self,
        scheme: &str,
        resident_id: Uuid,
        periods: Vec<PeriodKey>,
    ) -> DuesResult<Uuid> {
        self.mutate(scheme, |ledger| {
            let settings = ledger.settings.clone();
            LedgerService::append_payment(ledger, &settings, resident_id, periods)
        })
    }

    pub fn remove_payment(&self, scheme: &str, entry_id: Uuid) -> DuesResult<()> {
        self.mutate(scheme, |ledger| LedgerService::remove_payment(ledger, entry_id))
    }

    pub fn payments_by_resident(
        &self,
        scheme: &str,
        resident_id: Uuid,
    ) -> DuesResult<Vec<PaymentEntry>> {
        let ledger = self.load_scheme(scheme)?;
        Ok(LedgerService::payments_by_resident(&ledger, resident_id)
            .into_iter()
            .cloned()
            .collect())
    }

    // --- reconciliation ---------------------------------------------------

    pub fn advance_prepayment(
        &self,
        scheme: &str,
        resident_id: Uuid,
        amount: i64,
        reference_date: NaiveDate,
    ) -> DuesResult<NaiveDate> {
        self.mutate(scheme, |ledger| {
            let settings = ledger.settings.clone();
            ReconciliationService::advance_prepayment(
                ledger,
                &settings,
                resident_id,
                amount,
                reference_date,
            )
        })
    }

    pub fn compute_deficiency(
        &self,
        scheme: &str,
        resident_id: Uuid,
        through: &PeriodKey,
    ) -> DuesResult<Deficiency> {
        let ledger = self.load_scheme(scheme)?;
        ReconciliationService::compute_deficiency(&ledger, &ledger.settings, resident_id, through)
    }

    pub fn deficiency_report(
        &self,
        scheme: &str,
        through: &PeriodKey,
    ) -> DuesResult<Vec<DeficiencyRow>> {
        let ledger = self.load_scheme(scheme)?;
        ReconciliationService::deficiency_report(&ledger, &ledger.settings, through)
    }

    pub fn pool_balances(&self, scheme: &str) -> DuesResult<PoolBalances> {
        let ledger = self.load_scheme(scheme)?;
        Ok(ReconciliationService::pool_balances(&ledger))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_treasury(
        &self,
        scheme: &str,
        kind: TransactionKind,
        pool: PoolTag,
        amount: i64,
        description: &str,
        date: NaiveDate,
        evidence_ref: Option<String>,
    ) -> DuesResult<Uuid> {
        self.mutate(scheme, |ledger| {
            ReconciliationService::record_treasury(
                ledger,
                kind,
                pool,
                amount,
                description,
                date,
                evidence_ref,
            )
        })
    }

    pub fn remove_treasury(&self, scheme: &str, id: Uuid) -> DuesResult<()> {
        self.mutate(scheme, |ledger| {
            ReconciliationService::remove_treasury(ledger, id)
        })
    }

    // --- lottery ----------------------------------------------------------

    /// Draws a winner for presentation. No side effect is persisted; the
    /// payout happens only through `confirm_payout`.
    pub fn draw_winner(&self, scheme: &str) -> DuesResult<Uuid> {
        self.draw_winner_with(scheme, &mut rand::thread_rng())
    }

    pub fn draw_winner_with<R: Rng>(&self, scheme: &str, rng: &mut R) -> DuesResult<Uuid> {
        let ledger = self.load_scheme(scheme)?;
        LotteryService::draw_winner(&ledger, rng)
    }

    /// Confirms the payout against a freshly loaded snapshot, so a balance
    /// captured during the draw animation is never paid out stale.
    pub fn confirm_payout(
        &self,
        scheme: &str,
        winner_id: Uuid,
        date: NaiveDate,
    ) -> DuesResult<Uuid> {
        self.mutate(scheme, |ledger| {
            LotteryService::confirm_payout(ledger, winner_id, date)
        })
    }

    // --- diagnostics ------------------------------------------------------

    pub fn warnings(&self, scheme: &str) -> DuesResult<Vec<String>> {
        let ledger = self.load_scheme(scheme)?;
        Ok(scheme_warnings(&ledger))
    }

    pub fn verify(&self, scheme: &str) -> DuesResult<()> {
        let ledger = self.load_scheme(scheme)?;
        ReconciliationService::verify_income_total(&ledger)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::domain::scheme::SettlementRule;
    use crate::ledger::period::Granularity;
    use crate::storage::MemoryStore;

    fn daily_engine() -> DuesEngine<MemoryStore> {
        let engine = DuesEngine::new(MemoryStore::new());
        engine
            .create_scheme(
                DuesScheme::new(
                    "jimpitan",
                    "JMP",
                    Granularity::Daily,
                    SettlementRule::Watermark,
                ),
                SchemeSettings::new(1_000),
            )
            .expect("create scheme");
        engine
    }

    #[test]
    fn create_refuses_duplicate_scheme() {
        let engine = daily_engine();
        let err = engine
            .create_scheme(
                DuesScheme::new(
                    "jimpitan",
                    "JMP",
                    Granularity::Daily,
                    SettlementRule::Watermark,
                ),
                SchemeSettings::new(1_000),
            )
            .expect_err("duplicate scheme must fail");
        assert!(matches!(err, DuesError::Validation(_)));
    }

    #[test]
    fn missing_scheme_surfaces_not_found() {
        let engine = DuesEngine::new(MemoryStore::new());
        let err = engine.load_scheme("nowhere").expect_err("must fail");
        assert!(matches!(err, DuesError::SchemeNotFound(_)));
    }

    struct CountingNotifier(Arc<AtomicUsize>);

    impl CollectionNotifier for CountingNotifier {
        fn collection_recorded(&self, event: &CollectionRecorded) {
            assert_eq!(event.scheme, "jimpitan");
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn collection_save_fires_notifier_after_persist() {
        let fired = Arc::new(AtomicUsize::new(0));
        let engine = DuesEngine::new(MemoryStore::new())
            .with_notifier(Box::new(CountingNotifier(Arc::clone(&fired))));
        engine
            .create_scheme(
                DuesScheme::new(
                    "jimpitan",
                    "JMP",
                    Granularity::Daily,
                    SettlementRule::Watermark,
                ),
                SchemeSettings::new(1_000),
            )
            .expect("create scheme");
        let resident = engine
            .add_resident("jimpitan", Resident::new("Agus"))
            .expect("add resident");
        engine
            .record_collection(
                "jimpitan",
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                "pak rt",
                vec![resident],
                Vec::new(),
            )
            .expect("record collection");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn settings_update_does_not_rewrite_history() {
        let engine = daily_engine();
        let resident = engine
            .add_resident("jimpitan", Resident::new("Agus"))
            .expect("add resident");
        engine
            .record_collection(
                "jimpitan",
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                "pak rt",
                vec![resident],
                Vec::new(),
            )
            .expect("collection at 1000");
        engine
            .update_settings("jimpitan", SchemeSettings::new(2_000))
            .expect("rate change");
        let ledger = engine.load_scheme("jimpitan").expect("load");
        assert_eq!(ledger.collections[0].unit_amount, 1_000);
        assert_eq!(ledger.settings.unit_amount, 2_000);
    }
}
