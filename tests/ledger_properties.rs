//! Property-style checks over the engine's documented invariants.

use chrono::NaiveDate;
use dues_core::core::DuesEngine;
use dues_core::domain::{DuesScheme, Resident, SchemeSettings, SettlementRule};
use dues_core::errors::DuesError;
use dues_core::ledger::{periods_of_year, Granularity, PeriodKey};
use dues_core::storage::MemoryStore;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn month_key(y: i32, m: u32) -> PeriodKey {
    PeriodKey::of(date(y, m, 1), Granularity::Monthly)
}

fn monthly_engine(unit_amount: i64) -> (DuesEngine<MemoryStore>, uuid::Uuid) {
    let engine = DuesEngine::new(MemoryStore::new());
    engine
        .create_scheme(
            DuesScheme::new(
                "solidarity",
                "SOL",
                Granularity::Monthly,
                SettlementRule::PaidSet,
            ),
            SchemeSettings::new(unit_amount),
        )
        .expect("create scheme");
    let resident = engine
        .add_resident("solidarity", Resident::new("Resident"))
        .expect("register");
    (engine, resident)
}

#[test]
fn double_toggle_returns_to_the_original_status() {
    let (engine, resident) = monthly_engine(50_000);
    for m in 1..=12 {
        let period = month_key(2024, m);
        let before = engine
            .is_satisfied("solidarity", resident, &period)
            .expect("status");
        engine
            .toggle("solidarity", resident, &period, "admin")
            .expect("first toggle");
        engine
            .toggle("solidarity", resident, &period, "admin")
            .expect("second toggle");
        let after = engine
            .is_satisfied("solidarity", resident, &period)
            .expect("status");
        assert_eq!(before, after);
    }
    let ledger = engine.load_scheme("solidarity").expect("load");
    assert!(ledger.payments.is_empty(), "no residual entries");
    assert_eq!(ledger.dues_income_total, 0);
}

#[test]
fn deficiency_equals_unsatisfied_period_count() {
    let (engine, resident) = monthly_engine(50_000);
    engine
        .record_payment(
            "solidarity",
            resident,
            vec![month_key(2024, 2), month_key(2024, 5), month_key(2024, 9)],
        )
        .expect("payment");

    let through = month_key(2024, 12);
    let expected = periods_of_year(2024, Granularity::Monthly)
        .into_iter()
        .filter(|period| {
            !engine
                .is_satisfied("solidarity", resident, period)
                .expect("status")
        })
        .count();
    let deficiency = engine
        .compute_deficiency("solidarity", resident, &through)
        .expect("deficiency");
    assert_eq!(deficiency.count, expected);
    assert_eq!(deficiency.amount_owed, expected as i64 * 50_000);
}

#[test]
fn watermark_is_monotonic_under_any_prepayment_sequence() {
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
    let resident = engine
        .add_resident("jimpitan", Resident::new("Resident"))
        .expect("register");

    let mut previous: Option<NaiveDate> = None;
    let tenders = [
        (5_000, date(2024, 1, 1)),
        (1_000, date(2024, 1, 2)),
        (12_500, date(2023, 12, 1)), // reference before the watermark
        (2_000, date(2024, 3, 1)),
    ];
    for (amount, reference) in tenders {
        let watermark = engine
            .advance_prepayment("jimpitan", resident, amount, reference)
            .expect("prepayment");
        if let Some(previous) = previous {
            assert!(watermark > previous, "watermark must never decrease");
        }
        previous = Some(watermark);
    }

    // A sub-unit tender fails validation and leaves the watermark alone.
    let before = engine
        .load_scheme("jimpitan")
        .expect("load")
        .watermark(resident);
    let err = engine
        .advance_prepayment("jimpitan", resident, 999, date(2024, 6, 1))
        .expect_err("sub-unit tender must fail");
    assert!(matches!(err, DuesError::Validation(_)));
    let after = engine
        .load_scheme("jimpitan")
        .expect("load")
        .watermark(resident);
    assert_eq!(before, after);
}

#[test]
fn removal_restores_status_for_every_covered_period() {
    let (engine, resident) = monthly_engine(50_000);
    let periods = vec![month_key(2024, 3), month_key(2024, 4), month_key(2024, 5)];
    let before: Vec<bool> = periods
        .iter()
        .map(|p| {
            engine
                .is_satisfied("solidarity", resident, p)
                .expect("status")
        })
        .collect();

    let entry = engine
        .record_payment("solidarity", resident, periods.clone())
        .expect("payment");
    engine
        .remove_payment("solidarity", entry)
        .expect("removal");

    let after: Vec<bool> = periods
        .iter()
        .map(|p| {
            engine
                .is_satisfied("solidarity", resident, p)
                .expect("status")
        })
        .collect();
    assert_eq!(before, after);
    assert!(engine.warnings("solidarity").expect("warnings").is_empty());
    engine.verify("solidarity").expect("income counter intact");
}

#[test]
fn appended_entry_round_trips_with_derived_totals() {
    let (engine, resident) = monthly_engine(25_000);
    engine
        .record_payment(
            "solidarity",
            resident,
            vec![month_key(2024, 1), month_key(2024, 2), month_key(2024, 3)],
        )
        .expect("payment");
    let history = engine
        .payments_by_resident("solidarity", resident)
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].total_paid,
        history[0].periods.len() as i64 * history[0].amount_per_period
    );
    assert_eq!(history[0].total_paid, 75_000);
}
