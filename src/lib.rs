#![doc(test(attr(deny(warnings))))]

//! Dues Core implements the periodic dues ledger and reconciliation engine
//! behind a residential community's night-watch levy, solidarity fund, and
//! youth-association lottery fund.

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod storage;
pub mod utils;

pub use crate::core::{CollectionNotifier, CollectionRecorded, DuesEngine};
pub use errors::{DuesError, DuesResult};
pub use ledger::{periods_of_year, Granularity, PeriodKey, SchemeLedger};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Dues Core tracing initialized.");
    });
}
