use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::period::Granularity;

/// How a resident's obligation for a period is considered settled.
///
/// `Watermark` schemes (the daily night-watch levy) let residents prepay a
/// lump sum that advances a paid-until date; `PaidSet` schemes (monthly
/// solidarity and youth dues) track an explicit set of settled period keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SettlementRule {
    Watermark,
    PaidSet,
}

/// Descriptor for one dues scheme: the generic abstraction behind the
/// night-watch, solidarity, and youth-fund ledgers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuesScheme {
    pub name: String,
    /// Short label used in treasury transaction codes, e.g. "KAS".
    pub category_label: String,
    pub granularity: Granularity,
    pub settlement: SettlementRule,
}

impl DuesScheme {
    pub fn new(
        name: impl Into<String>,
        category_label: impl Into<String>,
        granularity: Granularity,
        settlement: SettlementRule,
    ) -> Self {
        Self {
            name: name.into(),
            category_label: category_label.into(),
            granularity,
            settlement,
        }
    }
}

/// Rates in force for a scheme, always passed explicitly into engine calls.
/// Entries snapshot the amount current at creation time, so changing these
/// never rewrites history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemeSettings {
    /// Price of one period unit, in whole rupiah.
    pub unit_amount: i64,
    /// Scheme-specific named amounts (e.g. the mandatory-kas share of the
    /// combined youth dues).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_amounts: BTreeMap<String, i64>,
}

impl SchemeSettings {
    pub fn new(unit_amount: i64) -> Self {
        Self {
            unit_amount,
            extra_amounts: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, amount: i64) -> Self {
        self.extra_amounts.insert(name.into(), amount);
        self
    }
}
