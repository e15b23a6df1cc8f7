use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::Identifiable;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    In,
    Out,
}

impl TransactionKind {
    pub fn code_label(&self) -> &'static str {
        match self {
            TransactionKind::In => "IN",
            TransactionKind::Out => "OUT",
        }
    }
}

/// Which sub-balance a treasury row affects. Dues income itself is derived
/// from the payment log, never from treasury rows; only explicitly
/// dues-tagged rows (such as lottery payouts) move the dues pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PoolTag {
    Dues,
    Operational,
}

/// Manually entered cash-ledger row: expenses, donations, lottery payouts.
/// `code` is a display convenience; `id` is the real identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreasuryTransaction {
    pub id: Uuid,
    pub code: String,
    pub kind: TransactionKind,
    #[serde(default = "PoolTag::operational_default")]
    pub pool: PoolTag,
    pub amount: i64,
    pub description: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
}

impl PoolTag {
    fn operational_default() -> Self {
        PoolTag::Operational
    }
}

impl TreasuryTransaction {
    pub fn new(
        code: impl Into<String>,
        kind: TransactionKind,
        pool: PoolTag,
        amount: i64,
        description: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            kind,
            pool,
            amount,
            description: description.into(),
            date,
            evidence_ref: None,
        }
    }

    pub fn with_evidence(mut self, evidence_ref: impl Into<String>) -> Self {
        self.evidence_ref = Some(evidence_ref.into());
        self
    }
}

impl Identifiable for TreasuryTransaction {
    fn id(&self) -> Uuid {
        self.id
    }
}
