pub mod ledger_service;
pub mod lottery_service;
pub mod reconciliation_service;
pub mod status_service;

pub use ledger_service::LedgerService;
pub use lottery_service::LotteryService;
pub use reconciliation_service::{
    Deficiency, DeficiencyRow, PoolBalances, ReconciliationService,
};
pub use status_service::{StatusService, ToggleOutcome};
