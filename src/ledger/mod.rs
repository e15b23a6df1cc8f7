pub mod ledger;
pub mod period;

pub use ledger::{scheme_warnings, SchemeLedger};
pub use period::{periods_of_year, Granularity, PeriodKey};
