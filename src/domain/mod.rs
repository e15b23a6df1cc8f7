pub mod common;
pub mod entry;
pub mod resident;
pub mod scheme;
pub mod treasury;

pub use common::{Displayable, Identifiable, NamedEntity};
pub use entry::{CollectionEntry, PaymentEntry};
pub use resident::Resident;
pub use scheme::{DuesScheme, SchemeSettings, SettlementRule};
pub use treasury::{PoolTag, TransactionKind, TreasuryTransaction};
