pub mod engine;
pub mod services;

pub use engine::{CollectionNotifier, CollectionRecorded, DuesEngine};
