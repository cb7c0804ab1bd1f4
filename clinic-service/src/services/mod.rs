pub mod booking;
pub mod database;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod query;
pub mod registry;
pub mod sequence;
pub mod store;
pub mod validator;

pub use booking::BookingEngine;
pub use database::Database;
pub use ledger::LedgerEngine;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use query::QueryFacade;
pub use registry::Registry;
pub use store::{BookingConflictPolicy, ClinicStore};
pub use validator::{Reference, ReferenceValidator};
