//! Data access for offline trace analysis: SQLite event logs written by the
//! instrumented ordering service, plus Etherscan transaction exports used to
//! characterize the submitted workload.

pub mod store;
pub mod transactions;
pub mod types;

pub use store::EventStore;
pub use transactions::TxRecord;
pub use types::{EventKind, EventRecord, RequestId};
