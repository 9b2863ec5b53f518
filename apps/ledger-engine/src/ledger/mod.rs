//! Order/fill ledger - the leaf data layer.

mod store;

pub use store::{FillLine, FillRevision, LedgerStore};
