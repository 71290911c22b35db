//! Transactions: states, changes, and the recovery unit driving them.

mod change;
mod recovery;
mod state;

pub use change::{Change, SimpleChange};
pub use recovery::{EngineRecoveryUnit, RecoveryUnit};
pub use state::TransactionState;
