pub mod ledger;

pub use ledger::{LedgerOutcome, SeatLedger, DEFAULT_MAX_CAS_ATTEMPTS};
