//! Circulation: checkout ledger for a lending library
//!
//! Borrowing, returning and renewing books and adjusting inventory, with
//! the copy counts kept consistent under concurrent requests.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod storage;

pub use error::{CirculationError, Result};
