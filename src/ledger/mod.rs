// Circulation - Library Checkout Ledger
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Checkout ledger
//!
//! Owns borrow / return / renew and staff inventory changes, the only
//! operations allowed to touch a book's `available_copies`.
//!
//! # Components
//! - `checkout_ledger`: [`CheckoutLedger`], the four operations
//! - `store`: [`LedgerStore`] / [`LedgerTx`], the injected persistence backend
//! - `sqlite`: relational backend on the crate's SQLite database
//! - `memory`: in-memory backend with deadlock injection
//! - `retry`: deadlock retry wrapper shared by all operations
//! - `policy`: day ranges, late-fee formula, copy arithmetic
//!
//! # Usage Example
//! ```no_run
//! use circulation_core::directory::SqliteUserDirectory;
//! use circulation_core::ledger::{CheckoutLedger, LedgerPolicy, SqliteLedgerStore};
//! use circulation_core::storage::{BookId, Database, UserId};
//! use std::sync::Arc;
//!
//! # async fn example(db: Database) -> circulation_core::error::Result<()> {
//! let ledger = CheckoutLedger::new(
//!     SqliteLedgerStore::from_database(&db),
//!     Arc::new(SqliteUserDirectory::new(db.pool().clone())),
//!     LedgerPolicy::default(),
//! );
//!
//! let receipt = ledger.borrow(UserId(1), BookId(7), 14).await?;
//! let returned = ledger.return_book(UserId(1), receipt.checkout.checkout_id).await?;
//! println!("late fee: {}", returned.late_fee);
//! # Ok(())
//! # }
//! ```

pub mod checkout_ledger;
pub mod memory;
pub mod policy;
pub mod retry;
pub mod sqlite;
pub mod store;

pub use checkout_ledger::{CheckoutLedger, CheckoutReceipt, ReturnReceipt};
pub use memory::MemoryLedgerStore;
pub use policy::{LateFee, LedgerPolicy};
pub use retry::RetryPolicy;
pub use sqlite::SqliteLedgerStore;
pub use store::{LedgerStore, LedgerTx};
