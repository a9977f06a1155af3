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


//! Persistence backend seam for the checkout ledger
//!
//! The ledger never talks to a connection pool directly. It is handed a
//! [`LedgerStore`] at construction and runs every operation inside one
//! [`LedgerTx`]. Backends guarantee:
//!
//! - Reads made through `lock_book` / `lock_checkout` hold the row (or a
//!   coarser lock) until the transaction ends, so concurrent ledger
//!   transactions on the same book are totally ordered.
//! - Nothing written through a `LedgerTx` is visible to anyone else before
//!   `commit`. `rollback`, or dropping the transaction, discards it all.
//! - Deadlocks and lock-wait timeouts surface as errors for which
//!   [`CirculationError::is_deadlock`](crate::error::CirculationError::is_deadlock)
//!   is true, so the retry wrapper can restart the unit of work.

use crate::error::Result;
use crate::storage::models::{Book, BookId, Checkout, CheckoutId, InventoryAdjustment, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    /// Open a transaction (REPEATABLE READ or stronger)
    async fn begin(&self) -> Result<Self::Tx>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Whether the user has an active loan past due at `now`, or a loan
    /// flagged overdue that has not been returned
    async fn has_overdue_items(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<bool>;

    async fn has_active_checkout(&mut self, user_id: UserId, book_id: BookId) -> Result<bool>;

    /// Read the book, holding its lock until the transaction ends
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>>;

    async fn write_book_copies(&mut self, book_id: BookId, total: i64, available: i64) -> Result<()>;

    async fn insert_checkout(&mut self, checkout: &Checkout) -> Result<()>;

    /// Read the checkout, holding its lock until the transaction ends
    async fn lock_checkout(&mut self, checkout_id: CheckoutId) -> Result<Option<Checkout>>;

    /// Persist due date, return date, status, lateness and fee
    async fn update_checkout(&mut self, checkout: &Checkout) -> Result<()>;

    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
