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


//! SQLite ledger backend
//!
//! SQLite locks the whole database for writing rather than individual rows.
//! Each transaction opened here bumps `ledger_write_lock` as its first
//! statement, which takes the write lock (waiting up to the configured busy
//! timeout). `lock_book` and `lock_checkout` are then plain reads: the lock
//! they promise is already held, and it covers every row.

use crate::error::{CirculationError, Result};
use crate::ledger::store::{LedgerStore, LedgerTx};
use crate::storage::models::*;
use crate::storage::queries::{row_to_book, row_to_checkout, BOOK_COLUMNS, CHECKOUT_COLUMNS};
use crate::storage::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub struct SqliteLedgerTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    type Tx = SqliteLedgerTx;

    async fn begin(&self) -> Result<SqliteLedgerTx> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE ledger_write_lock SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;

        Ok(SqliteLedgerTx { tx })
    }
}

#[async_trait]
impl LedgerTx for SqliteLedgerTx {
    async fn has_overdue_items(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<bool> {
        let blocked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM checkouts
                WHERE user_id = ?
                  AND ((status = 'active' AND due_date < ?)
                    OR (status = 'overdue' AND return_date IS NULL))
            )
            "#,
        )
        .bind(user_id.0)
        .bind(format_timestamp(now))
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(blocked)
    }

    async fn has_active_checkout(&mut self, user_id: UserId, book_id: BookId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM checkouts
                WHERE user_id = ? AND book_id = ? AND status = 'active'
            )
            "#,
        )
        .bind(user_id.0)
        .bind(book_id.0)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {} FROM books WHERE book_id = ?", BOOK_COLUMNS))
            .bind(book_id.0)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_book).transpose()
    }

    async fn write_book_copies(&mut self, book_id: BookId, total: i64, available: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE books SET total_copies = ?, available_copies = ? WHERE book_id = ?",
        )
        .bind(total)
        .bind(available)
        .bind(book_id.0)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(CirculationError::InvalidState(format!(
                "book {} vanished while locked",
                book_id
            )));
        }
        Ok(())
    }

    async fn insert_checkout(&mut self, checkout: &Checkout) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkouts (
                checkout_id, user_id, book_id, checkout_date, due_date,
                return_date, status, is_late, late_fee_cents
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(checkout.checkout_id.to_string())
        .bind(checkout.user_id.0)
        .bind(checkout.book_id.0)
        .bind(format_timestamp(checkout.checkout_date))
        .bind(format_timestamp(checkout.due_date))
        .bind(checkout.return_date.map(format_timestamp))
        .bind(checkout.status.as_str())
        .bind(checkout.is_late)
        .bind(checkout.late_fee.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_checkout(&mut self, checkout_id: CheckoutId) -> Result<Option<Checkout>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM checkouts WHERE checkout_id = ?",
            CHECKOUT_COLUMNS
        ))
        .bind(checkout_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_checkout).transpose()
    }

    async fn update_checkout(&mut self, checkout: &Checkout) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE checkouts SET
                due_date = ?, return_date = ?, status = ?, is_late = ?, late_fee_cents = ?
            WHERE checkout_id = ?
            "#,
        )
        .bind(format_timestamp(checkout.due_date))
        .bind(checkout.return_date.map(format_timestamp))
        .bind(checkout.status.as_str())
        .bind(checkout.is_late)
        .bind(checkout.late_fee.cents())
        .bind(checkout.checkout_id.to_string())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(CirculationError::InvalidState(format!(
                "checkout {} vanished while locked",
                checkout.checkout_id
            )));
        }
        Ok(())
    }

    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_adjustments (
                staff_id, book_id, previous_total, new_total,
                previous_available, new_available, adjusted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(adjustment.staff_id.0)
        .bind(adjustment.book_id.0)
        .bind(adjustment.previous_total)
        .bind(adjustment.new_total)
        .bind(adjustment.previous_available)
        .bind(adjustment.new_available)
        .bind(format_timestamp(adjustment.adjusted_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
