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


//! Database query functions
//!
//! Catalog and user seeding plus the read side of the checkout tables.
//! Nothing here enforces circulation rules: every mutation of copy counts or
//! checkout state goes through [`crate::ledger::CheckoutLedger`].
//!
//! # Query Patterns
//! - Free async functions over `&SqlitePool`
//! - Rows are mapped by hand (`row_to_*`) so that id newtypes, enums and
//!   timestamps are parsed in one place and shared with the ledger backend

use crate::error::{CirculationError, Result};
use crate::storage::models::*;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub(crate) const BOOK_COLUMNS: &str =
    "book_id, title, author, isbn, total_copies, available_copies, is_retired";

pub(crate) const CHECKOUT_COLUMNS: &str = "checkout_id, user_id, book_id, checkout_date, due_date, \
     return_date, status, is_late, late_fee_cents";

const ADJUSTMENT_COLUMNS: &str = "staff_id, book_id, previous_total, new_total, \
     previous_available, new_available, adjusted_at";

// ============================================================================
// ROW MAPPING
// ============================================================================

pub(crate) fn row_to_book(row: &SqliteRow) -> Result<Book> {
    Ok(Book {
        book_id: BookId(row.try_get("book_id")?),
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        isbn: row.try_get("isbn")?,
        total_copies: row.try_get("total_copies")?,
        available_copies: row.try_get("available_copies")?,
        is_retired: row.try_get("is_retired")?,
    })
}

pub(crate) fn row_to_checkout(row: &SqliteRow) -> Result<Checkout> {
    let checkout_id: String = row.try_get("checkout_id")?;
    let status: String = row.try_get("status")?;
    let checkout_date: String = row.try_get("checkout_date")?;
    let due_date: String = row.try_get("due_date")?;
    let return_date: Option<String> = row.try_get("return_date")?;

    Ok(Checkout {
        checkout_id: checkout_id
            .parse::<CheckoutId>()
            .map_err(|_| CirculationError::InvalidState(format!("Corrupt checkout id: {}", checkout_id)))?,
        user_id: UserId(row.try_get("user_id")?),
        book_id: BookId(row.try_get("book_id")?),
        checkout_date: parse_timestamp(&checkout_date)?,
        due_date: parse_timestamp(&due_date)?,
        return_date: return_date.as_deref().map(parse_timestamp).transpose()?,
        status: status.parse::<CheckoutStatus>()?,
        is_late: row.try_get("is_late")?,
        late_fee: Money::from_cents(row.try_get("late_fee_cents")?),
    })
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        user_id: UserId(row.try_get("user_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role.parse::<Role>()?,
        is_active: row.try_get("is_active")?,
    })
}

fn row_to_adjustment(row: &SqliteRow) -> Result<InventoryAdjustment> {
    let adjusted_at: String = row.try_get("adjusted_at")?;
    Ok(InventoryAdjustment {
        staff_id: UserId(row.try_get("staff_id")?),
        book_id: BookId(row.try_get("book_id")?),
        previous_total: row.try_get("previous_total")?,
        new_total: row.try_get("new_total")?,
        previous_available: row.try_get("previous_available")?,
        new_available: row.try_get("new_available")?,
        adjusted_at: parse_timestamp(&adjusted_at)?,
    })
}

fn rows_to_checkouts(rows: &[SqliteRow]) -> Result<Vec<Checkout>> {
    rows.iter().map(row_to_checkout).collect()
}

// ============================================================================
// BOOK QUERIES
// ============================================================================

/// Insert a new book with every copy available
///
/// Returns the book_id of the inserted book.
pub async fn insert_book(pool: &SqlitePool, book: &NewBook) -> Result<BookId> {
    if book.total_copies < 0 {
        return Err(CirculationError::invalid_argument(format!(
            "total_copies must be >= 0, got {}",
            book.total_copies
        )));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO books (title, author, isbn, total_copies, available_copies)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(book.total_copies)
    .bind(book.total_copies)
    .execute(pool)
    .await?;

    Ok(BookId(result.last_insert_rowid()))
}

/// Find book by ID
pub async fn find_book(pool: &SqlitePool, book_id: BookId) -> Result<Option<Book>> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE book_id = ?", BOOK_COLUMNS))
        .bind(book_id.0)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_book).transpose()
}

/// Retire a book from circulation, or bring it back
pub async fn set_book_retired(pool: &SqlitePool, book_id: BookId, retired: bool) -> Result<()> {
    let result = sqlx::query("UPDATE books SET is_retired = ? WHERE book_id = ?")
        .bind(retired)
        .bind(book_id.0)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CirculationError::not_found(format!("book {}", book_id)));
    }
    Ok(())
}

// ============================================================================
// USER QUERIES
// ============================================================================

/// Insert a new active user
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<UserId> {
    let result = sqlx::query("INSERT INTO users (name, email, role) VALUES (?, ?, ?)")
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .execute(pool)
        .await?;

    Ok(UserId(result.last_insert_rowid()))
}

/// Find user by ID
pub async fn find_user(pool: &SqlitePool, user_id: UserId) -> Result<Option<User>> {
    let row = sqlx::query("SELECT user_id, name, email, role, is_active FROM users WHERE user_id = ?")
        .bind(user_id.0)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

/// Activate or deactivate a user account
pub async fn set_user_active(pool: &SqlitePool, user_id: UserId, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE user_id = ?")
        .bind(active)
        .bind(user_id.0)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CirculationError::not_found(format!("user {}", user_id)));
    }
    Ok(())
}

// ============================================================================
// CHECKOUT QUERIES
// ============================================================================

/// Find checkout by ID
pub async fn find_checkout(pool: &SqlitePool, checkout_id: CheckoutId) -> Result<Option<Checkout>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM checkouts WHERE checkout_id = ?",
        CHECKOUT_COLUMNS
    ))
    .bind(checkout_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_checkout).transpose()
}

/// Active checkouts of one user, oldest due first
pub async fn list_active_checkouts_for_user(
    pool: &SqlitePool,
    user_id: UserId,
) -> Result<Vec<Checkout>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM checkouts WHERE user_id = ? AND status = 'active' ORDER BY due_date",
        CHECKOUT_COLUMNS
    ))
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    rows_to_checkouts(&rows)
}

/// Every checkout not yet returned, across all users
pub async fn list_unreturned_checkouts(pool: &SqlitePool) -> Result<Vec<Checkout>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM checkouts WHERE return_date IS NULL ORDER BY checkout_date",
        CHECKOUT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows_to_checkouts(&rows)
}

/// Loan history of a book, including returned checkouts, newest first
pub async fn list_checkout_history_for_book(
    pool: &SqlitePool,
    book_id: BookId,
) -> Result<Vec<Checkout>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM checkouts WHERE book_id = ? ORDER BY checkout_date DESC",
        CHECKOUT_COLUMNS
    ))
    .bind(book_id.0)
    .fetch_all(pool)
    .await?;

    rows_to_checkouts(&rows)
}

/// Outstanding loans that are past due (or flagged overdue) at `now`
pub async fn list_overdue_checkouts(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Checkout>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM checkouts
        WHERE (status = 'active' AND due_date < ?)
           OR (status = 'overdue' AND return_date IS NULL)
        ORDER BY due_date
        "#,
        CHECKOUT_COLUMNS
    ))
    .bind(format_timestamp(now))
    .fetch_all(pool)
    .await?;

    rows_to_checkouts(&rows)
}

/// Number of active checkouts of a book
pub async fn count_active_checkouts_for_book(pool: &SqlitePool, book_id: BookId) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM checkouts WHERE book_id = ? AND status = 'active'",
    )
    .bind(book_id.0)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

// ============================================================================
// INVENTORY AUDIT QUERIES
// ============================================================================

/// Audit trail of staff copy changes for a book, oldest first
pub async fn list_inventory_adjustments(
    pool: &SqlitePool,
    book_id: BookId,
) -> Result<Vec<InventoryAdjustment>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM inventory_adjustments WHERE book_id = ? ORDER BY adjustment_id",
        ADJUSTMENT_COLUMNS
    ))
    .bind(book_id.0)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_adjustment).collect()
}
