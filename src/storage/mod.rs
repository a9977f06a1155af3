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


//! Database storage and models
//!
//! This module handles all database operations using SQLite through sqlx.
//!
//! # Database Schema
//! - users: Readers and staff, with an active flag
//! - books: Catalog entries with `total_copies` / `available_copies`
//! - checkouts: One row per loan, never deleted
//! - inventory_adjustments: Append-only audit of staff copy changes
//!
//! # Usage Example
//! ```no_run
//! use circulation_core::config::DatabaseConfig;
//! use circulation_core::storage::{Database, queries, models::NewBook};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./circulation.db", &DatabaseConfig::default()).await?;
//!
//! let book_id = queries::insert_book(db.pool(), &NewBook::new("Dune", "Frank Herbert", 2)).await?;
//! let book = queries::find_book(db.pool(), book_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

// Re-export commonly used types
pub use database::Database;
pub use models::{
    Book, BookId, Checkout, CheckoutId, CheckoutStatus, InventoryAdjustment, Money, NewBook,
    NewUser, Role, User, UserId,
};
