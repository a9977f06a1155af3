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


//! Database models for Circulation
//!
//! Rust structs mirroring the tables created in `migrations.rs`.
//!
//! # Model Types
//! - Entity structs (Book, User, Checkout, InventoryAdjustment) read back from the database
//! - New* structs for insertion (without generated fields)
//! - Id newtypes and enums for typed columns
//!
//! # Timestamps
//! All timestamps are stored as fixed-width RFC 3339 UTC text, see
//! [`format_timestamp`]. Lexical order of the stored text equals
//! chronological order, so `due_date < ?` comparisons work in SQL.

use crate::error::{CirculationError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// User identifier (row id in `users`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Book identifier (row id in `books`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub i64);

/// Checkout identifier, generated when the checkout is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutId(pub Uuid);

impl CheckoutId {
    pub fn generate() -> Self {
        CheckoutId(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CheckoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CheckoutId {
    type Err = CirculationError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(CheckoutId(Uuid::parse_str(s)?))
    }
}

// ============================================================================
// ENUMS
// ============================================================================

/// Role of a library user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Staff => "staff",
        }
    }
}

impl FromStr for Role {
    type Err = CirculationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reader" => Ok(Role::Reader),
            "staff" => Ok(Role::Staff),
            _ => Err(CirculationError::InvalidState(format!("Invalid role: {}", s))),
        }
    }
}

/// Status of a checkout
///
/// `Overdue` is written by a late return, so it is terminal like `Returned`.
/// Rows may also carry `Overdue` with no return date when an outside process
/// flagged a loan that is still outstanding; those block new borrowing
/// until the book comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    Active,
    Returned,
    Overdue,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::Active => "active",
            CheckoutStatus::Returned => "returned",
            CheckoutStatus::Overdue => "overdue",
        }
    }
}

impl FromStr for CheckoutStatus {
    type Err = CirculationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(CheckoutStatus::Active),
            "returned" => Ok(CheckoutStatus::Returned),
            "overdue" => Ok(CheckoutStatus::Overdue),
            _ => Err(CirculationError::InvalidState(format!(
                "Invalid checkout status: {}",
                s
            ))),
        }
    }
}

// ============================================================================
// VALUE OBJECTS
// ============================================================================

/// Amount of money in minor currency units (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn times(&self, factor: i64) -> Money {
        Money(self.0.saturating_mul(factor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// Library user (reader or staff)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl NewUser {
    pub fn reader(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: Role::Reader,
        }
    }

    pub fn staff(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: Role::Staff,
        }
    }
}

/// Book and its copy counts
///
/// Invariant: `0 <= available_copies <= total_copies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub total_copies: i64,
    pub available_copies: i64,
    pub is_retired: bool,
}

impl Book {
    /// Copies currently lent out
    pub fn checked_out_copies(&self) -> i64 {
        self.total_copies - self.available_copies
    }
}

/// New book for insertion (all copies start available)
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub total_copies: i64,
}

impl NewBook {
    pub fn new(title: impl Into<String>, author: impl Into<String>, total_copies: i64) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: None,
            total_copies,
        }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }
}

/// A loan of one copy of a book to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkout {
    pub checkout_id: CheckoutId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: CheckoutStatus,
    pub is_late: bool,
    pub late_fee: Money,
}

impl Checkout {
    /// Fresh active checkout starting at `now`
    pub fn open(user_id: UserId, book_id: BookId, now: DateTime<Utc>, loan_days: i64) -> Self {
        Self {
            checkout_id: CheckoutId::generate(),
            user_id,
            book_id,
            checkout_date: now,
            due_date: now + chrono::Duration::days(loan_days),
            return_date: None,
            status: CheckoutStatus::Active,
            is_late: false,
            late_fee: Money::ZERO,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CheckoutStatus::Active
    }

    /// Not yet returned, whatever its status
    pub fn is_outstanding(&self) -> bool {
        self.return_date.is_none()
    }

    /// Active, or flagged overdue and not yet returned
    pub fn is_returnable(&self) -> bool {
        self.is_outstanding() && self.status != CheckoutStatus::Returned
    }

    /// Active and past its due date at `now`
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_date < now
    }

    /// Whether this checkout prevents its user from borrowing at `now`
    pub fn blocks_borrowing(&self, now: DateTime<Utc>) -> bool {
        self.is_past_due(now)
            || (self.status == CheckoutStatus::Overdue && self.is_outstanding())
    }
}

/// Audit record of a staff change to a book's total copies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub staff_id: UserId,
    pub book_id: BookId,
    pub previous_total: i64,
    pub new_total: i64,
    pub previous_available: i64,
    pub new_available: i64,
    pub adjusted_at: DateTime<Utc>,
}

// ============================================================================
// TIMESTAMP HELPERS
// ============================================================================

/// Format a timestamp for storage (fixed width, microseconds, `Z` suffix)
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_timestamp`]
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}
