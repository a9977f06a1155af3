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


//! Circulation rules that do not touch storage
//!
//! Range checks, the late-fee formula, and the copy arithmetic used when
//! staff resize a book's inventory. Kept pure so the rules can be tested
//! without a backend.

use crate::error::{CirculationError, Result};
use crate::ledger::retry::RetryPolicy;
use crate::storage::models::{Book, Money};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

/// Late fee charged per whole day past due (1.00)
pub const DEFAULT_FEE_PER_DAY: Money = Money(100);

/// Circulation rules applied by [`CheckoutLedger`](super::CheckoutLedger)
///
/// Built from configuration by `CirculationConfig::policy`; the default
/// matches the stock configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPolicy {
    pub loan_days: RangeInclusive<i64>,
    pub renewal_days: RangeInclusive<i64>,
    pub fee_per_day: Money,
    pub retry: RetryPolicy,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            loan_days: 1..=30,
            renewal_days: 1..=14,
            fee_per_day: DEFAULT_FEE_PER_DAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of the late-fee computation at return time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LateFee {
    pub days_late: i64,
    pub fee: Money,
}

impl LateFee {
    pub fn is_late(&self) -> bool {
        self.days_late > 0
    }
}

impl LedgerPolicy {
    pub fn check_loan_days(&self, loan_days: i64) -> Result<()> {
        check_range("loan days", loan_days, &self.loan_days)
    }

    pub fn check_renewal_days(&self, additional_days: i64) -> Result<()> {
        check_range("renewal days", additional_days, &self.renewal_days)
    }

    /// Whole days past `due_date` at `now` (never negative) and the fee owed
    pub fn late_fee(&self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> LateFee {
        // num_days truncates toward zero, which is floor for positive spans
        let days_late = (now - due_date).num_days().max(0);
        LateFee {
            days_late,
            fee: self.fee_per_day.times(days_late),
        }
    }
}

fn check_range(what: &str, value: i64, range: &RangeInclusive<i64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(CirculationError::invalid_argument(format!(
            "{} must be between {} and {}, got {}",
            what,
            range.start(),
            range.end(),
            value
        )))
    }
}

/// Available copies after staff set a new total
///
/// Copies already lent out stay lent out. Shrinking the total below that
/// number leaves nothing available rather than a negative count.
pub fn available_after_resize(book: &Book, new_total: i64) -> i64 {
    (new_total - book.checked_out_copies()).max(0)
}

/// Available copies after one copy comes back, capped at the total
pub fn available_after_return(total: i64, available: i64) -> i64 {
    (available + 1).min(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_loan_day_bounds() {
        let policy = LedgerPolicy::default();
        assert!(policy.check_loan_days(1).is_ok());
        assert!(policy.check_loan_days(30).is_ok());
        assert!(matches!(
            policy.check_loan_days(0),
            Err(CirculationError::InvalidArgument(_))
        ));
        assert!(policy.check_loan_days(31).is_err());
        assert!(policy.check_renewal_days(14).is_ok());
        assert!(policy.check_renewal_days(15).is_err());
    }

    #[test]
    fn test_on_time_return_has_no_fee() {
        let policy = LedgerPolicy::default();
        let fee = policy.late_fee(at(10, 12), at(10, 11));
        assert_eq!(fee.days_late, 0);
        assert_eq!(fee.fee, Money::ZERO);
        assert!(!fee.is_late());
    }

    #[test]
    fn test_partial_days_round_down() {
        let policy = LedgerPolicy::default();
        // 23 hours late is not a whole day
        assert_eq!(policy.late_fee(at(10, 0), at(10, 23)).days_late, 0);
        // 2 days and 5 hours late
        let fee = policy.late_fee(at(10, 0), at(12, 5));
        assert_eq!(fee.days_late, 2);
        assert_eq!(fee.fee, Money::from_cents(200));
    }

    #[test]
    fn test_one_day_loan_returned_three_days_later() {
        let policy = LedgerPolicy::default();
        let borrowed = at(1, 9);
        let due = borrowed + Duration::days(1);
        let fee = policy.late_fee(due, borrowed + Duration::days(3));
        assert_eq!(fee.days_late, 2);
        assert_eq!(fee.fee.to_string(), "2.00");
    }

    #[test]
    fn test_resize_never_goes_negative() {
        // 5 copies, 3 lent out
        let book = Book {
            book_id: crate::storage::models::BookId(1),
            title: "Middlemarch".to_string(),
            author: "George Eliot".to_string(),
            isbn: None,
            total_copies: 5,
            available_copies: 2,
            is_retired: false,
        };
        assert_eq!(book.checked_out_copies(), 3);
        assert_eq!(available_after_resize(&book, 8), 5);
        assert_eq!(available_after_resize(&book, 3), 0);
        assert_eq!(available_after_resize(&book, 1), 0);
        assert_eq!(available_after_resize(&book, 4), 1);
    }

    #[test]
    fn test_return_caps_at_total() {
        assert_eq!(available_after_return(3, 1), 2);
        assert_eq!(available_after_return(1, 1), 1);
    }
}
