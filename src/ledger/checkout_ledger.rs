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


//! The checkout ledger
//!
//! Every mutation that moves a copy of a book between "available" and
//! "checked out" goes through [`CheckoutLedger`]. Each operation:
//!
//! 1. validates arguments and capabilities without touching locks,
//! 2. runs as one unit of work inside a backend transaction,
//! 3. is restarted from scratch on deadlock, per the ledger's [`RetryPolicy`](super::retry::RetryPolicy).
//!
//! Rejections are returned as typed [`CirculationError`] variants and leave
//! no trace in the store.

use super::policy::{available_after_resize, available_after_return, LedgerPolicy};
use super::store::{LedgerStore, LedgerTx};
use crate::clock::{Clock, SystemClock};
use crate::directory::UserDirectory;
use crate::error::{CirculationError, Result};
use crate::storage::models::*;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A newly created checkout with the borrowed book's title and ISBN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    #[serde(flatten)]
    pub checkout: Checkout,
    pub title: String,
    pub isbn: Option<String>,
}

/// Result of returning a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub checkout_id: CheckoutId,
    pub book_id: BookId,
    pub returned_at: DateTime<Utc>,
    pub days_late: i64,
    pub late_fee: Money,
    pub status: CheckoutStatus,
}

/// Borrow, return, renew and inventory changes over one [`LedgerStore`]
///
/// Capabilities are checked against the injected [`UserDirectory`]; "now"
/// comes from the injected [`Clock`], the system clock unless replaced with
/// [`CheckoutLedger::with_clock`].
pub struct CheckoutLedger<S: LedgerStore> {
    store: S,
    directory: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> CheckoutLedger<S> {
    pub fn new(store: S, directory: Arc<dyn UserDirectory>, policy: LedgerPolicy) -> Self {
        Self {
            store,
            directory,
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    /// Lend one copy of `book_id` to `user_id` for `loan_days` days
    #[tracing::instrument(skip_all, fields(user_id = %user_id, book_id = %book_id, loan_days = loan_days))]
    pub async fn borrow(
        &self,
        user_id: UserId,
        book_id: BookId,
        loan_days: i64,
    ) -> Result<CheckoutReceipt> {
        let result: Result<CheckoutReceipt> = async {
            self.policy.check_loan_days(loan_days)?;
            self.require_reader(user_id).await?;
            self.policy
                .retry
                .run(move |_| self.borrow_once(user_id, book_id, loan_days))
                .await
        }
        .await;

        if let Ok(receipt) = &result {
            tracing::info!(
                checkout_id = %receipt.checkout.checkout_id,
                due_date = %receipt.checkout.due_date,
                "book borrowed"
            );
        }
        observe("borrow", result)
    }

    /// Take back the copy lent out under `checkout_id`
    ///
    /// `actor` must be the borrower, or staff returning on their behalf.
    #[tracing::instrument(skip_all, fields(actor = %actor, checkout_id = %checkout_id))]
    pub async fn return_book(&self, actor: UserId, checkout_id: CheckoutId) -> Result<ReturnReceipt> {
        let result: Result<ReturnReceipt> = async {
            let acting_as_staff = self.directory.is_staff(actor).await?;
            if !acting_as_staff {
                self.require_reader(actor).await?;
            }
            self.policy
                .retry
                .run(move |_| self.return_once(actor, acting_as_staff, checkout_id))
                .await
        }
        .await;

        if let Ok(receipt) = &result {
            tracing::info!(
                book_id = %receipt.book_id,
                days_late = receipt.days_late,
                late_fee = %receipt.late_fee,
                "book returned"
            );
        }
        observe("return", result)
    }

    /// Push the due date of an active, not yet overdue loan back by `additional_days`
    #[tracing::instrument(skip_all, fields(user_id = %user_id, checkout_id = %checkout_id, additional_days = additional_days))]
    pub async fn renew(
        &self,
        user_id: UserId,
        checkout_id: CheckoutId,
        additional_days: i64,
    ) -> Result<Checkout> {
        let result: Result<Checkout> = async {
            self.policy.check_renewal_days(additional_days)?;
            self.require_reader(user_id).await?;
            self.policy
                .retry
                .run(move |_| self.renew_once(user_id, checkout_id, additional_days))
                .await
        }
        .await;

        if let Ok(checkout) = &result {
            tracing::info!(due_date = %checkout.due_date, "loan renewed");
        }
        observe("renew", result)
    }

    /// Set the total number of copies of a book and record the change
    #[tracing::instrument(skip_all, fields(staff_id = %staff_id, book_id = %book_id, new_total_copies = new_total_copies))]
    pub async fn update_inventory(
        &self,
        staff_id: UserId,
        book_id: BookId,
        new_total_copies: i64,
    ) -> Result<InventoryAdjustment> {
        let result: Result<InventoryAdjustment> = async {
            if new_total_copies < 0 {
                return Err(CirculationError::invalid_argument(format!(
                    "total copies must be >= 0, got {}",
                    new_total_copies
                )));
            }
            if !self.directory.is_staff(staff_id).await? {
                return Err(CirculationError::permission_denied(format!(
                    "user {} is not active staff",
                    staff_id
                )));
            }
            self.policy
                .retry
                .run(move |_| self.update_inventory_once(staff_id, book_id, new_total_copies))
                .await
        }
        .await;

        if let Ok(adjustment) = &result {
            tracing::info!(
                previous_total = adjustment.previous_total,
                new_total = adjustment.new_total,
                new_available = adjustment.new_available,
                "inventory adjusted"
            );
        }
        observe("update_inventory", result)
    }

    // ========================================================================
    // UNITS OF WORK
    // ========================================================================

    async fn borrow_once(
        &self,
        user_id: UserId,
        book_id: BookId,
        loan_days: i64,
    ) -> Result<CheckoutReceipt> {
        let mut tx = self.store.begin().await?;
        let outcome = self.borrow_in(&mut tx, user_id, book_id, loan_days).await;
        finish(tx, outcome).await
    }

    async fn borrow_in(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        book_id: BookId,
        loan_days: i64,
    ) -> Result<CheckoutReceipt> {
        let now = self.clock.now();

        if tx.has_overdue_items(user_id, now).await? {
            return Err(CirculationError::HasOverdueItems { user_id });
        }
        if tx.has_active_checkout(user_id, book_id).await? {
            return Err(CirculationError::AlreadyCheckedOut { user_id, book_id });
        }

        let book = tx
            .lock_book(book_id)
            .await?
            .ok_or_else(|| CirculationError::not_found(format!("book {}", book_id)))?;
        if book.is_retired {
            return Err(CirculationError::Retired(book_id));
        }
        if book.available_copies <= 0 {
            return Err(CirculationError::NoCopiesAvailable(book_id));
        }

        let checkout = Checkout::open(user_id, book_id, now, loan_days);
        tx.insert_checkout(&checkout).await?;
        tx.write_book_copies(book_id, book.total_copies, book.available_copies - 1)
            .await?;

        Ok(CheckoutReceipt {
            checkout,
            title: book.title,
            isbn: book.isbn,
        })
    }

    async fn return_once(
        &self,
        actor: UserId,
        acting_as_staff: bool,
        checkout_id: CheckoutId,
    ) -> Result<ReturnReceipt> {
        let mut tx = self.store.begin().await?;
        let outcome = self
            .return_in(&mut tx, actor, acting_as_staff, checkout_id)
            .await;
        finish(tx, outcome).await
    }

    async fn return_in(
        &self,
        tx: &mut S::Tx,
        actor: UserId,
        acting_as_staff: bool,
        checkout_id: CheckoutId,
    ) -> Result<ReturnReceipt> {
        let mut checkout = tx
            .lock_checkout(checkout_id)
            .await?
            .filter(|c| c.is_returnable() && (acting_as_staff || c.user_id == actor))
            .ok_or_else(|| {
                CirculationError::not_found(format!("outstanding checkout {}", checkout_id))
            })?;

        let book = tx.lock_book(checkout.book_id).await?.ok_or_else(|| {
            CirculationError::InvalidState(format!(
                "checkout {} references missing book {}",
                checkout_id, checkout.book_id
            ))
        })?;

        let now = self.clock.now();
        let late = self.policy.late_fee(checkout.due_date, now);
        // A loan flagged overdue stays overdue even when returned within a day
        let returned_late = late.is_late() || checkout.status == CheckoutStatus::Overdue;

        checkout.return_date = Some(now);
        checkout.is_late = returned_late;
        checkout.late_fee = late.fee;
        checkout.status = if returned_late {
            CheckoutStatus::Overdue
        } else {
            CheckoutStatus::Returned
        };

        tx.update_checkout(&checkout).await?;
        tx.write_book_copies(
            book.book_id,
            book.total_copies,
            available_after_return(book.total_copies, book.available_copies),
        )
        .await?;

        Ok(ReturnReceipt {
            checkout_id,
            book_id: book.book_id,
            returned_at: now,
            days_late: late.days_late,
            late_fee: late.fee,
            status: checkout.status,
        })
    }

    async fn renew_once(
        &self,
        user_id: UserId,
        checkout_id: CheckoutId,
        additional_days: i64,
    ) -> Result<Checkout> {
        let mut tx = self.store.begin().await?;
        let outcome = self
            .renew_in(&mut tx, user_id, checkout_id, additional_days)
            .await;
        finish(tx, outcome).await
    }

    async fn renew_in(
        &self,
        tx: &mut S::Tx,
        user_id: UserId,
        checkout_id: CheckoutId,
        additional_days: i64,
    ) -> Result<Checkout> {
        let mut checkout = tx
            .lock_checkout(checkout_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| CirculationError::not_found(format!("checkout {}", checkout_id)))?;

        if !checkout.is_active() {
            return Err(CirculationError::not_eligible(
                checkout_id,
                "the loan is no longer active",
            ));
        }
        if checkout.is_past_due(self.clock.now()) {
            return Err(CirculationError::not_eligible(
                checkout_id,
                "the loan is overdue and must be returned first",
            ));
        }

        checkout.due_date = checkout.due_date + Duration::days(additional_days);
        tx.update_checkout(&checkout).await?;

        Ok(checkout)
    }

    async fn update_inventory_once(
        &self,
        staff_id: UserId,
        book_id: BookId,
        new_total_copies: i64,
    ) -> Result<InventoryAdjustment> {
        let mut tx = self.store.begin().await?;
        let outcome = self
            .update_inventory_in(&mut tx, staff_id, book_id, new_total_copies)
            .await;
        finish(tx, outcome).await
    }

    async fn update_inventory_in(
        &self,
        tx: &mut S::Tx,
        staff_id: UserId,
        book_id: BookId,
        new_total_copies: i64,
    ) -> Result<InventoryAdjustment> {
        let book = tx
            .lock_book(book_id)
            .await?
            .ok_or_else(|| CirculationError::not_found(format!("book {}", book_id)))?;

        let new_available = available_after_resize(&book, new_total_copies);
        tx.write_book_copies(book_id, new_total_copies, new_available)
            .await?;

        let adjustment = InventoryAdjustment {
            staff_id,
            book_id,
            previous_total: book.total_copies,
            new_total: new_total_copies,
            previous_available: book.available_copies,
            new_available,
            adjusted_at: self.clock.now(),
        };
        tx.insert_adjustment(&adjustment).await?;

        Ok(adjustment)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    async fn require_reader(&self, user_id: UserId) -> Result<()> {
        if self.directory.is_active_reader(user_id).await? {
            Ok(())
        } else {
            Err(CirculationError::permission_denied(format!(
                "user {} is not an active reader",
                user_id
            )))
        }
    }
}

/// Commit on success, roll back on failure
async fn finish<Tx: LedgerTx, T>(tx: Tx, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error.message = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

fn observe<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    match &result {
        Err(e) if e.is_business_rule() => {
            tracing::debug!(operation, error.message = %e, "request rejected");
        }
        Err(e) => {
            tracing::error!(
                operation,
                error.cause_chain = ?e,
                error.message = %e,
                "ledger operation failed"
            );
        }
        Ok(_) => {}
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::directory::StaticUserDirectory;
    use crate::ledger::memory::MemoryLedgerStore;
    use chrono::TimeZone;

    const READER: UserId = UserId(1);
    const OTHER_READER: UserId = UserId(2);
    const STAFF: UserId = UserId(10);
    const STRANGER: UserId = UserId(99);

    struct Fixture {
        ledger: CheckoutLedger<MemoryLedgerStore>,
        store: MemoryLedgerStore,
        clock: ManualClock,
        directory: Arc<StaticUserDirectory>,
    }

    async fn fixture() -> (Fixture, BookId) {
        let store = MemoryLedgerStore::new();
        let book_id = store
            .add_book(&NewBook::new("The Left Hand of Darkness", "Ursula K. Le Guin", 2).with_isbn("9780441478125"))
            .await
            .unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap());
        let directory = Arc::new(
            StaticUserDirectory::new()
                .with_reader(READER)
                .with_reader(OTHER_READER)
                .with_staff(STAFF),
        );
        let ledger = CheckoutLedger::new(store.clone(), directory.clone(), LedgerPolicy::default())
            .with_clock(Arc::new(clock.clone()));

        (
            Fixture {
                ledger,
                store,
                clock,
                directory,
            },
            book_id,
        )
    }

    /// Lend `book_id` 20 days ago for 14 days and flag the loan overdue
    /// the way an outside sweep would
    async fn flag_overdue_loan(fx: &Fixture, user_id: UserId, book_id: BookId) -> CheckoutId {
        let mut loan = Checkout::open(user_id, book_id, fx.clock.now() - Duration::days(20), 14);
        loan.status = CheckoutStatus::Overdue;
        fx.store.seed_checkout(loan.clone()).await;
        let mut tx = fx.store.begin().await.unwrap();
        tx.write_book_copies(book_id, 1, 0).await.unwrap();
        tx.commit().await.unwrap();
        loan.checkout_id
    }

    #[tokio::test]
    async fn test_borrow_returns_receipt_with_book_details() {
        let (fx, book_id) = fixture().await;

        let receipt = fx.ledger.borrow(READER, book_id, 14).await.unwrap();

        assert_eq!(receipt.title, "The Left Hand of Darkness");
        assert_eq!(receipt.isbn.as_deref(), Some("9780441478125"));
        assert_eq!(receipt.checkout.status, CheckoutStatus::Active);
        assert_eq!(receipt.checkout.checkout_date, fx.clock.now());
        assert_eq!(receipt.checkout.due_date, fx.clock.now() + Duration::days(14));
        assert!(receipt.checkout.return_date.is_none());
    }

    #[tokio::test]
    async fn test_borrow_rejects_out_of_range_loan_days() {
        let (fx, book_id) = fixture().await;

        for days in [0, -3, 31] {
            let err = fx.ledger.borrow(READER, book_id, days).await.unwrap_err();
            assert!(matches!(err, CirculationError::InvalidArgument(_)), "{} days", days);
        }
        assert_eq!(fx.store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_borrow_requires_active_reader() {
        let (fx, book_id) = fixture().await;

        let err = fx.ledger.borrow(STRANGER, book_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::PermissionDenied(_)));

        fx.directory.deactivate(READER);
        let err = fx.ledger.borrow(READER, book_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_borrow_missing_or_retired_book() {
        let (fx, book_id) = fixture().await;

        let err = fx.ledger.borrow(READER, BookId(404), 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));

        fx.store.set_retired(book_id, true).await.unwrap();
        let err = fx.ledger.borrow(READER, book_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::Retired(id) if id == book_id));
        assert_eq!(fx.store.book(book_id).await.unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_second_borrow_of_same_book_is_rejected() {
        let (fx, book_id) = fixture().await;

        fx.ledger.borrow(READER, book_id, 7).await.unwrap();
        let err = fx.ledger.borrow(READER, book_id, 7).await.unwrap_err();

        assert!(matches!(
            err,
            CirculationError::AlreadyCheckedOut { user_id, book_id: b } if user_id == READER && b == book_id
        ));
        assert_eq!(fx.store.checkouts().await.len(), 1);
        assert_eq!(fx.store.book(book_id).await.unwrap().available_copies, 1);
    }

    #[tokio::test]
    async fn test_flagged_overdue_loan_blocks_until_returned() {
        let (fx, book_id) = fixture().await;
        let other_book = fx.store.add_book(&NewBook::new("Kindred", "Octavia E. Butler", 1)).await.unwrap();
        let flagged = flag_overdue_loan(&fx, READER, other_book).await;

        let err = fx.ledger.borrow(READER, book_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::HasOverdueItems { .. }));

        let returned = fx.ledger.return_book(READER, flagged).await.unwrap();
        assert_eq!(returned.status, CheckoutStatus::Overdue);
        assert_eq!(returned.days_late, 6);
        assert_eq!(returned.late_fee, Money::from_cents(600));

        let stored = fx.store.checkout(flagged).await.unwrap();
        assert_eq!(stored.return_date, Some(fx.clock.now()));
        assert!(stored.is_late);
        assert_eq!(fx.store.book(other_book).await.unwrap().available_copies, 1);

        fx.ledger.borrow(READER, book_id, 7).await.unwrap();
    }

    #[tokio::test]
    async fn test_staff_can_return_flagged_overdue_loan() {
        let (fx, _) = fixture().await;
        let other_book = fx.store.add_book(&NewBook::new("Kindred", "Octavia E. Butler", 1)).await.unwrap();
        let flagged = flag_overdue_loan(&fx, READER, other_book).await;

        let err = fx.ledger.return_book(OTHER_READER, flagged).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));

        let returned = fx.ledger.return_book(STAFF, flagged).await.unwrap();
        assert_eq!(returned.status, CheckoutStatus::Overdue);
        assert_eq!(fx.store.book(other_book).await.unwrap().available_copies, 1);

        let err = fx.ledger.return_book(STAFF, flagged).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_late_return_does_not_block_future_borrowing() {
        let (fx, book_id) = fixture().await;

        let receipt = fx.ledger.borrow(READER, book_id, 1).await.unwrap();
        fx.clock.advance(Duration::days(5));
        let returned = fx
            .ledger
            .return_book(READER, receipt.checkout.checkout_id)
            .await
            .unwrap();
        assert_eq!(returned.status, CheckoutStatus::Overdue);

        fx.ledger.borrow(READER, book_id, 7).await.unwrap();
    }

    #[tokio::test]
    async fn test_return_by_another_reader_is_not_found() {
        let (fx, book_id) = fixture().await;
        let receipt = fx.ledger.borrow(READER, book_id, 7).await.unwrap();

        let err = fx
            .ledger
            .return_book(OTHER_READER, receipt.checkout.checkout_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));

        let err = fx
            .ledger
            .return_book(STRANGER, receipt.checkout.checkout_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_staff_can_return_on_behalf_of_reader() {
        let (fx, book_id) = fixture().await;
        let receipt = fx.ledger.borrow(READER, book_id, 7).await.unwrap();

        let returned = fx
            .ledger
            .return_book(STAFF, receipt.checkout.checkout_id)
            .await
            .unwrap();

        assert_eq!(returned.status, CheckoutStatus::Returned);
        assert_eq!(fx.store.book(book_id).await.unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_return_twice_is_not_found() {
        let (fx, book_id) = fixture().await;
        let receipt = fx.ledger.borrow(READER, book_id, 7).await.unwrap();
        let checkout_id = receipt.checkout.checkout_id;

        fx.ledger.return_book(READER, checkout_id).await.unwrap();
        let err = fx.ledger.return_book(READER, checkout_id).await.unwrap_err();

        assert!(matches!(err, CirculationError::NotFound(_)));
        assert_eq!(fx.store.book(book_id).await.unwrap().available_copies, 2);
    }

    #[tokio::test]
    async fn test_renew_rules() {
        let (fx, book_id) = fixture().await;
        let receipt = fx.ledger.borrow(READER, book_id, 3).await.unwrap();
        let checkout_id = receipt.checkout.checkout_id;

        let err = fx.ledger.renew(READER, checkout_id, 15).await.unwrap_err();
        assert!(matches!(err, CirculationError::InvalidArgument(_)));

        let err = fx.ledger.renew(OTHER_READER, checkout_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));

        let err = fx.ledger.renew(READER, CheckoutId::generate(), 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));

        fx.clock.advance(Duration::days(4));
        let err = fx.ledger.renew(READER, checkout_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotEligible { .. }));

        fx.ledger.return_book(READER, checkout_id).await.unwrap();
        let err = fx.ledger.renew(READER, checkout_id, 7).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotEligible { .. }));
    }

    #[tokio::test]
    async fn test_update_inventory_requires_staff() {
        let (fx, book_id) = fixture().await;

        let err = fx.ledger.update_inventory(READER, book_id, 5).await.unwrap_err();
        assert!(matches!(err, CirculationError::PermissionDenied(_)));

        let err = fx.ledger.update_inventory(STAFF, book_id, -1).await.unwrap_err();
        assert!(matches!(err, CirculationError::InvalidArgument(_)));

        let err = fx.ledger.update_inventory(STAFF, BookId(404), 5).await.unwrap_err();
        assert!(matches!(err, CirculationError::NotFound(_)));

        assert!(fx.store.adjustments().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_inventory_records_adjustment() {
        let (fx, book_id) = fixture().await;
        fx.ledger.borrow(READER, book_id, 7).await.unwrap();

        let adjustment = fx.ledger.update_inventory(STAFF, book_id, 6).await.unwrap();

        assert_eq!(adjustment.previous_total, 2);
        assert_eq!(adjustment.previous_available, 1);
        assert_eq!(adjustment.new_total, 6);
        assert_eq!(adjustment.new_available, 5);
        assert_eq!(adjustment.staff_id, STAFF);
        assert_eq!(adjustment.adjusted_at, fx.clock.now());
        assert_eq!(fx.store.adjustments().await, vec![adjustment]);
    }
}
