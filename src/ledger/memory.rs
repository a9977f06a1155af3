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


//! In-memory ledger backend
//!
//! The whole store sits behind one async mutex. `begin` takes the mutex and
//! copies the state; the transaction works on the copy and `commit` swaps it
//! in. This is stricter than row locking (every transaction is serialized)
//! and makes rollback free: the copy is simply dropped.
//!
//! Used by tests and by embedders that do not need durability.
//! [`MemoryLedgerStore::inject_deadlocks`] makes upcoming commits fail the
//! way a relational backend fails on deadlock, so retry behaviour can be
//! exercised deterministically.

use crate::error::{CirculationError, Result};
use crate::ledger::store::{LedgerStore, LedgerTx};
use crate::storage::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<BookId, Book>,
    checkouts: HashMap<CheckoutId, Checkout>,
    adjustments: Vec<InventoryAdjustment>,
    next_book_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
    pending_deadlocks: Arc<AtomicU32>,
    commits: Arc<AtomicU32>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book with every copy available
    pub async fn add_book(&self, book: &NewBook) -> Result<BookId> {
        if book.total_copies < 0 {
            return Err(CirculationError::invalid_argument(format!(
                "total_copies must be >= 0, got {}",
                book.total_copies
            )));
        }

        let mut state = self.state.lock().await;
        state.next_book_id += 1;
        let book_id = BookId(state.next_book_id);
        state.books.insert(
            book_id,
            Book {
                book_id,
                title: book.title.clone(),
                author: book.author.clone(),
                isbn: book.isbn.clone(),
                total_copies: book.total_copies,
                available_copies: book.total_copies,
                is_retired: false,
            },
        );
        Ok(book_id)
    }

    pub async fn set_retired(&self, book_id: BookId, retired: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&book_id)
            .ok_or_else(|| CirculationError::not_found(format!("book {}", book_id)))?;
        book.is_retired = retired;
        Ok(())
    }

    /// Store a checkout as-is, bypassing every rule
    ///
    /// For seeding states the ledger never produces itself, such as a loan
    /// flagged overdue before it was returned.
    pub async fn seed_checkout(&self, checkout: Checkout) {
        let mut state = self.state.lock().await;
        state.checkouts.insert(checkout.checkout_id, checkout);
    }

    pub async fn book(&self, book_id: BookId) -> Option<Book> {
        self.state.lock().await.books.get(&book_id).cloned()
    }

    pub async fn checkout(&self, checkout_id: CheckoutId) -> Option<Checkout> {
        self.state.lock().await.checkouts.get(&checkout_id).cloned()
    }

    /// All checkouts, oldest first
    pub async fn checkouts(&self) -> Vec<Checkout> {
        let state = self.state.lock().await;
        let mut checkouts: Vec<Checkout> = state.checkouts.values().cloned().collect();
        checkouts.sort_by_key(|c| c.checkout_date);
        checkouts
    }

    pub async fn adjustments(&self) -> Vec<InventoryAdjustment> {
        self.state.lock().await.adjustments.clone()
    }

    /// Make the next `count` commits fail with a lock conflict
    pub fn inject_deadlocks(&self, count: u32) {
        self.pending_deadlocks.fetch_add(count, Ordering::SeqCst);
    }

    /// Number of transactions committed so far
    pub fn commit_count(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    pending_deadlocks: Arc<AtomicU32>,
    commits: Arc<AtomicU32>,
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> Result<MemoryLedgerTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryLedgerTx {
            guard,
            working,
            pending_deadlocks: self.pending_deadlocks.clone(),
            commits: self.commits.clone(),
        })
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn has_overdue_items(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .working
            .checkouts
            .values()
            .any(|c| c.user_id == user_id && c.blocks_borrowing(now)))
    }

    async fn has_active_checkout(&mut self, user_id: UserId, book_id: BookId) -> Result<bool> {
        Ok(self
            .working
            .checkouts
            .values()
            .any(|c| c.user_id == user_id && c.book_id == book_id && c.is_active()))
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn write_book_copies(&mut self, book_id: BookId, total: i64, available: i64) -> Result<()> {
        if total < 0 || available < 0 || available > total {
            return Err(CirculationError::InvalidState(format!(
                "book {} copy counts out of range: {} of {} available",
                book_id, available, total
            )));
        }
        let book = self.working.books.get_mut(&book_id).ok_or_else(|| {
            CirculationError::InvalidState(format!("book {} vanished while locked", book_id))
        })?;
        book.total_copies = total;
        book.available_copies = available;
        Ok(())
    }

    async fn insert_checkout(&mut self, checkout: &Checkout) -> Result<()> {
        if checkout.is_active()
            && self
                .working
                .checkouts
                .values()
                .any(|c| c.user_id == checkout.user_id && c.book_id == checkout.book_id && c.is_active())
        {
            return Err(CirculationError::InvalidState(format!(
                "second active checkout for user {} and book {}",
                checkout.user_id, checkout.book_id
            )));
        }
        self.working
            .checkouts
            .insert(checkout.checkout_id, checkout.clone());
        Ok(())
    }

    async fn lock_checkout(&mut self, checkout_id: CheckoutId) -> Result<Option<Checkout>> {
        Ok(self.working.checkouts.get(&checkout_id).cloned())
    }

    async fn update_checkout(&mut self, checkout: &Checkout) -> Result<()> {
        match self.working.checkouts.get_mut(&checkout.checkout_id) {
            Some(existing) => {
                *existing = checkout.clone();
                Ok(())
            }
            None => Err(CirculationError::InvalidState(format!(
                "checkout {} vanished while locked",
                checkout.checkout_id
            ))),
        }
    }

    async fn insert_adjustment(&mut self, adjustment: &InventoryAdjustment) -> Result<()> {
        self.working.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let MemoryLedgerTx {
            mut guard,
            working,
            pending_deadlocks,
            commits,
        } = self;

        let injected = pending_deadlocks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(CirculationError::LockConflict(
                "deadlock detected while committing".to_string(),
            ));
        }

        *guard = working;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
