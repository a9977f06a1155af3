//! Checkout ledger on a real SQLite file
//!
//! These tests open a database in a temp directory so several pool
//! connections compete for the write lock the way a deployed service does.

use chrono::{Duration, TimeZone, Utc};
use circulation_core::clock::{Clock, ManualClock};
use circulation_core::config::DatabaseConfig;
use circulation_core::directory::SqliteUserDirectory;
use circulation_core::ledger::{CheckoutLedger, LedgerPolicy, RetryPolicy, SqliteLedgerStore};
use circulation_core::storage::{queries, BookId, CheckoutStatus, Database, NewBook, NewUser, UserId};
use circulation_core::CirculationError;
use std::sync::Arc;
use tempfile::TempDir;

async fn open_database(temp_dir: &TempDir, config: &DatabaseConfig) -> Database {
    Database::new(temp_dir.path().join("circulation.db"), config)
        .await
        .expect("Failed to open database")
}

fn ledger(db: &Database, retry: RetryPolicy) -> CheckoutLedger<SqliteLedgerStore> {
    let policy = LedgerPolicy {
        retry,
        ..LedgerPolicy::default()
    };
    CheckoutLedger::new(
        SqliteLedgerStore::from_database(db),
        Arc::new(SqliteUserDirectory::new(db.pool().clone())),
        policy,
    )
}

async fn add_reader(db: &Database, name: &str) -> UserId {
    queries::insert_user(db.pool(), &NewUser::reader(name, format!("{}@library.test", name)))
        .await
        .expect("Failed to insert reader")
}

async fn add_book(db: &Database, copies: i64) -> BookId {
    queries::insert_book(db.pool(), &NewBook::new("The Dispossessed", "Ursula K. Le Guin", copies))
        .await
        .expect("Failed to insert book")
}

#[tokio::test]
async fn test_full_circulation_flow() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_database(&temp_dir, &DatabaseConfig::default()).await;
    let ledger = ledger(&db, RetryPolicy::default());

    let reader = add_reader(&db, "ines").await;
    let staff = queries::insert_user(db.pool(), &NewUser::staff("otto", "otto@library.test"))
        .await
        .unwrap();
    let book_id = add_book(&db, 2).await;

    let receipt = ledger.borrow(reader, book_id, 14).await.unwrap();
    assert_eq!(receipt.title, "The Dispossessed");

    let stored = queries::find_checkout(db.pool(), receipt.checkout.checkout_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, receipt.checkout);

    let renewed = ledger
        .renew(reader, receipt.checkout.checkout_id, 7)
        .await
        .unwrap();
    assert_eq!(renewed.due_date, receipt.checkout.due_date + Duration::days(7));

    let adjustment = ledger.update_inventory(staff, book_id, 4).await.unwrap();
    assert_eq!(adjustment.new_available, 3);

    let returned = ledger
        .return_book(reader, receipt.checkout.checkout_id)
        .await
        .unwrap();
    assert_eq!(returned.status, CheckoutStatus::Returned);

    let book = queries::find_book(db.pool(), book_id).await.unwrap().unwrap();
    assert_eq!(book.total_copies, 4);
    assert_eq!(book.available_copies, 4);

    let history = queries::list_checkout_history_for_book(db.pool(), book_id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].return_date.is_some());

    let adjustments = queries::list_inventory_adjustments(db.pool(), book_id)
        .await
        .unwrap();
    assert_eq!(adjustments, vec![adjustment]);
}

#[tokio::test]
async fn test_rejected_borrow_leaves_no_trace() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_database(&temp_dir, &DatabaseConfig::default()).await;
    let ledger = ledger(&db, RetryPolicy::default());

    let reader = add_reader(&db, "mara").await;
    let book_id = add_book(&db, 1).await;
    queries::set_book_retired(db.pool(), book_id, true).await.unwrap();

    let err = ledger.borrow(reader, book_id, 7).await.unwrap_err();
    assert!(matches!(err, CirculationError::Retired(_)));

    assert!(queries::list_unreturned_checkouts(db.pool()).await.unwrap().is_empty());
    let book = queries::find_book(db.pool(), book_id).await.unwrap().unwrap();
    assert_eq!(book.available_copies, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_never_oversell() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_database(&temp_dir, &DatabaseConfig::default()).await;
    let ledger = Arc::new(ledger(&db, RetryPolicy::new(5, std::time::Duration::from_millis(20))));

    let book_id = add_book(&db, 2).await;
    let mut readers = Vec::new();
    for i in 0..6 {
        readers.push(add_reader(&db, &format!("reader{}", i)).await);
    }

    let handles: Vec<_> = readers
        .into_iter()
        .map(|reader| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.borrow(reader, book_id, 7).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CirculationError::NoCopiesAvailable(id)) => assert_eq!(id, book_id),
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 2);
    let book = queries::find_book(db.pool(), book_id).await.unwrap().unwrap();
    assert_eq!(book.available_copies, 0);
    assert_eq!(
        queries::count_active_checkouts_for_book(db.pool(), book_id).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_busy_write_lock_is_retried_then_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        busy_timeout_secs: 0,
        ..DatabaseConfig::default()
    };
    let db = open_database(&temp_dir, &config).await;
    let ledger = ledger(&db, RetryPolicy::new(2, std::time::Duration::from_millis(10)));

    let reader = add_reader(&db, "jonas").await;
    let book_id = add_book(&db, 1).await;

    // Another writer holds the database write lock
    let mut blocker = db.pool().begin().await.unwrap();
    sqlx::query("UPDATE ledger_write_lock SET generation = generation + 1 WHERE id = 1")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let err = ledger.borrow(reader, book_id, 7).await.unwrap_err();
    assert!(matches!(err, CirculationError::Contention { attempts: 2 }));

    blocker.commit().await.unwrap();

    ledger.borrow(reader, book_id, 7).await.unwrap();
    let book = queries::find_book(db.pool(), book_id).await.unwrap().unwrap();
    assert_eq!(book.available_copies, 0);
}

#[tokio::test]
async fn test_overdue_loans_are_listed_and_block_borrowing() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_database(&temp_dir, &DatabaseConfig::default()).await;
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap());
    let ledger = ledger(&db, RetryPolicy::default()).with_clock(Arc::new(clock.clone()));

    let reader = add_reader(&db, "ayla").await;
    let first = add_book(&db, 1).await;
    let second = add_book(&db, 1).await;

    let receipt = ledger.borrow(reader, first, 3).await.unwrap();
    clock.advance(Duration::days(4));

    let overdue = queries::list_overdue_checkouts(db.pool(), clock.now())
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].checkout_id, receipt.checkout.checkout_id);

    let err = ledger.borrow(reader, second, 7).await.unwrap_err();
    assert!(matches!(err, CirculationError::HasOverdueItems { .. }));

    let returned = ledger
        .return_book(reader, receipt.checkout.checkout_id)
        .await
        .unwrap();
    assert_eq!(returned.days_late, 1);
    assert_eq!(returned.status, CheckoutStatus::Overdue);

    ledger.borrow(reader, second, 7).await.unwrap();
}

#[tokio::test]
async fn test_loan_flagged_overdue_can_be_returned() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_database(&temp_dir, &DatabaseConfig::default()).await;
    let ledger = ledger(&db, RetryPolicy::default());

    let reader = add_reader(&db, "tove").await;
    let first = add_book(&db, 1).await;
    let second = add_book(&db, 1).await;
    let receipt = ledger.borrow(reader, first, 7).await.unwrap();

    // Flagged by an outside sweep while still on loan
    sqlx::query("UPDATE checkouts SET status = 'overdue' WHERE checkout_id = ?")
        .bind(receipt.checkout.checkout_id.to_string())
        .execute(db.pool())
        .await
        .unwrap();

    let err = ledger.borrow(reader, second, 7).await.unwrap_err();
    assert!(matches!(err, CirculationError::HasOverdueItems { .. }));

    let returned = ledger
        .return_book(reader, receipt.checkout.checkout_id)
        .await
        .unwrap();
    assert_eq!(returned.status, CheckoutStatus::Overdue);

    let stored = queries::find_checkout(db.pool(), receipt.checkout.checkout_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.return_date.is_some());
    assert!(stored.is_late);
    let book = queries::find_book(db.pool(), first).await.unwrap().unwrap();
    assert_eq!(book.available_copies, 1);

    ledger.borrow(reader, second, 7).await.unwrap();
}
