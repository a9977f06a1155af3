//! Error types for Circulation
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are split into two families:
//!
//! ### Business-rule rejections
//! Returned by the checkout ledger when a request is well-formed but not
//! allowed: `InvalidArgument`, `PermissionDenied`, `NotFound`,
//! `HasOverdueItems`, `AlreadyCheckedOut`, `Retired`, `NoCopiesAvailable`,
//! `NotEligible`. Callers render these as specific user-facing messages.
//!
//! ### Infrastructure failures
//! Database, migration, configuration and I/O errors, plus `Contention`
//! (lock conflicts that survived every retry). Callers log these and show a
//! generic failure.
//!
//! `LockConflict` is the odd one out: backends raise it for a deadlock or a
//! lock-wait timeout and the retry wrapper consumes it. Once retries are
//! exhausted it is reported as `Contention`.

use crate::storage::models::{BookId, CheckoutId, UserId};
use thiserror::Error;

/// Result type alias using our CirculationError type
pub type Result<T> = std::result::Result<T, CirculationError>;

/// SQLite primary/extended codes for BUSY and LOCKED, PostgreSQL deadlock and
/// serialization failure, MySQL deadlock and lock-wait timeout.
const LOCK_CONFLICT_CODES: &[&str] = &[
    "5", "6", "261", "262", "517", "40P01", "40001", "1213", "1205",
];

/// Main error type for Circulation
#[derive(Error, Debug)]
pub enum CirculationError {
    // ===== Business-rule rejections =====

    /// Out-of-range loan/renewal days or malformed identifiers
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Caller lacks the Reader or Staff capability the operation requires
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Book or checkout does not exist, or does not belong to the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Borrow blocked because the user has overdue items outstanding
    #[error("User {user_id} has overdue items")]
    HasOverdueItems { user_id: UserId },

    /// Borrow blocked by an existing active checkout of the same book
    #[error("User {user_id} already has book {book_id} checked out")]
    AlreadyCheckedOut { user_id: UserId, book_id: BookId },

    /// Book has been retired from circulation
    #[error("Book {0} is retired")]
    Retired(BookId),

    /// Every copy of the book is currently lent out
    #[error("No copies of book {0} are available")]
    NoCopiesAvailable(BookId),

    /// Renewal refused (checkout not active, or already past due)
    #[error("Checkout {checkout_id} is not eligible: {reason}")]
    NotEligible {
        checkout_id: CheckoutId,
        reason: String,
    },

    // ===== Transient contention =====

    /// Deadlock or lock-wait timeout reported by a persistence backend
    #[error("Lock conflict: {0}")]
    LockConflict(String),

    /// Lock conflicts persisted through every retry attempt
    #[error("Operation abandoned after {attempts} attempts due to lock contention")]
    Contention { attempts: u32 },

    // ===== Infrastructure =====

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Stored data could not be interpreted
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<uuid::Error> for CirculationError {
    fn from(err: uuid::Error) -> Self {
        CirculationError::InvalidArgument(format!("Malformed checkout id: {}", err))
    }
}

impl From<chrono::ParseError> for CirculationError {
    fn from(err: chrono::ParseError) -> Self {
        CirculationError::InvalidState(format!("Malformed timestamp in database: {}", err))
    }
}

// Helper methods for creating common errors
impl CirculationError {
    /// Create a NotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        CirculationError::NotFound(resource.into())
    }

    /// Create an InvalidArgument error with a message
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        CirculationError::InvalidArgument(message.into())
    }

    /// Create a PermissionDenied error with a message
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        CirculationError::PermissionDenied(message.into())
    }

    /// Create a NotEligible error
    pub fn not_eligible<S: Into<String>>(checkout_id: CheckoutId, reason: S) -> Self {
        CirculationError::NotEligible {
            checkout_id,
            reason: reason.into(),
        }
    }

    /// Check if this is a business-rule rejection rather than a failure
    ///
    /// Business-rule rejections leave no trace in the store and carry enough
    /// context for a specific user-facing message.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            CirculationError::InvalidArgument(_)
                | CirculationError::PermissionDenied(_)
                | CirculationError::NotFound(_)
                | CirculationError::HasOverdueItems { .. }
                | CirculationError::AlreadyCheckedOut { .. }
                | CirculationError::Retired(_)
                | CirculationError::NoCopiesAvailable(_)
                | CirculationError::NotEligible { .. }
        )
    }

    /// Check if the backend reported a deadlock or lock-wait timeout
    ///
    /// Only this class of failure is ever retried.
    pub fn is_deadlock(&self) -> bool {
        match self {
            CirculationError::LockConflict(_) => true,
            CirculationError::Database(sqlx::Error::Database(db_err)) => {
                let code_matches = db_err
                    .code()
                    .map(|code| LOCK_CONFLICT_CODES.contains(&code.as_ref()))
                    .unwrap_or(false);
                let message = db_err.message().to_ascii_lowercase();
                code_matches
                    || message.contains("database is locked")
                    || message.contains("database table is locked")
                    || message.contains("deadlock")
            }
            _ => false,
        }
    }

    /// Check if the caller may reasonably try the request again later
    pub fn is_retryable(&self) -> bool {
        self.is_deadlock() || matches!(self, CirculationError::Contention { .. })
    }

    /// Get user-friendly error message suitable for display
    ///
    /// Infrastructure details are replaced with a generic message.
    pub fn user_message(&self) -> String {
        match self {
            CirculationError::HasOverdueItems { .. } => {
                "You have overdue items. Please return them before borrowing more books.".to_string()
            }
            CirculationError::AlreadyCheckedOut { .. } => {
                "You already have this book checked out.".to_string()
            }
            CirculationError::Retired(_) => {
                "This book has been retired and can no longer be borrowed.".to_string()
            }
            CirculationError::NoCopiesAvailable(_) => {
                "No copies of this book are available right now.".to_string()
            }
            CirculationError::NotEligible { reason, .. } => {
                format!("This loan cannot be renewed: {}.", reason)
            }
            CirculationError::Contention { .. } | CirculationError::LockConflict(_) => {
                "The library is busy. Please try again in a moment.".to_string()
            }
            e if e.is_business_rule() => e.to_string(),
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_classification() {
        assert!(CirculationError::NoCopiesAvailable(BookId(1)).is_business_rule());
        assert!(CirculationError::HasOverdueItems { user_id: UserId(4) }.is_business_rule());
        assert!(!CirculationError::Contention { attempts: 3 }.is_business_rule());
        assert!(!CirculationError::InvalidState("x".into()).is_business_rule());
    }

    #[test]
    fn test_lock_conflict_is_deadlock() {
        let err = CirculationError::LockConflict("injected".into());
        assert!(err.is_deadlock());
        assert!(err.is_retryable());
        assert!(!CirculationError::not_found("book 1").is_deadlock());
    }

    #[test]
    fn test_pool_timeout_is_not_deadlock() {
        let err = CirculationError::Database(sqlx::Error::PoolTimedOut);
        assert!(!err.is_deadlock());
    }

    #[test]
    fn test_user_message_hides_infrastructure_details() {
        let err = CirculationError::MigrationFailed("syntax error near CREATE".into());
        assert!(!err.user_message().contains("CREATE"));
        let err = CirculationError::Retired(BookId(9));
        assert!(err.user_message().contains("retired"));
    }
}
