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


//! Deadlock retry wrapper
//!
//! Any ledger unit of work runs through [`RetryPolicy::run`]. A failure that
//! the backend reports as a deadlock or lock-wait timeout restarts the whole
//! unit of work after a fixed backoff. Any other failure is returned at once.
//! When every attempt hits a lock conflict the caller sees
//! [`CirculationError::Contention`].

use crate::error::{CirculationError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-backoff retry policy for lock conflicts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `op` until it succeeds, fails with a non-deadlock error, or the
    /// attempts are used up. `op` receives the zero-based attempt number.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_deadlock() => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            attempts = attempt,
                            error.message = %err,
                            "giving up after repeated lock conflicts"
                        );
                        return Err(CirculationError::Contention { attempts: attempt });
                    }
                    tracing::warn!(
                        attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error.message = %err,
                        "lock conflict, retrying unit of work"
                    );
                    sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
