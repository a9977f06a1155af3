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


//! Runtime configuration
//!
//! Loaded with the `config` crate from an optional `circulation.toml` in the
//! working directory, then from `CIRCULATION_*` environment variables
//! (nested keys separated by `__`, e.g. `CIRCULATION_RETRY__BACKOFF_MS=250`).
//! Every field has a default, so an empty environment yields a usable config.

use crate::error::{CirculationError, Result};
use crate::ledger::policy::LedgerPolicy;
use crate::ledger::retry::RetryPolicy;
use crate::storage::models::Money;
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CirculationConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub loans: LoanConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; platform data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a transaction waits for the SQLite write lock
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    30
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanConfig {
    #[serde(default = "default_min_days")]
    pub min_days: i64,
    #[serde(default = "default_max_days")]
    pub max_days: i64,
    #[serde(default = "default_min_days")]
    pub min_renewal_days: i64,
    #[serde(default = "default_max_renewal_days")]
    pub max_renewal_days: i64,
    #[serde(default = "default_fee_per_day_cents")]
    pub fee_per_day_cents: i64,
}

fn default_min_days() -> i64 {
    1
}

fn default_max_days() -> i64 {
    30
}

fn default_max_renewal_days() -> i64 {
    14
}

fn default_fee_per_day_cents() -> i64 {
    100
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            min_days: default_min_days(),
            max_days: default_max_days(),
            min_renewal_days: default_min_days(),
            max_renewal_days: default_max_renewal_days(),
            fee_per_day_cents: default_fee_per_day_cents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl CirculationConfig {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(config::File::with_name("circulation.toml").required(false))
            .add_source(
                config::Environment::with_prefix("CIRCULATION")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let loans = &self.loans;
        if loans.min_days < 1 || loans.min_days > loans.max_days {
            return Err(CirculationError::InvalidConfiguration(format!(
                "loan days range [{}, {}] is invalid",
                loans.min_days, loans.max_days
            )));
        }
        if loans.min_renewal_days < 1 || loans.min_renewal_days > loans.max_renewal_days {
            return Err(CirculationError::InvalidConfiguration(format!(
                "renewal days range [{}, {}] is invalid",
                loans.min_renewal_days, loans.max_renewal_days
            )));
        }
        if loans.fee_per_day_cents < 0 {
            return Err(CirculationError::InvalidConfiguration(
                "fee_per_day_cents must not be negative".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(CirculationError::InvalidConfiguration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(CirculationError::InvalidConfiguration(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(crate::storage::Database::get_default_path)
    }

    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            loan_days: self.loans.min_days..=self.loans.max_days,
            renewal_days: self.loans.min_renewal_days..=self.loans.max_renewal_days,
            fee_per_day: Money::from_cents(self.loans.fee_per_day_cents),
            retry: RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.backoff_ms),
            ),
        }
    }
}
