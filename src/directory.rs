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


//! User capabilities
//!
//! The ledger does not authenticate anyone. Request handlers establish who
//! the caller is; the ledger asks a [`UserDirectory`] what that user may do.
//!
//! - Reader: any active user, staff included, may borrow, renew and return
//!   their own loans.
//! - Staff: active staff may additionally return anyone's loan and change
//!   inventory.

use crate::error::Result;
use crate::storage::models::{Role, UserId};
use crate::storage::queries;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn is_active_reader(&self, user_id: UserId) -> Result<bool>;

    async fn is_staff(&self, user_id: UserId) -> Result<bool>;
}

/// Directory backed by the `users` table
#[derive(Debug, Clone)]
pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn is_active_reader(&self, user_id: UserId) -> Result<bool> {
        Ok(queries::find_user(&self.pool, user_id)
            .await?
            .map(|user| user.is_active)
            .unwrap_or(false))
    }

    async fn is_staff(&self, user_id: UserId) -> Result<bool> {
        Ok(queries::find_user(&self.pool, user_id)
            .await?
            .map(|user| user.is_active && user.role == Role::Staff)
            .unwrap_or(false))
    }
}

/// Directory held in memory
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: RwLock<HashMap<UserId, (Role, bool)>>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(self, user_id: UserId) -> Self {
        self.insert(user_id, Role::Reader, true);
        self
    }

    pub fn with_staff(self, user_id: UserId) -> Self {
        self.insert(user_id, Role::Staff, true);
        self
    }

    pub fn insert(&self, user_id: UserId, role: Role, active: bool) {
        self.users
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id, (role, active));
    }

    pub fn deactivate(&self, user_id: UserId) {
        let mut users = self.users.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = users.get_mut(&user_id) {
            entry.1 = false;
        }
    }

    fn lookup(&self, user_id: UserId) -> Option<(Role, bool)> {
        self.users
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&user_id)
            .copied()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn is_active_reader(&self, user_id: UserId) -> Result<bool> {
        Ok(matches!(self.lookup(user_id), Some((_, true))))
    }

    async fn is_staff(&self, user_id: UserId) -> Result<bool> {
        Ok(matches!(self.lookup(user_id), Some((Role::Staff, true))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::NewUser;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_static_directory_capabilities() {
        let directory = StaticUserDirectory::new()
            .with_reader(UserId(1))
            .with_staff(UserId(2));

        assert!(directory.is_active_reader(UserId(1)).await.unwrap());
        assert!(!directory.is_staff(UserId(1)).await.unwrap());
        assert!(directory.is_active_reader(UserId(2)).await.unwrap());
        assert!(directory.is_staff(UserId(2)).await.unwrap());
        assert!(!directory.is_active_reader(UserId(3)).await.unwrap());

        directory.deactivate(UserId(2));
        assert!(!directory.is_active_reader(UserId(2)).await.unwrap());
        assert!(!directory.is_staff(UserId(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_directory_reads_users_table() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let reader = queries::insert_user(db.pool(), &NewUser::reader("Rin", "rin@library.test"))
            .await
            .unwrap();
        let staff = queries::insert_user(db.pool(), &NewUser::staff("Sol", "sol@library.test"))
            .await
            .unwrap();
        let directory = SqliteUserDirectory::new(db.pool().clone());

        assert!(directory.is_active_reader(reader).await.unwrap());
        assert!(!directory.is_staff(reader).await.unwrap());
        assert!(directory.is_staff(staff).await.unwrap());
        assert!(!directory.is_active_reader(UserId(404)).await.unwrap());

        queries::set_user_active(db.pool(), reader, false).await.unwrap();
        assert!(!directory.is_active_reader(reader).await.unwrap());
    }
}
