// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! PostgreSQL wallet storage.
//!
//! Uses the `wallets` table from `migrations/`. The `balance >= 0` check
//! constraint is the last line of defense for non-negative balances.

use super::{UnitOfWork, WalletRepository};
use crate::base::{UserId, WalletId};
use crate::{LedgerConfig, Wallet, WalletError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

const WALLET_COLUMNS: &str = "id, user_id, balance, created_at, updated_at, deleted_at, \
                              created_by, updated_by, deleted_by";

/// Wallet repository and unit of work over a Postgres pool.
#[derive(Clone)]
pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `config.database_url`.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, WalletError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| WalletError::Internal("database url is not configured".into()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(url)
            .await
            .map_err(db_error)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps a driver error onto the wallet taxonomy.
fn db_error(err: sqlx::Error) -> WalletError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return WalletError::AlreadyExists,
            Some(CHECK_VIOLATION) => return WalletError::InsufficientBalance,
            _ => {}
        }
    }
    WalletError::internal(err)
}

fn wallet_from_row(row: &PgRow) -> Result<Wallet, WalletError> {
    let id: String = row.try_get("id").map_err(db_error)?;
    let id = id.parse::<WalletId>().map_err(WalletError::internal)?;
    Ok(Wallet {
        id,
        user_id: UserId(row.try_get("user_id").map_err(db_error)?),
        balance: row.try_get("balance").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
        deleted_at: row.try_get("deleted_at").map_err(db_error)?,
        created_by: UserId(row.try_get("created_by").map_err(db_error)?),
        updated_by: UserId(row.try_get("updated_by").map_err(db_error)?),
        deleted_by: row
            .try_get::<Option<uuid::Uuid>, _>("deleted_by")
            .map_err(db_error)?
            .map(UserId),
    })
}

/// Zero affected rows means the wallet is missing or deleted.
fn require_row(rows_affected: u64) -> Result<(), WalletError> {
    if rows_affected == 0 {
        Err(WalletError::EmptyWallet)
    } else {
        Ok(())
    }
}

const ADD_BALANCE: &str = r#"
    UPDATE wallets
    SET balance = balance + $2, updated_at = now()
    WHERE id = $1 AND deleted_at IS NULL
"#;

#[async_trait]
impl UnitOfWork for PgWalletStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, WalletError> {
        self.pool.begin().await.map_err(db_error)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), WalletError> {
        tx.commit().await.map_err(db_error)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), WalletError> {
        tx.rollback().await.map_err(db_error)
    }
}

#[async_trait]
impl WalletRepository for PgWalletStore {
    type Tx = Transaction<'static, Postgres>;

    async fn insert(&self, wallet: &Wallet) -> Result<(), WalletError> {
        sqlx::query(
            r#"
            INSERT INTO wallets
                (id, user_id, balance, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(wallet.id.as_string())
        .bind(wallet.user_id.0)
        .bind(wallet.balance)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .bind(wallet.created_by.0)
        .bind(wallet.updated_by.0)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn add_wallet_balance(
        &self,
        wallet_id: &WalletId,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let result = sqlx::query(ADD_BALANCE)
            .bind(wallet_id.as_string())
            .bind(amount)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        require_row(result.rows_affected())
    }

    async fn get_user_wallet_for_update(
        &self,
        tx: &mut Self::Tx,
        wallet_id: &WalletId,
        user_id: &UserId,
    ) -> Result<Option<Wallet>, WalletError> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets \
             WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL \
             FOR UPDATE"
        ))
        .bind(wallet_id.as_string())
        .bind(user_id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;

        row.as_ref().map(wallet_from_row).transpose()
    }

    async fn add_wallet_balance_with_tx(
        &self,
        tx: &mut Self::Tx,
        wallet_id: &WalletId,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let result = sqlx::query(ADD_BALANCE)
            .bind(wallet_id.as_string())
            .bind(amount)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        require_row(result.rows_affected())
    }

    async fn get_wallet(&self, wallet_id: &WalletId) -> Result<Option<Wallet>, WalletError> {
        let row = sqlx::query(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1"))
            .bind(wallet_id.as_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(wallet_from_row).transpose()
    }

    async fn list_user_wallets(&self, user_id: &UserId) -> Result<Vec<Wallet>, WalletError> {
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(wallet_from_row).collect()
    }
}
