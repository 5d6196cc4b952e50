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

//! Storage contracts for wallets.
//!
//! The ledger core only needs a transaction-capable row store with row-level
//! locking reads. [`MemoryWalletStore`] backs tests and local replays,
//! [`PgWalletStore`] backs production.

mod memory;
mod postgres;

pub use self::memory::{MemoryTx, MemoryWalletStore};
pub use self::postgres::PgWalletStore;

use crate::base::{UserId, WalletId};
use crate::{Wallet, WalletError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

/// Transactional execution boundary.
///
/// A transaction is opened with [`begin`](UnitOfWork::begin) and closed with
/// [`finish`](UnitOfWork::finish), which commits on success and rolls back on
/// failure. Dropping an unfinished transaction rolls it back.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, WalletError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), WalletError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), WalletError>;

    /// Commits when `outcome` is `Ok`, rolls back otherwise.
    ///
    /// The original error is returned unchanged after a rollback; a failing
    /// rollback does not mask it. A failing commit is returned as-is.
    async fn finish<T: Send>(
        &self,
        tx: Self::Tx,
        outcome: Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        match outcome {
            Ok(value) => {
                self.commit(tx).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback(tx).await {
                    warn!(error = %rollback_err, cause = %err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Wallet persistence and balance mutation.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Transaction handle shared with the [`UnitOfWork`] driving it.
    type Tx: Send;

    /// Persists a new wallet.
    ///
    /// # Errors
    ///
    /// [`WalletError::AlreadyExists`] if a wallet with the same id exists.
    async fn insert(&self, wallet: &Wallet) -> Result<(), WalletError>;

    /// Atomically adds a signed `amount` to the wallet balance.
    ///
    /// # Errors
    ///
    /// - [`WalletError::EmptyWallet`] if the wallet does not exist.
    /// - [`WalletError::InsufficientBalance`] if the balance would go negative.
    /// - [`WalletError::InvalidAmount`] if the new balance is not representable.
    async fn add_wallet_balance(
        &self,
        wallet_id: &WalletId,
        amount: Decimal,
    ) -> Result<(), WalletError>;

    /// Reads and row-locks a wallet owned by `user_id` inside `tx`.
    ///
    /// Returns `Ok(None)` when no live wallet with that id belongs to the user.
    /// The lock is held until the transaction ends.
    async fn get_user_wallet_for_update(
        &self,
        tx: &mut Self::Tx,
        wallet_id: &WalletId,
        user_id: &UserId,
    ) -> Result<Option<Wallet>, WalletError>;

    /// Atomically adds a signed `amount` to the wallet balance inside `tx`.
    ///
    /// Errors as [`add_wallet_balance`](WalletRepository::add_wallet_balance).
    async fn add_wallet_balance_with_tx(
        &self,
        tx: &mut Self::Tx,
        wallet_id: &WalletId,
        amount: Decimal,
    ) -> Result<(), WalletError>;

    /// Reads a wallet outside any transaction.
    async fn get_wallet(&self, wallet_id: &WalletId) -> Result<Option<Wallet>, WalletError>;

    /// Lists the live wallets of a user, oldest first.
    async fn list_user_wallets(&self, user_id: &UserId) -> Result<Vec<Wallet>, WalletError>;
}
