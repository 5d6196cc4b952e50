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

//! In-memory wallet storage with row locks and transactions.
//!
//! Each row pairs an async lock (the "for update" lock, held across awaits by
//! a transaction) with the committed wallet state. Readers outside a
//! transaction see the committed state without waiting on row locks.
//!
//! ```text
//!  begin ──► lock rows, edit working copies ──► commit: publish copies, unlock
//!                                          └──► rollback / drop: discard, unlock
//! ```

use super::{UnitOfWork, WalletRepository};
use crate::base::{UserId, WalletId};
use crate::{Wallet, WalletError};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

#[derive(Debug)]
struct Row {
    lock: Arc<RowLock<()>>,
    committed: RwLock<Wallet>,
}

impl Row {
    fn new(wallet: Wallet) -> Self {
        Self {
            lock: Arc::new(RowLock::new(())),
            committed: RwLock::new(wallet),
        }
    }

    fn snapshot(&self) -> Wallet {
        self.committed.read().clone()
    }
}

/// A row locked by a transaction, with its uncommitted state.
#[derive(Debug)]
struct LockedRow {
    row: Arc<Row>,
    working: Wallet,
    _guard: OwnedMutexGuard<()>,
}

/// Open transaction over a [`MemoryWalletStore`].
///
/// Dropping it without committing discards every change and releases the
/// row locks.
#[derive(Debug)]
pub struct MemoryTx {
    rows: Vec<LockedRow>,
}

impl MemoryTx {
    fn locked(&mut self, wallet_id: &WalletId) -> Option<&mut LockedRow> {
        self.rows.iter_mut().find(|locked| locked.working.id == *wallet_id)
    }

    /// Ids of the rows locked so far, in acquisition order.
    pub fn lock_order(&self) -> Vec<WalletId> {
        self.rows.iter().map(|locked| locked.working.id).collect()
    }
}

/// Wallet store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryWalletStore {
    wallets: DashMap<WalletId, Arc<Row>>,
    /// Wallets whose next transactional update fails.
    failing: Mutex<HashSet<WalletId>>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure for the next transactional balance update of
    /// `wallet_id`, to exercise rollback paths.
    pub fn fail_updates_for(&self, wallet_id: WalletId) {
        self.failing.lock().insert(wallet_id);
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Sum of every committed balance.
    pub fn total_balance(&self) -> Decimal {
        self.wallets
            .iter()
            .map(|row| row.value().committed.read().balance)
            .sum()
    }

    fn row(&self, wallet_id: &WalletId) -> Option<Arc<Row>> {
        self.wallets.get(wallet_id).map(|row| Arc::clone(row.value()))
    }

    async fn lock_row(&self, tx: &mut MemoryTx, row: Arc<Row>) -> Wallet {
        let guard = Arc::clone(&row.lock).lock_owned().await;
        let working = row.snapshot();
        tx.rows.push(LockedRow {
            row,
            working: working.clone(),
            _guard: guard,
        });
        working
    }
}

fn apply(wallet: &mut Wallet, amount: Decimal) -> Result<(), WalletError> {
    if wallet.is_deleted() {
        return Err(WalletError::EmptyWallet);
    }
    let balance = wallet
        .balance
        .checked_add(amount)
        .ok_or(WalletError::InvalidAmount)?;
    if balance < Decimal::ZERO {
        return Err(WalletError::InsufficientBalance);
    }
    wallet.balance = balance;
    wallet.updated_at = Utc::now();
    Ok(())
}

#[async_trait]
impl UnitOfWork for MemoryWalletStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, WalletError> {
        Ok(MemoryTx { rows: Vec::new() })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), WalletError> {
        for locked in &tx.rows {
            *locked.row.committed.write() = locked.working.clone();
        }
        // Guards drop with `tx`, after every row is published.
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), WalletError> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl WalletRepository for MemoryWalletStore {
    type Tx = MemoryTx;

    async fn insert(&self, wallet: &Wallet) -> Result<(), WalletError> {
        match self.wallets.entry(wallet.id) {
            Entry::Occupied(_) => Err(WalletError::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Row::new(wallet.clone())));
                Ok(())
            }
        }
    }

    async fn add_wallet_balance(
        &self,
        wallet_id: &WalletId,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let row = self.row(wallet_id).ok_or(WalletError::EmptyWallet)?;
        let _guard = row.lock.lock().await;
        let mut wallet = row.snapshot();
        apply(&mut wallet, amount)?;
        *row.committed.write() = wallet;
        Ok(())
    }

    async fn get_user_wallet_for_update(
        &self,
        tx: &mut MemoryTx,
        wallet_id: &WalletId,
        user_id: &UserId,
    ) -> Result<Option<Wallet>, WalletError> {
        if let Some(locked) = tx.locked(wallet_id) {
            return Ok(locked
                .working
                .is_owned_by(user_id)
                .then(|| locked.working.clone()));
        }

        let Some(row) = self.row(wallet_id) else {
            return Ok(None);
        };
        // A row that does not match the predicate stays unlocked.
        if !row.snapshot().is_owned_by(user_id) {
            return Ok(None);
        }
        let wallet = self.lock_row(tx, row).await;
        if !wallet.is_owned_by(user_id) {
            // Deleted while we waited for the lock.
            tx.rows.pop();
            return Ok(None);
        }
        Ok(Some(wallet))
    }

    async fn add_wallet_balance_with_tx(
        &self,
        tx: &mut MemoryTx,
        wallet_id: &WalletId,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        if self.failing.lock().remove(wallet_id) {
            return Err(WalletError::Internal(format!(
                "injected update failure for wallet {wallet_id}"
            )));
        }

        if tx.locked(wallet_id).is_none() {
            let row = self.row(wallet_id).ok_or(WalletError::EmptyWallet)?;
            self.lock_row(tx, row).await;
        }
        let locked = tx.locked(wallet_id).ok_or(WalletError::EmptyWallet)?;
        apply(&mut locked.working, amount)
    }

    async fn get_wallet(&self, wallet_id: &WalletId) -> Result<Option<Wallet>, WalletError> {
        Ok(self.row(wallet_id).map(|row| row.snapshot()))
    }

    async fn list_user_wallets(&self, user_id: &UserId) -> Result<Vec<Wallet>, WalletError> {
        let mut wallets: Vec<Wallet> = self
            .wallets
            .iter()
            .map(|row| row.value().snapshot())
            .filter(|wallet| wallet.is_owned_by(user_id))
            .collect();
        wallets.sort_by_key(|wallet| wallet.id);
        Ok(wallets)
    }
}
