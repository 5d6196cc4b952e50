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

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_ledger::{Ledger, LedgerConfig, MemoryIdempotencyStore, MemoryWalletStore};

pub type MemoryLedger = Ledger<MemoryWalletStore, MemoryIdempotencyStore>;

/// A ledger over fresh in-memory backends, plus a handle on its store.
pub fn ledger() -> (MemoryLedger, Arc<MemoryWalletStore>) {
    ledger_with(LedgerConfig::default())
}

pub fn ledger_with(config: LedgerConfig) -> (MemoryLedger, Arc<MemoryWalletStore>) {
    let store = Arc::new(MemoryWalletStore::new());
    let keys = Arc::new(MemoryIdempotencyStore::new(config.idempotency_ttl()));
    let ledger = Ledger::new(Arc::clone(&store), keys, &config, tracing::Span::none());
    (ledger, store)
}

pub fn new_user() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Owner and wallet id of a freshly funded wallet.
pub struct Funded {
    pub user: String,
    pub wallet: String,
}

pub async fn funded(ledger: &MemoryLedger, balance: Decimal) -> Funded {
    let user = new_user();
    let wallet = ledger.create_wallet(&user).await.unwrap().id.to_string();
    if !balance.is_zero() {
        ledger
            .topup_wallet(&wallet, &user, balance, &format!("seed-{wallet}"))
            .await
            .unwrap();
    }
    Funded { user, wallet }
}

pub async fn balance(ledger: &MemoryLedger, wallet: &str) -> Decimal {
    ledger.wallet(wallet).await.unwrap().unwrap().balance
}
