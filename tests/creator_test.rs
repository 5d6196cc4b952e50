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

//! Wallet creation through the public API.

mod common;

use common::{ledger, new_user};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wallet_ledger::{NewWallet, WalletError};

#[tokio::test]
async fn create_persists_wallet_with_audit_fields() {
    let (ledger, store) = ledger();
    let user = new_user();

    let wallet = ledger.create_wallet(&user).await.unwrap();

    assert_eq!(wallet.user_id.to_string(), user);
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(wallet.created_by, wallet.user_id);
    assert_eq!(wallet.updated_by, wallet.user_id);
    assert_eq!(wallet.created_at, wallet.updated_at);
    assert!(wallet.deleted_at.is_none());
    assert_eq!(store.len(), 1);

    let stored = ledger.wallet(&wallet.id.to_string()).await.unwrap().unwrap();
    assert_eq!(stored, wallet);
}

#[tokio::test]
async fn missing_wallet_is_empty_wallet() {
    let (ledger, store) = ledger();
    let result = ledger.creator().create(None).await;
    assert_eq!(result, Err(WalletError::EmptyWallet));
    assert!(store.is_empty());
}

#[tokio::test]
async fn blank_malformed_or_nil_user_is_invalid_user() {
    let (ledger, store) = ledger();

    for user in ["", "   ", "user-42", "00000000-0000-0000-0000-000000000000"] {
        let result = ledger.create_wallet(user).await;
        assert_eq!(result, Err(WalletError::InvalidUser), "user {user:?}");
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn user_may_own_several_wallets() {
    let (ledger, _) = ledger();
    let user = new_user();

    let first = ledger.create_wallet(&user).await.unwrap();
    let second = ledger.create_wallet(&user).await.unwrap();
    ledger.create_wallet(&new_user()).await.unwrap();

    assert_ne!(first.id, second.id);
    let owned: Vec<_> = ledger
        .user_wallets(&user)
        .await
        .unwrap()
        .into_iter()
        .map(|wallet| wallet.id)
        .collect();
    assert_eq!(owned, vec![first.id, second.id]);
}

#[tokio::test]
async fn opening_balance_is_kept() {
    let (ledger, _) = ledger();
    let request = NewWallet {
        user_id: new_user(),
        balance: dec!(25.75),
    };

    let wallet = ledger.creator().create(Some(request)).await.unwrap();
    let stored = ledger.wallet(&wallet.id.to_string()).await.unwrap().unwrap();
    assert_eq!(stored.balance, dec!(25.75));
}
