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

//! Property-based tests for the wallet ledger.
//!
//! These tests verify invariants that should hold for any sequence of
//! top-ups and transfers.

mod common;

use common::{Funded, MemoryLedger, balance, funded, ledger};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::runtime::Runtime;
use wallet_ledger::WalletError;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.01 to 1000.00).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// A transfer between two of `wallets` wallets.
fn arb_transfer(wallets: usize) -> impl Strategy<Value = (usize, usize, Decimal)> {
    (0..wallets, 0..wallets, arb_amount())
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

async fn open_wallets(ledger: &MemoryLedger, balances: &[Decimal]) -> Vec<Funded> {
    let mut wallets = Vec::with_capacity(balances.len());
    for balance in balances {
        wallets.push(funded(ledger, *balance).await);
    }
    wallets
}

// =============================================================================
// Transfer Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Transfers match a sequential model exactly: money is conserved, no
    /// balance goes negative, and a rejected transfer changes nothing.
    #[test]
    fn transfers_match_model(
        balances in prop::collection::vec(arb_amount(), 2..5),
        transfers in prop::collection::vec(arb_transfer(4), 0..40),
    ) {
        runtime().block_on(async {
            let (ledger, store) = ledger();
            let wallets = open_wallets(&ledger, &balances).await;
            let mut expected = balances.clone();
            let total: Decimal = balances.iter().sum();

            for (from, to, amount) in transfers {
                let (from, to) = (from % wallets.len(), to % wallets.len());
                let (sender, receiver) = (&wallets[from], &wallets[to]);
                let result = ledger
                    .transfer_balance(&sender.user, &sender.wallet, &receiver.user, &receiver.wallet, amount)
                    .await;

                if from == to {
                    prop_assert_eq!(result, Err(WalletError::SameAccount));
                } else if expected[from] < amount {
                    prop_assert_eq!(result, Err(WalletError::InsufficientBalance));
                } else {
                    prop_assert_eq!(result, Ok(()));
                    expected[from] -= amount;
                    expected[to] += amount;
                }
                prop_assert_eq!(store.total_balance(), total);
            }

            for (wallet, expected) in wallets.iter().zip(&expected) {
                let actual = balance(&ledger, &wallet.wallet).await;
                prop_assert_eq!(actual, *expected);
                prop_assert!(actual >= Decimal::ZERO);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}

// =============================================================================
// Top-up Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Each idempotency key is applied at most once, by its first use.
    #[test]
    fn each_key_applies_once(
        topups in prop::collection::vec((0usize..6, arb_amount()), 1..30),
    ) {
        runtime().block_on(async {
            let (ledger, _) = ledger();
            let wallet = funded(&ledger, Decimal::ZERO).await;
            let mut first_use: HashMap<String, Decimal> = HashMap::new();

            for (key, amount) in topups {
                let key = format!("key-{key}");
                let result = ledger
                    .topup_wallet(&wallet.wallet, &wallet.user, amount, &key)
                    .await;
                if first_use.contains_key(&key) {
                    prop_assert_eq!(result, Err(WalletError::AlreadyExists));
                } else {
                    prop_assert_eq!(result, Ok(()));
                    first_use.insert(key, amount);
                }
            }

            let expected: Decimal = first_use.values().sum();
            prop_assert_eq!(balance(&ledger, &wallet.wallet).await, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Signed top-ups never drive a balance below zero.
    #[test]
    fn signed_topups_never_overdraw(
        amounts in prop::collection::vec((arb_amount(), any::<bool>()), 1..30),
    ) {
        runtime().block_on(async {
            let (ledger, _) = ledger();
            let wallet = funded(&ledger, Decimal::ZERO).await;
            let mut expected = Decimal::ZERO;

            for (i, (amount, debit)) in amounts.into_iter().enumerate() {
                let amount = if debit { -amount } else { amount };
                let result = ledger
                    .topup_wallet(&wallet.wallet, &wallet.user, amount, &format!("k{i}"))
                    .await;
                if expected + amount < Decimal::ZERO {
                    prop_assert_eq!(result, Err(WalletError::InsufficientBalance));
                } else {
                    prop_assert_eq!(result, Ok(()));
                    expected += amount;
                }
            }

            prop_assert_eq!(balance(&ledger, &wallet.wallet).await, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
