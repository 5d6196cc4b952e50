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

//! # Wallet Ledger
//!
//! This library provides a wallet ledger engine: it creates wallets, applies
//! idempotent balance top-ups, and performs atomic balance transfers between
//! two wallets under concurrent access.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Command surface wiring the services below
//! - [`WalletCreator`]: Validates and persists new wallets
//! - [`WalletTopup`]: Idempotent balance increases
//! - [`WalletTransferer`]: Deadlock-free atomic transfers
//! - [`WalletRepository`] / [`UnitOfWork`]: Storage contracts, with in-memory and Postgres backends
//! - [`IdempotencyKeyRepository`]: Atomic key claiming, with in-memory and Redis backends
//! - [`WalletError`]: Error kinds for every failure
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal_macros::dec;
//! use wallet_ledger::{Ledger, LedgerConfig, MemoryIdempotencyStore, MemoryWalletStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), wallet_ledger::WalletError> {
//! let ledger = Ledger::new(
//!     Arc::new(MemoryWalletStore::new()),
//!     Arc::new(MemoryIdempotencyStore::default()),
//!     &LedgerConfig::default(),
//!     tracing::Span::none(),
//! );
//!
//! let alice = uuid::Uuid::new_v4().to_string();
//! let bob = uuid::Uuid::new_v4().to_string();
//! let from = ledger.create_wallet(&alice).await?.id.to_string();
//! let to = ledger.create_wallet(&bob).await?.id.to_string();
//!
//! ledger.topup_wallet(&from, &alice, dec!(100.00), "k1").await?;
//! ledger.transfer_balance(&alice, &from, &bob, &to, dec!(50.00)).await?;
//!
//! assert_eq!(ledger.wallet(&from).await?.unwrap().balance, dec!(50.00));
//! assert_eq!(ledger.wallet(&to).await?.unwrap().balance, dec!(50.00));
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! Every component is `Send + Sync` and meant to be shared behind an `Arc`.
//! Balances change only under a row lock inside a transaction (transfers) or
//! through a single atomic increment (top-ups).

mod base;
pub mod config;
mod creator;
pub mod error;
pub mod idempotency;
mod ledger;
pub mod repository;
mod topup;
mod transferer;
mod wallet;

pub use base::{UserId, WalletId};
pub use config::LedgerConfig;
pub use creator::WalletCreator;
pub use error::WalletError;
pub use idempotency::{IdempotencyKeyRepository, MemoryIdempotencyStore, RedisIdempotencyStore};
pub use ledger::Ledger;
pub use repository::{MemoryTx, MemoryWalletStore, PgWalletStore, UnitOfWork, WalletRepository};
pub use topup::WalletTopup;
pub use transferer::WalletTransferer;
pub use wallet::{NewWallet, TopupWallet, TransferWallet, Wallet};
