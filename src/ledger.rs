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

//! Wallet ledger command surface.
//!
//! The [`Ledger`] wires the creator, top-up and transfer services over one
//! storage backend and one idempotency store, and is what a transport layer
//! calls into.
//!
//! # Commands
//!
//! - **Create**: Open a wallet for a user.
//! - **Top-up**: Add a signed amount to a wallet, at most once per idempotency key.
//! - **Transfer**: Move a positive amount between wallets of two different users.
//!
//! # Deadlines
//!
//! Every command runs under the configured request timeout. When it elapses
//! the command future is dropped, any open transaction with it, and the caller
//! gets [`WalletError::Cancelled`].

use crate::base::{parse_user_id, parse_wallet_id};
use crate::creator::WalletCreator;
use crate::idempotency::IdempotencyKeyRepository;
use crate::repository::{UnitOfWork, WalletRepository};
use crate::topup::WalletTopup;
use crate::transferer::WalletTransferer;
use crate::{LedgerConfig, NewWallet, TopupWallet, TransferWallet, Wallet, WalletError};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Span, warn};

/// Wallet ledger over a store `S` and an idempotency store `I`.
///
/// Commands from different callers run concurrently; transfers touching
/// disjoint wallet pairs never wait on each other.
pub struct Ledger<S, I> {
    store: Arc<S>,
    creator: WalletCreator<S>,
    topup: WalletTopup<S, I>,
    transferer: WalletTransferer<S, S>,
    timeout: Duration,
    span: Span,
}

impl<S, I> Ledger<S, I>
where
    S: WalletRepository + UnitOfWork<Tx = <S as WalletRepository>::Tx>,
    I: IdempotencyKeyRepository,
{
    pub fn new(store: Arc<S>, keys: Arc<I>, config: &LedgerConfig, span: Span) -> Self {
        Self {
            creator: WalletCreator::new(Arc::clone(&store), span.clone()),
            topup: WalletTopup::new(Arc::clone(&store), keys, span.clone()),
            transferer: WalletTransferer::new(Arc::clone(&store), Arc::clone(&store), span.clone()),
            store,
            timeout: config.request_timeout(),
            span,
        }
    }

    /// Opens a zero-balance wallet for `user_id`.
    ///
    /// # Errors
    ///
    /// [`WalletError::InvalidUser`], [`WalletError::Cancelled`], or a storage error.
    pub async fn create_wallet(&self, user_id: &str) -> Result<Wallet, WalletError> {
        self.bounded("create_wallet", self.creator.create(Some(NewWallet::for_user(user_id))))
            .await
    }

    /// Adds `amount` to the wallet at most once per `idempotency_key`.
    ///
    /// # Errors
    ///
    /// - [`WalletError::EmptyWallet`] - Wallet id blank or unknown.
    /// - [`WalletError::InvalidUser`] - User id blank or malformed.
    /// - [`WalletError::InvalidAmount`] - Amount is zero.
    /// - [`WalletError::AlreadyExists`] - Key already consumed.
    /// - [`WalletError::Cancelled`] - Deadline elapsed.
    /// - [`WalletError::Internal`] - Backend failure.
    pub async fn topup_wallet(
        &self,
        wallet_id: &str,
        user_id: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> Result<(), WalletError> {
        let command = TopupWallet {
            wallet_id: wallet_id.to_owned(),
            user_id: user_id.to_owned(),
            amount,
            idempotency_key: idempotency_key.to_owned(),
        };
        self.bounded("topup_wallet", self.topup.topup(Some(command)))
            .await
    }

    /// Moves `amount` from the sender wallet to the receiver wallet atomically.
    ///
    /// # Errors
    ///
    /// - [`WalletError::SameAccount`] - Sender and receiver are the same user.
    /// - [`WalletError::InvalidAmount`] - Amount is not positive.
    /// - [`WalletError::InvalidUser`] - A wallet is missing or not owned by its user.
    /// - [`WalletError::InsufficientBalance`] - Sender cannot cover the amount.
    /// - [`WalletError::Cancelled`] - Deadline elapsed; nothing was committed.
    /// - [`WalletError::Internal`] - Backend failure; nothing was committed.
    pub async fn transfer_balance(
        &self,
        sender_id: &str,
        sender_wallet_id: &str,
        receiver_id: &str,
        receiver_wallet_id: &str,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let command = TransferWallet {
            sender_id: sender_id.to_owned(),
            sender_wallet_id: sender_wallet_id.to_owned(),
            receiver_id: receiver_id.to_owned(),
            receiver_wallet_id: receiver_wallet_id.to_owned(),
            amount,
        };
        self.bounded(
            "transfer_balance",
            self.transferer.transfer_balance(Some(command)),
        )
        .await
    }

    /// Retrieves a wallet by id.
    ///
    /// Returns `Ok(None)` if no wallet exists with that id.
    pub async fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, WalletError> {
        let wallet_id = parse_wallet_id(wallet_id).ok_or(WalletError::EmptyWallet)?;
        self.bounded("wallet", self.store.get_wallet(&wallet_id))
            .await
    }

    /// Lists the live wallets owned by `user_id`.
    pub async fn user_wallets(&self, user_id: &str) -> Result<Vec<Wallet>, WalletError> {
        let user_id = parse_user_id(user_id)?;
        self.bounded("user_wallets", self.store.list_user_wallets(&user_id))
            .await
    }

    pub fn creator(&self) -> &WalletCreator<S> {
        &self.creator
    }

    pub fn topup(&self) -> &WalletTopup<S, I> {
        &self.topup
    }

    pub fn transferer(&self) -> &WalletTransferer<S, S> {
        &self.transferer
    }

    async fn bounded<T>(
        &self,
        command: &'static str,
        future: impl Future<Output = Result<T, WalletError>>,
    ) -> Result<T, WalletError> {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(parent: &self.span, command, timeout = ?self.timeout, "deadline elapsed");
                Err(WalletError::Cancelled)
            }
        }
    }
}
