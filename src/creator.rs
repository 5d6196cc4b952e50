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

//! Wallet creation.

use crate::base::{WalletId, parse_user_id};
use crate::repository::WalletRepository;
use crate::{NewWallet, Wallet, WalletError};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{Span, info, warn};
use ulid::Generator;

/// Validates and persists new wallets.
///
/// Wallet ids come from a monotonic ULID generator, so ids minted by one
/// creator sort in creation order even within the same millisecond.
pub struct WalletCreator<R> {
    repo: Arc<R>,
    ids: Mutex<Generator>,
    span: Span,
}

impl<R: WalletRepository> WalletCreator<R> {
    pub fn new(repo: Arc<R>, span: Span) -> Self {
        Self {
            repo,
            ids: Mutex::new(Generator::new()),
            span,
        }
    }

    /// Creates a wallet for `wallet.user_id` and returns it as persisted.
    ///
    /// # Errors
    ///
    /// - [`WalletError::EmptyWallet`] - No wallet given.
    /// - [`WalletError::InvalidUser`] - User id blank, malformed or nil.
    /// - [`WalletError::InvalidBalance`] - Opening balance is negative.
    /// - Repository errors, unchanged.
    pub async fn create(&self, wallet: Option<NewWallet>) -> Result<Wallet, WalletError> {
        let request = wallet.ok_or(WalletError::EmptyWallet)?;
        let user_id = parse_user_id(&request.user_id)?;
        if request.balance < Decimal::ZERO {
            return Err(WalletError::InvalidBalance);
        }

        let wallet = Wallet::open(self.next_id()?, user_id, request.balance, Utc::now());
        self.repo.insert(&wallet).await.inspect_err(|err| {
            warn!(parent: &self.span, user_id = %user_id, error = %err, "wallet insert failed");
        })?;

        info!(
            parent: &self.span,
            wallet_id = %wallet.id,
            user_id = %user_id,
            "wallet created"
        );
        Ok(wallet)
    }

    fn next_id(&self) -> Result<WalletId, WalletError> {
        self.ids
            .lock()
            .generate()
            .map(WalletId)
            .map_err(WalletError::internal)
    }
}
