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

//! Idempotent wallet top-ups.
//!
//! A top-up runs an ordered pipeline where every step may exit early:
//!
//! 1. reject a missing command,
//! 2. claim the idempotency key (an existing claim means duplicate),
//! 3. validate wallet, user and amount,
//! 4. atomically add the amount to the wallet balance.
//!
//! The claim in step 2 is the only guard against double application, so it
//! happens in the same round trip as the presence check.

use crate::base::{WalletId, parse_user_id, parse_wallet_id};
use crate::idempotency::IdempotencyKeyRepository;
use crate::repository::WalletRepository;
use crate::{TopupWallet, WalletError};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{Span, debug, info, warn};

pub struct WalletTopup<R, I> {
    repo: Arc<R>,
    keys: Arc<I>,
    span: Span,
}

impl<R, I> WalletTopup<R, I>
where
    R: WalletRepository,
    I: IdempotencyKeyRepository,
{
    pub fn new(repo: Arc<R>, keys: Arc<I>, span: Span) -> Self {
        Self { repo, keys, span }
    }

    /// Adds `topup.amount` to the wallet balance at most once per
    /// idempotency key.
    ///
    /// # Errors
    ///
    /// - [`WalletError::EmptyWallet`] - No command, blank key, or unknown wallet.
    /// - [`WalletError::AlreadyExists`] - The idempotency key was already consumed.
    /// - [`WalletError::InvalidUser`] - User id blank or malformed.
    /// - [`WalletError::InvalidAmount`] - Amount is zero.
    /// - [`WalletError::Internal`] - Idempotency store or repository failure.
    pub async fn topup(&self, topup: Option<TopupWallet>) -> Result<(), WalletError> {
        let topup = topup.ok_or(WalletError::EmptyWallet)?;
        let key = topup.idempotency_key.trim();
        if key.is_empty() {
            return Err(WalletError::EmptyWallet);
        }

        if self.keys.exists(key).await.inspect_err(|err| {
            warn!(parent: &self.span, key, error = %err, "idempotency check failed");
        })? {
            debug!(parent: &self.span, key, "duplicate top-up ignored");
            return Err(WalletError::AlreadyExists);
        }

        let (wallet_id, amount) = match validate(&topup) {
            Ok(valid) => valid,
            Err(err) => {
                // Nothing was applied, so a corrected retry may reuse the key.
                if let Err(release_err) = self.keys.release(key).await {
                    warn!(parent: &self.span, key, error = %release_err, "idempotency key release failed");
                }
                return Err(err);
            }
        };

        self.repo
            .add_wallet_balance(&wallet_id, amount)
            .await
            .inspect_err(|err| {
                warn!(parent: &self.span, %wallet_id, key, error = %err, "top-up failed");
            })?;

        info!(parent: &self.span, %wallet_id, %amount, key, "wallet topped up");
        Ok(())
    }
}

fn validate(topup: &TopupWallet) -> Result<(WalletId, Decimal), WalletError> {
    let wallet_id = topup.wallet_id.trim();
    if wallet_id.is_empty() {
        return Err(WalletError::EmptyWallet);
    }
    if topup.user_id.trim().is_empty() {
        return Err(WalletError::InvalidUser);
    }
    if topup.amount.is_zero() {
        return Err(WalletError::InvalidAmount);
    }

    let wallet_id = parse_wallet_id(wallet_id).ok_or(WalletError::EmptyWallet)?;
    parse_user_id(&topup.user_id)?;
    Ok((wallet_id, topup.amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use ulid::Ulid;
    use uuid::Uuid;

    fn command(wallet_id: &str, user_id: &str, amount: Decimal) -> TopupWallet {
        TopupWallet {
            wallet_id: wallet_id.into(),
            user_id: user_id.into(),
            amount,
            idempotency_key: "k1".into(),
        }
    }

    #[test]
    fn validation_order() {
        let wallet = Ulid::new().to_string();
        let user = Uuid::new_v4().to_string();

        assert_eq!(
            validate(&command("  ", "", dec!(0))),
            Err(WalletError::EmptyWallet)
        );
        assert_eq!(
            validate(&command(&wallet, " ", dec!(0))),
            Err(WalletError::InvalidUser)
        );
        assert_eq!(
            validate(&command(&wallet, &user, dec!(0))),
            Err(WalletError::InvalidAmount)
        );
        assert_eq!(
            validate(&command("wallet-1", &user, dec!(1))),
            Err(WalletError::EmptyWallet)
        );
        assert_eq!(
            validate(&command(&wallet, "user-1", dec!(1))),
            Err(WalletError::InvalidUser)
        );
    }

    #[test]
    fn negative_amount_is_valid() {
        let wallet = Ulid::new().to_string();
        let user = Uuid::new_v4().to_string();
        let (_, amount) = validate(&command(&wallet, &user, dec!(-3.5))).unwrap();
        assert_eq!(amount, dec!(-3.5));
    }

    #[test]
    fn ids_are_trimmed() {
        let wallet = Ulid::new();
        let user = Uuid::new_v4();
        let (wallet_id, _) = validate(&command(
            &format!(" {wallet} "),
            &format!("{user}\n"),
            dec!(1),
        ))
        .unwrap();
        assert_eq!(wallet_id, WalletId(wallet));
    }
}
