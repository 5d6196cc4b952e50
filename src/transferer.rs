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

//! Atomic balance transfers between two wallets.
//!
//! # Lock ordering
//!
//! Both wallet rows are locked before the sufficiency check, always in
//! ascending wallet id order regardless of which side is sending. Two
//! transfers moving money in opposite directions between the same pair
//! therefore queue on the same first row instead of each holding the lock
//! the other waits for.
//!
//! ```text
//!  A → B:  lock A, lock B        B → A:  lock A, lock B      (A < B)
//! ```
//!
//! # Atomicity
//!
//! Everything after validation runs in one unit of work. Any error rolls the
//! transaction back, leaving both balances as they were. Dropping the future
//! mid-flight drops the transaction, which rolls it back too.

use crate::base::{UserId, WalletId, parse_user_id, parse_wallet_id};
use crate::repository::{UnitOfWork, WalletRepository};
use crate::{TransferWallet, Wallet, WalletError};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{Span, debug, info};

/// Parsed transfer with both parties resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TransferLegs {
    sender_id: UserId,
    sender_wallet_id: WalletId,
    receiver_id: UserId,
    receiver_wallet_id: WalletId,
    amount: Decimal,
}

impl TransferLegs {
    fn parse(transfer: &TransferWallet) -> Result<Self, WalletError> {
        let sender_id = parse_user_id(&transfer.sender_id)?;
        let receiver_id = parse_user_id(&transfer.receiver_id)?;
        Ok(Self {
            sender_id,
            sender_wallet_id: parse_wallet_id(&transfer.sender_wallet_id)
                .ok_or(WalletError::InvalidUser)?,
            receiver_id,
            receiver_wallet_id: parse_wallet_id(&transfer.receiver_wallet_id)
                .ok_or(WalletError::InvalidUser)?,
            amount: transfer.amount,
        })
    }

    /// Whether the sender row must be locked before the receiver row.
    fn sender_locks_first(&self) -> bool {
        self.sender_wallet_id.as_string() < self.receiver_wallet_id.as_string()
    }
}

/// Compares parsed ids when both parse, so letter case does not matter;
/// falls back to the trimmed text otherwise.
fn same_user(sender_id: &str, receiver_id: &str) -> bool {
    match (parse_user_id(sender_id), parse_user_id(receiver_id)) {
        (Ok(sender), Ok(receiver)) => sender == receiver,
        _ => sender_id.trim() == receiver_id.trim(),
    }
}

pub struct WalletTransferer<R, U> {
    repo: Arc<R>,
    uow: Arc<U>,
    span: Span,
}

impl<R, U> WalletTransferer<R, U>
where
    R: WalletRepository,
    U: UnitOfWork<Tx = R::Tx>,
{
    pub fn new(repo: Arc<R>, uow: Arc<U>, span: Span) -> Self {
        Self { repo, uow, span }
    }

    /// Moves `transfer.amount` from the sender wallet to the receiver wallet.
    ///
    /// # Errors
    ///
    /// Validation, before any transaction opens:
    /// - [`WalletError::InvalidTransfer`] - No command given.
    /// - [`WalletError::SameAccount`] - Sender and receiver are the same user.
    /// - [`WalletError::InvalidAmount`] - Amount is zero or negative.
    /// - [`WalletError::InvalidUser`] - A user or wallet id is malformed.
    ///
    /// Inside the transaction, which is rolled back:
    /// - [`WalletError::InvalidUser`] - A wallet is missing or owned by someone else.
    /// - [`WalletError::InsufficientBalance`] - Sender balance is below the amount.
    /// - Repository errors, unchanged.
    pub async fn transfer_balance(
        &self,
        transfer: Option<TransferWallet>,
    ) -> Result<(), WalletError> {
        let transfer = transfer.ok_or(WalletError::InvalidTransfer)?;
        if same_user(&transfer.sender_id, &transfer.receiver_id) {
            return Err(WalletError::SameAccount);
        }
        if transfer.amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        let legs = TransferLegs::parse(&transfer)?;

        let mut tx = self.uow.begin().await?;
        let outcome = self.move_balance(&mut tx, &legs).await;
        self.uow.finish(tx, outcome).await.inspect_err(|err| {
            debug!(
                parent: &self.span,
                sender_wallet_id = %legs.sender_wallet_id,
                receiver_wallet_id = %legs.receiver_wallet_id,
                error = %err,
                "transfer rolled back"
            );
        })?;

        info!(
            parent: &self.span,
            sender_wallet_id = %legs.sender_wallet_id,
            receiver_wallet_id = %legs.receiver_wallet_id,
            amount = %legs.amount,
            "transfer committed"
        );
        Ok(())
    }

    async fn move_balance(&self, tx: &mut R::Tx, legs: &TransferLegs) -> Result<(), WalletError> {
        let (sender, receiver) = self.lock_wallets(tx, legs).await?;
        let (Some(sender), Some(receiver)) = (sender, receiver) else {
            return Err(WalletError::InvalidUser);
        };

        // Read under the lock, so no concurrent transfer can spend it first.
        if sender.balance < legs.amount {
            return Err(WalletError::InsufficientBalance);
        }

        self.repo
            .add_wallet_balance_with_tx(tx, &sender.id, -legs.amount)
            .await?;
        self.repo
            .add_wallet_balance_with_tx(tx, &receiver.id, legs.amount)
            .await
    }

    /// Locks both wallets in ascending id order; returns `(sender, receiver)`.
    async fn lock_wallets(
        &self,
        tx: &mut R::Tx,
        legs: &TransferLegs,
    ) -> Result<(Option<Wallet>, Option<Wallet>), WalletError> {
        if legs.sender_locks_first() {
            let sender = self.lock_sender(tx, legs).await?;
            let receiver = self.lock_receiver(tx, legs).await?;
            Ok((sender, receiver))
        } else {
            let receiver = self.lock_receiver(tx, legs).await?;
            let sender = self.lock_sender(tx, legs).await?;
            Ok((sender, receiver))
        }
    }

    async fn lock_sender(
        &self,
        tx: &mut R::Tx,
        legs: &TransferLegs,
    ) -> Result<Option<Wallet>, WalletError> {
        self.repo
            .get_user_wallet_for_update(tx, &legs.sender_wallet_id, &legs.sender_id)
            .await
    }

    async fn lock_receiver(
        &self,
        tx: &mut R::Tx,
        legs: &TransferLegs,
    ) -> Result<Option<Wallet>, WalletError> {
        self.repo
            .get_user_wallet_for_update(tx, &legs.receiver_wallet_id, &legs.receiver_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use ulid::Ulid;
    use uuid::Uuid;

    fn command(sender_wallet: Ulid, receiver_wallet: Ulid) -> TransferWallet {
        TransferWallet {
            sender_id: Uuid::new_v4().to_string(),
            sender_wallet_id: sender_wallet.to_string(),
            receiver_id: Uuid::new_v4().to_string(),
            receiver_wallet_id: receiver_wallet.to_string(),
            amount: dec!(1),
        }
    }

    #[test]
    fn smaller_wallet_id_locks_first() {
        let mut generator = ulid::Generator::new();
        let smaller = generator.generate().unwrap();
        let larger = generator.generate().unwrap();

        let forward = TransferLegs::parse(&command(smaller, larger)).unwrap();
        let backward = TransferLegs::parse(&command(larger, smaller)).unwrap();

        assert!(forward.sender_locks_first());
        assert!(!backward.sender_locks_first());
    }

    #[test]
    fn same_user_ignores_case_and_padding() {
        let user = Uuid::new_v4().to_string();

        assert!(same_user(&user.to_uppercase(), &user));
        assert!(same_user(&format!(" {user}\t"), &user));
        assert!(same_user("", "  "));
        assert!(!same_user(&user, &Uuid::new_v4().to_string()));
    }

    #[test]
    fn malformed_wallet_id_is_invalid_user() {
        let mut transfer = command(Ulid::new(), Ulid::new());
        transfer.receiver_wallet_id = "nope".into();
        assert_eq!(TransferLegs::parse(&transfer), Err(WalletError::InvalidUser));
    }
}
