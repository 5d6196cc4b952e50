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

//! Wallet entity and the commands that mutate it.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use wallet_ledger::{UserId, Wallet, WalletId};
//!
//! let user = UserId(uuid::Uuid::new_v4());
//! let wallet = Wallet::open(WalletId(ulid::Ulid::new()), user, dec!(0), chrono::Utc::now());
//! assert_eq!(wallet.balance, dec!(0));
//! assert_eq!(wallet.created_by, user);
//! ```

use crate::base::{UserId, WalletId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One balance account owned by exactly one user.
///
/// Audit fields are stamped by the mutating operation, never by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub deleted_by: Option<UserId>,
}

impl Wallet {
    /// Builds a freshly created wallet stamped as created and updated by its owner.
    pub fn open(id: WalletId, user_id: UserId, balance: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            balance,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            created_by: user_id,
            updated_by: user_id,
            deleted_by: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the wallet is live and owned by `user_id`.
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        !self.is_deleted() && self.user_id == *user_id
    }
}

/// Request to create a wallet for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWallet {
    pub user_id: String,
    /// Opening balance, zero unless stated.
    #[serde(default)]
    pub balance: Decimal,
}

impl NewWallet {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            balance: Decimal::ZERO,
        }
    }
}

/// Idempotent balance increase on one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopupWallet {
    pub wallet_id: String,
    pub user_id: String,
    /// Signed, nonzero.
    pub amount: Decimal,
    pub idempotency_key: String,
}

/// Atomic balance move between two wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferWallet {
    pub sender_id: String,
    pub sender_wallet_id: String,
    pub receiver_id: String,
    pub receiver_wallet_id: String,
    /// Strictly positive.
    pub amount: Decimal,
}
