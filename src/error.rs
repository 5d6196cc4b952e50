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

//! Error types for wallet operations.

use thiserror::Error;

/// Wallet ledger errors.
///
/// Every kind is a per-request failure. The transport layer maps them to
/// protocol status codes through [`WalletError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Wallet or command is missing, or the referenced wallet does not exist
    #[error("wallet is empty")]
    EmptyWallet,

    /// User id is missing, malformed, or does not own the wallet
    #[error("invalid user")]
    InvalidUser,

    /// Amount is zero, or not positive where a positive amount is required
    #[error("invalid amount")]
    InvalidAmount,

    /// Balance is not numeric or is negative
    #[error("invalid balance")]
    InvalidBalance,

    /// Idempotency key already consumed, or resource already present
    #[error("already exists")]
    AlreadyExists,

    /// Transfer command is missing
    #[error("invalid transfer")]
    InvalidTransfer,

    /// Sender and receiver are the same user
    #[error("sender and receiver are the same account")]
    SameAccount,

    /// Sender balance is lower than the requested amount
    #[error("insufficient balance")]
    InsufficientBalance,

    /// The caller's deadline elapsed before the operation finished
    #[error("operation cancelled")]
    Cancelled,

    /// Unexpected failure from a storage or idempotency backend
    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::EmptyWallet => "EMPTY_WALLET",
            WalletError::InvalidUser => "INVALID_USER",
            WalletError::InvalidAmount => "INVALID_AMOUNT",
            WalletError::InvalidBalance => "INVALID_BALANCE",
            WalletError::AlreadyExists => "ALREADY_EXISTS",
            WalletError::InvalidTransfer => "INVALID_TRANSFER",
            WalletError::SameAccount => "SAME_ACCOUNT",
            WalletError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            WalletError::Cancelled => "CANCELLED",
            WalletError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the error comes from input validation rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WalletError::EmptyWallet
                | WalletError::InvalidUser
                | WalletError::InvalidAmount
                | WalletError::InvalidBalance
                | WalletError::InvalidTransfer
                | WalletError::SameAccount
        )
    }

    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        WalletError::Internal(err.to_string())
    }
}
