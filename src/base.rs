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

//! Core identifier types for wallets and users.

use crate::WalletError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;
use uuid::Uuid;

/// Unique identifier for a wallet.
///
/// Wraps a ULID: 128 bits, time-ordered, generated by the wallet creator and
/// never by the storage layer. The canonical string form sorts in the same
/// order as the underlying value, which the transfer lock order relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WalletId(pub Ulid);

impl WalletId {
    /// Canonical 26-character Crockford base32 form.
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WalletId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

/// Identifier of the user owning a wallet, as issued by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Parses a trimmed, well-formed, non-nil user id.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, WalletError> {
    let user_id: UserId = raw.trim().parse().map_err(|_| WalletError::InvalidUser)?;
    if user_id.is_nil() {
        return Err(WalletError::InvalidUser);
    }
    Ok(user_id)
}

/// Parses a trimmed wallet id, `None` when blank or malformed.
pub(crate) fn parse_wallet_id(raw: &str) -> Option<WalletId> {
    raw.trim().parse().ok()
}
