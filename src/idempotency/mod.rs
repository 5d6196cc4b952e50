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

//! Idempotency key tracking.
//!
//! A key is claimed with a single atomic "set if absent, with expiry" call.
//! Of two concurrent requests carrying the same key, exactly one observes the
//! key as absent; the other sees it as already existing.

mod memory;
mod redis_store;

pub use self::memory::MemoryIdempotencyStore;
pub use self::redis_store::RedisIdempotencyStore;

use crate::WalletError;
use async_trait::async_trait;

#[async_trait]
pub trait IdempotencyKeyRepository: Send + Sync {
    /// Tests and claims `key` in one step.
    ///
    /// Returns `Ok(false)` when the key was absent and is now claimed by this
    /// call, `Ok(true)` when an unexpired claim already exists.
    ///
    /// # Errors
    ///
    /// [`WalletError::Internal`] when the backend cannot be reached.
    async fn exists(&self, key: &str) -> Result<bool, WalletError>;

    /// Drops a claim so the key can be used again.
    async fn release(&self, key: &str) -> Result<(), WalletError>;
}
