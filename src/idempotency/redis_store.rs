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

//! Redis-backed idempotency keys.

use super::IdempotencyKeyRepository;
use crate::{LedgerConfig, WalletError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Claims keys with `SET key 1 NX EX ttl`, one round trip per claim.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    redis: ConnectionManager,
    prefix: String,
    ttl: Duration,
}

impl RedisIdempotencyStore {
    pub fn new(redis: ConnectionManager, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
            ttl,
        }
    }

    /// Opens a managed connection to `config.redis_url`.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, WalletError> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| WalletError::Internal("redis url is not configured".into()))?;
        let client = redis::Client::open(url).map_err(WalletError::internal)?;
        let redis = ConnectionManager::new(client)
            .await
            .map_err(WalletError::internal)?;
        Ok(Self::new(
            redis,
            config.idempotency_key_prefix.clone(),
            config.idempotency_ttl(),
        ))
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn ttl_secs(&self) -> u64 {
        // EX rejects zero
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl IdempotencyKeyRepository for RedisIdempotencyStore {
    async fn exists(&self, key: &str) -> Result<bool, WalletError> {
        // OK when the key was set, nil when it was already present.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(key))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(&mut self.redis.clone())
            .await
            .map_err(WalletError::internal)?;
        Ok(reply.is_none())
    }

    async fn release(&self, key: &str) -> Result<(), WalletError> {
        let _: i64 = redis::cmd("DEL")
            .arg(self.key(key))
            .query_async(&mut self.redis.clone())
            .await
            .map_err(WalletError::internal)?;
        Ok(())
    }
}
