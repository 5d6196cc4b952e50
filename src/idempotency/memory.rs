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

//! Thread-safe idempotency key store with expiry.

use super::IdempotencyKeyRepository;
use crate::WalletError;
use crate::config::DEFAULT_IDEMPOTENCY_TTL_SECS;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

/// In-process idempotency keys.
///
/// Claims go through the [`DashMap`] entry API, which holds the shard lock
/// across the check and the insert, so racing claims on one key serialize.
#[derive(Debug)]
pub struct MemoryIdempotencyStore {
    /// Claimed keys mapped to the instant their claim expires.
    keys: DashMap<String, Instant>,
    ttl: Duration,
}

impl MemoryIdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            keys: DashMap::new(),
            ttl,
        }
    }

    /// Removes every expired claim and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.keys.retain(|_, expires_at| {
            let live = *expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_IDEMPOTENCY_TTL_SECS))
    }
}

#[async_trait]
impl IdempotencyKeyRepository for MemoryIdempotencyStore {
    async fn exists(&self, key: &str) -> Result<bool, WalletError> {
        let now = Instant::now();
        match self.keys.entry(key.to_owned()) {
            Entry::Occupied(entry) if *entry.get() > now => Ok(true),
            Entry::Occupied(mut entry) => {
                entry.insert(now + self.ttl);
                Ok(false)
            }
            Entry::Vacant(entry) => {
                entry.insert(now + self.ttl);
                Ok(false)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<(), WalletError> {
        self.keys.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn first_claim_wins() {
        let store = MemoryIdempotencyStore::default();
        assert!(!store.exists("k1").await.unwrap());
        assert!(store.exists("k1").await.unwrap());
        assert!(!store.exists("k2").await.unwrap());
    }

    #[tokio::test]
    async fn released_key_can_be_claimed_again() {
        let store = MemoryIdempotencyStore::default();
        store.exists("k1").await.unwrap();
        store.release("k1").await.unwrap();
        assert!(!store.exists("k1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn claim_expires_after_ttl() {
        let store = MemoryIdempotencyStore::new(Duration::from_secs(60));
        assert!(!store.exists("k1").await.unwrap());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.exists("k1").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("k1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_keys() {
        let store = MemoryIdempotencyStore::new(Duration::from_secs(10));
        store.exists("old").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        store.exists("new").await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.exists("new").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryIdempotencyStore::default());
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.exists("shared").await.unwrap() })
            })
            .collect();

        let mut claimed = 0;
        for handle in handles {
            if !handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn purge_counts_stay_exact_while_keys_are_claimed() {
        const CLAIMS: usize = 20_000;
        // Zero TTL: every claim is expired as soon as it lands.
        let store = Arc::new(MemoryIdempotencyStore::new(Duration::ZERO));
        let done = Arc::new(AtomicBool::new(false));

        let purger = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut purged = 0;
                while !done.load(Ordering::Acquire) {
                    purged += store.purge_expired();
                }
                purged
            })
        };

        for i in 0..CLAIMS {
            assert!(!store.exists(&format!("k{i}")).await.unwrap());
        }
        done.store(true, Ordering::Release);

        let purged = purger.join().unwrap();
        assert_eq!(purged + store.len(), CLAIMS);
    }
}
