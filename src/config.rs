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

//! Ledger configuration.
//!
//! Every setting is a command line flag that can also be supplied through
//! the environment.

use clap::Args;
use std::time::Duration;

/// Default lifetime of a consumed idempotency key: 24 hours.
pub const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Postgres connection string; in-memory storage when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Redis connection string; in-memory idempotency keys when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "IDEMPOTENCY_KEY_PREFIX", default_value = "idempotency:")]
    pub idempotency_key_prefix: String,

    /// How long a consumed idempotency key blocks retries
    #[arg(long, env = "IDEMPOTENCY_TTL_SECS", default_value_t = DEFAULT_IDEMPOTENCY_TTL_SECS)]
    pub idempotency_ttl_secs: u64,

    /// Deadline applied to every ledger command
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 5_000)]
    pub request_timeout_ms: u64,
}

impl LedgerConfig {
    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            redis_url: None,
            idempotency_key_prefix: "idempotency:".to_string(),
            idempotency_ttl_secs: DEFAULT_IDEMPOTENCY_TTL_SECS,
            request_timeout_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: LedgerConfig,
    }

    #[test]
    fn flag_defaults_match_default_impl() {
        let cli = Cli::parse_from(["wallet-ledger"]);
        let expected = LedgerConfig::default();
        assert_eq!(cli.config.idempotency_ttl(), Duration::from_secs(86_400));
        assert_eq!(cli.config.request_timeout(), expected.request_timeout());
        assert_eq!(cli.config.database_max_connections, expected.database_max_connections);
        assert_eq!(cli.config.idempotency_key_prefix, expected.idempotency_key_prefix);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "wallet-ledger",
            "--idempotency-ttl-secs",
            "60",
            "--request-timeout-ms",
            "250",
        ]);
        assert_eq!(cli.config.idempotency_ttl(), Duration::from_secs(60));
        assert_eq!(cli.config.request_timeout(), Duration::from_millis(250));
    }
}
