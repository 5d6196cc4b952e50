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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, info_span, warn};
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    IdempotencyKeyRepository, Ledger, LedgerConfig, MemoryIdempotencyStore, MemoryWalletStore,
    PgWalletStore, RedisIdempotencyStore, UnitOfWork, WalletError, WalletRepository,
};

/// Wallet Ledger - Replay wallet commands from a CSV file
///
/// Reads create, topup and transfer commands from a CSV file, applies them
/// in order, and writes the resulting wallet balances to stdout.
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Replays wallet ledger commands from a CSV file", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: type,user,wallet,to_user,to_wallet,amount,key
    /// Example: cargo run -- commands.csv > wallets.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    #[command(flatten)]
    config: LedgerConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let result = match (&args.config.database_url, &args.config.redis_url) {
        (Some(_), Some(_)) => match connect_both(&args.config).await {
            Ok((store, keys)) => run(store, keys, &args.config, file).await,
            Err(e) => Err(e),
        },
        (Some(_), None) => match PgWalletStore::connect(&args.config).await {
            Ok(store) => run(store, memory_keys(&args.config), &args.config, file).await,
            Err(e) => Err(e),
        },
        (None, Some(_)) => match RedisIdempotencyStore::connect(&args.config).await {
            Ok(keys) => run(MemoryWalletStore::new(), keys, &args.config, file).await,
            Err(e) => Err(e),
        },
        (None, None) => {
            run(
                MemoryWalletStore::new(),
                memory_keys(&args.config),
                &args.config,
                file,
            )
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("Error processing commands: {}", e);
        process::exit(1);
    }
}

async fn connect_both(
    config: &LedgerConfig,
) -> Result<(PgWalletStore, RedisIdempotencyStore), WalletError> {
    Ok((
        PgWalletStore::connect(config).await?,
        RedisIdempotencyStore::connect(config).await?,
    ))
}

fn memory_keys(config: &LedgerConfig) -> MemoryIdempotencyStore {
    MemoryIdempotencyStore::new(config.idempotency_ttl())
}

async fn run<S, I>(
    store: S,
    keys: I,
    config: &LedgerConfig,
    input: File,
) -> Result<(), WalletError>
where
    S: WalletRepository + UnitOfWork<Tx = <S as WalletRepository>::Tx>,
    I: IdempotencyKeyRepository,
{
    let ledger = Ledger::new(
        Arc::new(store),
        Arc::new(keys),
        config,
        info_span!("wallet_ledger"),
    );
    let wallets = replay(&ledger, BufReader::new(input)).await;
    write_wallets(&ledger, &wallets, std::io::stdout()).await
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, user, wallet, to_user, to_wallet, amount, key`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    command: String,
    user: String,
    wallet: String,
    #[serde(default)]
    to_user: String,
    #[serde(default)]
    to_wallet: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    key: String,
}

/// Wallet labels from `create` rows, bound to the ids the ledger generated.
type Labels = BTreeMap<String, (String, String)>;

/// Applies every command in the CSV, in order.
///
/// Malformed rows and rejected commands are logged and skipped.
async fn replay<S, I, R>(ledger: &Ledger<S, I>, reader: R) -> Labels
where
    S: WalletRepository + UnitOfWork<Tx = <S as WalletRepository>::Tx>,
    I: IdempotencyKeyRepository,
    R: Read,
{
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut labels = Labels::new();
    for (line, record) in csv_reader.deserialize::<CsvRecord>().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(line, error = %e, "skipping malformed row");
                continue;
            }
        };
        if let Err(e) = apply(ledger, &mut labels, &record).await {
            warn!(line, command = %record.command, code = e.code(), error = %e, "command rejected");
        }
    }
    labels
}

async fn apply<S, I>(
    ledger: &Ledger<S, I>,
    labels: &mut Labels,
    record: &CsvRecord,
) -> Result<(), WalletError>
where
    S: WalletRepository + UnitOfWork<Tx = <S as WalletRepository>::Tx>,
    I: IdempotencyKeyRepository,
{
    match record.command.to_lowercase().as_str() {
        "create" => {
            let wallet = ledger.create_wallet(&record.user).await?;
            labels.insert(
                record.wallet.clone(),
                (wallet.id.to_string(), wallet.user_id.to_string()),
            );
            Ok(())
        }
        "topup" => {
            let amount = record.amount.ok_or(WalletError::InvalidAmount)?;
            ledger
                .topup_wallet(&resolve(labels, &record.wallet), &record.user, amount, &record.key)
                .await
        }
        "transfer" => {
            let amount = record.amount.ok_or(WalletError::InvalidAmount)?;
            ledger
                .transfer_balance(
                    &record.user,
                    &resolve(labels, &record.wallet),
                    &record.to_user,
                    &resolve(labels, &record.to_wallet),
                    amount,
                )
                .await
        }
        _ => Err(WalletError::InvalidTransfer),
    }
}

/// Maps a label to its wallet id; unknown labels pass through as raw ids.
fn resolve(labels: &Labels, label: &str) -> String {
    labels
        .get(label)
        .map(|(id, _)| id.clone())
        .unwrap_or_else(|| label.to_owned())
}

fn output_error(err: impl std::fmt::Display) -> WalletError {
    WalletError::Internal(format!("writing output: {err}"))
}

/// Writes `wallet,user,balance` rows, one per created wallet label.
async fn write_wallets<S, I, W>(
    ledger: &Ledger<S, I>,
    labels: &Labels,
    writer: W,
) -> Result<(), WalletError>
where
    S: WalletRepository + UnitOfWork<Tx = <S as WalletRepository>::Tx>,
    I: IdempotencyKeyRepository,
    W: Write,
{
    let mut csv_writer = Writer::from_writer(writer);
    csv_writer
        .write_record(["wallet", "user", "balance"])
        .map_err(output_error)?;

    for (label, (id, user)) in labels {
        let Some(wallet) = ledger.wallet(id).await? else {
            continue;
        };
        csv_writer
            .write_record([label.as_str(), user.as_str(), &wallet.balance.to_string()])
            .map_err(output_error)?;
    }
    csv_writer.flush().map_err(output_error)
}
