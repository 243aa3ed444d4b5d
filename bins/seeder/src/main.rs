//! Database seeder for Buku development and testing.
//!
//! Seeds the standard chart of accounts and, on an empty journal, a small
//! sample month of activity. Running it twice is harmless.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use buku_core::accounts::{Account, AccountType, NewAccount};
use buku_core::journal::{EntryMeta, JournalDraft, LineInput, PostedEntryFilter, SourceDocument};
use buku_core::{Ledger, LedgerError};
use buku_db::PgLedgerStore;
use buku_shared::LedgerConfig;
use buku_shared::config::{LogFormat, LoggingConfig};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type PgLedger = Ledger<PgLedgerStore>;

/// Standard chart: (code, name, type, parent code, system critical).
const CHART: &[(&str, &str, AccountType, Option<&str>, bool)] = &[
    ("1000", "Aset", AccountType::Asset, None, false),
    ("1100", "Aset Lancar", AccountType::Asset, Some("1000"), false),
    ("1101", "Kas", AccountType::Asset, Some("1100"), false),
    ("1102", "Bank", AccountType::Asset, Some("1100"), false),
    ("1201", "Piutang Usaha", AccountType::Asset, Some("1100"), false),
    ("2000", "Kewajiban", AccountType::Liability, None, false),
    ("2101", "Utang Usaha", AccountType::Liability, Some("2000"), false),
    ("3000", "Ekuitas", AccountType::Equity, None, false),
    ("3101", "Modal Pemilik", AccountType::Equity, Some("3000"), false),
    ("3102", "Laba Ditahan", AccountType::Equity, Some("3000"), true),
    ("4000", "Pendapatan", AccountType::Revenue, None, false),
    ("4101", "Pendapatan Penjualan", AccountType::Revenue, Some("4000"), false),
    ("5000", "Beban", AccountType::Expense, None, false),
    ("5101", "Harga Pokok Penjualan", AccountType::Expense, Some("5000"), false),
    ("5201", "Beban Gaji", AccountType::Expense, Some("5000"), false),
    ("5202", "Beban Listrik", AccountType::Expense, Some("5000"), false),
];

/// Sample journal: (code, day of January 2026, description, debit code, credit code, amount).
const SAMPLE_JOURNAL: &[(&str, u32, &str, &str, &str, i64)] = &[
    ("JE-2026-0001", 2, "Setoran modal awal", "1102", "3101", 50_000_000),
    ("JE-2026-0002", 5, "Penarikan kas kecil", "1101", "1102", 5_000_000),
    ("JE-2026-0003", 12, "Penjualan tunai", "1101", "4101", 12_500_000),
    ("JE-2026-0004", 15, "Penjualan kredit", "1201", "4101", 8_000_000),
    ("JE-2026-0005", 25, "Gaji karyawan Januari", "5201", "1102", 9_000_000),
    ("JE-2026-0006", 28, "Tagihan listrik Januari", "5202", "1101", 750_000),
];

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.filter.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    info!("Connecting to database...");
    let db = buku_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let ledger = Ledger::from_config(PgLedgerStore::new(db), &config);

    info!("Seeding chart of accounts...");
    seed_chart(&ledger).await?;

    info!("Seeding sample journal...");
    seed_journal(&ledger).await?;

    info!("Seeding complete!");
    Ok(())
}

/// Returns the active account with `code`, if one exists.
async fn existing(ledger: &PgLedger, code: &str) -> anyhow::Result<Option<Account>> {
    match ledger.accounts().resolve(code).await {
        Ok(account) => Ok(Some(account)),
        Err(LedgerError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn seed_chart(ledger: &PgLedger) -> anyhow::Result<()> {
    for &(code, name, account_type, parent, system_critical) in CHART {
        if existing(ledger, code).await?.is_some() {
            info!(code, "Account already exists, skipping");
            continue;
        }

        let mut input = if CHART.iter().any(|(_, _, _, p, _)| *p == Some(code)) {
            NewAccount::header(code, name, account_type)
        } else {
            NewAccount::leaf(code, name, account_type)
        };
        if let Some(parent_code) = parent {
            let parent = ledger.accounts().resolve(parent_code).await?;
            input = input.under(parent.id);
        }
        if system_critical {
            input = input.system_critical();
        }

        let account = ledger.accounts().create(input).await?;
        info!(code, account_id = %account.id, "Account created");
    }
    Ok(())
}

async fn seed_journal(ledger: &PgLedger) -> anyhow::Result<()> {
    let posted = ledger
        .journal()
        .posted_entries(&PostedEntryFilter::default())
        .await?;
    if !posted.is_empty() {
        info!(entries = posted.len(), "Journal already has entries, skipping");
        return Ok(());
    }

    for &(code, day, description, debit, credit, amount) in SAMPLE_JOURNAL {
        let entry_date = NaiveDate::from_ymd_opt(2026, 1, day).context("invalid sample date")?;
        let debit = ledger.accounts().resolve(debit).await?;
        let credit = ledger.accounts().resolve(credit).await?;
        let amount = Decimal::from(amount);

        let draft = JournalDraft::new(
            EntryMeta::new(code, entry_date, description).with_source(SourceDocument::new("SEED", code)),
            vec![LineInput::debit(debit.id, amount), LineInput::credit(credit.id, amount)],
        )?;
        let entry = ledger.journal().post_draft(draft).await?;
        info!(code, entry_id = %entry.id, "Sample entry posted");
    }
    Ok(())
}
