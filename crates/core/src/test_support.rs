//! Shared fixtures for service tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::accounts::{Account, AccountType, NewAccount};
use crate::journal::{EntryMeta, JournalDraft, JournalEntry, LineInput};
use crate::ledger::Ledger;
use crate::store::InMemoryLedgerStore;

pub(crate) type TestLedger = Ledger<InMemoryLedgerStore>;

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A small Indonesian SME chart.
pub(crate) struct Chart {
    pub assets: Account,
    pub kas: Account,
    pub bank: Account,
    pub utang: Account,
    pub modal: Account,
    pub laba_ditahan: Account,
    pub penjualan: Account,
    pub hpp: Account,
    pub gaji: Account,
}

pub(crate) async fn ledger_with_chart() -> (TestLedger, Chart) {
    let ledger = Ledger::new(InMemoryLedgerStore::new());
    let coa = ledger.accounts();

    let header = |code: &str, name: &str, t| NewAccount::header(code, name, t);
    let assets = coa.create(header("1000", "Aset", AccountType::Asset)).await.unwrap();
    let liabilities = coa.create(header("2000", "Kewajiban", AccountType::Liability)).await.unwrap();
    let equity = coa.create(header("3000", "Ekuitas", AccountType::Equity)).await.unwrap();
    let revenue = coa.create(header("4000", "Pendapatan", AccountType::Revenue)).await.unwrap();
    let expense = coa.create(header("5000", "Beban", AccountType::Expense)).await.unwrap();

    let leaf = |code: &str, name: &str, t, parent: &Account| NewAccount::leaf(code, name, t).under(parent.id);
    let chart = Chart {
        kas: coa.create(leaf("1101", "Kas", AccountType::Asset, &assets)).await.unwrap(),
        bank: coa.create(leaf("1102", "Bank", AccountType::Asset, &assets)).await.unwrap(),
        utang: coa
            .create(leaf("2101", "Utang Usaha", AccountType::Liability, &liabilities))
            .await
            .unwrap(),
        modal: coa
            .create(leaf("3101", "Modal Pemilik", AccountType::Equity, &equity))
            .await
            .unwrap(),
        laba_ditahan: coa
            .create(leaf("3102", "Laba Ditahan", AccountType::Equity, &equity).system_critical())
            .await
            .unwrap(),
        penjualan: coa
            .create(leaf("4101", "Pendapatan Penjualan", AccountType::Revenue, &revenue))
            .await
            .unwrap(),
        hpp: coa
            .create(leaf("5101", "Harga Pokok Penjualan", AccountType::Expense, &expense))
            .await
            .unwrap(),
        gaji: coa
            .create(leaf("5201", "Beban Gaji", AccountType::Expense, &expense))
            .await
            .unwrap(),
        assets,
    };
    (ledger, chart)
}

pub(crate) fn transfer(code: &str, on: NaiveDate, debit: &Account, credit: &Account, amount: Decimal) -> JournalDraft {
    JournalDraft::new(
        EntryMeta::new(code, on, format!("{code} {} / {}", debit.name, credit.name)),
        vec![LineInput::debit(debit.id, amount), LineInput::credit(credit.id, amount)],
    )
    .unwrap()
}

pub(crate) async fn post(
    ledger: &TestLedger,
    code: &str,
    on: NaiveDate,
    debit: &Account,
    credit: &Account,
    amount: Decimal,
) -> JournalEntry {
    ledger
        .journal()
        .post_draft(transfer(code, on, debit, credit, amount))
        .await
        .unwrap()
}
