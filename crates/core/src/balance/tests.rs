use std::time::Duration;

use buku_shared::types::AccountId;
use rust_decimal_macros::dec;

use crate::error::LedgerError;
use crate::test_support::{date, ledger_with_chart, post};

#[tokio::test]
async fn test_as_of_bounds_by_entry_date() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 5), &chart.kas, &chart.modal, dec!(1000)).await;
    post(&ledger, "JE-2", date(2026, 1, 20), &chart.gaji, &chart.kas, dec!(300)).await;
    post(&ledger, "JE-3", date(2026, 2, 1), &chart.kas, &chart.penjualan, dec!(50)).await;

    let balances = ledger.balances();
    let at = |day| balances.balance_of(chart.kas.id, Some(day));
    assert_eq!(at(date(2026, 1, 4)).await.unwrap().balance, dec!(0));
    assert_eq!(at(date(2026, 1, 5)).await.unwrap().balance, dec!(1000));
    assert_eq!(at(date(2026, 1, 31)).await.unwrap().balance, dec!(700));

    let all_time = balances.balance_of(chart.kas.id, None).await.unwrap();
    assert_eq!(all_time.debit, dec!(1050));
    assert_eq!(all_time.credit, dec!(300));
    assert_eq!(all_time.balance, dec!(750));

    // Dated reads never touch the cache.
    assert_eq!(balances.cached(chart.kas.id).unwrap().balance, dec!(750));
    assert_eq!(at(date(2026, 1, 31)).await.unwrap().balance, dec!(700));
}

#[tokio::test]
async fn test_credit_normal_accounts_grow_with_credits() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 5), &chart.hpp, &chart.utang, dec!(400)).await;

    let balances = ledger.balances();
    assert_eq!(balances.balance_of(chart.utang.id, None).await.unwrap().balance, dec!(400));
    assert_eq!(balances.balance_of(chart.hpp.id, None).await.unwrap().balance, dec!(400));
}

#[tokio::test]
async fn test_balances_for_keeps_input_order() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 5), &chart.kas, &chart.penjualan, dec!(10)).await;

    let ids = [chart.penjualan.id, chart.bank.id, chart.kas.id];
    let balances = ledger.balances().balances_for(&ids).await.unwrap();

    assert_eq!(balances.iter().map(|b| b.account_id).collect::<Vec<_>>(), ids);
    assert_eq!(
        balances.iter().map(|b| b.balance).collect::<Vec<_>>(),
        vec![dec!(10), dec!(0), dec!(10)]
    );

    let err = ledger
        .balances()
        .balances_for(&[chart.kas.id, AccountId::new()])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let (ledger, _) = ledger_with_chart().await;
    let err = ledger.balances().balance_of(AccountId::new(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));
}

#[tokio::test]
async fn test_refresh_matches_recompute() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 5), &chart.kas, &chart.modal, dec!(123.45)).await;
    post(&ledger, "JE-2", date(2026, 1, 6), &chart.gaji, &chart.kas, dec!(23.40)).await;

    let balances = ledger.balances();
    let refreshed = balances.refresh(chart.kas.id).await.unwrap();
    let recomputed = balances
        .balance_of(chart.kas.id, Some(date(9999, 12, 31)))
        .await
        .unwrap();

    assert_eq!(refreshed, recomputed);
    assert_eq!(balances.cached(chart.kas.id), Some(refreshed));
}

#[tokio::test]
async fn test_refresh_all_fills_every_active_account() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 5), &chart.kas, &chart.modal, dec!(10)).await;

    let balances = ledger.balances();
    let filled = balances.refresh_all().await.unwrap();

    // 5 headers and 8 leaves.
    assert_eq!(filled, 13);
    assert_eq!(balances.cached(chart.kas.id).unwrap().balance, dec!(10));
    assert_eq!(balances.cached(chart.bank.id).unwrap().balance, dec!(0));
}

#[tokio::test]
async fn test_invalidate_drops_entry() {
    let (ledger, chart) = ledger_with_chart().await;
    let balances = ledger.balances();
    balances.refresh(chart.kas.id).await.unwrap();

    balances.invalidate(&[chart.kas.id]);
    assert!(balances.cached(chart.kas.id).is_none());
}

#[tokio::test]
async fn test_refresh_job_fills_cache() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 5), &chart.kas, &chart.modal, dec!(10)).await;

    let aggregator = std::sync::Arc::new(crate::balance::BalanceAggregator::new(
        std::sync::Arc::clone(ledger.store()),
        std::sync::Arc::clone(ledger.balances().cache()),
    ));
    let handle = aggregator.spawn_refresh_job(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();

    assert_eq!(ledger.balances().cached(chart.kas.id).unwrap().balance, dec!(10));
}
