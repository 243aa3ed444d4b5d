use rust_decimal_macros::dec;

use super::*;
use crate::audit::AuditAction;
use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::test_support::{date, ledger_with_chart, post, transfer};

#[tokio::test]
async fn test_scenario_post_moves_both_balances() {
    let (ledger, chart) = ledger_with_chart().await;

    let entry = post(&ledger, "JE-2026-0001", date(2026, 1, 15), &chart.kas, &chart.penjualan, dec!(10000000)).await;

    assert_eq!(entry.status, EntryStatus::Posted);
    assert_eq!(entry.total_debit, dec!(10000000));
    assert_eq!(entry.total_credit, dec!(10000000));
    assert!(entry.posted_at.is_some());

    let balances = ledger.balances();
    assert_eq!(balances.balance_of(chart.kas.id, None).await.unwrap().balance, dec!(10000000));
    assert_eq!(balances.balance_of(chart.penjualan.id, None).await.unwrap().balance, dec!(10000000));
}

#[tokio::test]
async fn test_submit_then_post() {
    let (ledger, chart) = ledger_with_chart().await;
    let journal = ledger.journal();

    let draft = journal
        .submit_draft(transfer("JE-1", date(2026, 1, 3), &chart.kas, &chart.modal, dec!(250)))
        .await
        .unwrap();
    assert_eq!(draft.status, EntryStatus::Draft);
    assert_eq!(ledger.balances().balance_of(chart.kas.id, None).await.unwrap().balance, dec!(0));

    let posted = journal.post(draft.id).await.unwrap();
    assert_eq!(posted.id, draft.id);
    assert_eq!(posted.status, EntryStatus::Posted);

    let err = journal.post(draft.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_unbalanced_entry_is_rejected_and_stays_draft() {
    let (ledger, chart) = ledger_with_chart().await;
    let draft = JournalDraft::new(
        EntryMeta::new("JE-1", date(2026, 1, 3), "Off by a cent"),
        vec![
            LineInput::debit(chart.kas.id, dec!(100.00)),
            LineInput::credit(chart.penjualan.id, dec!(99.99)),
        ],
    )
    .unwrap();

    let stored = ledger.journal().submit_draft(draft).await.unwrap();
    let err = ledger.journal().post(stored.id).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::Unbalanced {
            debit: dec!(100.00),
            credit: dec!(99.99),
        }
    );

    let reloaded = ledger.journal().get(stored.id).await.unwrap();
    assert_eq!(reloaded.entry.status, EntryStatus::Draft);
    assert_eq!(ledger.balances().balance_of(chart.kas.id, None).await.unwrap().balance, dec!(0));
}

#[tokio::test]
async fn test_header_and_inactive_accounts_are_rejected() {
    let (ledger, chart) = ledger_with_chart().await;

    let err = ledger
        .journal()
        .post_draft(transfer("JE-1", date(2026, 1, 3), &chart.assets, &chart.modal, dec!(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccount { account_id, .. } if account_id == chart.assets.id));

    ledger.accounts().deactivate(chart.bank.id).await.unwrap();
    let err = ledger
        .journal()
        .post_draft(transfer("JE-2", date(2026, 1, 3), &chart.bank, &chart.modal, dec!(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccount { account_id, .. } if account_id == chart.bank.id));

    // Nothing from the failed attempts reached the ledger.
    let feed = ledger.journal().posted_entries(&PostedEntryFilter::default()).await.unwrap();
    assert!(feed.is_empty());
}

#[tokio::test]
async fn test_cancel_posts_mirror_and_keeps_original() {
    let (ledger, chart) = ledger_with_chart().await;
    let original = post(&ledger, "JE-7", date(2026, 2, 10), &chart.kas, &chart.penjualan, dec!(750)).await;

    let reversal = ledger.journal().cancel(original.id, "duplicate sale").await.unwrap();

    assert_eq!(reversal.code, "REV-JE-7");
    assert_eq!(reversal.entry_date, original.entry_date);
    assert_eq!(reversal.reversal_of, Some(original.id));
    assert_eq!(reversal.description, format!("Reversal: {} (duplicate sale)", original.description));
    assert_eq!(reversal.status, EntryStatus::Posted);

    let unchanged = ledger.journal().get(original.id).await.unwrap();
    assert_eq!(unchanged.entry, original);
    assert_eq!(
        ledger.journal().reversal_of(original.id).await.unwrap().map(|e| e.id),
        Some(reversal.id)
    );

    let balances = ledger.balances();
    assert_eq!(balances.balance_of(chart.kas.id, None).await.unwrap().balance, dec!(0));
    assert_eq!(balances.balance_of(chart.penjualan.id, None).await.unwrap().balance, dec!(0));

    let err = ledger.journal().cancel(original.id, "again").await.unwrap_err();
    assert_eq!(err, LedgerError::AlreadyReversed(original.id));
}

#[tokio::test]
async fn test_cancel_requires_posted_entry() {
    let (ledger, chart) = ledger_with_chart().await;
    let draft = ledger
        .journal()
        .submit_draft(transfer("JE-1", date(2026, 1, 3), &chart.kas, &chart.modal, dec!(1)))
        .await
        .unwrap();
    let err = ledger.journal().cancel(draft.id, "nope").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_closed_period_refuses_posts_and_cancels() {
    let (ledger, chart) = ledger_with_chart().await;
    let january = post(&ledger, "JE-1", date(2026, 1, 10), &chart.kas, &chart.penjualan, dec!(300)).await;
    ledger
        .closing()
        .close(date(2026, 1, 1), date(2026, 1, 31), chart.laba_ditahan.id, None)
        .await
        .unwrap();

    let err = ledger
        .journal()
        .post_draft(transfer("JE-2", date(2026, 1, 20), &chart.kas, &chart.penjualan, dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::PeriodLocked {
            start: date(2026, 1, 1),
            end: date(2026, 1, 31),
        }
    );

    let err = ledger.journal().cancel(january.id, "late fix").await.unwrap_err();
    assert!(matches!(err, LedgerError::PeriodLocked { .. }));

    // February is still open.
    post(&ledger, "JE-3", date(2026, 2, 1), &chart.kas, &chart.penjualan, dec!(1)).await;
}

#[tokio::test]
async fn test_discard_draft() {
    let (ledger, chart) = ledger_with_chart().await;
    let journal = ledger.journal();
    let draft = journal
        .submit_draft(transfer("JE-1", date(2026, 1, 3), &chart.kas, &chart.modal, dec!(9)))
        .await
        .unwrap();

    let discarded = journal.discard_draft(draft.id).await.unwrap();
    assert_eq!(discarded.status, EntryStatus::Cancelled);
    assert!(discarded.cancelled_at.is_some());
    assert!(journal.get(draft.id).await.unwrap().lines.is_empty());

    let err = journal.post(draft.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let posted = post(&ledger, "JE-2", date(2026, 1, 4), &chart.kas, &chart.modal, dec!(9)).await;
    let err = journal.discard_draft(posted.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_posted_entries_feed() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 3), &chart.kas, &chart.modal, dec!(1000)).await;
    post(&ledger, "JE-2", date(2026, 1, 9), &chart.gaji, &chart.kas, dec!(200)).await;
    post(&ledger, "JE-3", date(2026, 2, 2), &chart.bank, &chart.modal, dec!(50)).await;
    ledger
        .journal()
        .submit_draft(transfer("JE-4", date(2026, 1, 5), &chart.kas, &chart.modal, dec!(1)))
        .await
        .unwrap();

    let january = ledger
        .journal()
        .posted_entries(&PostedEntryFilter {
            from: Some(date(2026, 1, 1)),
            to: Some(date(2026, 1, 31)),
            account_id: None,
        })
        .await
        .unwrap();
    let codes: Vec<_> = january.iter().map(|e| e.entry.code.as_str()).collect();
    assert_eq!(codes, vec!["JE-1", "JE-2"]);

    let bank = ledger
        .journal()
        .posted_entries(&PostedEntryFilter {
            account_id: Some(chart.bank.id),
            ..PostedEntryFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(bank.len(), 1);
    assert_eq!(bank[0].lines.len(), 2);
}

#[tokio::test]
async fn test_post_invalidates_cached_balances() {
    let (ledger, chart) = ledger_with_chart().await;
    post(&ledger, "JE-1", date(2026, 1, 3), &chart.kas, &chart.modal, dec!(100)).await;

    let balances = ledger.balances();
    balances.balance_of(chart.kas.id, None).await.unwrap();
    assert_eq!(balances.cached(chart.kas.id).unwrap().balance, dec!(100));

    post(&ledger, "JE-2", date(2026, 1, 4), &chart.kas, &chart.modal, dec!(40)).await;
    assert!(balances.cached(chart.kas.id).is_none());
    assert_eq!(balances.balance_of(chart.kas.id, None).await.unwrap().balance, dec!(140));
}

#[tokio::test]
async fn test_posting_is_audited() {
    let (ledger, chart) = ledger_with_chart().await;
    let entry = post(&ledger, "JE-1", date(2026, 1, 3), &chart.kas, &chart.modal, dec!(100)).await;

    let mut tx = ledger.store().begin().await.unwrap();
    let actions: Vec<_> = tx
        .audit_trail(entry.id.into())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Created, AuditAction::Posted]);
}
