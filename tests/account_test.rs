use std::sync::atomic::{AtomicU32, Ordering};

use common::{Ledger, admin};
use fantasy_ledger::{
    account::repository, auth::Caller, error::LedgerError, utils::retry_on_conflict,
};
use futures::future::join_all;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};
mod common;

#[tokio::test]
async fn opened_account_starts_empty_and_first_time() {
    let ledger = Ledger::new().await;
    let account = assert_ok!(ledger.accounts.open(1).await);

    assert_eq!(account.balance, dec!(0));
    assert!(account.first_time_free_investment);
    assert!(!account.trial_bonus_granted);
    assert!(!account.restricted);
}

#[tokio::test]
async fn opening_twice_is_invalid_input() {
    let ledger = Ledger::new().await;
    assert_ok!(ledger.accounts.open(1).await);

    let err = assert_err!(ledger.accounts.open(1).await);
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let ledger = Ledger::new().await;
    let err = assert_err!(ledger.accounts.get_balance(42).await);
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn credit_then_debit_moves_balance() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(250.50)).await;

    let account = assert_ok!(ledger.accounts.debit(1, dec!(50.25)).await);
    assert_eq!(account.balance, dec!(200.25));
    assert_eq!(ledger.balance(1).await, dec!(200.25));
}

#[tokio::test]
async fn debit_beyond_balance_leaves_it_untouched() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(100)).await;

    let err = assert_err!(ledger.accounts.debit(1, dec!(100.01)).await);
    assert!(matches!(err, LedgerError::InsufficientFunds));
    assert_eq!(ledger.balance(1).await, dec!(100));
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(10)).await;

    for amount in [dec!(0), dec!(-5), dec!(0.001)] {
        assert!(matches!(
            ledger.accounts.credit(1, amount).await,
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.accounts.debit(1, amount).await,
            Err(LedgerError::InvalidInput(_))
        ));
    }
    assert_eq!(ledger.balance(1).await, dec!(10));
}

#[tokio::test]
async fn concurrent_credits_sum_exactly() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(0)).await;

    let credits = (0..25).map(|_| ledger.accounts.credit(1, dec!(4.04)));
    for result in join_all(credits).await {
        assert_ok!(result);
    }

    assert_eq!(ledger.balance(1).await, dec!(101.00));
}

#[tokio::test]
async fn concurrent_debits_never_overdraw() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(100)).await;

    let debits = (0..5).map(|_| ledger.accounts.debit(1, dec!(30)));
    let results = join_all(debits).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LedgerError::InsufficientFunds))
    );
    assert_eq!(ledger.balance(1).await, dec!(10));
}

#[tokio::test]
async fn stale_version_is_refused() {
    let ledger = Ledger::new().await;
    let before = ledger.funded(1, dec!(100)).await;
    assert_ok!(ledger.accounts.credit(1, dec!(5)).await);

    let mut conn = ledger.pool.acquire().await.unwrap();
    let err = assert_err!(repository::write_balance(&mut conn, 1, dec!(0), before.version).await);
    assert!(matches!(err, LedgerError::Conflict(1)));
    drop(conn);

    assert_eq!(ledger.balance(1).await, dec!(105));
}

#[tokio::test]
async fn lost_race_is_retried_to_the_exact_total() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(100)).await;
    let attempts = AtomicU32::new(0);

    let (ledger_ref, attempts_ref) = (&ledger, &attempts);
    let account = assert_ok!(
        retry_on_conflict(3, move || async move {
            let seen = ledger_ref.accounts.get(1).await?;
            if attempts_ref.fetch_add(1, Ordering::SeqCst) == 0 {
                // another writer commits between our read and our write
                ledger_ref.accounts.credit(1, dec!(5)).await?;
            }
            let mut tx = ledger_ref.pool.begin().await?;
            repository::write_balance(&mut tx, 1, seen.balance + dec!(10), seen.version).await?;
            tx.commit().await?;
            ledger_ref.accounts.get(1).await
        })
        .await
    );

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(account.balance, dec!(115));
    assert_eq!(ledger.balance(1).await, dec!(115));
}

#[tokio::test]
async fn admin_credit_requires_admin() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(0)).await;

    let err = assert_err!(ledger.accounts.admin_credit(&Caller::user(1), 1, dec!(50)).await);
    assert!(matches!(err, LedgerError::Unauthorized));

    let account = assert_ok!(ledger.accounts.admin_credit(&admin(), 1, dec!(50)).await);
    assert_eq!(account.balance, dec!(50));
}

#[tokio::test]
async fn restriction_is_idempotent_and_listed() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(0)).await;
    ledger.funded(2, dec!(0)).await;

    assert_ok!(ledger.accounts.restrict(&admin(), 2).await);
    let again = assert_ok!(ledger.accounts.restrict(&admin(), 2).await);
    assert!(again.restricted);

    let restricted = assert_ok!(ledger.accounts.list_restricted(&admin()).await);
    assert_eq!(restricted.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);

    let lifted = assert_ok!(ledger.accounts.unrestrict(&admin(), 2).await);
    assert!(!lifted.restricted);
    assert!(assert_ok!(ledger.accounts.list_restricted(&admin()).await).is_empty());
}

#[tokio::test]
async fn restriction_needs_admin() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(0)).await;

    let err = assert_err!(ledger.accounts.restrict(&Caller::user(1), 1).await);
    assert!(matches!(err, LedgerError::Unauthorized));
}
