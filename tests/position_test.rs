use common::{Ledger, admin, new_match};
use fantasy_ledger::{
    auth::Caller,
    config::LedgerConfig,
    error::LedgerError,
    position::{
        model::{AccountTotal, MatchStatus},
        repository,
    },
};
use futures::TryStreamExt;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};
mod common;

#[tokio::test]
async fn create_match_needs_admin_and_valid_fields() {
    let ledger = Ledger::new().await;

    let err = assert_err!(
        ledger
            .positions
            .create_match(&Caller::user(1), new_match(dec!(100), 1))
            .await
    );
    assert!(matches!(err, LedgerError::Unauthorized));

    let mut inverted = new_match(dec!(100), 1);
    inverted.min_multiplier = dec!(5);
    inverted.max_multiplier = dec!(2);
    let err = assert_err!(ledger.positions.create_match(&admin(), inverted).await);
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    let game = assert_ok!(ledger.positions.create_match(&admin(), new_match(dec!(100), 2)).await);
    assert_eq!(game.status, MatchStatus::Upcoming);
    assert_eq!(game.final_multiplier, None);
    assert_eq!(game.min_positions_per_account, 2);

    let listed = assert_ok!(ledger.positions.list_matches().await);
    assert_eq!(listed.len(), 1);
    assert_eq!(assert_ok!(ledger.positions.get_match(game.id).await).team1, "Mumbai");
}

#[tokio::test]
async fn first_investment_must_be_the_trial_amount() {
    let ledger = Ledger::new().await;
    ledger.investor(1, dec!(1000)).await;
    let game = ledger.open_match(dec!(500), 1).await;
    let user = Caller::user(1);

    let err = assert_err!(ledger.positions.invest(&user, game.id, dec!(500)).await);
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    let position = assert_ok!(ledger.positions.invest(&user, game.id, dec!(100)).await);
    assert_eq!(position.amount, dec!(100));
    assert!(!position.is_paid());
    assert!(!assert_ok!(ledger.accounts.get(1).await).first_time_free_investment);
    assert_eq!(ledger.balance(1).await, dec!(1000));

    // the trial is spent, so 100 no longer fits a 500 match
    let err = assert_err!(ledger.positions.invest(&user, game.id, dec!(100)).await);
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_eq!(ledger.balance(1).await, dec!(1000));
}

#[tokio::test]
async fn stakes_are_whole_positions() {
    let ledger = Ledger::new().await;
    ledger.seasoned_investor(1, dec!(5000)).await;
    let game = ledger.open_match(dec!(500), 1).await;
    let user = Caller::user(1);

    assert_ok!(ledger.positions.invest(&user, game.id, dec!(500)).await);
    let err = assert_err!(ledger.positions.invest(&user, game.id, dec!(700)).await);
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_ok!(ledger.positions.invest(&user, game.id, dec!(1000)).await);

    assert_eq!(ledger.balance(1).await, dec!(3500));
}

#[tokio::test]
async fn stake_must_cover_minimum_positions() {
    let ledger = Ledger::new().await;
    ledger.seasoned_investor(1, dec!(5000)).await;
    let game = ledger.open_match(dec!(200), 3).await;
    let user = Caller::user(1);

    let err = assert_err!(ledger.positions.invest(&user, game.id, dec!(400)).await);
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_ok!(ledger.positions.invest(&user, game.id, dec!(600)).await);
}

#[tokio::test]
async fn investing_needs_an_active_plan() {
    let ledger = Ledger::new().await;
    ledger.funded(1, dec!(1000)).await;
    let game = ledger.open_match(dec!(100), 1).await;

    let err = assert_err!(ledger.positions.invest(&Caller::user(1), game.id, dec!(100)).await);
    assert!(matches!(err, LedgerError::NotEligible));
    assert_eq!(ledger.balance(1).await, dec!(1000));
}

#[tokio::test]
async fn investing_needs_funds() {
    let ledger = Ledger::new().await;
    ledger.seasoned_investor(1, dec!(300)).await;
    let game = ledger.open_match(dec!(200), 1).await;

    let err = assert_err!(ledger.positions.invest(&Caller::user(1), game.id, dec!(400)).await);
    assert!(matches!(err, LedgerError::InsufficientFunds));
    assert_eq!(ledger.balance(1).await, dec!(300));
    assert!(
        assert_ok!(ledger.positions.positions_for_account(&Caller::user(1), 1).await)
            .iter()
            .all(|p| p.match_id != game.id)
    );
}

#[tokio::test]
async fn restricted_accounts_cannot_invest() {
    let ledger = Ledger::new().await;
    ledger.seasoned_investor(1, dec!(300)).await;
    let game = ledger.open_match(dec!(100), 1).await;
    assert_ok!(ledger.accounts.restrict(&admin(), 1).await);

    let err = assert_err!(ledger.positions.invest(&Caller::user(1), game.id, dec!(100)).await);
    assert!(matches!(err, LedgerError::AccountRestricted));
}

#[tokio::test]
async fn completed_and_unknown_matches_are_closed() {
    let ledger = Ledger::new().await;
    ledger.seasoned_investor(1, dec!(300)).await;
    let game = ledger.open_match(dec!(100), 1).await;
    assert_ok!(ledger.settlement.apply_multiplier(&admin(), game.id, dec!(2)).await);

    let err = assert_err!(ledger.positions.invest(&Caller::user(1), game.id, dec!(100)).await);
    assert!(matches!(err, LedgerError::MatchNotOpen));

    let err = assert_err!(ledger.positions.invest(&Caller::user(1), 999, dec!(100)).await);
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn only_an_upcoming_match_can_be_locked_for_investment() {
    let ledger = Ledger::new().await;
    let game = ledger.open_match(dec!(100), 1).await;

    let mut tx = ledger.pool.begin().await.unwrap();
    assert!(assert_ok!(repository::lock_open_match(&mut tx, game.id).await));
    tx.rollback().await.unwrap();

    assert_ok!(ledger.settlement.apply_multiplier(&admin(), game.id, dec!(2)).await);
    let mut conn = ledger.pool.acquire().await.unwrap();
    assert!(!assert_ok!(repository::lock_open_match(&mut conn, game.id).await));
    assert!(!assert_ok!(repository::lock_open_match(&mut conn, 999).await));
}

#[tokio::test]
async fn positions_are_visible_to_owner_and_admin() {
    let ledger = Ledger::new().await;
    ledger.investor(1, dec!(0)).await;
    ledger.funded(2, dec!(0)).await;
    let game = ledger.open_match(dec!(100), 1).await;
    assert_ok!(ledger.positions.invest(&Caller::user(1), game.id, dec!(100)).await);

    let mine = assert_ok!(ledger.positions.positions_for_account(&Caller::user(1), 1).await);
    assert_eq!(mine.len(), 1);
    let seen = assert_ok!(ledger.positions.positions_for_account(&admin(), 1).await);
    assert_eq!(seen.len(), 1);

    let err = assert_err!(ledger.positions.positions_for_account(&Caller::user(2), 1).await);
    assert!(matches!(err, LedgerError::Unauthorized));
}

#[tokio::test]
async fn match_report_totals_per_account() {
    let ledger = Ledger::new().await;
    ledger.seasoned_investor(1, dec!(1000)).await;
    ledger.seasoned_investor(2, dec!(1000)).await;
    let game = ledger.open_match(dec!(100), 1).await;
    assert_ok!(ledger.positions.invest(&Caller::user(1), game.id, dec!(200)).await);
    assert_ok!(ledger.positions.invest(&Caller::user(1), game.id, dec!(100)).await);
    assert_ok!(ledger.positions.invest(&Caller::user(2), game.id, dec!(500)).await);

    let report = assert_ok!(ledger.positions.match_investments(&admin(), game.id).await);
    assert_eq!(report.positions.len(), 3);
    assert_eq!(report.total_staked, dec!(800));
    assert_eq!(
        report.totals,
        vec![
            AccountTotal {
                account_id: 1,
                staked: dec!(300),
                positions: 2,
            },
            AccountTotal {
                account_id: 2,
                staked: dec!(500),
                positions: 1,
            },
        ]
    );
}

#[tokio::test]
async fn position_pages_walk_every_position_in_order() {
    let ledger = Ledger::with_config(LedgerConfig {
        settlement_page_size: 2,
        ..LedgerConfig::default()
    })
    .await;
    ledger.seasoned_investor(1, dec!(1000)).await;
    let game = ledger.open_match(dec!(100), 1).await;
    for _ in 0..5 {
        assert_ok!(ledger.positions.invest(&Caller::user(1), game.id, dec!(100)).await);
    }

    let pages: Vec<_> = assert_ok!(
        ledger
            .positions
            .position_pages(game.id, 0, false)
            .try_collect()
            .await
    );
    assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
    let ids: Vec<i64> = pages.iter().flatten().map(|p| p.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    // restarting after the second id skips what was already seen
    let rest: Vec<_> = assert_ok!(
        ledger
            .positions
            .position_pages(game.id, ids[1], false)
            .try_collect()
            .await
    );
    assert_eq!(rest.into_iter().flatten().count(), 3);
}
