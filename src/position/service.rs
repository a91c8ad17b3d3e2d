use std::collections::BTreeMap;

use chrono::Utc;
use futures::{Stream, stream};
use rust_decimal::Decimal;
use sqlx::AnyPool;
use tracing::info;

use super::{
    model::{AccountTotal, Match, MatchInvestments, MatchPosition, MatchStatus, NewMatch},
    repository,
};
use crate::{
    account::{model::AccountFlag, repository as accounts, service::AccountStore},
    auth::Caller,
    config::LedgerConfig,
    error::{LedgerError, Result},
    plan::service::PlanManager,
    utils::{require_positive, retry_on_conflict},
};

pub struct PositionLedger {
    pool: AnyPool,
    config: LedgerConfig,
}

impl PositionLedger {
    pub fn new(pool: AnyPool, config: LedgerConfig) -> Self {
        PositionLedger { pool, config }
    }

    pub async fn create_match(&self, caller: &Caller, new_match: NewMatch) -> Result<Match> {
        caller.require_admin()?;
        new_match.validate()?;
        let mut tx = self.pool.begin().await?;
        let id = repository::insert_match(&mut tx, &new_match).await?;
        let created = repository::fetch_match(&mut tx, id).await?;
        tx.commit().await?;
        info!(match_id = id, team1 = %created.team1, team2 = %created.team2, "match created");
        Ok(created)
    }

    pub async fn get_match(&self, match_id: i64) -> Result<Match> {
        let mut conn = self.pool.acquire().await?;
        repository::fetch_match(&mut conn, match_id).await
    }

    pub async fn list_matches(&self) -> Result<Vec<Match>> {
        let mut conn = self.pool.acquire().await?;
        repository::list_matches(&mut conn).await
    }

    /// Stakes `amount` of the caller's balance on a match.
    ///
    /// An account's first investment must be exactly the trial amount; after that
    /// stakes are whole multiples of the match price. The debit, the flag change and
    /// the new position commit together.
    pub async fn invest(
        &self,
        caller: &Caller,
        match_id: i64,
        amount: Decimal,
    ) -> Result<MatchPosition> {
        require_positive(amount)?;
        let account_id = caller.account_id;
        retry_on_conflict(self.config.conflict_retries, move || async move {
            let mut tx = self.pool.begin().await?;
            let account = accounts::fetch(&mut tx, account_id).await?;
            account.ensure_unrestricted()?;
            if !PlanManager::is_eligible_in(&mut tx, account_id).await? {
                return Err(LedgerError::NotEligible);
            }
            let game = repository::fetch_match(&mut tx, match_id).await?;
            // held until commit, so a settlement flip waits for this position
            if game.status != MatchStatus::Upcoming
                || !repository::lock_open_match(&mut tx, match_id).await?
            {
                return Err(LedgerError::MatchNotOpen);
            }
            let trial = account.first_time_free_investment;
            if trial {
                if amount != self.config.trial_amount {
                    return Err(LedgerError::invalid(format!(
                        "a first-time investor can only invest exactly {}",
                        self.config.trial_amount
                    )));
                }
            } else {
                game.check_stake(amount)?;
            }
            if account.balance < amount {
                return Err(LedgerError::InsufficientFunds);
            }

            AccountStore::apply_debit(&mut tx, account_id, amount).await?;
            if trial {
                AccountStore::consume_flag(
                    &mut tx,
                    account_id,
                    AccountFlag::FirstTimeFreeInvestment,
                )
                .await?;
            }
            let now = Utc::now();
            let id =
                repository::insert_position(&mut tx, account_id, match_id, amount, now).await?;
            let position = repository::fetch_position(&mut tx, id).await?;
            tx.commit().await?;
            info!(position_id = id, account_id, match_id, %amount, trial, "position opened");
            Ok(position)
        })
        .await
    }

    /// Restartable, lazily fetched pages of a match's positions in id order,
    /// beginning after `after_id`. With `unpaid_only` set, positions already
    /// carrying a payout are skipped.
    pub fn position_pages(
        &self,
        match_id: i64,
        after_id: i64,
        unpaid_only: bool,
    ) -> impl Stream<Item = Result<Vec<MatchPosition>>> + '_ {
        stream::try_unfold(Some(after_id), move |cursor| async move {
            match cursor {
                None => Ok(None),
                Some(after) => self.next_page(match_id, after, unpaid_only).await,
            }
        })
    }

    async fn next_page(
        &self,
        match_id: i64,
        after_id: i64,
        unpaid_only: bool,
    ) -> Result<Option<(Vec<MatchPosition>, Option<i64>)>> {
        let limit = self.config.settlement_page_size.max(1);
        let mut conn = self.pool.acquire().await?;
        let page =
            repository::positions_page(&mut conn, match_id, after_id, limit, unpaid_only).await?;
        if page.is_empty() {
            return Ok(None);
        }
        let next = match page.last() {
            Some(last) if page.len() as i64 == limit => Some(last.id),
            _ => None,
        };
        Ok(Some((page, next)))
    }

    pub async fn positions_for_account(
        &self,
        caller: &Caller,
        account_id: i64,
    ) -> Result<Vec<MatchPosition>> {
        if account_id != caller.account_id {
            caller.require_admin()?;
        }
        let mut conn = self.pool.acquire().await?;
        repository::positions_for_account(&mut conn, account_id).await
    }

    pub async fn match_investments(
        &self,
        caller: &Caller,
        match_id: i64,
    ) -> Result<MatchInvestments> {
        caller.require_admin()?;
        let mut conn = self.pool.acquire().await?;
        let game = repository::fetch_match(&mut conn, match_id).await?;
        let positions = repository::positions_for_match(&mut conn, match_id).await?;
        let overflow = || LedgerError::invalid(format!("stakes on match {} overflow", match_id));
        let mut by_account: BTreeMap<i64, AccountTotal> = BTreeMap::new();
        let mut total_staked = Decimal::ZERO;
        for position in &positions {
            let total = by_account.entry(position.account_id).or_insert(AccountTotal {
                account_id: position.account_id,
                staked: Decimal::ZERO,
                positions: 0,
            });
            total.staked = total.staked.checked_add(position.amount).ok_or_else(overflow)?;
            total.positions += 1;
            total_staked = total_staked.checked_add(position.amount).ok_or_else(overflow)?;
        }
        Ok(MatchInvestments {
            game,
            positions,
            totals: by_account.into_values().collect(),
            total_staked,
        })
    }
}
