use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::AnyPool;
use tracing::{info, warn};

use super::model::{PayoutFailure, PayoutOutcome, SettlementSummary};
use crate::{
    account::service::AccountStore,
    auth::Caller,
    config::LedgerConfig,
    constants::MONEY_SCALE,
    error::{LedgerError, Result},
    position::{
        model::{MatchPosition, MatchStatus},
        repository as positions,
        service::PositionLedger,
    },
    utils::retry_on_conflict,
};

/// Pays every position on a match once an admin supplies the final multiplier.
///
/// The match is marked `Completed` before any money moves, so a crash mid-run
/// can never lead to a second settlement. Each position is paid in its own
/// transaction together with its paid marker; [`SettlementEngine::resume`]
/// walks the unpaid remainder.
pub struct SettlementEngine {
    pool: AnyPool,
    ledger: Arc<PositionLedger>,
    config: LedgerConfig,
}

impl SettlementEngine {
    pub fn new(pool: AnyPool, ledger: Arc<PositionLedger>, config: LedgerConfig) -> Self {
        SettlementEngine {
            pool,
            ledger,
            config,
        }
    }

    pub async fn apply_multiplier(
        &self,
        caller: &Caller,
        match_id: i64,
        multiplier: Decimal,
    ) -> Result<SettlementSummary> {
        caller.require_admin()?;
        if multiplier <= Decimal::ZERO {
            return Err(LedgerError::InvalidMultiplier);
        }

        let mut tx = self.pool.begin().await?;
        let game = positions::fetch_match(&mut tx, match_id).await?;
        game.status.complete()?;
        if multiplier < game.min_multiplier || multiplier > game.max_multiplier {
            return Err(LedgerError::InvalidMultiplier);
        }
        positions::complete_match(&mut tx, match_id, multiplier).await?;
        tx.commit().await?;
        info!(match_id, admin = caller.account_id, %multiplier, "match completed, paying out");

        Ok(self.pay_out(match_id, multiplier).await)
    }

    /// Re-runs the payout loop of a completed match, paying only unpaid positions.
    pub async fn resume(&self, caller: &Caller, match_id: i64) -> Result<SettlementSummary> {
        caller.require_admin()?;
        let game = self.ledger.get_match(match_id).await?;
        let multiplier = match (game.status, game.final_multiplier) {
            (MatchStatus::Completed, Some(multiplier)) => multiplier,
            (status, _) => return Err(LedgerError::transition(status, "Resume")),
        };
        info!(match_id, admin = caller.account_id, "resuming settlement");
        Ok(self.pay_out(match_id, multiplier).await)
    }

    async fn pay_out(&self, match_id: i64, multiplier: Decimal) -> SettlementSummary {
        let mut summary = SettlementSummary::new(match_id, multiplier);
        let mut paid_accounts = HashSet::new();
        let mut pages = Box::pin(self.ledger.position_pages(match_id, 0, true));

        loop {
            let page = match pages.try_next().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    warn!(match_id, error = ?e, "settlement stopped while listing positions");
                    summary.aborted = Some(e.to_string());
                    break;
                }
            };

            let mut by_account: BTreeMap<i64, Vec<MatchPosition>> = BTreeMap::new();
            for position in page {
                by_account.entry(position.account_id).or_default().push(position);
            }

            // accounts in parallel, each account's positions in order
            let outcomes: Vec<Vec<PayoutOutcome>> = stream::iter(by_account.into_values())
                .map(|account_positions| self.pay_account(account_positions, multiplier))
                .buffer_unordered(self.config.settlement_concurrency.max(1))
                .collect()
                .await;

            for outcome in outcomes.into_iter().flatten() {
                match outcome {
                    PayoutOutcome::Paid { account_id, payout } => {
                        summary.positions_paid += 1;
                        // reporting only; every single credit was already range checked
                        summary.total_disbursed = summary.total_disbursed.saturating_add(payout);
                        paid_accounts.insert(account_id);
                    }
                    PayoutOutcome::ZeroPayout => summary.zero_payouts += 1,
                    PayoutOutcome::AlreadyPaid => summary.already_paid += 1,
                    PayoutOutcome::Failed(failure) => {
                        warn!(
                            match_id,
                            position_id = failure.position_id,
                            account_id = failure.account_id,
                            reason = %failure.reason,
                            "payout failed"
                        );
                        summary.failures.push(failure);
                    }
                }
            }
        }

        summary.accounts_paid = paid_accounts.len();
        summary.failures.sort_by_key(|f| f.position_id);
        info!(
            match_id,
            positions_paid = summary.positions_paid,
            accounts_paid = summary.accounts_paid,
            total_disbursed = %summary.total_disbursed,
            zero_payouts = summary.zero_payouts,
            failures = summary.failures.len(),
            "settlement run finished"
        );
        summary
    }

    async fn pay_account(
        &self,
        account_positions: Vec<MatchPosition>,
        multiplier: Decimal,
    ) -> Vec<PayoutOutcome> {
        let mut outcomes = Vec::with_capacity(account_positions.len());
        for position in &account_positions {
            let outcome = match self.pay_position(position, multiplier).await {
                Ok(outcome) => outcome,
                Err(e) => PayoutOutcome::Failed(PayoutFailure {
                    position_id: position.id,
                    account_id: position.account_id,
                    reason: e.to_string(),
                }),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn pay_position(
        &self,
        position: &MatchPosition,
        multiplier: Decimal,
    ) -> Result<PayoutOutcome> {
        let payout = payout_for(position.amount, multiplier)?;
        retry_on_conflict(self.config.conflict_retries, move || async move {
            let mut tx = self.pool.begin().await?;
            if !positions::mark_paid(&mut tx, position.id, payout, Utc::now()).await? {
                return Ok(PayoutOutcome::AlreadyPaid);
            }
            if payout.is_zero() {
                tx.commit().await?;
                return Ok(PayoutOutcome::ZeroPayout);
            }
            AccountStore::apply_credit(&mut tx, position.account_id, payout).await?;
            tx.commit().await?;
            Ok(PayoutOutcome::Paid {
                account_id: position.account_id,
                payout,
            })
        })
        .await
    }
}

/// Stake times multiplier, rounded toward zero so rounding never overpays.
pub fn payout_for(amount: Decimal, multiplier: Decimal) -> Result<Decimal> {
    amount
        .checked_mul(multiplier)
        .map(|payout| payout.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero))
        .ok_or_else(|| {
            LedgerError::invalid(format!("payout of {} x {} overflows", amount, multiplier))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payout_is_stake_times_multiplier() {
        assert_eq!(payout_for(dec!(200), dec!(3)).unwrap(), dec!(600));
        assert_eq!(payout_for(dec!(500), dec!(1.75)).unwrap(), dec!(875));
    }

    #[test]
    fn payout_rounds_down_to_the_cent() {
        assert_eq!(payout_for(dec!(10.01), dec!(1.333)).unwrap(), dec!(13.34));
        assert_eq!(payout_for(dec!(0.01), dec!(0.5)).unwrap(), dec!(0));
    }

    #[test]
    fn oversized_payout_is_an_error() {
        let payout = payout_for(Decimal::MAX, dec!(2));
        assert!(matches!(payout, Err(LedgerError::InvalidInput(_))));
    }
}
