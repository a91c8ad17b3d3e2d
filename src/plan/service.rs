use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{AnyConnection, AnyPool};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{
    model::{InvestmentPlan, PlanEvent, PlanStatus},
    repository,
};
use crate::{
    account::{model::AccountFlag, repository as accounts, service::AccountStore},
    auth::Caller,
    config::LedgerConfig,
    error::{LedgerError, Result},
    utils::{require_positive, retry_on_conflict},
};

pub struct PlanManager {
    pool: AnyPool,
    config: LedgerConfig,
}

impl PlanManager {
    pub fn new(pool: AnyPool, config: LedgerConfig) -> Self {
        PlanManager { pool, config }
    }

    pub async fn purchase(
        &self,
        caller: &Caller,
        plan_name: &str,
        price: Decimal,
        expiry_date: DateTime<Utc>,
        evidence: &str,
    ) -> Result<InvestmentPlan> {
        if plan_name.trim().is_empty() {
            return Err(LedgerError::invalid("plan name is required"));
        }
        if evidence.trim().is_empty() {
            return Err(LedgerError::invalid("payment evidence is required"));
        }
        require_positive(price)?;
        if expiry_date <= Utc::now() {
            return Err(LedgerError::invalid("expiry date must be in the future"));
        }

        let mut tx = self.pool.begin().await?;
        let account = accounts::fetch(&mut tx, caller.account_id).await?;
        account.ensure_unrestricted()?;
        repository::upsert_pending(
            &mut tx,
            account.id,
            plan_name.trim(),
            price,
            expiry_date,
            evidence,
        )
        .await?;
        let plan = Self::require_plan(&mut tx, account.id).await?;
        tx.commit().await?;
        info!(account_id = account.id, plan = %plan.plan_name, "plan purchase requested");
        Ok(plan)
    }

    /// Activates a pending plan. The first approval an account ever receives
    /// also pays the one-time plan bonus, in the same transaction.
    pub async fn approve(&self, caller: &Caller, account_id: i64) -> Result<InvestmentPlan> {
        caller.require_admin()?;
        retry_on_conflict(self.config.conflict_retries, move || async move {
            let mut tx = self.pool.begin().await?;
            let plan = Self::require_plan(&mut tx, account_id).await?;
            plan.status.apply(PlanEvent::Approve)?;
            repository::activate(&mut tx, account_id, Utc::now()).await?;

            let account = accounts::fetch(&mut tx, account_id).await?;
            let bonus = account.first_time_free_investment && !account.trial_bonus_granted;
            if bonus {
                AccountStore::apply_credit(&mut tx, account_id, self.config.plan_bonus).await?;
                AccountStore::consume_flag(&mut tx, account_id, AccountFlag::TrialBonusGranted)
                    .await?;
            }
            let plan = Self::require_plan(&mut tx, account_id).await?;
            tx.commit().await?;
            info!(account_id, admin = caller.account_id, bonus, "plan approved");
            Ok(plan)
        })
        .await
    }

    /// Clears a pending plan. The returned record is the plan as it stood, marked `Rejected`.
    pub async fn reject(&self, caller: &Caller, account_id: i64) -> Result<InvestmentPlan> {
        caller.require_admin()?;
        let mut tx = self.pool.begin().await?;
        let mut plan = Self::require_plan(&mut tx, account_id).await?;
        plan.status = plan.status.apply(PlanEvent::Reject)?;
        repository::delete_pending(&mut tx, account_id)
            .await
            .map_err(|e| match e {
                LedgerError::Conflict(_) => LedgerError::transition(PlanStatus::Active, "Reject"),
                other => other,
            })?;
        tx.commit().await?;
        info!(account_id, admin = caller.account_id, "plan rejected");
        Ok(plan)
    }

    /// Expires active plans whose expiry date has passed. Re-running is a no-op.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        let expired = repository::expire_due(&mut conn, now).await?;
        for account_id in &expired {
            info!(account_id, "plan expired");
        }
        Ok(expired)
    }

    pub async fn is_eligible_to_invest(&self, account_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Self::is_eligible_in(&mut conn, account_id).await
    }

    pub async fn is_eligible_in(conn: &mut AnyConnection, account_id: i64) -> Result<bool> {
        Ok(matches!(
            repository::fetch(conn, account_id).await?,
            Some(InvestmentPlan {
                status: PlanStatus::Active,
                ..
            })
        ))
    }

    pub async fn plan_for(&self, caller: &Caller) -> Result<Option<InvestmentPlan>> {
        let mut conn = self.pool.acquire().await?;
        repository::fetch(&mut conn, caller.account_id).await
    }

    pub async fn pending(&self, caller: &Caller) -> Result<Vec<InvestmentPlan>> {
        caller.require_admin()?;
        let mut conn = self.pool.acquire().await?;
        repository::list_by_status(&mut conn, PlanStatus::Pending).await
    }

    async fn require_plan(conn: &mut AnyConnection, account_id: i64) -> Result<InvestmentPlan> {
        repository::fetch(conn, account_id)
            .await?
            .ok_or_else(|| {
                LedgerError::not_found(format!("Investment plan for account {}", account_id))
            })
    }
}

/// Stands in for the external scheduler: sweeps expired plans on a fixed cadence.
pub fn spawn_expiry_sweeper(plans: Arc<PlanManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match plans.sweep_expired(Utc::now()).await {
                Ok(expired) => info!(count = expired.len(), "expiry sweep completed"),
                Err(e) => error!(error = ?e, "expiry sweep failed"),
            }
        }
    })
}
