use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::AnyPool;
use tracing::{info, warn};

use super::{
    model::{
        Destination, FundRequest, Outcome, RequestDetails, RequestKind, RequestStatus,
        validate_currency,
    },
    repository,
};
use crate::{
    account::{repository as accounts, service::AccountStore},
    auth::Caller,
    config::LedgerConfig,
    error::{LedgerError, Result},
    utils::{require_positive, retry_on_conflict},
};

/// Admin-reviewed deposit and withdrawal requests.
///
/// A decision and its balance effect commit in one transaction; when the balance
/// effect fails the request stays `Pending` and the decision can be retried.
pub struct RequestWorkflow {
    pool: AnyPool,
    config: LedgerConfig,
}

impl RequestWorkflow {
    pub fn new(pool: AnyPool, config: LedgerConfig) -> Self {
        RequestWorkflow { pool, config }
    }

    pub async fn submit_deposit(
        &self,
        caller: &Caller,
        amount: Decimal,
        evidence: &str,
    ) -> Result<FundRequest> {
        if evidence.trim().is_empty() {
            return Err(LedgerError::invalid("payment evidence is required"));
        }
        let details = RequestDetails::Deposit {
            evidence: evidence.to_string(),
        };
        self.submit(caller, amount, details).await
    }

    pub async fn submit_withdrawal(
        &self,
        caller: &Caller,
        amount: Decimal,
        currency: &str,
        destination: Destination,
    ) -> Result<FundRequest> {
        validate_currency(currency)?;
        destination.validate()?;
        let details = RequestDetails::Withdrawal {
            currency: currency.to_string(),
            destination,
        };
        self.submit(caller, amount, details).await
    }

    async fn submit(
        &self,
        caller: &Caller,
        amount: Decimal,
        details: RequestDetails,
    ) -> Result<FundRequest> {
        require_positive(amount)?;
        let mut tx = self.pool.begin().await?;
        let account = accounts::fetch(&mut tx, caller.account_id).await?;
        account.ensure_unrestricted()?;
        if details.kind() == RequestKind::Withdrawal && account.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let id = repository::insert(&mut tx, account.id, amount, &details, Utc::now()).await?;
        let request = repository::fetch(&mut tx, id).await?;
        tx.commit().await?;
        info!(
            request_id = id,
            account_id = account.id,
            kind = %details.kind(),
            %amount,
            "request submitted"
        );
        Ok(request)
    }

    /// Applies an admin verdict. A second decision on the same request is an
    /// `InvalidTransition`, never a second balance movement.
    pub async fn decide(
        &self,
        caller: &Caller,
        request_id: i64,
        outcome: Outcome,
        reason: Option<&str>,
    ) -> Result<FundRequest> {
        caller.require_admin()?;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let result = retry_on_conflict(self.config.conflict_retries, move || async move {
            self.try_decide(request_id, outcome, reason).await
        })
        .await;
        match &result {
            Ok(request) => info!(
                request_id,
                admin = caller.account_id,
                kind = %request.details.kind(),
                status = %request.status,
                "request decided"
            ),
            Err(err) => {
                warn!(request_id, admin = caller.account_id, reason = %err, "decision refused")
            }
        }
        result
    }

    async fn try_decide(
        &self,
        request_id: i64,
        outcome: Outcome,
        reason: Option<&str>,
    ) -> Result<FundRequest> {
        let mut tx = self.pool.begin().await?;
        let request = repository::fetch(&mut tx, request_id).await?;
        let next = request.status.decide(outcome)?;
        match (next, request.details.kind()) {
            (RequestStatus::Rejected, _) if reason.is_none() => {
                return Err(LedgerError::invalid("rejection reason is required"));
            }
            (RequestStatus::Approved, RequestKind::Deposit) => {
                AccountStore::apply_credit(&mut tx, request.account_id, request.amount).await?;
            }
            (RequestStatus::Approved, RequestKind::Withdrawal) => {
                // balance may have moved since submission
                AccountStore::apply_debit(&mut tx, request.account_id, request.amount).await?;
            }
            _ => {}
        }
        let reason = if next == RequestStatus::Rejected { reason } else { None };
        repository::mark_decided(&mut tx, request_id, next, Utc::now(), reason).await?;
        let decided = repository::fetch(&mut tx, request_id).await?;
        tx.commit().await?;
        Ok(decided)
    }

    /// A request is visible to its owner and to admins.
    pub async fn get(&self, caller: &Caller, request_id: i64) -> Result<FundRequest> {
        let mut conn = self.pool.acquire().await?;
        let request = repository::fetch(&mut conn, request_id).await?;
        if request.account_id != caller.account_id {
            caller.require_admin()?;
        }
        Ok(request)
    }

    pub async fn history(&self, caller: &Caller, kind: RequestKind) -> Result<Vec<FundRequest>> {
        let mut conn = self.pool.acquire().await?;
        repository::list_for_account(&mut conn, caller.account_id, kind).await
    }

    pub async fn pending(&self, caller: &Caller, kind: RequestKind) -> Result<Vec<FundRequest>> {
        caller.require_admin()?;
        let mut conn = self.pool.acquire().await?;
        repository::list_by_status(&mut conn, kind, RequestStatus::Pending).await
    }
}
