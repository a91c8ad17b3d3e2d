use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LedgerError, Result},
    utils::{decimal_from_db, from_millis, text_enum},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Pending,
    Active,
    Expired,
    Rejected,
}

text_enum!(PlanStatus { Pending, Active, Expired, Rejected });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEvent {
    Approve,
    Reject,
    Expire,
}

impl PlanStatus {
    pub fn apply(self, event: PlanEvent) -> Result<PlanStatus> {
        match (self, event) {
            (PlanStatus::Pending, PlanEvent::Approve) => Ok(PlanStatus::Active),
            (PlanStatus::Pending, PlanEvent::Reject) => Ok(PlanStatus::Rejected),
            (PlanStatus::Active, PlanEvent::Expire) => Ok(PlanStatus::Expired),
            (from, event) => Err(LedgerError::transition(from, &format!("{:?}", event))),
        }
    }
}

/// The account's current subscription; at most one per account.
#[derive(Debug, Clone, Serialize)]
pub struct InvestmentPlan {
    pub account_id: i64,
    pub plan_name: String,
    pub price: Decimal,
    pub purchase_date: Option<DateTime<Utc>>,
    pub expiry_date: DateTime<Utc>,
    pub status: PlanStatus,
    pub evidence: String,
}

#[derive(sqlx::FromRow)]
pub struct PlanRow {
    pub account_id: i64,
    pub plan_name: String,
    pub price: String,
    pub purchase_date: Option<i64>,
    pub expiry_date: i64,
    pub status: String,
    pub evidence: String,
}

impl TryFrom<PlanRow> for InvestmentPlan {
    type Error = LedgerError;

    fn try_from(row: PlanRow) -> Result<Self> {
        Ok(InvestmentPlan {
            account_id: row.account_id,
            plan_name: row.plan_name,
            price: decimal_from_db(&row.price)?,
            purchase_date: row.purchase_date.map(from_millis).transpose()?,
            expiry_date: from_millis(row.expiry_date)?,
            status: row.status.parse()?,
            evidence: row.evidence,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanPurchase {
    pub plan_name: String,
    pub price: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub evidence: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanRef {
    pub account_id: i64,
}
