use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LedgerError, Result},
    utils::{decimal_from_db, from_millis},
};

/// A user's wallet. Balance only moves through the store's credit and debit primitives.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub balance: Decimal,
    pub restricted: bool,
    pub first_time_free_investment: bool,
    pub trial_bonus_granted: bool,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn ensure_unrestricted(&self) -> Result<()> {
        if self.restricted {
            return Err(LedgerError::AccountRestricted);
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub balance: String,
    pub restricted: i64,
    pub first_time_free_investment: i64,
    pub trial_bonus_granted: i64,
    pub version: i64,
    pub created_at: i64,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self> {
        Ok(Account {
            id: row.id,
            balance: decimal_from_db(&row.balance)?,
            restricted: row.restricted != 0,
            first_time_free_investment: row.first_time_free_investment != 0,
            trial_bonus_granted: row.trial_bonus_granted != 0,
            version: row.version,
            created_at: from_millis(row.created_at)?,
        })
    }
}

/// Flags that change without touching the balance.
#[derive(Debug, Clone, Copy)]
pub enum AccountFlag {
    Restricted,
    FirstTimeFreeInvestment,
    TrialBonusGranted,
}

impl AccountFlag {
    pub fn column(self) -> &'static str {
        match self {
            AccountFlag::Restricted => "restricted",
            AccountFlag::FirstTimeFreeInvestment => "first_time_free_investment",
            AccountFlag::TrialBonusGranted => "trial_bonus_granted",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenAccount {
    pub account_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdminCredit {
    pub account_id: i64,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AccountRef {
    pub account_id: i64,
}

#[derive(Debug, Serialize)]
pub struct Balance {
    pub account_id: i64,
    pub balance: Decimal,
}
