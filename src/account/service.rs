use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{AnyConnection, AnyPool};
use tracing::info;

use super::{
    model::{Account, AccountFlag},
    repository,
};
use crate::{
    auth::Caller,
    config::LedgerConfig,
    error::{LedgerError, Result},
    utils::{require_positive, retry_on_conflict},
};

/// Owner of every balance. Other components reach balances only through
/// [`AccountStore::apply_credit`] and [`AccountStore::apply_debit`] inside their own
/// transaction, so the balance write and their own state change commit together.
pub struct AccountStore {
    pool: AnyPool,
    config: LedgerConfig,
}

impl AccountStore {
    pub fn new(pool: AnyPool, config: LedgerConfig) -> Self {
        AccountStore { pool, config }
    }

    /// Registration hook: creates a zero-balance account for a new user.
    pub async fn open(&self, account_id: i64) -> Result<Account> {
        let mut tx = self.pool.begin().await?;
        repository::insert(&mut tx, account_id, Utc::now()).await?;
        let account = repository::fetch(&mut tx, account_id).await?;
        tx.commit().await?;
        info!(account_id, "account opened");
        Ok(account)
    }

    pub async fn get(&self, account_id: i64) -> Result<Account> {
        let mut conn = self.pool.acquire().await?;
        repository::fetch(&mut conn, account_id).await
    }

    pub async fn get_balance(&self, account_id: i64) -> Result<Decimal> {
        Ok(self.get(account_id).await?.balance)
    }

    pub async fn credit(&self, account_id: i64, amount: Decimal) -> Result<Account> {
        require_positive(amount)?;
        retry_on_conflict(self.config.conflict_retries, move || async move {
            let mut tx = self.pool.begin().await?;
            let account = Self::apply_credit(&mut tx, account_id, amount).await?;
            tx.commit().await?;
            Ok(account)
        })
        .await
    }

    pub async fn debit(&self, account_id: i64, amount: Decimal) -> Result<Account> {
        require_positive(amount)?;
        retry_on_conflict(self.config.conflict_retries, move || async move {
            let mut tx = self.pool.begin().await?;
            let account = Self::apply_debit(&mut tx, account_id, amount).await?;
            tx.commit().await?;
            Ok(account)
        })
        .await
    }

    /// Credits without a request record, e.g. a manual top-up by an admin.
    pub async fn admin_credit(
        &self,
        caller: &Caller,
        account_id: i64,
        amount: Decimal,
    ) -> Result<Account> {
        caller.require_admin()?;
        let account = self.credit(account_id, amount).await?;
        info!(admin = caller.account_id, account_id, %amount, "admin credit");
        Ok(account)
    }

    pub async fn restrict(&self, caller: &Caller, account_id: i64) -> Result<Account> {
        caller.require_admin()?;
        self.set_restricted(account_id, true).await
    }

    pub async fn unrestrict(&self, caller: &Caller, account_id: i64) -> Result<Account> {
        caller.require_admin()?;
        self.set_restricted(account_id, false).await
    }

    pub async fn list_restricted(&self, caller: &Caller) -> Result<Vec<Account>> {
        caller.require_admin()?;
        let mut conn = self.pool.acquire().await?;
        repository::list_restricted(&mut conn).await
    }

    async fn set_restricted(&self, account_id: i64, restricted: bool) -> Result<Account> {
        retry_on_conflict(self.config.conflict_retries, move || async move {
            let mut tx = self.pool.begin().await?;
            let account = repository::fetch(&mut tx, account_id).await?;
            if account.restricted == restricted {
                return Ok(account);
            }
            repository::swap_flag(&mut tx, account_id, AccountFlag::Restricted, restricted).await?;
            let account = repository::fetch(&mut tx, account_id).await?;
            tx.commit().await?;
            info!(account_id, restricted, "account restriction changed");
            Ok(account)
        })
        .await
    }

    /// Adds `amount` to the balance inside the caller's transaction.
    pub async fn apply_credit(
        conn: &mut AnyConnection,
        account_id: i64,
        amount: Decimal,
    ) -> Result<Account> {
        require_positive(amount)?;
        let mut account = repository::fetch(conn, account_id).await?;
        let balance = account.balance.checked_add(amount).ok_or_else(|| {
            LedgerError::invalid(format!("credit of {} overflows the balance", amount))
        })?;
        repository::write_balance(conn, account_id, balance, account.version).await?;
        account.balance = balance;
        account.version += 1;
        info!(account_id, %amount, %balance, "credit");
        Ok(account)
    }

    /// Removes `amount` from the balance inside the caller's transaction.
    /// Never lets the balance go below zero.
    pub async fn apply_debit(
        conn: &mut AnyConnection,
        account_id: i64,
        amount: Decimal,
    ) -> Result<Account> {
        require_positive(amount)?;
        let mut account = repository::fetch(conn, account_id).await?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds);
        }
        let balance = account.balance - amount;
        repository::write_balance(conn, account_id, balance, account.version).await?;
        account.balance = balance;
        account.version += 1;
        info!(account_id, %amount, %balance, "debit");
        Ok(account)
    }

    /// Clears a one-shot flag as part of the caller's transaction.
    pub async fn consume_flag(
        conn: &mut AnyConnection,
        account_id: i64,
        flag: AccountFlag,
    ) -> Result<()> {
        let value = match flag {
            AccountFlag::TrialBonusGranted => true,
            AccountFlag::FirstTimeFreeInvestment => false,
            AccountFlag::Restricted => {
                return Err(LedgerError::invalid("restriction is not a one-shot flag"));
            }
        };
        repository::swap_flag(conn, account_id, flag, value).await
    }
}
