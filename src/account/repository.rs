use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::AnyConnection;

use super::model::{Account, AccountFlag, AccountRow};
use crate::{
    error::{LedgerError, Result},
    utils::{money_to_db, to_millis},
};

const SELECT_ACCOUNT: &str = r#"
    SELECT id, balance, restricted, first_time_free_investment, trial_bonus_granted,
           version, created_at
    FROM accounts
"#;

pub async fn fetch(conn: &mut AnyConnection, account_id: i64) -> Result<Account> {
    let row = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Account {}", account_id)))?;
    Account::try_from(row)
}

pub async fn insert(conn: &mut AnyConnection, account_id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO accounts (id, balance, restricted, first_time_free_investment,
                              trial_bonus_granted, version, created_at)
        VALUES ($1, '0', 0, 1, 0, 0, $2)"#,
    )
    .bind(account_id)
    .bind(to_millis(now))
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::invalid(format!("account {} already exists", account_id))
        }
        e => LedgerError::Database(e),
    })?;
    Ok(())
}

/// Writes a new balance only if nobody else bumped the row since `expected_version`.
pub async fn write_balance(
    conn: &mut AnyConnection,
    account_id: i64,
    balance: Decimal,
    expected_version: i64,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET balance = $1, version = version + 1
        WHERE id = $2 AND version = $3"#,
    )
    .bind(money_to_db(balance))
    .bind(account_id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict(account_id));
    }
    Ok(())
}

/// Flips a flag, failing with `Conflict` when it does not currently hold `!value`.
pub async fn swap_flag(
    conn: &mut AnyConnection,
    account_id: i64,
    flag: AccountFlag,
    value: bool,
) -> Result<()> {
    let column = flag.column();
    let result = sqlx::query(&format!(
        "UPDATE accounts SET {column} = $1, version = version + 1 WHERE id = $2 AND {column} = $3"
    ))
    .bind(value as i64)
    .bind(account_id)
    .bind(!value as i64)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict(account_id));
    }
    Ok(())
}

pub async fn list_restricted(conn: &mut AnyConnection) -> Result<Vec<Account>> {
    sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} WHERE restricted = 1 ORDER BY id"))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Account::try_from)
        .collect()
}
