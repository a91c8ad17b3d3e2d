use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::AnyConnection;

use super::model::{InvestmentPlan, PlanRow, PlanStatus};
use crate::{
    error::{LedgerError, Result},
    utils::{money_to_db, to_millis},
};

const SELECT_PLAN: &str = r#"
    SELECT account_id, plan_name, price, purchase_date, expiry_date, status, evidence
    FROM investment_plans
"#;

pub async fn fetch(conn: &mut AnyConnection, account_id: i64) -> Result<Option<InvestmentPlan>> {
    sqlx::query_as::<_, PlanRow>(&format!("{SELECT_PLAN} WHERE account_id = $1"))
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(InvestmentPlan::try_from)
        .transpose()
}

/// Writes a fresh `Pending` plan over whatever non-active plan the account had.
pub async fn upsert_pending(
    conn: &mut AnyConnection,
    account_id: i64,
    plan_name: &str,
    price: Decimal,
    expiry_date: DateTime<Utc>,
    evidence: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO investment_plans
            (account_id, plan_name, price, purchase_date, expiry_date, status, evidence)
        VALUES ($1, $2, $3, NULL, $4, $5, $6)
        ON CONFLICT (account_id) DO UPDATE
        SET plan_name = excluded.plan_name,
            price = excluded.price,
            purchase_date = NULL,
            expiry_date = excluded.expiry_date,
            status = excluded.status,
            evidence = excluded.evidence
        WHERE investment_plans.status <> $7"#,
    )
    .bind(account_id)
    .bind(plan_name)
    .bind(money_to_db(price))
    .bind(to_millis(expiry_date))
    .bind(PlanStatus::Pending.as_str())
    .bind(evidence)
    .bind(PlanStatus::Active.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::PlanAlreadyActive);
    }
    Ok(())
}

pub async fn activate(
    conn: &mut AnyConnection,
    account_id: i64,
    purchase_date: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE investment_plans SET status = $1, purchase_date = $2
        WHERE account_id = $3 AND status = $4"#,
    )
    .bind(PlanStatus::Active.as_str())
    .bind(to_millis(purchase_date))
    .bind(account_id)
    .bind(PlanStatus::Pending.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict(account_id));
    }
    Ok(())
}

pub async fn delete_pending(conn: &mut AnyConnection, account_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM investment_plans WHERE account_id = $1 AND status = $2")
        .bind(account_id)
        .bind(PlanStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::Conflict(account_id));
    }
    Ok(())
}

/// Expires every active plan due at `now`, returning the affected accounts.
pub async fn expire_due(conn: &mut AnyConnection, now: DateTime<Utc>) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        UPDATE investment_plans
        SET status = $1
        WHERE status = $2 AND expiry_date <= $3
        RETURNING account_id"#,
    )
    .bind(PlanStatus::Expired.as_str())
    .bind(PlanStatus::Active.as_str())
    .bind(to_millis(now))
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn list_by_status(
    conn: &mut AnyConnection,
    status: PlanStatus,
) -> Result<Vec<InvestmentPlan>> {
    sqlx::query_as::<_, PlanRow>(&format!("{SELECT_PLAN} WHERE status = $1 ORDER BY account_id"))
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(InvestmentPlan::try_from)
        .collect()
}
