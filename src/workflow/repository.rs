use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::AnyConnection;

use super::model::{FundRequest, FundRequestRow, RequestDetails, RequestKind, RequestStatus};
use crate::{
    error::{LedgerError, Result},
    utils::{money_to_db, to_millis},
};

const SELECT_REQUEST: &str = r#"
    SELECT id, kind, account_id, amount, status, evidence, currency, destination,
           requested_at, reviewed_at, reason
    FROM fund_requests
"#;

pub async fn insert(
    conn: &mut AnyConnection,
    account_id: i64,
    amount: Decimal,
    details: &RequestDetails,
    now: DateTime<Utc>,
) -> Result<i64> {
    let (evidence, currency, destination) = match details {
        RequestDetails::Deposit { evidence } => (Some(evidence.clone()), None, None),
        RequestDetails::Withdrawal {
            currency,
            destination,
        } => (
            None,
            Some(currency.clone()),
            Some(
                serde_json::to_string(destination)
                    .map_err(|e| LedgerError::invalid(e.to_string()))?,
            ),
        ),
    };
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO fund_requests
            (kind, account_id, amount, status, evidence, currency, destination, requested_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id"#,
    )
    .bind(details.kind().as_str())
    .bind(account_id)
    .bind(money_to_db(amount))
    .bind(RequestStatus::Pending.as_str())
    .bind(evidence)
    .bind(currency)
    .bind(destination)
    .bind(to_millis(now))
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}

pub async fn fetch(conn: &mut AnyConnection, request_id: i64) -> Result<FundRequest> {
    let row = sqlx::query_as::<_, FundRequestRow>(&format!("{SELECT_REQUEST} WHERE id = $1"))
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Request {}", request_id)))?;
    FundRequest::try_from(row)
}

/// Moves a request out of `Pending`. Loses cleanly if another decision got there first.
pub async fn mark_decided(
    conn: &mut AnyConnection,
    request_id: i64,
    status: RequestStatus,
    reviewed_at: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE fund_requests
        SET status = $1, reviewed_at = $2, reason = $3
        WHERE id = $4 AND status = $5"#,
    )
    .bind(status.as_str())
    .bind(to_millis(reviewed_at))
    .bind(reason.map(str::to_string))
    .bind(request_id)
    .bind(RequestStatus::Pending.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::InvalidTransition {
            from: "already decided".to_string(),
            action: status.as_str().to_string(),
        });
    }
    Ok(())
}

pub async fn list_for_account(
    conn: &mut AnyConnection,
    account_id: i64,
    kind: RequestKind,
) -> Result<Vec<FundRequest>> {
    sqlx::query_as::<_, FundRequestRow>(&format!(
        "{SELECT_REQUEST} WHERE account_id = $1 AND kind = $2 ORDER BY requested_at DESC, id DESC"
    ))
    .bind(account_id)
    .bind(kind.as_str())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(FundRequest::try_from)
    .collect()
}

pub async fn list_by_status(
    conn: &mut AnyConnection,
    kind: RequestKind,
    status: RequestStatus,
) -> Result<Vec<FundRequest>> {
    sqlx::query_as::<_, FundRequestRow>(&format!(
        "{SELECT_REQUEST} WHERE kind = $1 AND status = $2 ORDER BY requested_at DESC, id DESC"
    ))
    .bind(kind.as_str())
    .bind(status.as_str())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(FundRequest::try_from)
    .collect()
}
