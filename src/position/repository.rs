use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::AnyConnection;

use super::model::{Match, MatchPosition, MatchRow, MatchStatus, NewMatch, PositionRow};
use crate::{
    error::{LedgerError, Result},
    utils::{money_to_db, to_millis},
};

const SELECT_MATCH: &str = r#"
    SELECT id, team1, team2, match_date, match_time, category, price_per_position,
           min_positions_per_account, min_multiplier, max_multiplier, status, final_multiplier
    FROM matches
"#;

const SELECT_POSITION: &str = r#"
    SELECT id, account_id, match_id, amount, staked_at, payout, paid_at
    FROM match_positions
"#;

pub async fn insert_match(conn: &mut AnyConnection, new_match: &NewMatch) -> Result<i64> {
    let match_date = new_match.match_date.and_time(NaiveTime::MIN).and_utc();
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO matches (team1, team2, match_date, match_time, category, price_per_position,
                             min_positions_per_account, min_multiplier, max_multiplier, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id"#,
    )
    .bind(new_match.team1.trim())
    .bind(new_match.team2.trim())
    .bind(to_millis(match_date))
    .bind(new_match.match_time.trim())
    .bind(new_match.category.trim())
    .bind(money_to_db(new_match.price_per_position))
    .bind(new_match.min_positions_per_account)
    .bind(new_match.min_multiplier.normalize().to_string())
    .bind(new_match.max_multiplier.normalize().to_string())
    .bind(MatchStatus::Upcoming.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}

pub async fn fetch_match(conn: &mut AnyConnection, match_id: i64) -> Result<Match> {
    let row = sqlx::query_as::<_, MatchRow>(&format!("{SELECT_MATCH} WHERE id = $1"))
        .bind(match_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Match {}", match_id)))?;
    Match::try_from(row)
}

pub async fn list_matches(conn: &mut AnyConnection) -> Result<Vec<Match>> {
    sqlx::query_as::<_, MatchRow>(&format!("{SELECT_MATCH} ORDER BY match_date, id"))
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Match::try_from)
        .collect()
}

/// Flips `Upcoming` to `Completed` and records the multiplier; losing the race means
/// somebody else already settled the match.
pub async fn complete_match(
    conn: &mut AnyConnection,
    match_id: i64,
    multiplier: Decimal,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE matches SET status = $1, final_multiplier = $2 WHERE id = $3 AND status = $4",
    )
    .bind(MatchStatus::Completed.as_str())
    .bind(multiplier.normalize().to_string())
    .bind(match_id)
    .bind(MatchStatus::Upcoming.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::AlreadySettled);
    }
    Ok(())
}

/// Takes the write lock on an `Upcoming` match row without changing it.
/// Returns `false` when the match is no longer open.
pub async fn lock_open_match(conn: &mut AnyConnection, match_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE matches SET status = status WHERE id = $1 AND status = $2")
        .bind(match_id)
        .bind(MatchStatus::Upcoming.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_position(
    conn: &mut AnyConnection,
    account_id: i64,
    match_id: i64,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO match_positions (account_id, match_id, amount, staked_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id"#,
    )
    .bind(account_id)
    .bind(match_id)
    .bind(money_to_db(amount))
    .bind(to_millis(now))
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}

pub async fn fetch_position(conn: &mut AnyConnection, position_id: i64) -> Result<MatchPosition> {
    let row = sqlx::query_as::<_, PositionRow>(&format!("{SELECT_POSITION} WHERE id = $1"))
        .bind(position_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Position {}", position_id)))?;
    MatchPosition::try_from(row)
}

/// Keyset page of a match's positions with ids above `after_id`.
pub async fn positions_page(
    conn: &mut AnyConnection,
    match_id: i64,
    after_id: i64,
    limit: i64,
    unpaid_only: bool,
) -> Result<Vec<MatchPosition>> {
    let unpaid = if unpaid_only { "AND paid_at IS NULL" } else { "" };
    sqlx::query_as::<_, PositionRow>(&format!(
        "{SELECT_POSITION} WHERE match_id = $1 AND id > $2 {unpaid} ORDER BY id LIMIT $3"
    ))
    .bind(match_id)
    .bind(after_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(MatchPosition::try_from)
    .collect()
}

pub async fn positions_for_account(
    conn: &mut AnyConnection,
    account_id: i64,
) -> Result<Vec<MatchPosition>> {
    sqlx::query_as::<_, PositionRow>(&format!(
        "{SELECT_POSITION} WHERE account_id = $1 ORDER BY staked_at DESC, id DESC"
    ))
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(MatchPosition::try_from)
    .collect()
}

pub async fn positions_for_match(
    conn: &mut AnyConnection,
    match_id: i64,
) -> Result<Vec<MatchPosition>> {
    sqlx::query_as::<_, PositionRow>(&format!("{SELECT_POSITION} WHERE match_id = $1 ORDER BY id"))
        .bind(match_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(MatchPosition::try_from)
        .collect()
}

/// Stamps the payout on a position. Returns `false` when it was already paid.
pub async fn mark_paid(
    conn: &mut AnyConnection,
    position_id: i64,
    payout: Decimal,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE match_positions SET payout = $1, paid_at = $2 WHERE id = $3 AND paid_at IS NULL",
    )
    .bind(money_to_db(payout))
    .bind(to_millis(now))
    .bind(position_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
