use std::{collections::HashMap, future::Future, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        BAD_REQUEST, CONFLICT, FORBIDDEN, INTERNAL_ERROR, MONEY_SCALE, NOT_FOUND, OK_RESPONSE,
    },
    error::{LedgerError, Result},
};

pub fn des_from_str<T: for<'a> Deserialize<'a>>(string: &str) -> std::result::Result<T, ()> {
    serde_json::from_str(string.split("\r\n\r\n").last().unwrap_or_default()).map_err(|_| ())
}

pub fn ser_to_str<T: Serialize>(t: &T) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string(t)
}

/// Parses a JSON request body, reporting malformed input as `InvalidInput`.
pub fn parse_body<T: for<'a> Deserialize<'a>>(body: &str) -> Result<T> {
    des_from_str(body).map_err(|_| LedgerError::invalid("invalid body"))
}

/// Maps a ledger outcome onto a status line and JSON body.
pub fn respond<T: Serialize>(result: Result<T>, ok_status: &str) -> (String, String) {
    match result {
        Ok(value) => match ser_to_str(&value) {
            Ok(json) => (ok_status.to_string(), json),
            Err(e) => {
                tracing::error!(error = %e, "serde error");
                (INTERNAL_ERROR.to_string(), "".to_string())
            }
        },
        Err(err) => {
            let status = match &err {
                LedgerError::NotFound(_) => NOT_FOUND,
                LedgerError::Unauthorized | LedgerError::AccountRestricted => FORBIDDEN,
                LedgerError::Conflict(_) => CONFLICT,
                LedgerError::Database(_) => {
                    tracing::error!(error = ?err, "ledger storage failure");
                    return (INTERNAL_ERROR.to_string(), "".to_string());
                }
                _ => BAD_REQUEST,
            };
            tracing::warn!(reason = %err, "request rejected");
            let body = serde_json::json!({ "message": err.to_string() }).to_string();
            (status.to_string(), body)
        }
    }
}

pub fn ok<T: Serialize>(result: Result<T>) -> (String, String) {
    respond(result, OK_RESPONSE)
}

pub fn extract_token(headers: &HashMap<String, String>) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| LedgerError::invalid(format!("timestamp {} out of range", millis)))
}

/// Canonical text form for stored amounts.
pub fn money_to_db(amount: Decimal) -> String {
    amount
        .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero)
        .normalize()
        .to_string()
}

pub fn decimal_from_db(value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| LedgerError::invalid(format!("stored amount '{}' is not a decimal", value)))
}

/// Rejects zero and negative amounts and anything finer than the money scale.
pub fn require_positive(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid("amount must be greater than zero"));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::invalid(format!(
            "amount {} has more than {} decimal places",
            amount, MONEY_SCALE
        )));
    }
    Ok(amount)
}

/// Gives a fieldless enum its stored text form: `as_str`, `FromStr` and `Display`.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => stringify!($variant),)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::error::LedgerError;

            fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
                match value {
                    $(stringify!($variant) => Ok($ty::$variant),)+
                    other => Err($crate::error::LedgerError::invalid(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_enum;

/// Runs `op` again whenever it loses an optimistic version check on an account row.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(LedgerError::Conflict(account_id)) if attempt < max_attempts => {
                tracing::debug!(account_id, attempt, "version conflict, retrying");
                attempt += 1;
                tokio::task::yield_now().await;
            }
            Err(LedgerError::Conflict(account_id)) => {
                tracing::warn!(account_id, attempt, "retry budget exhausted");
                return Err(LedgerError::Conflict(account_id));
            }
            other => return other,
        }
    }
}
