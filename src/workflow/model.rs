use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    constants::SUPPORTED_CURRENCIES,
    error::{LedgerError, Result},
    utils::{decimal_from_db, from_millis, text_enum},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Admin verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl RequestStatus {
    /// The whole transition table: only `Pending` may be decided, and only once.
    pub fn decide(self, outcome: Outcome) -> Result<RequestStatus> {
        match (self, outcome) {
            (RequestStatus::Pending, Outcome::Approved) => Ok(RequestStatus::Approved),
            (RequestStatus::Pending, Outcome::Rejected) => Ok(RequestStatus::Rejected),
            (from, outcome) => Err(LedgerError::transition(from, &format!("{:?}", outcome))),
        }
    }
}

text_enum!(RequestKind { Deposit, Withdrawal });
text_enum!(RequestStatus { Pending, Approved, Rejected });

/// Bank details captured at the moment a withdrawal is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub bank_name: String,
    pub account_number: String,
    pub branch_code: String,
}

impl Destination {
    pub fn validate(&self) -> Result<()> {
        if [&self.bank_name, &self.account_number, &self.branch_code]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(LedgerError::invalid(
                "bank name, account number and branch code are required",
            ));
        }
        Ok(())
    }
}

pub fn validate_currency(currency: &str) -> Result<()> {
    if !SUPPORTED_CURRENCIES.contains(&currency) {
        return Err(LedgerError::invalid(format!(
            "unsupported currency '{}', expected one of {}",
            currency,
            SUPPORTED_CURRENCIES.join(", ")
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum RequestDetails {
    Deposit {
        evidence: String,
    },
    Withdrawal {
        currency: String,
        destination: Destination,
    },
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestDetails::Deposit { .. } => RequestKind::Deposit,
            RequestDetails::Withdrawal { .. } => RequestKind::Withdrawal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FundRequest {
    pub id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub status: RequestStatus,
    #[serde(flatten)]
    pub details: RequestDetails,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(sqlx::FromRow)]
pub struct FundRequestRow {
    pub id: i64,
    pub kind: String,
    pub account_id: i64,
    pub amount: String,
    pub status: String,
    pub evidence: Option<String>,
    pub currency: Option<String>,
    pub destination: Option<String>,
    pub requested_at: i64,
    pub reviewed_at: Option<i64>,
    pub reason: Option<String>,
}

impl TryFrom<FundRequestRow> for FundRequest {
    type Error = LedgerError;

    fn try_from(row: FundRequestRow) -> Result<Self> {
        let details = match row.kind.parse::<RequestKind>()? {
            RequestKind::Deposit => RequestDetails::Deposit {
                evidence: row.evidence.unwrap_or_default(),
            },
            RequestKind::Withdrawal => {
                let destination = row
                    .destination
                    .as_deref()
                    .map(serde_json::from_str::<Destination>)
                    .transpose()
                    .map_err(|e| LedgerError::invalid(format!("stored destination: {}", e)))?
                    .ok_or_else(|| LedgerError::invalid("withdrawal without destination"))?;
                RequestDetails::Withdrawal {
                    currency: row.currency.unwrap_or_default(),
                    destination,
                }
            }
        };
        Ok(FundRequest {
            id: row.id,
            account_id: row.account_id,
            amount: decimal_from_db(&row.amount)?,
            status: row.status.parse()?,
            details,
            requested_at: from_millis(row.requested_at)?,
            reviewed_at: row.reviewed_at.map(from_millis).transpose()?,
            reason: row.reason,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DepositSubmission {
    pub amount: Decimal,
    pub evidence: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalSubmission {
    pub amount: Decimal,
    pub currency: String,
    pub destination: Destination,
}

#[derive(Debug, Deserialize)]
pub struct Decision {
    pub request_id: i64,
    pub outcome: Outcome,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestRef {
    pub request_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_requests_can_be_decided() {
        assert_eq!(
            RequestStatus::Pending.decide(Outcome::Approved).unwrap(),
            RequestStatus::Approved
        );
        assert_eq!(
            RequestStatus::Pending.decide(Outcome::Rejected).unwrap(),
            RequestStatus::Rejected
        );
        for from in [RequestStatus::Approved, RequestStatus::Rejected] {
            for outcome in [Outcome::Approved, Outcome::Rejected] {
                assert!(matches!(
                    from.decide(outcome),
                    Err(LedgerError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn status_text_round_trips() {
        assert_eq!("Rejected".parse::<RequestStatus>().unwrap(), RequestStatus::Rejected);
        assert_eq!(RequestKind::Withdrawal.to_string(), "Withdrawal");
        assert!("approved".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn currencies_are_limited() {
        assert!(validate_currency("INR").is_ok());
        assert!(validate_currency("USD").is_err());
    }

    #[test]
    fn destination_fields_are_required() {
        let destination = Destination {
            bank_name: "HDFC".into(),
            account_number: " ".into(),
            branch_code: "0042".into(),
        };
        assert!(destination.validate().is_err());
    }
}
