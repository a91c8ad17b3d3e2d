use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ApplyMultiplier {
    pub match_id: i64,
    pub multiplier: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ResumeSettlement {
    pub match_id: i64,
}

/// What happened to a single position during a payout run.
#[derive(Debug, Clone, PartialEq)]
pub enum PayoutOutcome {
    Paid { account_id: i64, payout: Decimal },
    /// Marked paid, but the payout rounded to nothing so no credit was made.
    ZeroPayout,
    AlreadyPaid,
    Failed(PayoutFailure),
}

/// A position that could not be paid; the admin retries these with a resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutFailure {
    pub position_id: i64,
    pub account_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementSummary {
    pub match_id: i64,
    pub multiplier: Decimal,
    pub positions_paid: usize,
    pub accounts_paid: usize,
    pub total_disbursed: Decimal,
    pub zero_payouts: usize,
    pub already_paid: usize,
    pub failures: Vec<PayoutFailure>,
    /// Set when the run stopped before visiting every position.
    pub aborted: Option<String>,
}

impl SettlementSummary {
    pub fn new(match_id: i64, multiplier: Decimal) -> Self {
        SettlementSummary {
            match_id,
            multiplier,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none()
    }
}
