use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LedgerError, Result},
    utils::{decimal_from_db, from_millis, require_positive, text_enum},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Upcoming,
    Completed,
}

text_enum!(MatchStatus { Upcoming, Completed });

impl MatchStatus {
    /// Matches only ever move forward, and only once.
    pub fn complete(self) -> Result<MatchStatus> {
        match self {
            MatchStatus::Upcoming => Ok(MatchStatus::Completed),
            MatchStatus::Completed => Err(LedgerError::AlreadySettled),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub id: i64,
    pub team1: String,
    pub team2: String,
    pub match_date: NaiveDate,
    pub match_time: String,
    pub category: String,
    pub price_per_position: Decimal,
    pub min_positions_per_account: i64,
    pub min_multiplier: Decimal,
    pub max_multiplier: Decimal,
    pub status: MatchStatus,
    pub final_multiplier: Option<Decimal>,
}

impl Match {
    /// Sizing rule for accounts past their trial investment.
    pub fn check_stake(&self, amount: Decimal) -> Result<()> {
        let price = self.price_per_position;
        if amount <= Decimal::ZERO || !(amount % price).is_zero() {
            return Err(LedgerError::invalid(format!(
                "investment amount must be a multiple of {}",
                price
            )));
        }
        let minimum = price
            .checked_mul(Decimal::from(self.min_positions_per_account))
            .ok_or_else(|| LedgerError::invalid("minimum stake overflows"))?;
        if amount < minimum {
            return Err(LedgerError::invalid(format!(
                "investment amount must be at least {}",
                minimum
            )));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
pub struct MatchRow {
    pub id: i64,
    pub team1: String,
    pub team2: String,
    pub match_date: i64,
    pub match_time: String,
    pub category: String,
    pub price_per_position: String,
    pub min_positions_per_account: i64,
    pub min_multiplier: String,
    pub max_multiplier: String,
    pub status: String,
    pub final_multiplier: Option<String>,
}

impl TryFrom<MatchRow> for Match {
    type Error = LedgerError;

    fn try_from(row: MatchRow) -> Result<Self> {
        Ok(Match {
            id: row.id,
            team1: row.team1,
            team2: row.team2,
            match_date: from_millis(row.match_date)?.date_naive(),
            match_time: row.match_time,
            category: row.category,
            price_per_position: decimal_from_db(&row.price_per_position)?,
            min_positions_per_account: row.min_positions_per_account,
            min_multiplier: decimal_from_db(&row.min_multiplier)?,
            max_multiplier: decimal_from_db(&row.max_multiplier)?,
            status: row.status.parse()?,
            final_multiplier: row.final_multiplier.as_deref().map(decimal_from_db).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMatch {
    pub team1: String,
    pub team2: String,
    pub match_date: NaiveDate,
    pub match_time: String,
    pub category: String,
    pub price_per_position: Decimal,
    #[serde(default = "default_min_positions")]
    pub min_positions_per_account: i64,
    pub min_multiplier: Decimal,
    pub max_multiplier: Decimal,
}

fn default_min_positions() -> i64 {
    1
}

impl NewMatch {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("team1", &self.team1),
            ("team2", &self.team2),
            ("match_time", &self.match_time),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::invalid(format!("{} is required", field)));
            }
        }
        require_positive(self.price_per_position)?;
        if self.min_positions_per_account < 1 {
            return Err(LedgerError::invalid("minimum positions per account must be at least 1"));
        }
        if self.min_multiplier <= Decimal::ZERO || self.min_multiplier > self.max_multiplier {
            return Err(LedgerError::invalid("multiplier range must satisfy 0 < min <= max"));
        }
        Ok(())
    }
}

/// One stake by one account in one match. Positions are never edited except
/// for the payout marker written by settlement.
#[derive(Debug, Clone, Serialize)]
pub struct MatchPosition {
    pub id: i64,
    pub account_id: i64,
    pub match_id: i64,
    pub amount: Decimal,
    pub staked_at: DateTime<Utc>,
    pub payout: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl MatchPosition {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

#[derive(sqlx::FromRow)]
pub struct PositionRow {
    pub id: i64,
    pub account_id: i64,
    pub match_id: i64,
    pub amount: String,
    pub staked_at: i64,
    pub payout: Option<String>,
    pub paid_at: Option<i64>,
}

impl TryFrom<PositionRow> for MatchPosition {
    type Error = LedgerError;

    fn try_from(row: PositionRow) -> Result<Self> {
        Ok(MatchPosition {
            id: row.id,
            account_id: row.account_id,
            match_id: row.match_id,
            amount: decimal_from_db(&row.amount)?,
            staked_at: from_millis(row.staked_at)?,
            payout: row.payout.as_deref().map(decimal_from_db).transpose()?,
            paid_at: row.paid_at.map(from_millis).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Investment {
    pub match_id: i64,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct MatchRef {
    pub match_id: i64,
}

/// Admin view of everything staked on one match.
#[derive(Debug, Serialize)]
pub struct MatchInvestments {
    #[serde(rename = "match")]
    pub game: Match,
    pub positions: Vec<MatchPosition>,
    pub totals: Vec<AccountTotal>,
    pub total_staked: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountTotal {
    pub account_id: i64,
    pub staked: Decimal,
    pub positions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn game(price: Decimal, min_positions: i64) -> Match {
        Match {
            id: 1,
            team1: "Mumbai".into(),
            team2: "Chennai".into(),
            match_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            match_time: "19:30".into(),
            category: "IPL".into(),
            price_per_position: price,
            min_positions_per_account: min_positions,
            min_multiplier: dec!(1),
            max_multiplier: dec!(5),
            status: MatchStatus::Upcoming,
            final_multiplier: None,
        }
    }

    #[test]
    fn stakes_are_whole_positions() {
        let m = game(dec!(500), 1);
        assert!(m.check_stake(dec!(500)).is_ok());
        assert!(m.check_stake(dec!(1000)).is_ok());
        assert!(m.check_stake(dec!(700)).is_err());
        assert!(m.check_stake(dec!(0)).is_err());
    }

    #[test]
    fn stakes_respect_minimum_positions() {
        let m = game(dec!(500), 3);
        assert!(m.check_stake(dec!(1000)).is_err());
        assert!(m.check_stake(dec!(1500)).is_ok());
    }

    #[test]
    fn completion_happens_once() {
        assert_eq!(MatchStatus::Upcoming.complete().unwrap(), MatchStatus::Completed);
        assert!(matches!(
            MatchStatus::Completed.complete(),
            Err(LedgerError::AlreadySettled)
        ));
    }

    #[test]
    fn new_match_is_validated() {
        let valid = NewMatch {
            team1: "Mumbai".into(),
            team2: "Chennai".into(),
            match_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            match_time: "19:30".into(),
            category: "IPL".into(),
            price_per_position: dec!(500),
            min_positions_per_account: 1,
            min_multiplier: dec!(1.5),
            max_multiplier: dec!(3),
        };
        assert!(valid.validate().is_ok());

        let inverted = NewMatch {
            min_multiplier: dec!(4),
            ..valid.clone()
        };
        assert!(inverted.validate().is_err());

        let nameless = NewMatch {
            team2: " ".into(),
            ..valid
        };
        assert!(nameless.validate().is_err());
    }
}
