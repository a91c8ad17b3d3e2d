use std::{error::Error, fmt::Debug};

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Account is restricted")]
    AccountRestricted,

    #[error("An investment plan is already active")]
    PlanAlreadyActive,

    #[error("An active investment plan is required to invest")]
    NotEligible,

    #[error("Match is not open for investment")]
    MatchNotOpen,

    #[error("Multiplier already applied, match is completed")]
    AlreadySettled,

    #[error("Multiplier must be greater than zero and within the match range")]
    InvalidMultiplier,

    #[error("Invalid transition from {from} on {action}")]
    InvalidTransition { from: String, action: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Admin capability required")]
    Unauthorized,

    #[error("Concurrent update on account {0}")]
    Conflict(i64),

    #[error("Database query")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidInput(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LedgerError::NotFound(what.into())
    }

    pub fn transition(from: impl Debug, action: &str) -> Self {
        LedgerError::InvalidTransition {
            from: format!("{:?}", from),
            action: action.to_string(),
        }
    }
}

impl Debug for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if let Some(source) = self.source() {
            write!(f, " (Caused by: {})", source)?;
        }
        Ok(())
    }
}
