use std::{env, str::FromStr};

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_CONFLICT_RETRIES, DEFAULT_EXPIRY_SWEEP_SECS, DEFAULT_PLAN_BONUS,
    DEFAULT_SETTLEMENT_CONCURRENCY, DEFAULT_SETTLEMENT_PAGE_SIZE, DEFAULT_TRIAL_AMOUNT,
};

/// Business rules and tuning knobs handed to every ledger component.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Exact amount a first-time investor must stake.
    pub trial_amount: Decimal,
    /// One-time credit granted when a first plan is approved.
    pub plan_bonus: Decimal,
    pub conflict_retries: u32,
    pub settlement_page_size: i64,
    pub settlement_concurrency: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            trial_amount: DEFAULT_TRIAL_AMOUNT,
            plan_bonus: DEFAULT_PLAN_BONUS,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            settlement_page_size: DEFAULT_SETTLEMENT_PAGE_SIZE,
            settlement_concurrency: DEFAULT_SETTLEMENT_CONCURRENCY,
        }
    }
}

pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_public_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub expiry_sweep_secs: u64,
    pub ledger: LedgerConfig,
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key = %key, value = %value, "unparsable config value, using default");
            default
        }),
        Err(_) => default,
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load environment variables

    Config {
        database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        bind_addr: var_or("BIND_ADDR", DEFAULT_BIND_ADDR.to_string()),
        jwt_public_key: env::var("JWT_PUBLIC_KEY").ok(),
        jwt_secret: env::var("JWT_SECRET").ok(),
        expiry_sweep_secs: var_or("EXPIRY_SWEEP_SECS", DEFAULT_EXPIRY_SWEEP_SECS),
        ledger: LedgerConfig {
            trial_amount: var_or("TRIAL_INVESTMENT_AMOUNT", DEFAULT_TRIAL_AMOUNT),
            plan_bonus: var_or("PLAN_APPROVAL_BONUS", DEFAULT_PLAN_BONUS),
            conflict_retries: var_or("CONFLICT_RETRIES", DEFAULT_CONFLICT_RETRIES),
            settlement_page_size: var_or("SETTLEMENT_PAGE_SIZE", DEFAULT_SETTLEMENT_PAGE_SIZE),
            settlement_concurrency: var_or(
                "SETTLEMENT_CONCURRENCY",
                DEFAULT_SETTLEMENT_CONCURRENCY,
            ),
        },
    }
});

pub fn init_config() -> &'static Config {
    &CONFIG
}
