#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use fantasy_ledger::{
    account::{model::Account, service::AccountStore},
    auth::Caller,
    config::LedgerConfig,
    db::Database,
    plan::service::PlanManager,
    position::{
        model::{Match, NewMatch},
        service::PositionLedger,
    },
    settlement::service::SettlementEngine,
    workflow::service::RequestWorkflow,
};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::{
    AnyPool,
    any::{AnyPoolOptions, install_default_drivers},
};

pub const ADMIN_ID: i64 = 9_000;

pub async fn setup_test_db() -> AnyPool {
    install_default_drivers();
    let timestamp: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    let db_name = format!("test_{}", timestamp);
    let database_url = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    // One long-lived connection keeps the shared in-memory DB alive and
    // serializes writers the way row locks would.
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(&database_url)
        .await
        .expect("Failed to create in-memory SQLite DB");

    Database::init_schema(&pool, &database_url)
        .await
        .expect("Failed to create test schema");

    pool
}

pub fn admin() -> Caller {
    Caller::admin(ADMIN_ID)
}

/// All ledger components over one fresh database.
pub struct Ledger {
    pub pool: AnyPool,
    pub config: LedgerConfig,
    pub accounts: Arc<AccountStore>,
    pub workflow: Arc<RequestWorkflow>,
    pub plans: Arc<PlanManager>,
    pub positions: Arc<PositionLedger>,
    pub settlement: Arc<SettlementEngine>,
}

impl Ledger {
    pub async fn new() -> Self {
        Self::with_config(LedgerConfig::default()).await
    }

    pub async fn with_config(config: LedgerConfig) -> Self {
        let pool = setup_test_db().await;
        let positions = Arc::new(PositionLedger::new(pool.clone(), config.clone()));
        Ledger {
            accounts: Arc::new(AccountStore::new(pool.clone(), config.clone())),
            workflow: Arc::new(RequestWorkflow::new(pool.clone(), config.clone())),
            plans: Arc::new(PlanManager::new(pool.clone(), config.clone())),
            settlement: Arc::new(SettlementEngine::new(
                pool.clone(),
                Arc::clone(&positions),
                config.clone(),
            )),
            positions,
            config,
            pool,
        }
    }

    pub async fn balance(&self, account_id: i64) -> Decimal {
        self.accounts.get_balance(account_id).await.unwrap()
    }

    /// Opens an account holding `funds`.
    pub async fn funded(&self, account_id: i64, funds: Decimal) -> Account {
        self.accounts.open(account_id).await.unwrap();
        if funds > Decimal::ZERO {
            self.accounts.credit(account_id, funds).await.unwrap();
        }
        self.accounts.get(account_id).await.unwrap()
    }

    /// Buys and approves a plan. A first approval also pays the plan bonus.
    pub async fn activate_plan(&self, account_id: i64) {
        self.plans
            .purchase(
                &Caller::user(account_id),
                "Gold",
                dec!(499),
                Utc::now() + Duration::days(30),
                "upi-ref-1",
            )
            .await
            .unwrap();
        self.plans.approve(&admin(), account_id).await.unwrap();
    }

    /// Funded account with an active plan, balance `funds` plus the plan bonus.
    pub async fn investor(&self, account_id: i64, funds: Decimal) -> Account {
        self.funded(account_id, funds).await;
        self.activate_plan(account_id).await;
        self.accounts.get(account_id).await.unwrap()
    }

    /// Investor that already spent the bonus on its trial investment, so its
    /// balance is exactly `funds` and regular sizing rules apply.
    pub async fn seasoned_investor(&self, account_id: i64, funds: Decimal) -> Account {
        self.investor(account_id, funds).await;
        let warmup = self.open_match(dec!(100), 1).await;
        self.positions
            .invest(&Caller::user(account_id), warmup.id, self.config.trial_amount)
            .await
            .unwrap();
        self.accounts.get(account_id).await.unwrap()
    }

    pub async fn open_match(&self, price: Decimal, min_positions: i64) -> Match {
        self.positions
            .create_match(&admin(), new_match(price, min_positions))
            .await
            .unwrap()
    }
}

pub fn new_match(price: Decimal, min_positions: i64) -> NewMatch {
    NewMatch {
        team1: "Mumbai".to_string(),
        team2: "Chennai".to_string(),
        match_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        match_time: "19:30".to_string(),
        category: "T20".to_string(),
        price_per_position: price,
        min_positions_per_account: min_positions,
        min_multiplier: dec!(0.5),
        max_multiplier: dec!(10),
    }
}
