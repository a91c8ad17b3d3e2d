use std::{sync::Arc, time::Duration};

use anyhow::Context;
use fantasy_ledger::{
    account::{controller::AccountController, service::AccountStore},
    auth::jwt::TokenVerifier,
    config::init_config,
    db::Database,
    plan::{
        controller::PlanController,
        service::{PlanManager, spawn_expiry_sweeper},
    },
    position::{controller::PositionController, service::PositionLedger},
    server::{Api, Server},
    settlement::{controller::SettlementController, service::SettlementEngine},
    workflow::{controller::WorkflowController, service::RequestWorkflow},
};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = init_config();
    let pool = Database::new_pool(&config.database_url)
        .await
        .context("Failed to create DB pool")?;
    Database::init_schema(&pool, &config.database_url)
        .await
        .context("Failed to create schema")?;
    Database::print_pool_stats(&pool);

    let ledger_config = config.ledger.clone();
    let accounts = Arc::new(AccountStore::new(pool.clone(), ledger_config.clone()));
    let workflow = Arc::new(RequestWorkflow::new(pool.clone(), ledger_config.clone()));
    let plans = Arc::new(PlanManager::new(pool.clone(), ledger_config.clone()));
    let positions = Arc::new(PositionLedger::new(pool.clone(), ledger_config.clone()));
    let settlement = Arc::new(SettlementEngine::new(
        pool.clone(),
        Arc::clone(&positions),
        ledger_config,
    ));

    let sweeper = spawn_expiry_sweeper(
        Arc::clone(&plans),
        Duration::from_secs(config.expiry_sweep_secs.max(1)),
    );

    let api = Arc::new(Api {
        accounts: AccountController::new(accounts),
        workflow: WorkflowController::new(workflow),
        plans: PlanController::new(plans),
        positions: PositionController::new(positions),
        settlement: SettlementController::new(settlement),
        verifier: TokenVerifier::from_config(config)?,
    });
    let server = Server::new(api, config.bind_addr.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    let result = server.start(shutdown_rx).await;
    sweeper.abort();
    pool.close().await;
    result
}
