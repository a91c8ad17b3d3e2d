use sqlx::{AnyPool, Executor, Pool};

const POSTGRES_SCHEMA: &str = include_str!("../migrations/postgres.sql");
const SQLITE_SCHEMA: &str = include_str!("../migrations/sqlite.sql");

pub struct Database;

impl Database {
    pub async fn new_pool(url: &str) -> Result<Pool<sqlx::Any>, sqlx::Error> {
        sqlx::any::install_default_drivers();
        sqlx::any::AnyPoolOptions::new()
            .max_connections(10)
            .min_connections(5)
            .idle_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await
    }

    /// Creates the ledger tables for the backend named by `url`.
    pub async fn init_schema(pool: &AnyPool, url: &str) -> Result<(), sqlx::Error> {
        let schema = if url.starts_with("sqlite") {
            SQLITE_SCHEMA
        } else {
            POSTGRES_SCHEMA
        };
        for statement in schema.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            pool.execute(statement).await?;
        }
        tracing::info!("ledger schema ready");
        Ok(())
    }

    pub fn print_pool_stats(pool: &AnyPool) {
        tracing::debug!(
            total = pool.size(),
            idle = pool.num_idle(),
            active = pool.size().saturating_sub(pool.num_idle() as u32),
            "db pool stats"
        );
    }
}
