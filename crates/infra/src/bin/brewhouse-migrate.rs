//! Applies the Postgres schema. Reads the same environment as the services.

use anyhow::Context;
use tracing::info;

use brewhouse_infra::{PostgresStore, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    brewhouse_observability::init();

    let config = StoreConfig::from_env().context("invalid configuration")?;
    let pool = config.connect().await.context("failed to connect to Postgres")?;
    let store = PostgresStore::new(pool);
    store.apply_schema().await.context("failed to apply schema")?;

    info!("schema applied");
    Ok(())
}
