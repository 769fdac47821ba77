use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::postgres::PostgresClient;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Table recording applied schema versions
pub const MIGRATION_TABLE: &str = "schema_migrations";

/// Applies the embedded `migrations/V*__*.sql` files that have not run yet.
/// Each migration runs in its own transaction.
pub struct MigrationRunner {
    client: PostgresClient,
}

impl MigrationRunner {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    /// Run all pending migrations, returning how many were applied.
    pub async fn run_migrations(&self) -> Result<usize> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .context("checking out migration connection")?;
        let client: &mut tokio_postgres::Client = &mut conn;

        let report = embedded::migrations::runner()
            .set_migration_table_name(MIGRATION_TABLE)
            .run_async(client)
            .await
            .context("applying schema migrations")?;

        let applied = report.applied_migrations();
        for migration in applied {
            info!(version = migration.version(), name = migration.name(), "applied migration");
        }
        if applied.is_empty() {
            debug!("schema up to date");
        }

        Ok(applied.len())
    }
}
