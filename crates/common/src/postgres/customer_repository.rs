use crate::domain::{CustomerRepository, DomainError, DomainResult};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresCustomerRepository {
    client: PostgresClient,
}

impl PostgresCustomerRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    #[instrument(skip(self, customer_id), fields(customer_id = %customer_id))]
    async fn customer_exists(&self, customer_id: Uuid) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT 1 FROM customers WHERE customer_id = $1",
                &[&customer_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.is_some())
    }
}
