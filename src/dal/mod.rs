use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    domain::{business::BusinessProfile, lead::Lead},
    error::StorageError,
};

pub mod business_profile_db;
pub mod lead_db;
pub mod memory_db;

pub use memory_db::MemoryStorage;

/// Outcome of a write the pipeline does not depend on.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageResult {
    pub success: bool,
    pub error: Option<String>,
}

impl StorageResult {
    pub fn stored() -> Self {
        StorageResult {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: StorageError) -> Self {
        StorageResult {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<(), StorageError>> for StorageResult {
    fn from(value: Result<(), StorageError>) -> Self {
        match value {
            Ok(()) => StorageResult::stored(),
            Err(e) => StorageResult::failed(e),
        }
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_business_profile(
        &self,
        user_id: &str,
        profile: &BusinessProfile,
    ) -> StorageResult;

    async fn create_lead(&self, lead: &Lead) -> StorageResult;
}

pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        PgStorage { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create_business_profile(
        &self,
        user_id: &str,
        profile: &BusinessProfile,
    ) -> StorageResult {
        business_profile_db::upsert_business_profile(user_id, profile, &self.pool)
            .await
            .into()
    }

    async fn create_lead(&self, lead: &Lead) -> StorageResult {
        lead_db::upsert_lead(lead, &self.pool).await.into()
    }
}
