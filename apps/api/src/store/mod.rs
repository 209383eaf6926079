//! Storage seams: records, profiles, the token ledger and raw files.
//!
//! `AppState` holds each seam as an `Arc<dyn …>`, chosen at startup from
//! `STORE_BACKEND`: `PgStore` + `S3FileStore` in production, `MemoryStore` +
//! `MemoryFileStore` for local runs and tests.

pub mod files;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{AiAnalysis, AnalysisRecord, NewRecord};
use crate::models::sections::CanonicalRecord;
use crate::models::user::{ProfileTargeting, Role, UserProfile};

/// Persisted `AnalysisRecord`s. Status changes happen only through these calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a new record with status `uploaded`.
    async fn create_record(&self, new: NewRecord) -> Result<AnalysisRecord, AppError>;

    async fn get_record(&self, id: Uuid) -> Result<Option<AnalysisRecord>, AppError>;

    /// Records owned by `owner_id`, newest first.
    async fn list_records(&self, owner_id: &str) -> Result<Vec<AnalysisRecord>, AppError>;

    /// Stores sections and extracted text; status becomes `parsed`.
    async fn save_sections(
        &self,
        id: Uuid,
        sections: &CanonicalRecord,
        raw_text: &str,
    ) -> Result<(), AppError>;

    /// Stores the merged score set; status becomes `analyzed`.
    async fn save_analysis(&self, id: Uuid, ai: &AiAnalysis) -> Result<(), AppError>;

    /// Status becomes `error` with `message`.
    async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError>;

    /// Returns the profile, creating it with `starting_tokens` if absent.
    /// A null balance on an existing profile is repaired to `starting_tokens`.
    async fn ensure_profile(
        &self,
        uid: &str,
        role: Role,
        starting_tokens: i64,
    ) -> Result<UserProfile, AppError>;

    /// Overwrites the targeting fields of an existing profile.
    async fn update_targeting(
        &self,
        uid: &str,
        targeting: &ProfileTargeting,
    ) -> Result<UserProfile, AppError>;
}

/// Atomic debit/credit of `parse_tokens`. A missing balance reads as `MISSING_BALANCE`.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Current balance, or `None` when the profile does not exist.
    async fn balance(&self, uid: &str) -> Result<Option<i64>, AppError>;

    /// Debits one token and returns the balance left.
    /// `InsufficientTokens` when the balance is 0 or less; `NotFound` without a profile.
    async fn reserve(&self, uid: &str) -> Result<i64, AppError>;

    /// Credits one token back and returns the new balance.
    async fn refund(&self, uid: &str) -> Result<i64, AppError>;
}

/// Raw upload storage.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores the object and returns its path.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, AppError>;

    /// Removes an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Object key for an upload. Path separators in the file name are flattened.
pub fn upload_key(owner_id: &str, record_id: Uuid, file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("resumes/{owner_id}/{record_id}-{name}")
}
