//! In-process backend for local runs and tests.
//!
//! Each map sits behind a `tokio::sync::Mutex`; the ledger holds the profile
//! lock for the whole read-check-write, which gives the same compare-and-decrement
//! guarantee as the row lock in Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{AiAnalysis, AnalysisRecord, NewRecord, RecordStatus};
use crate::models::sections::CanonicalRecord;
use crate::models::user::{ProfileTargeting, Role, UserProfile, MISSING_BALANCE};
use crate::store::{ProfileStore, RecordStore, TokenLedger};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, AnalysisRecord>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a profile as-is.
    #[cfg(test)]
    pub async fn put_profile(&self, profile: UserProfile) {
        self.profiles
            .lock()
            .await
            .insert(profile.uid.clone(), profile);
    }

    async fn update_record<F>(&self, id: Uuid, apply: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut AnalysisRecord) + Send,
    {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

fn profile_not_found(uid: &str) -> AppError {
    AppError::NotFound(format!("Profile {uid} not found"))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_record(&self, new: NewRecord) -> Result<AnalysisRecord, AppError> {
        let now = Utc::now();
        let record = AnalysisRecord {
            id: new.id,
            owner_id: new.owner_id,
            file: new.file,
            status: RecordStatus::Uploaded,
            sections: None,
            raw_text: None,
            ai: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.records.lock().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<AnalysisRecord>, AppError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn list_records(&self, owner_id: &str) -> Result<Vec<AnalysisRecord>, AppError> {
        let mut records: Vec<AnalysisRecord> = self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn save_sections(
        &self,
        id: Uuid,
        sections: &CanonicalRecord,
        raw_text: &str,
    ) -> Result<(), AppError> {
        let sections = sections.clone();
        let raw_text = raw_text.to_string();
        self.update_record(id, move |r| {
            r.sections = Some(sections);
            r.raw_text = Some(raw_text);
            r.status = RecordStatus::Parsed;
            r.error_message = None;
        })
        .await
    }

    async fn save_analysis(&self, id: Uuid, ai: &AiAnalysis) -> Result<(), AppError> {
        let ai = ai.clone();
        self.update_record(id, move |r| {
            r.ai = Some(ai);
            r.status = RecordStatus::Analyzed;
            r.error_message = None;
        })
        .await
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        let message = message.to_string();
        self.update_record(id, move |r| {
            r.status = RecordStatus::Error;
            r.error_message = Some(message);
        })
        .await
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.lock().await.get(uid).cloned())
    }

    async fn ensure_profile(
        &self,
        uid: &str,
        role: Role,
        starting_tokens: i64,
    ) -> Result<UserProfile, AppError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.entry(uid.to_string()).or_insert_with(|| {
            let mut profile = UserProfile::new_default(uid, starting_tokens);
            profile.role = role;
            profile
        });
        if profile.parse_tokens.is_none() {
            profile.parse_tokens = Some(starting_tokens);
            profile.updated_at = Utc::now();
        }
        Ok(profile.clone())
    }

    async fn update_targeting(
        &self,
        uid: &str,
        targeting: &ProfileTargeting,
    ) -> Result<UserProfile, AppError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.get_mut(uid).ok_or_else(|| profile_not_found(uid))?;
        profile.targeting = targeting.clone();
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

#[async_trait]
impl TokenLedger for MemoryStore {
    async fn balance(&self, uid: &str) -> Result<Option<i64>, AppError> {
        Ok(self
            .profiles
            .lock()
            .await
            .get(uid)
            .map(UserProfile::effective_balance))
    }

    async fn reserve(&self, uid: &str) -> Result<i64, AppError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.get_mut(uid).ok_or_else(|| profile_not_found(uid))?;
        let current = profile.effective_balance();
        if current <= 0 {
            return Err(AppError::InsufficientTokens);
        }
        profile.parse_tokens = Some(current - 1);
        profile.updated_at = Utc::now();
        Ok(current - 1)
    }

    async fn refund(&self, uid: &str) -> Result<i64, AppError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles.get_mut(uid).ok_or_else(|| profile_not_found(uid))?;
        let restored = profile.parse_tokens.unwrap_or(MISSING_BALANCE) + 1;
        profile.parse_tokens = Some(restored);
        profile.updated_at = Utc::now();
        Ok(restored)
    }
}
