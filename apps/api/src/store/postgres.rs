//! Postgres backend. Schema: `migrations/0001_init.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::{AiAnalysis, AnalysisRecord, FileMeta, NewRecord, RecordStatus};
use crate::models::sections::CanonicalRecord;
use crate::models::user::{ProfileTargeting, Role, UserProfile, MISSING_BALANCE};
use crate::parsing::normalizer::normalize_sections;
use crate::store::{ProfileStore, RecordStore, TokenLedger};

#[derive(Debug, FromRow)]
struct ResumeRow {
    id: Uuid,
    user_id: String,
    file_name: String,
    file_path: String,
    content_type: String,
    size_bytes: i64,
    status: String,
    raw_text: Option<String>,
    sections: Option<Value>,
    ai: Option<Value>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ResumeRow> for AnalysisRecord {
    type Error = AppError;

    fn try_from(row: ResumeRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<RecordStatus>()
            .map_err(AppError::PersistenceFailed)?;
        // Stored JSON goes back through the normalizer so old or hand-edited rows
        // still satisfy the canonical shape.
        let sections = row.sections.as_ref().map(normalize_sections);
        let ai = row.ai.and_then(|v| match serde_json::from_value::<AiAnalysis>(v) {
            Ok(ai) => Some(ai),
            Err(e) => {
                warn!("Resume {} has an unreadable ai block: {e}", row.id);
                None
            }
        });
        Ok(AnalysisRecord {
            id: row.id,
            owner_id: row.user_id,
            file: FileMeta {
                name: row.file_name,
                path: row.file_path,
                content_type: row.content_type,
                size_bytes: row.size_bytes,
            },
            status,
            sections,
            raw_text: row.raw_text,
            ai,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    uid: String,
    role: String,
    parse_tokens: Option<i64>,
    target_role: String,
    seniority: String,
    industries: Vec<String>,
    must_have_keywords: Vec<String>,
    nice_to_have_keywords: Vec<String>,
    locations: Vec<String>,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            uid: row.uid,
            role: row.role.parse::<Role>().map_err(AppError::PersistenceFailed)?,
            parse_tokens: row.parse_tokens,
            targeting: ProfileTargeting {
                target_role: row.target_role,
                seniority: row.seniority,
                industries: row.industries,
                must_have_keywords: row.must_have_keywords,
                nice_to_have_keywords: row.nice_to_have_keywords,
                locations: row.locations,
                notes: row.notes,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::PersistenceFailed(e.to_string()))
}

fn resume_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Resume {id} not found"))
}

fn profile_not_found(uid: &str) -> AppError {
    AppError::NotFound(format!("Profile {uid} not found"))
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool of up to 10 connections. The schema in `migrations/` is applied
    /// out of band.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        info!("PostgreSQL connection pool established");
        Ok(Self::new(pool))
    }
}

fn expect_one_row(id: Uuid, rows: u64) -> Result<(), AppError> {
    if rows == 0 {
        return Err(resume_not_found(id));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for PgStore {
    async fn create_record(&self, new: NewRecord) -> Result<AnalysisRecord, AppError> {
        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes
                (id, user_id, file_name, file_path, content_type, size_bytes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(&new.owner_id)
        .bind(&new.file.name)
        .bind(&new.file.path)
        .bind(&new.file.content_type)
        .bind(new.file.size_bytes)
        .bind(RecordStatus::Uploaded.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<AnalysisRecord>, AppError> {
        sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AnalysisRecord::try_from)
            .transpose()
    }

    async fn list_records(&self, owner_id: &str) -> Result<Vec<AnalysisRecord>, AppError> {
        sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(AnalysisRecord::try_from)
        .collect()
    }

    async fn save_sections(
        &self,
        id: Uuid,
        sections: &CanonicalRecord,
        raw_text: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE resumes
            SET sections = $2, raw_text = $3, status = $4, error_message = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(to_json(sections)?)
        .bind(raw_text)
        .bind(RecordStatus::Parsed.as_str())
        .execute(&self.pool)
        .await?;
        expect_one_row(id, result.rows_affected())
    }

    async fn save_analysis(&self, id: Uuid, ai: &AiAnalysis) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE resumes
            SET ai = $2, status = $3, error_message = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(to_json(ai)?)
        .bind(RecordStatus::Analyzed.as_str())
        .execute(&self.pool)
        .await?;
        expect_one_row(id, result.rows_affected())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE resumes SET status = $2, error_message = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(RecordStatus::Error.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;
        expect_one_row(id, result.rows_affected())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?
            .map(UserProfile::try_from)
            .transpose()
    }

    async fn ensure_profile(
        &self,
        uid: &str,
        role: Role,
        starting_tokens: i64,
    ) -> Result<UserProfile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (uid, role, parse_tokens)
            VALUES ($1, $2, $3)
            ON CONFLICT (uid) DO UPDATE
            SET parse_tokens = COALESCE(profiles.parse_tokens, EXCLUDED.parse_tokens),
                updated_at = CASE WHEN profiles.parse_tokens IS NULL
                                  THEN NOW() ELSE profiles.updated_at END
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(role.as_str())
        .bind(starting_tokens)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn update_targeting(
        &self,
        uid: &str,
        targeting: &ProfileTargeting,
    ) -> Result<UserProfile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE profiles
            SET target_role = $2, seniority = $3, industries = $4, must_have_keywords = $5,
                nice_to_have_keywords = $6, locations = $7, notes = $8, updated_at = NOW()
            WHERE uid = $1
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(&targeting.target_role)
        .bind(&targeting.seniority)
        .bind(&targeting.industries)
        .bind(&targeting.must_have_keywords)
        .bind(&targeting.nice_to_have_keywords)
        .bind(&targeting.locations)
        .bind(&targeting.notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| profile_not_found(uid))?;
        row.try_into()
    }
}

#[async_trait]
impl TokenLedger for PgStore {
    async fn balance(&self, uid: &str) -> Result<Option<i64>, AppError> {
        let tokens: Option<Option<i64>> =
            sqlx::query_scalar("SELECT parse_tokens FROM profiles WHERE uid = $1")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(tokens.map(|t| t.unwrap_or(MISSING_BALANCE)))
    }

    async fn reserve(&self, uid: &str) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent reserves for the same user queue here.
        let tokens: Option<Option<i64>> =
            sqlx::query_scalar("SELECT parse_tokens FROM profiles WHERE uid = $1 FOR UPDATE")
                .bind(uid)
                .fetch_optional(&mut *tx)
                .await?;
        let current = tokens
            .ok_or_else(|| profile_not_found(uid))?
            .unwrap_or(MISSING_BALANCE);
        if current <= 0 {
            return Err(AppError::InsufficientTokens);
        }

        let remaining = current - 1;
        sqlx::query("UPDATE profiles SET parse_tokens = $2, updated_at = NOW() WHERE uid = $1")
            .bind(uid)
            .bind(remaining)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Reserved parse token for {uid} ({remaining} left)");
        Ok(remaining)
    }

    async fn refund(&self, uid: &str) -> Result<i64, AppError> {
        let restored: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE profiles
            SET parse_tokens = COALESCE(parse_tokens, $2) + 1, updated_at = NOW()
            WHERE uid = $1
            RETURNING parse_tokens
            "#,
        )
        .bind(uid)
        .bind(MISSING_BALANCE)
        .fetch_optional(&self.pool)
        .await?;
        let restored = restored.ok_or_else(|| profile_not_found(uid))?;
        info!("Refunded parse token to {uid} ({restored} now)");
        Ok(restored)
    }
}
