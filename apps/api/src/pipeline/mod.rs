//! Orchestrator: sequences extraction, normalization, scoring and the ledger.
//!
//! Record lifecycle:
//!   uploaded ──extract+normalize──▶ parsed ──reserve, score, persist──▶ analyzed
//!       └──────── failure ────────▶ error
//!
//! Tokens are only reserved after a record is parsed, so extraction and
//! normalization failures never cost anything. Once a token is reserved, any
//! later failure (judgment call, timeout, persistence) refunds it.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{extract_text, DocumentFormat};
use crate::llm_client::CompletionClient;
use crate::models::analysis::{AiAnalysis, AnalysisRecord, FileMeta, NewRecord, ScoreSet};
use crate::models::sections::CanonicalRecord;
use crate::models::user::{Caller, ProfileTargeting};
use crate::parsing::extract_sections;
use crate::scoring::judgment::{score_judgment, JudgmentBudget};
use crate::scoring::{merge_scores, score_deterministic, ScoringWeights};
use crate::store::{upload_key, FileStore, ProfileStore, RecordStore, TokenLedger};

/// A file received from the client, not yet validated.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Character budget for the normalizer input.
    pub parse_max_chars: usize,
    /// Upper bound on each completion call, on top of the client's own retries.
    pub llm_timeout: Duration,
    pub weights: ScoringWeights,
    pub budget: JudgmentBudget,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            parse_max_chars: 60_000,
            llm_timeout: Duration::from_secs(60),
            weights: ScoringWeights::default(),
            budget: JudgmentBudget::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOutcome {
    pub score_set: ScoreSet,
    /// Balance after the debit; `None` for unmetered roles.
    pub tokens_remaining: Option<i64>,
}

#[derive(Clone)]
pub struct Pipeline {
    pub records: Arc<dyn RecordStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub ledger: Arc<dyn TokenLedger>,
    pub files: Arc<dyn FileStore>,
    pub llm: Arc<dyn CompletionClient>,
    pub settings: PipelineSettings,
}

impl Pipeline {
    /// Fails fast for metered callers with nothing to spend. Does not debit.
    pub async fn check_balance(&self, caller: &Caller) -> Result<(), AppError> {
        if caller.role.is_elevated() {
            return Ok(());
        }
        let balance = self
            .ledger
            .balance(&caller.uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", caller.uid)))?;
        if balance <= 0 {
            return Err(AppError::InsufficientTokens);
        }
        Ok(())
    }

    /// Runs `fut` under the configured completion timeout.
    async fn with_llm_timeout<T, F>(
        &self,
        fut: F,
        on_timeout: impl FnOnce(String) -> AppError,
    ) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.settings.llm_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(format!(
                "completion call timed out after {:?}",
                self.settings.llm_timeout
            ))),
        }
    }

    /// Text Extractor + Section Normalizer. Returns the sections and extracted text.
    async fn parse_document(
        &self,
        bytes: Bytes,
        format: DocumentFormat,
    ) -> Result<(CanonicalRecord, String), AppError> {
        let text = extract_text(bytes, format).await?;
        let sections = self
            .with_llm_timeout(
                extract_sections(self.llm.as_ref(), &text, self.settings.parse_max_chars),
                AppError::NormalizationFailed,
            )
            .await?;
        Ok((sections, text))
    }

    /// Extract: file in, canonical record out. Nothing is persisted.
    pub async fn extract(&self, caller: &Caller, upload: Upload) -> Result<CanonicalRecord, AppError> {
        let format = DocumentFormat::detect(&upload.file_name, upload.content_type.as_deref())?;
        self.check_balance(caller).await?;
        let (sections, _) = self.parse_document(upload.bytes, format).await?;
        Ok(sections)
    }

    /// Upload: store the file, create the record, then take it to `parsed`.
    /// A parse or save failure marks the record `error` and is returned to the caller.
    /// If the record cannot be created, the stored file is removed again.
    pub async fn upload(&self, caller: &Caller, upload: Upload) -> Result<AnalysisRecord, AppError> {
        let format = DocumentFormat::detect(&upload.file_name, upload.content_type.as_deref())?;
        self.check_balance(caller).await?;

        let id = Uuid::new_v4();
        let key = upload_key(&caller.uid, id, &upload.file_name);
        let path = self
            .files
            .put(&key, upload.bytes.clone(), format.mime())
            .await?;

        let created = self
            .records
            .create_record(NewRecord {
                id,
                owner_id: caller.uid.clone(),
                file: FileMeta {
                    name: upload.file_name.clone(),
                    path,
                    content_type: format.mime().to_string(),
                    size_bytes: upload.bytes.len() as i64,
                },
            })
            .await;
        if let Err(e) = created {
            if let Err(delete_err) = self.files.delete(&key).await {
                error!("Orphaned upload {key} left behind: {delete_err}");
            }
            return Err(e);
        }
        info!("Resume {id} uploaded by {}", caller.uid);

        let parsed = match self.parse_document(upload.bytes, format).await {
            Ok((sections, text)) => self.records.save_sections(id, &sections, &text).await,
            Err(e) => Err(e),
        };
        if let Err(e) = parsed {
            warn!("Resume {id} could not be parsed: {e}");
            if let Err(mark_err) = self.records.mark_error(id, &e.to_string()).await {
                error!("Could not mark resume {id} as failed: {mark_err}");
            }
            return Err(e);
        }
        info!("Resume {id} parsed");

        self.records
            .get_record(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
    }

    /// Analyze: score a parsed record and persist the result.
    pub async fn analyze(&self, caller: &Caller, id: Uuid) -> Result<AnalyzeOutcome, AppError> {
        let record = self
            .records
            .get_record(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
        if !caller.can_access(&record.owner_id) {
            warn!("{} denied analysis of resume {id}", caller.uid);
            return Err(AppError::Forbidden);
        }
        let sections = record
            .sections
            .clone()
            .ok_or_else(|| AppError::Validation(format!("Resume {id} has not been parsed")))?;
        let targeting = self
            .profiles
            .get_profile(&record.owner_id)
            .await?
            .map(|p| p.targeting)
            .unwrap_or_default();

        let tokens_remaining = if caller.role.is_elevated() {
            None
        } else {
            Some(self.ledger.reserve(&caller.uid).await?)
        };

        let text = record.scoring_text();
        match self.score_and_persist(id, &text, &sections, &targeting).await {
            Ok(score_set) => {
                info!(
                    "Resume {id} analyzed (objective {}, design {}, subjective {}, employer {})",
                    score_set.scores.objective,
                    score_set.scores.design,
                    score_set.scores.subjective,
                    score_set.scores.employer
                );
                Ok(AnalyzeOutcome {
                    score_set,
                    tokens_remaining,
                })
            }
            Err(e) => {
                warn!("Analysis of resume {id} failed: {e}");
                if tokens_remaining.is_some() {
                    self.refund(&caller.uid).await;
                }
                Err(e)
            }
        }
    }

    async fn score_and_persist(
        &self,
        id: Uuid,
        text: &str,
        sections: &CanonicalRecord,
        targeting: &ProfileTargeting,
    ) -> Result<ScoreSet, AppError> {
        let deterministic = score_deterministic(text, sections, &self.settings.weights);
        let judgment = self
            .with_llm_timeout(
                score_judgment(
                    self.llm.as_ref(),
                    text,
                    sections,
                    targeting,
                    &self.settings.budget,
                ),
                AppError::JudgmentFailed,
            )
            .await?;

        let score_set = merge_scores(deterministic, judgment);
        let ai = AiAnalysis {
            score_set: score_set.clone(),
            model: self.llm.model().to_string(),
            updated_at: Utc::now(),
        };
        self.records.save_analysis(id, &ai).await.map_err(|e| {
            if e.is_persistence() {
                e
            } else {
                AppError::PersistenceFailed(e.to_string())
            }
        })?;
        Ok(score_set)
    }

    /// Best-effort refund. A failure here is logged; the caller still sees the original error.
    async fn refund(&self, uid: &str) {
        match self.ledger.refund(uid).await {
            Ok(balance) => info!("Refunded token to {uid} (balance {balance})"),
            Err(e) => error!("Refund for {uid} failed: {e}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::extraction::docx::tests::build_docx;
    use crate::llm_client::testing::{FakeClient, Scripted};
    use crate::models::analysis::RecordStatus;
    use crate::models::user::{Role, UserProfile};
    use crate::store::files::MemoryFileStore;
    use crate::store::memory::MemoryStore;

    pub(crate) const SECTIONS_REPLY: &str = r#"{
        "contact": {"name": "Jane Doe", "email": "jane@example.com"},
        "education": "BSc Computer Science",
        "skills": ["Rust", "SQL"],
        "experience": [{
            "title": "Engineer",
            "company": "Acme",
            "details": ["Built a billing API serving 2M requests", "Led a team of 4", "Wrote docs"]
        }]
    }"#;

    pub(crate) const JUDGMENT_REPLY: &str = r#"{
        "subjectiveScore": 78,
        "employerScore": 64,
        "highlights": ["Quantified impact"],
        "suggestions": ["Add a summary"]
    }"#;

    pub(crate) fn user(uid: &str) -> Caller {
        Caller {
            uid: uid.to_string(),
            role: Role::User,
        }
    }

    pub(crate) fn admin() -> Caller {
        Caller {
            uid: "root".to_string(),
            role: Role::Admin,
        }
    }

    pub(crate) fn docx_upload() -> Upload {
        Upload {
            file_name: "cv.docx".to_string(),
            content_type: None,
            bytes: Bytes::from(build_docx(&[
                "Jane Doe",
                "Experience",
                "Built a billing API serving 2M requests",
                "Education",
                "Skills",
            ])),
        }
    }

    pub(crate) struct Harness {
        pub store: Arc<MemoryStore>,
        pub files: Arc<MemoryFileStore>,
        pub llm: Arc<FakeClient>,
        pub pipeline: Pipeline,
    }

    pub(crate) async fn harness(script: Vec<Scripted>, balances: &[(&str, Option<i64>)]) -> Harness {
        let store = Arc::new(MemoryStore::new());
        for (uid, tokens) in balances {
            let mut profile = UserProfile::new_default(uid, 0);
            profile.parse_tokens = *tokens;
            store.put_profile(profile).await;
        }
        let llm = Arc::new(FakeClient::new(script));
        let files = Arc::new(MemoryFileStore::new());
        let pipeline = Pipeline {
            records: store.clone(),
            profiles: store.clone(),
            ledger: store.clone(),
            files: files.clone(),
            llm: llm.clone(),
            settings: PipelineSettings {
                llm_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        };
        Harness {
            store,
            files,
            llm,
            pipeline,
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum FailOn {
        Create,
        SaveSections,
        SaveAnalysis,
    }

    /// Memory-backed records where one write always fails.
    struct FlakyRecords {
        inner: Arc<MemoryStore>,
        fail_on: FailOn,
    }

    impl FlakyRecords {
        fn wrap(h: &Harness, fail_on: FailOn) -> Pipeline {
            Pipeline {
                records: Arc::new(FlakyRecords {
                    inner: h.store.clone(),
                    fail_on,
                }),
                ..h.pipeline.clone()
            }
        }

        fn check(&self, op: FailOn) -> Result<(), AppError> {
            if self.fail_on == op {
                return Err(AppError::Internal(anyhow::anyhow!("connection reset")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RecordStore for FlakyRecords {
        async fn create_record(&self, new: NewRecord) -> Result<AnalysisRecord, AppError> {
            self.check(FailOn::Create)?;
            self.inner.create_record(new).await
        }

        async fn get_record(&self, id: Uuid) -> Result<Option<AnalysisRecord>, AppError> {
            self.inner.get_record(id).await
        }

        async fn list_records(&self, owner_id: &str) -> Result<Vec<AnalysisRecord>, AppError> {
            self.inner.list_records(owner_id).await
        }

        async fn save_sections(
            &self,
            id: Uuid,
            sections: &CanonicalRecord,
            raw_text: &str,
        ) -> Result<(), AppError> {
            self.check(FailOn::SaveSections)?;
            self.inner.save_sections(id, sections, raw_text).await
        }

        async fn save_analysis(&self, id: Uuid, ai: &AiAnalysis) -> Result<(), AppError> {
            self.check(FailOn::SaveAnalysis)?;
            self.inner.save_analysis(id, ai).await
        }

        async fn mark_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
            self.inner.mark_error(id, message).await
        }
    }

    fn reply(text: &str) -> Scripted {
        Scripted::Reply(text.to_string())
    }

    /// Seeds a parsed record owned by `owner` without going through upload.
    async fn parsed_record(store: &MemoryStore, owner: &str) -> Uuid {
        let record = store
            .create_record(NewRecord {
                id: Uuid::new_v4(),
                owner_id: owner.to_string(),
                file: FileMeta {
                    name: "cv.pdf".to_string(),
                    path: format!("resumes/{owner}/cv.pdf"),
                    content_type: "application/pdf".to_string(),
                    size_bytes: 1,
                },
            })
            .await
            .unwrap();
        let sections = crate::parsing::normalizer::normalize_sections(
            &serde_json::from_str(SECTIONS_REPLY).unwrap(),
        );
        store
            .save_sections(record.id, &sections, "Experience\nEducation\nSkills")
            .await
            .unwrap();
        record.id
    }

    #[tokio::test]
    async fn test_upload_parses_without_spending() {
        let h = harness(vec![reply(SECTIONS_REPLY)], &[("u1", Some(1))]).await;
        let record = h.pipeline.upload(&user("u1"), docx_upload()).await.unwrap();

        assert_eq!(record.status, RecordStatus::Parsed);
        assert_eq!(record.sections.unwrap().skills, vec!["Rust", "SQL"]);
        assert!(record.raw_text.unwrap().contains("billing API"));
        assert!(record.file.path.starts_with("resumes/u1/"));
        assert_eq!(h.files.keys().await, vec![record.file.path.clone()]);
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_upload_normalizer_failure_marks_error() {
        let h = harness(vec![Scripted::Fail], &[("u1", Some(1))]).await;
        let err = h.pipeline.upload(&user("u1"), docx_upload()).await.unwrap_err();
        assert!(matches!(err, AppError::NormalizationFailed(_)));

        let records = h.store.list_records("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RecordStatus::Error);
        assert!(records[0].error_message.is_some());
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_upload_corrupt_file_marks_error() {
        let h = harness(vec![], &[("u1", Some(1))]).await;
        let upload = Upload {
            file_name: "cv.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from_static(b"not really a pdf"),
        };
        let err = h.pipeline.upload(&user("u1"), upload).await.unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed(_)));
        assert_eq!(h.llm.calls(), 0);
        let records = h.store.list_records("u1").await.unwrap();
        assert_eq!(records[0].status, RecordStatus::Error);
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_format_before_storing() {
        let h = harness(vec![], &[("u1", Some(1))]).await;
        let upload = Upload {
            file_name: "cv.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            bytes: Bytes::from_static(b"hello"),
        };
        let err = h.pipeline.upload(&user("u1"), upload).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
        assert!(h.store.list_records("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_balance_rejected_before_model_call() {
        let h = harness(vec![reply(SECTIONS_REPLY)], &[("u1", Some(0))]).await;
        let err = h.pipeline.extract(&user("u1"), docx_upload()).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientTokens));
        assert_eq!(h.llm.calls(), 0);

        // Elevated roles are never metered.
        let sections = h.pipeline.extract(&admin(), docx_upload()).await.unwrap();
        assert_eq!(sections.contact.name.as_deref(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_analyze_spends_one_token() {
        let h = harness(vec![reply(JUDGMENT_REPLY)], &[("u1", Some(2))]).await;
        let id = parsed_record(&h.store, "u1").await;

        let outcome = h.pipeline.analyze(&user("u1"), id).await.unwrap();
        assert_eq!(outcome.tokens_remaining, Some(1));
        assert_eq!(outcome.score_set.scores.subjective, 78);
        assert_eq!(outcome.score_set.scores.employer, 64);
        assert!(outcome.score_set.scores.objective <= 100);

        let record = h.store.get_record(id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Analyzed);
        let ai = record.ai.unwrap();
        assert_eq!(ai.model, "fake-model");
        assert_eq!(ai.score_set, outcome.score_set);
    }

    #[tokio::test]
    async fn test_analyze_foreign_record_is_forbidden_and_free() {
        let h = harness(vec![reply(JUDGMENT_REPLY)], &[("u1", Some(1)), ("u2", Some(1))]).await;
        let id = parsed_record(&h.store, "u1").await;
        let before = h.store.get_record(id).await.unwrap();

        let err = h.pipeline.analyze(&user("u2"), id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(h.store.get_record(id).await.unwrap(), before);
        assert_eq!(h.store.balance("u2").await.unwrap(), Some(1));
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_analyzes_any_record_unmetered() {
        let h = harness(vec![reply(JUDGMENT_REPLY)], &[("u1", Some(0))]).await;
        let id = parsed_record(&h.store, "u1").await;
        let outcome = h.pipeline.analyze(&admin(), id).await.unwrap();
        assert_eq!(outcome.tokens_remaining, None);
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_judgment_failure_refunds_and_keeps_status() {
        let h = harness(vec![Scripted::Fail], &[("u1", Some(1))]).await;
        let id = parsed_record(&h.store, "u1").await;

        let err = h.pipeline.analyze(&user("u1"), id).await.unwrap_err();
        assert!(matches!(err, AppError::JudgmentFailed(_)));
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
        let record = h.store.get_record(id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Parsed);
        assert!(record.ai.is_none());
    }

    #[tokio::test]
    async fn test_judgment_timeout_refunds() {
        let h = harness(vec![Scripted::Hang], &[("u1", Some(1))]).await;
        let id = parsed_record(&h.store, "u1").await;

        let err = h.pipeline.analyze(&user("u1"), id).await.unwrap_err();
        assert!(matches!(err, AppError::JudgmentFailed(_)));
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_persist_failure_refunds_and_keeps_status() {
        let h = harness(vec![reply(JUDGMENT_REPLY)], &[("u1", Some(1))]).await;
        let id = parsed_record(&h.store, "u1").await;
        let pipeline = FlakyRecords::wrap(&h, FailOn::SaveAnalysis);

        let err = pipeline.analyze(&user("u1"), id).await.unwrap_err();
        assert!(matches!(err, AppError::PersistenceFailed(_)));
        assert_eq!(h.llm.calls(), 1);
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
        let record = h.store.get_record(id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Parsed);
        assert!(record.ai.is_none());
    }

    #[tokio::test]
    async fn test_upload_save_failure_marks_error() {
        let h = harness(vec![reply(SECTIONS_REPLY)], &[("u1", Some(1))]).await;
        let pipeline = FlakyRecords::wrap(&h, FailOn::SaveSections);

        let err = pipeline.upload(&user("u1"), docx_upload()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        let records = h.store.list_records("u1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RecordStatus::Error);
        assert!(records[0].sections.is_none());
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_upload_create_failure_removes_stored_file() {
        let h = harness(vec![reply(SECTIONS_REPLY)], &[("u1", Some(1))]).await;
        let pipeline = FlakyRecords::wrap(&h, FailOn::Create);

        pipeline.upload(&user("u1"), docx_upload()).await.unwrap_err();
        assert!(h.files.keys().await.is_empty());
        assert!(h.store.list_records("u1").await.unwrap().is_empty());
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_judgment_still_analyzes() {
        let h = harness(vec![reply("not json at all")], &[("u1", Some(1))]).await;
        let id = parsed_record(&h.store, "u1").await;
        let outcome = h.pipeline.analyze(&user("u1"), id).await.unwrap();
        assert_eq!(outcome.score_set.scores.subjective, 70);
        assert_eq!(outcome.score_set.scores.employer, 70);
        assert_eq!(outcome.tokens_remaining, Some(0));
    }

    #[tokio::test]
    async fn test_insufficient_tokens_blocks_analysis() {
        let h = harness(vec![reply(JUDGMENT_REPLY)], &[("u1", Some(0))]).await;
        let id = parsed_record(&h.store, "u1").await;
        let err = h.pipeline.analyze(&user("u1"), id).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientTokens));
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_unparsed_record_is_rejected() {
        let h = harness(vec![], &[("u1", Some(1))]).await;
        let record = h
            .store
            .create_record(NewRecord {
                id: Uuid::new_v4(),
                owner_id: "u1".to_string(),
                file: FileMeta {
                    name: "cv.pdf".to_string(),
                    path: "resumes/u1/cv.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    size_bytes: 1,
                },
            })
            .await
            .unwrap();
        let err = h.pipeline.analyze(&user("u1"), record.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.balance("u1").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let h = harness(vec![], &[("u1", Some(1))]).await;
        let err = h.pipeline.analyze(&user("u1"), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
