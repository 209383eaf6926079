//! Text Extractor: turns an uploaded PDF or DOCX into trimmed plain text.
//!
//! Pure: no state, no retries. Decoding is CPU-bound and some PDF inputs make the
//! decoder panic, so the work runs inside `tokio::task::spawn_blocking` and a panic
//! surfaces as `ExtractionFailed` instead of taking the worker down.

pub(crate) mod docx;

use bytes::Bytes;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::errors::AppError;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Detects the format from the file extension, falling back to the declared MIME type.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Result<Self, AppError> {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => return Ok(DocumentFormat::Pdf),
            "docx" => return Ok(DocumentFormat::Docx),
            _ => {}
        }

        match content_type.map(|c| c.trim().to_ascii_lowercase()) {
            Some(c) if c == PDF_MIME => Ok(DocumentFormat::Pdf),
            Some(c) if c == DOCX_MIME => Ok(DocumentFormat::Docx),
            _ => Err(AppError::UnsupportedFormat(format!(
                "'{file_name}' is not a PDF or DOCX file"
            ))),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => PDF_MIME,
            DocumentFormat::Docx => DOCX_MIME,
        }
    }
}

/// Extracts plain text off the async runtime.
pub async fn extract_text(bytes: Bytes, format: DocumentFormat) -> Result<String, AppError> {
    let joined = tokio::task::spawn_blocking(move || extract_text_sync(&bytes, format)).await;
    join_extraction(joined)
}

/// A decoder panic is the document's fault; a cancelled task is ours.
fn join_extraction(joined: Result<Result<String, AppError>, JoinError>) -> Result<String, AppError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            warn!("Extraction panicked: {e}");
            Err(AppError::ExtractionFailed(
                "The document could not be read".to_string(),
            ))
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context("extraction task was cancelled")
            .into()),
    }
}

/// Synchronous extraction. Empty output is an error: there is nothing to analyze.
pub fn extract_text_sync(bytes: &[u8], format: DocumentFormat) -> Result<String, AppError> {
    let text = match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            warn!("PDF extraction failed: {e}");
            AppError::ExtractionFailed("The PDF could not be read".to_string())
        })?,
        DocumentFormat::Docx => docx::extract_docx_text(bytes).map_err(|e| {
            warn!("DOCX extraction failed: {e:#}");
            AppError::ExtractionFailed("The DOCX could not be read".to_string())
        })?,
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::ExtractionFailed(
            "No text could be extracted from the document".to_string(),
        ));
    }

    debug!("Extracted {} chars from {:?}", text.len(), format);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(
            DocumentFormat::detect("CV.PDF", None).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect("resume.final.docx", Some("application/octet-stream"))
                .unwrap(),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn test_detect_falls_back_to_mime() {
        assert_eq!(
            DocumentFormat::detect("upload", Some(PDF_MIME)).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect("blob.bin", Some(DOCX_MIME)).unwrap(),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn test_detect_rejects_other_formats() {
        let err = DocumentFormat::detect("resume.doc", Some("application/msword")).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
        assert!(matches!(
            DocumentFormat::detect("notes.txt", None),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_extraction_failure() {
        let err = extract_text(Bytes::from_static(b"not a pdf at all"), DocumentFormat::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_docx_round_trip_through_async_wrapper() {
        let bytes = docx::tests::build_docx(&["Jane Doe", "Experience"]);
        let text = extract_text(Bytes::from(bytes), DocumentFormat::Docx)
            .await
            .unwrap();
        assert_eq!(text, "Jane Doe\nExperience");
    }

    #[tokio::test]
    async fn test_decoder_panic_is_extraction_failure() {
        let joined = tokio::task::spawn_blocking(|| -> Result<String, AppError> {
            panic!("decoder blew up")
        })
        .await;
        assert!(matches!(
            join_extraction(joined),
            Err(AppError::ExtractionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_extraction_is_internal() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok::<_, AppError>(String::new())
        });
        handle.abort();
        let err = join_extraction(handle.await).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(err.status_and_code().1, "INTERNAL_ERROR");
    }

    #[test]
    fn test_oversized_docx_is_extraction_failure() {
        let paragraph = "x".repeat(64 * 1024);
        let paragraphs = vec![paragraph.as_str(); 260];
        let bytes = docx::tests::build_docx(&paragraphs);
        assert!(matches!(
            extract_text_sync(&bytes, DocumentFormat::Docx),
            Err(AppError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_empty_docx_is_extraction_failure() {
        let bytes = docx::tests::build_docx(&["   "]);
        assert!(matches!(
            extract_text_sync(&bytes, DocumentFormat::Docx),
            Err(AppError::ExtractionFailed(_))
        ));
    }
}
