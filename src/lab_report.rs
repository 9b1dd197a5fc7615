//! Lab-report analysis: upload a report photo to the analysis service, show
//! the extracted `{test, result}` pairs, optionally save them.
//!
//! The upload is the only remote call with a timeout. On expiry (or any other
//! failure) the upload state moves to `Failed` and the user may retry by
//! hand; nothing is retried automatically.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::Identity;
use crate::config::AppConfig;
use crate::models::{Collection, LabFinding, LabReport};
use crate::store::{DocumentBackend, DocumentId, Record, RecordStore, StoreError};

/// Name used when the picked image has none.
const DEFAULT_UPLOAD_NAME: &str = "medical_report.jpg";

#[derive(Error, Debug)]
pub enum LabReportError {
    #[error("No image selected")]
    EmptyImage,

    #[error("Cannot read image {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("The analysis service did not answer within {secs}s. Please try again")]
    TimedOut { secs: u64 },

    #[error("{message}")]
    Provider { status: u16, message: String },

    #[error("Cannot reach the analysis service: {0}")]
    Transport(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A report photo ready for upload.
#[derive(Debug, Clone)]
pub struct LabImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl LabImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            file_name: if file_name.trim().is_empty() {
                DEFAULT_UPLOAD_NAME.to_string()
            } else {
                file_name
            },
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, LabReportError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| LabReportError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }

    /// Content type from the file extension, JPEG when unknown.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string())
    }
}

/// Analysis seam; the HTTP client in production.
#[async_trait]
pub trait ReportAnalyzer: Send + Sync {
    async fn analyze(&self, image: &LabImage) -> Result<Vec<LabFinding>, LabReportError>;
}

/// Client for `POST {base}/process-report` (multipart field `file`).
pub struct LabReportClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl LabReportClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LabReportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LabReportError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, LabReportError> {
        Self::new(&config.lab_api_url, config.upload_timeout())
    }
}

#[derive(Deserialize)]
struct AnalysisReply {
    results: Option<Vec<LabFinding>>,
}

/// Best-effort message from an error body: `detail`, `message` or `error`,
/// else the raw text.
fn provider_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ReportAnalyzer for LabReportClient {
    async fn analyze(&self, image: &LabImage) -> Result<Vec<LabFinding>, LabReportError> {
        let url = format!("{}/process-report", self.base_url);
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type())
            .map_err(|e| LabReportError::Transport(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!(
            file = %image.file_name,
            size = image.bytes.len(),
            "Uploading lab report"
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LabReportError::TimedOut {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    LabReportError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LabReportError::Provider {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let reply: AnalysisReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LabReportError::TimedOut {
                    secs: self.timeout.as_secs(),
                }
            } else {
                LabReportError::InvalidResponse(e.to_string())
            }
        })?;
        reply
            .results
            .ok_or_else(|| LabReportError::InvalidResponse("missing results".into()))
    }
}

/// Where the current upload stands.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Done(LabReport),
    Failed(String),
}

/// Lab Results screen service: one upload at a time plus the saved history.
pub struct LabResults<B, A> {
    store: RecordStore<B>,
    analyzer: A,
    status: UploadStatus,
}

impl<B: DocumentBackend, A: ReportAnalyzer> LabResults<B, A> {
    pub fn new(store: RecordStore<B>, analyzer: A) -> Self {
        Self {
            store,
            analyzer,
            status: UploadStatus::Idle,
        }
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    /// Back to `Idle`, dropping any result or error.
    pub fn reset(&mut self) {
        self.status = UploadStatus::Idle;
    }

    pub async fn analyze(&mut self, image: LabImage) -> Result<LabReport, LabReportError> {
        if image.bytes.is_empty() {
            return Err(LabReportError::EmptyImage);
        }
        self.status = UploadStatus::Uploading;
        match self.analyzer.analyze(&image).await {
            Ok(findings) => {
                tracing::info!(findings = findings.len(), "Lab report analysed");
                let report = LabReport {
                    findings,
                    source_name: image.file_name,
                    analyzed_at: Utc::now(),
                };
                self.status = UploadStatus::Done(report.clone());
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lab report analysis failed");
                self.status = UploadStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn save(
        &self,
        identity: &Identity,
        report: &LabReport,
    ) -> Result<DocumentId, LabReportError> {
        Ok(self
            .store
            .create(identity, Collection::LabResults, report)
            .await?)
    }

    /// Saved reports, newest first.
    pub async fn history(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Record<LabReport>>, LabReportError> {
        let mut reports: Vec<Record<LabReport>> =
            self.store.list_all(identity, Collection::LabResults).await?;
        reports.sort_by(|a, b| b.value.analyzed_at.cmp(&a.value.analyzed_at));
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::local_store;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn process_report(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
        let mut upload: Option<(String, Vec<u8>)> = None;
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some("file") {
                let name = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.unwrap_or_default();
                upload = Some((name, bytes.to_vec()));
            }
        }
        match upload {
            Some((_, bytes)) if bytes == b"slow" => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                (StatusCode::OK, Json(json!({"results": []})))
            }
            Some((_, bytes)) if bytes == b"blurry" => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": "No text found in image"})),
            ),
            Some((_, bytes)) if bytes == b"odd" => (StatusCode::OK, Json(json!({"data": 1}))),
            Some((name, _)) => (
                StatusCode::OK,
                Json(json!({"results": [
                    {"test": "TRIGLYCERIDES", "result": "935 mg/dl"},
                    {"test": "FILE", "result": name},
                ]})),
            ),
            None => (StatusCode::BAD_REQUEST, Json(json!({"detail": "file missing"}))),
        }
    }

    async fn spawn_service() -> String {
        let app = Router::new().route("/process-report", post(process_report));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn client(timeout: Duration) -> LabReportClient {
        LabReportClient::new(&spawn_service().await, timeout).unwrap()
    }

    #[tokio::test]
    async fn upload_returns_findings() {
        let client = client(Duration::from_secs(5)).await;
        let findings = client
            .analyze(&LabImage::new("report.png", b"pixels".to_vec()))
            .await
            .unwrap();
        assert_eq!(findings[0].test, "TRIGLYCERIDES");
        assert_eq!(findings[0].result, "935 mg/dl");
        assert_eq!(findings[1].result, "report.png");
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let client = client(Duration::from_millis(300)).await;
        let err = client
            .analyze(&LabImage::new("r.jpg", b"slow".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, LabReportError::TimedOut { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn provider_message_is_surfaced() {
        let client = client(Duration::from_secs(5)).await;
        let err = client
            .analyze(&LabImage::new("r.jpg", b"blurry".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No text found in image");
    }

    #[tokio::test]
    async fn missing_results_is_invalid_response() {
        let client = client(Duration::from_secs(5)).await;
        let err = client
            .analyze(&LabImage::new("r.jpg", b"odd".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, LabReportError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn failure_leaves_retryable_state() {
        let (store, _) = local_store();
        let mut lab = LabResults::new(store, client(Duration::from_secs(5)).await);

        let err = lab.analyze(LabImage::new("r.jpg", b"blurry".to_vec())).await.unwrap_err();
        assert!(matches!(err, LabReportError::Provider { status: 422, .. }));
        assert_eq!(lab.status(), &UploadStatus::Failed("No text found in image".into()));

        let report = lab.analyze(LabImage::new("r.jpg", b"clear".to_vec())).await.unwrap();
        assert!(matches!(lab.status(), UploadStatus::Done(r) if *r == report));

        lab.reset();
        assert_eq!(lab.status(), &UploadStatus::Idle);
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_upload() {
        let (store, _) = local_store();
        let mut lab = LabResults::new(store, client(Duration::from_secs(5)).await);
        let err = lab.analyze(LabImage::new("", Vec::new())).await.unwrap_err();
        assert!(matches!(err, LabReportError::EmptyImage));
        assert_eq!(lab.status(), &UploadStatus::Idle);
    }

    #[tokio::test]
    async fn saved_reports_are_listed() {
        let (store, me) = local_store();
        let mut lab = LabResults::new(store, client(Duration::from_secs(5)).await);
        let report = lab.analyze(LabImage::new("a.jpg", b"ok".to_vec())).await.unwrap();
        lab.save(&me, &report).await.unwrap();

        let history = lab.history(&me).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, report);
    }

    #[tokio::test]
    async fn image_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"png-bytes").unwrap();
        let image = LabImage::from_path(&path).await.unwrap();
        assert_eq!(image.file_name, "scan.png");
        assert_eq!(image.mime_type(), "image/png");

        let unnamed = LabImage::new("", vec![1]);
        assert_eq!(unnamed.file_name, "medical_report.jpg");
        assert_eq!(unnamed.mime_type(), "image/jpeg");
    }
}
