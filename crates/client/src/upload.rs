//! Chunked upload of a rewritten course archive to the course-import
//! endpoint, followed by polling until the import settles.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::header::CONTENT_RANGE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::io::AsyncReadExt;

use crate::error::ClientError;
use crate::http::{authorized, ensure_success, parse_response};

/// Default upload chunk size (20 MiB).
pub const DEFAULT_CHUNK_BYTES: u64 = 20 * 1024 * 1024;

/// Default delay between import status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Multipart field carrying the archive bytes.
const UPLOAD_FIELD: &str = "course-data";

/// Import status code signalling a finished import.
const STATUS_COMPLETE: i64 = 4;

/// Progress of a course import, decoded from its numeric status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    /// Still working; the code names the current stage
    /// (1 unpacking, 2 verifying, 3 updating).
    InProgress(i64),
    Complete,
    /// Failed; the absolute value of the code names the failing stage.
    Failed(i64),
}

impl ImportStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            STATUS_COMPLETE => Self::Complete,
            c if c < 0 => Self::Failed(-c),
            c => Self::InProgress(c),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress(_))
    }
}

/// Body of the import status endpoint.
#[derive(Debug, Deserialize)]
pub struct ImportStatusResponse {
    #[serde(rename = "ImportStatus")]
    pub import_status: i64,
}

/// `Content-Range` value for a chunk of `len` bytes at `start`.
pub fn content_range(start: u64, len: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", start, start + len - 1, total)
}

/// `(start, len)` of each chunk covering `total` bytes.
pub fn chunk_spans(total: u64, chunk_bytes: u64) -> impl Iterator<Item = (u64, u64)> {
    let chunk_bytes = chunk_bytes.max(1);
    (0..total)
        .step_by(chunk_bytes as usize)
        .map(move |start| (start, chunk_bytes.min(total - start)))
}

/// Call `fetch` every `interval` until it reports a terminal status.
///
/// There is no overall timeout; interrupting the process is the way out.
pub async fn poll_import<F, Fut>(interval: Duration, mut fetch: F) -> Result<(), ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i64, ClientError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match ImportStatus::from_code(fetch().await?) {
            ImportStatus::Complete => {
                tracing::info!(attempt, "Course import complete");
                return Ok(());
            }
            ImportStatus::Failed(stage) => {
                return Err(ClientError::UploadFailed { stage });
            }
            ImportStatus::InProgress(stage) => {
                tracing::debug!(
                    attempt,
                    stage,
                    delay_ms = interval.as_millis() as u64,
                    "Course import in progress",
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// HTTP client for the course-import endpoint of the authoring site.
pub struct StudioApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    chunk_bytes: u64,
    poll_interval: Duration,
}

impl StudioApi {
    /// Create a client with default chunking and polling.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://studio:8001`.
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: u64) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn import_url(&self, course_id: &str) -> String {
        format!("{}/import/{}", self.base_url, course_id)
    }

    pub fn status_url(&self, course_id: &str, file_name: &str) -> String {
        format!("{}/import_status/{}/{}", self.base_url, course_id, file_name)
    }

    /// Upload an archive for `course_id` and wait for the import to finish.
    pub async fn import_course(&self, course_id: &str, archive: &Path) -> Result<(), ClientError> {
        let file_name = archive
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "course.tar.gz".to_string());
        let file_name = file_name.as_str();
        self.upload_archive(course_id, archive, file_name).await?;
        poll_import(self.poll_interval, move || self.import_status(course_id, file_name)).await
    }

    /// Send the archive in `Content-Range` chunks, holding one chunk in
    /// memory at a time.
    pub async fn upload_archive(
        &self,
        course_id: &str,
        archive: &Path,
        file_name: &str,
    ) -> Result<(), ClientError> {
        let total = tokio::fs::metadata(archive).await?.len();
        if total == 0 {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "archive is empty",
            )));
        }
        let mut file = tokio::fs::File::open(archive).await?;
        let url = self.import_url(course_id);

        for (start, len) in chunk_spans(total, self.chunk_bytes) {
            let mut chunk = vec![0u8; len as usize];
            file.read_exact(&mut chunk).await?;

            let part = Part::bytes(chunk)
                .file_name(file_name.to_string())
                .mime_str("application/gzip")?;
            let form = Form::new().part(UPLOAD_FIELD, part);
            let builder = self
                .client
                .post(&url)
                .header(CONTENT_RANGE, content_range(start, len, total))
                .multipart(form);
            let response = authorized(builder, self.token.as_deref()).send().await?;
            ensure_success(response).await?;

            tracing::debug!(course_id, start, len, total, "Uploaded archive chunk");
        }
        tracing::info!(course_id, bytes = total, "Uploaded course archive");
        Ok(())
    }

    /// Current import status code for an uploaded archive.
    pub async fn import_status(&self, course_id: &str, file_name: &str) -> Result<i64, ClientError> {
        let builder = self.client.get(self.status_url(course_id, file_name));
        let response = authorized(builder, self.token.as_deref()).send().await?;
        let body: ImportStatusResponse = parse_response(response).await?;
        Ok(body.import_status)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn status_codes_decode() {
        assert_eq!(ImportStatus::from_code(1), ImportStatus::InProgress(1));
        assert_eq!(ImportStatus::from_code(3), ImportStatus::InProgress(3));
        assert_eq!(ImportStatus::from_code(4), ImportStatus::Complete);
        assert_eq!(ImportStatus::from_code(-2), ImportStatus::Failed(2));
        assert!(ImportStatus::Complete.is_terminal());
        assert!(!ImportStatus::InProgress(0).is_terminal());
    }

    #[test]
    fn status_body_parses() {
        let body: ImportStatusResponse = serde_json::from_str(r#"{"ImportStatus": -3}"#).unwrap();
        assert_eq!(body.import_status, -3);
    }

    #[test]
    fn chunks_cover_the_whole_file() {
        let spans: Vec<_> = chunk_spans(250, 100).collect();
        assert_eq!(spans, vec![(0, 100), (100, 100), (200, 50)]);
        assert_eq!(content_range(200, 50, 250), "bytes 200-249/250");
        assert_eq!(chunk_spans(100, 100).count(), 1);
        assert_eq!(chunk_spans(0, 100).count(), 0);
    }

    #[test]
    fn urls_embed_course_and_file() {
        let api = StudioApi::new("http://studio:8001/".to_string(), None);
        assert_eq!(
            api.import_url("course-v1:Org+C+1"),
            "http://studio:8001/import/course-v1:Org+C+1"
        );
        assert_eq!(
            api.status_url("course-v1:Org+C+1", "c.tar.gz"),
            "http://studio:8001/import_status/course-v1:Org+C+1/c.tar.gz"
        );
    }

    fn scripted(codes: &[i64]) -> Mutex<VecDeque<i64>> {
        Mutex::new(codes.iter().copied().collect())
    }

    #[tokio::test]
    async fn polling_stops_on_completion() {
        let codes = scripted(&[1, 2, 3, 4, 4]);
        let result = poll_import(Duration::ZERO, || {
            let next = codes.lock().unwrap().pop_front();
            async move { Ok(next.unwrap_or(0)) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(codes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn polling_reports_failed_stage() {
        let codes = scripted(&[1, -2]);
        let result = poll_import(Duration::ZERO, || {
            let next = codes.lock().unwrap().pop_front();
            async move { Ok(next.unwrap_or(0)) }
        })
        .await;
        assert_matches!(result, Err(ClientError::UploadFailed { stage: 2 }));
    }

    #[tokio::test]
    async fn polling_propagates_fetch_errors() {
        let result = poll_import(Duration::ZERO, || async {
            Err(ClientError::Permissions { status: 401 })
        })
        .await;
        assert_matches!(result, Err(ClientError::Permissions { status: 401 }));
    }

    #[tokio::test]
    async fn empty_archive_is_refused_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tar.gz");
        std::fs::write(&path, b"").unwrap();
        let api = StudioApi::new("http://127.0.0.1:9".to_string(), None);
        assert_matches!(
            api.upload_archive("Org/C/1", &path, "empty.tar.gz").await,
            Err(ClientError::Io(_))
        );
    }
}
