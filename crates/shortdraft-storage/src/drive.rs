//! Google Drive v3 REST client.
//!
//! Implements `RemoteStore` over the Drive files API with:
//! - Service-account auth through a cached token source
//! - One token refresh and resend on 401
//! - Paged listing
//! - Streaming downloads
//! - Resumable uploads sent in fixed-size chunks read from disk

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gcp_auth::CustomServiceAccount;
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use shortdraft_models::WorkItem;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, info_span, Instrument};

use crate::error::{parse_retry_after, StorageError, StorageResult};
use crate::store::{RemoteEntry, RemoteStore, FOLDER_MIME_TYPE};
use crate::token_cache::{AccessTokenSource, TokenCache};

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,size)";
const UPLOAD_FIELDS: &str = "id,name,webViewLink";

/// Resumable chunks must be multiples of 256 KiB.
const CHUNK_ALIGNMENT: usize = 256 * 1024;
const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

// =============================================================================
// Configuration
// =============================================================================

/// Drive client configuration.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Service account JSON key file
    pub service_account_path: PathBuf,
    /// Files API base URL
    pub api_base: String,
    /// Upload API base URL
    pub upload_base: String,
    /// Per-request timeout; one upload chunk is one request
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Bytes per resumable upload request, rounded down to 256 KiB
    pub upload_chunk_size: usize,
}

impl DriveConfig {
    pub fn new(service_account_path: impl Into<PathBuf>) -> Self {
        Self {
            service_account_path: service_account_path.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            upload_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    /// Drive reports sizes as decimal strings
    size: Option<String>,
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

impl From<DriveFile> for RemoteEntry {
    fn from(file: DriveFile) -> Self {
        let size = file.size.as_deref().and_then(|s| s.parse().ok());
        RemoteEntry::new(file.id, file.name, file.mime_type, size)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Google Drive REST client.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
    tokens: Arc<dyn AccessTokenSource>,
}

impl DriveClient {
    /// Create a client authenticated with the configured service account.
    pub fn new(config: DriveConfig) -> StorageResult<Self> {
        let service_account = CustomServiceAccount::from_file(&config.service_account_path)
            .map_err(|e| {
                StorageError::config_error(format!(
                    "Failed to load service account {}: {}",
                    config.service_account_path.display(),
                    e
                ))
            })?;

        let tokens: Arc<dyn AccessTokenSource> = Arc::new(TokenCache::new(Arc::new(service_account)));
        Self::with_token_source(config, tokens)
    }

    /// Create a client with an explicit token source.
    pub fn with_token_source(config: DriveConfig, tokens: Arc<dyn AccessTokenSource>) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            // Resumable uploads answer 308 for "send more"; never follow it
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("shortdraft-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Network)?;

        Ok(Self { http, config, tokens })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.config.api_base)
    }

    /// Send a request with a bearer token, refreshing once on 401.
    async fn send_authorized<F>(&self, operation: &str, build: F) -> StorageResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.access_token().await?;
        let mut response = build(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(operation = %operation, "Drive rejected token, refreshing");
            self.tokens.invalidate().await;
            let token = self.tokens.access_token().await?;
            response = build(&token).send().await?;
        }

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::handle_error_response(operation, response).await)
        }
    }

    async fn handle_error_response(operation: &str, response: Response) -> StorageError {
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        StorageError::from_drive_response(status, operation, &body, retry_after)
    }

    async fn execute_request<T, F>(&self, operation: &str, resource: &str, fut: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        let span = info_span!("drive_request", operation = %operation, resource = %resource);
        fut.instrument(span).await
    }

    /// Find a child folder by exact name.
    pub async fn find_folder(&self, parent: &str, name: &str) -> StorageResult<Option<String>> {
        let query = format!(
            "'{}' in parents and name = '{}' and mimeType = '{}' and trashed = false",
            escape_query(parent),
            escape_query(name),
            FOLDER_MIME_TYPE
        );
        let url = self.files_url();

        self.execute_request("find_folder", name, async {
            let response = self
                .send_authorized("find_folder", |token| {
                    self.http.get(&url).bearer_auth(token).query(&[
                        ("q", query.as_str()),
                        ("fields", "files(id,name)"),
                        ("pageSize", "10"),
                        ("supportsAllDrives", "true"),
                        ("includeItemsFromAllDrives", "true"),
                    ])
                })
                .await?;
            let list: FileList = response.json().await?;
            Ok(list.files.into_iter().next().map(|f| f.id))
        })
        .await
    }

    /// Open a resumable upload session, returning its URI.
    async fn start_upload_session(&self, name: &str, parent: &str, mime: &str, total: u64) -> StorageResult<String> {
        let url = format!("{}/files", self.config.upload_base);
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent],
        });
        let total = total.to_string();

        let response = self
            .send_authorized("upload_session", |token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .query(&[
                        ("uploadType", "resumable"),
                        ("supportsAllDrives", "true"),
                        ("fields", UPLOAD_FIELDS),
                    ])
                    .header("X-Upload-Content-Type", mime)
                    .header("X-Upload-Content-Length", total.as_str())
                    .json(&metadata)
            })
            .await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| StorageError::invalid_response("upload session has no Location header"))
    }

    /// PUT the file to `session` one chunk at a time until Drive returns
    /// the created file. Only one chunk is held in memory.
    async fn send_chunks(
        &self,
        session: &str,
        file: &mut tokio::fs::File,
        total: u64,
        name: &str,
    ) -> StorageResult<DriveFile> {
        let chunk_size = aligned_chunk_size(self.config.upload_chunk_size) as u64;
        let mut offset = 0u64;

        loop {
            let len = chunk_size.min(total - offset);
            let mut chunk = vec![0u8; len as usize];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk).await?;

            let token = self.tokens.access_token().await?;
            let response = self
                .http
                .put(session)
                .bearer_auth(&token)
                .header(CONTENT_RANGE, content_range(offset, len, total))
                .body(chunk)
                .send()
                .await?;

            match response.status().as_u16() {
                200 | 201 => return Ok(response.json().await?),
                308 => {
                    let next = acknowledged_bytes(response.headers().get(RANGE).and_then(|v| v.to_str().ok()));
                    if next <= offset || next > total {
                        return Err(StorageError::upload_failed(format!(
                            "{}: Drive acknowledged {} of {} bytes after offset {}",
                            name, next, total, offset
                        )));
                    }
                    debug!(file = %name, sent = next, total, "Upload chunk accepted");
                    offset = next;
                }
                _ => return Err(Self::handle_error_response("upload", response).await),
            }
        }
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list(&self, container: &str) -> StorageResult<Vec<RemoteEntry>> {
        let query = format!("'{}' in parents and trashed = false", escape_query(container));
        let url = self.files_url();

        self.execute_request("list", container, async {
            let mut entries = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let response = self
                    .send_authorized("list", |token| {
                        let mut req = self.http.get(&url).bearer_auth(token).query(&[
                            ("q", query.as_str()),
                            ("fields", LIST_FIELDS),
                            ("pageSize", "1000"),
                            ("supportsAllDrives", "true"),
                            ("includeItemsFromAllDrives", "true"),
                        ]);
                        if let Some(page) = page_token.as_deref() {
                            req = req.query(&[("pageToken", page)]);
                        }
                        req
                    })
                    .await?;

                let page: FileList = response.json().await?;
                entries.extend(page.files.into_iter().map(RemoteEntry::from));

                match page.next_page_token {
                    Some(next) if !next.is_empty() => page_token = Some(next),
                    _ => break,
                }
            }

            debug!(container = %container, count = entries.len(), "Listed Drive folder");
            Ok(entries)
        })
        .await
    }

    async fn download(&self, item: &WorkItem, dir: &Path) -> StorageResult<PathBuf> {
        let url = format!("{}/{}", self.files_url(), item.remote_id);
        let target = dir.join(local_file_name(&item.display_name));

        self.execute_request("download", &item.display_name, async {
            let response = self
                .send_authorized("download", |token| {
                    self.http
                        .get(&url)
                        .bearer_auth(token)
                        .query(&[("alt", "media"), ("supportsAllDrives", "true")])
                })
                .await?;

            let mut file = tokio::fs::File::create(&target).await?;
            let mut stream = response.bytes_stream();
            let mut written: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| {
                    StorageError::download_failed(format!("{}: {}", item.display_name, e))
                })?;
                written += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            info!(
                file = %item.display_name,
                bytes = written,
                path = %target.display(),
                "Downloaded file from Drive"
            );
            Ok(target.clone())
        })
        .await
    }

    async fn upload(&self, local_path: &Path, container: &str) -> StorageResult<String> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StorageError::upload_failed(format!("not a file path: {}", local_path.display()))
            })?;

        self.execute_request("upload", &name, async {
            let mut file = tokio::fs::File::open(local_path).await?;
            let total = file.metadata().await?.len();
            let mime = mime_for_path(local_path);

            let session = self.start_upload_session(&name, container, mime, total).await?;
            let uploaded = self.send_chunks(&session, &mut file, total, &name).await?;
            let link = uploaded
                .web_view_link
                .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", uploaded.id));

            info!(file = %name, bytes = total, "Uploaded file to Drive");
            Ok(link)
        })
        .await
    }

    async fn exists(&self, container: &str, name: &str) -> StorageResult<bool> {
        Ok(self.find_folder(container, name).await?.is_some())
    }

    async fn create_container(&self, parent: &str, name: &str) -> StorageResult<String> {
        if let Some(id) = self.find_folder(parent, name).await? {
            info!(folder = %name, id = %id, "Reusing existing Drive folder");
            return Ok(id);
        }

        let url = self.files_url();
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent],
        });

        self.execute_request("create_folder", name, async {
            let response = self
                .send_authorized("create_folder", |token| {
                    self.http
                        .post(&url)
                        .bearer_auth(token)
                        .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                        .json(&metadata)
                })
                .await?;

            let file: DriveFile = response.json().await?;
            if file.id.is_empty() {
                return Err(StorageError::invalid_response("created folder has no id"));
            }
            info!(folder = %name, id = %file.id, "Created Drive folder");
            Ok(file.id)
        })
        .await
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn local_file_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" => "text/markdown",
        "srt" => "application/x-subrip",
        "json" => "application/json",
        "txt" | "claim" => "text/plain",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

fn aligned_chunk_size(requested: usize) -> usize {
    (requested / CHUNK_ALIGNMENT).max(1) * CHUNK_ALIGNMENT
}

fn content_range(offset: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

/// Bytes Drive holds according to a `Range: bytes=0-N` header; none when absent.
fn acknowledged_bytes(range: Option<&str>) -> u64 {
    range
        .and_then(|r| r.trim().strip_prefix("bytes=0-"))
        .and_then(|end| end.parse::<u64>().ok())
        .map_or(0, |end| end + 1)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Hands out "stale" until invalidated, then "fresh".
    struct RotatingToken {
        invalidations: AtomicU32,
    }

    impl RotatingToken {
        fn new() -> Self {
            Self {
                invalidations: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AccessTokenSource for RotatingToken {
        async fn access_token(&self) -> StorageResult<String> {
            if self.invalidations.load(Ordering::SeqCst) == 0 {
                Ok("stale".to_string())
            } else {
                Ok("fresh".to_string())
            }
        }

        async fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoPageToken;

    impl Match for NoPageToken {
        fn matches(&self, request: &Request) -> bool {
            !request.url.query_pairs().any(|(k, _)| k == "pageToken")
        }
    }

    async fn client_for(server: &MockServer, tokens: Arc<dyn AccessTokenSource>) -> DriveClient {
        let mut config = DriveConfig::new("/unused/sa.json");
        config.api_base = server.uri();
        config.upload_base = format!("{}/upload", server.uri());
        DriveClient::with_token_source(config, tokens).unwrap()
    }

    #[tokio::test]
    async fn test_list_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(NoPageToken)
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nextPageToken": "p2",
                "files": [{"id": "1", "name": "a.mp4", "mimeType": "video/mp4", "size": "42"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "2", "name": "b", "mimeType": FOLDER_MIME_TYPE}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        let entries = client.list("root-id").await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].size, Some(42));
        assert!(entries[1].is_folder());
        assert_eq!(entries[1].size, None);
    }

    #[tokio::test]
    async fn test_refreshes_token_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_string("ACCESS_TOKEN_EXPIRED"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})))
            .mount(&server)
            .await;

        let tokens = Arc::new(RotatingToken::new());
        let client = client_for(&server, tokens.clone()).await;

        assert!(client.list("x").await.unwrap().is_empty());
        assert_eq!(tokens.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        let err = client.list("x").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_exists_queries_folder_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(query_param(
                "q",
                "'out' in parents and name = 'talk' and mimeType = 'application/vnd.google-apps.folder' and trashed = false",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "f1", "name": "talk"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        assert!(client.exists("out", "talk").await.unwrap());
        assert!(!client.exists("out", "other").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_container_reuses_existing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"id": "existing", "name": "talk"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "new"})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        assert_eq!(client.create_container("out", "talk").await.unwrap(), "existing");
    }

    #[tokio::test]
    async fn test_create_container_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(body_string_contains(FOLDER_MIME_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "new"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        assert_eq!(client.create_container("out", "talk").await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/vid1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        let item = WorkItem::new("vid1", "talk.mp4", Some(11));

        let local = client.download(&item, dir.path()).await.unwrap();

        assert_eq!(local, dir.path().join("talk.mp4"));
        assert_eq!(std::fs::read(local).unwrap(), b"video-bytes");
    }

    /// Matches requests whose body fits in the given number of bytes.
    struct BodyAtMost(usize);

    impl Match for BodyAtMost {
        fn matches(&self, request: &Request) -> bool {
            request.body.len() <= self.0
        }
    }

    async fn mount_session(server: &MockServer, total: &str) {
        let location = format!("{}/session/s1", server.uri());
        Mock::given(method("POST"))
            .and(path("/upload/files"))
            .and(query_param("uploadType", "resumable"))
            .and(header("x-upload-content-length", total))
            .and(body_string_contains("\"parents\":[\"out\"]"))
            .respond_with(ResponseTemplate::new(200).insert_header("Location", location.as_str()))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_upload_returns_view_link() {
        let server = MockServer::start().await;
        mount_session(&server, "7").await;
        Mock::given(method("PUT"))
            .and(path("/session/s1"))
            .and(header("content-range", "bytes 0-6/7"))
            .and(body_string_contains("# Draft"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "up1",
                "webViewLink": "https://drive.google.com/file/d/up1/view"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("talk_draft.md");
        std::fs::write(&file, "# Draft").unwrap();

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        let link = client.upload(&file, "out").await.unwrap();
        assert_eq!(link, "https://drive.google.com/file/d/up1/view");
    }

    #[tokio::test]
    async fn test_large_upload_is_sent_in_chunks() {
        const CHUNK: usize = 256 * 1024;
        let total = 600 * 1024;

        let server = MockServer::start().await;
        mount_session(&server, "614400").await;
        Mock::given(method("PUT"))
            .and(path("/session/s1"))
            .and(header("content-range", "bytes 0-262143/614400"))
            .and(BodyAtMost(CHUNK))
            .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-262143"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/session/s1"))
            .and(header("content-range", "bytes 262144-524287/614400"))
            .and(BodyAtMost(CHUNK))
            .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-524287"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/session/s1"))
            .and(header("content-range", "bytes 524288-614399/614400"))
            .and(BodyAtMost(CHUNK))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "vid"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("talk.mp4");
        std::fs::write(&file, vec![7u8; total]).unwrap();

        let mut config = DriveConfig::new("/unused/sa.json");
        config.api_base = server.uri();
        config.upload_base = format!("{}/upload", server.uri());
        config.upload_chunk_size = CHUNK;
        let client = DriveClient::with_token_source(config, Arc::new(RotatingToken::new())).unwrap();

        let link = client.upload(&file, "out").await.unwrap();
        assert_eq!(link, "https://drive.google.com/file/d/vid/view");
    }

    #[tokio::test]
    async fn test_upload_resends_from_acknowledged_offset() {
        const CHUNK: usize = 256 * 1024;
        let total = 300 * 1024;

        let server = MockServer::start().await;
        mount_session(&server, "307200").await;
        // Drive kept only the first 100 bytes of the first chunk
        Mock::given(method("PUT"))
            .and(header("content-range", "bytes 0-262143/307200"))
            .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-99"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(header("content-range", "bytes 100-262243/307200"))
            .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-262243"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(header("content-range", "bytes 262244-307199/307200"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "vid"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("talk.mp4");
        std::fs::write(&file, vec![1u8; total]).unwrap();

        let mut config = DriveConfig::new("/unused/sa.json");
        config.api_base = server.uri();
        config.upload_base = format!("{}/upload", server.uri());
        config.upload_chunk_size = CHUNK;
        let client = DriveClient::with_token_source(config, Arc::new(RotatingToken::new())).unwrap();

        client.upload(&file, "out").await.unwrap();
    }

    #[tokio::test]
    async fn test_forbidden_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "User Rate Limit Exceeded",
                    "errors": [{"domain": "usageLimits", "reason": "userRateLimitExceeded"}]
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RotatingToken::new())).await;
        let err = client.list("x").await.unwrap_err();

        assert!(matches!(err, StorageError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_chunk_helpers() {
        assert_eq!(aligned_chunk_size(1), CHUNK_ALIGNMENT);
        assert_eq!(aligned_chunk_size(CHUNK_ALIGNMENT * 3 + 5), CHUNK_ALIGNMENT * 3);
        assert_eq!(content_range(0, 10, 10), "bytes 0-9/10");
        assert_eq!(content_range(0, 0, 0), "bytes */0");
        assert_eq!(acknowledged_bytes(Some("bytes=0-99")), 100);
        assert_eq!(acknowledged_bytes(None), 0);
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("it's"), "it\\'s");
        assert_eq!(escape_query("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.SRT")), "application/x-subrip");
        assert_eq!(mime_for_path(Path::new("a.mov")), "video/quicktime");
        assert_eq!(mime_for_path(Path::new("a")), "application/octet-stream");
    }
}
