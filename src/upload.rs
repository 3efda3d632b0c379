//! # Upload Module
//!
//! The announcement-stock helper: scans a data file for line metrics, uploads
//! it to one of two public hosts gated by file size, and reports the result.
//! Each host gets exactly one retry; a double failure is embedded into the
//! report text rather than aborting the operation.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default size threshold routing uploads between the two hosts
pub const DEFAULT_THRESHOLD_MB: f64 = 200.0;
/// Gofile upload endpoint (high-size host)
pub const GOFILE_ENDPOINT: &str = "https://upload.gofile.io/uploadfile";
/// Catbox upload endpoint (low-size host)
pub const CATBOX_ENDPOINT: &str = "https://catbox.moe/user/api.php";

/// Lines are counted as valid entries when they carry the field delimiter
/// and are not flagged with the skip sentinel.
const ENTRY_DELIMITER: char = ':';
const SKIP_SENTINEL: &str = "[NOT_SAVED]";

/// Derived metrics for an upload candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetrics {
    pub filename: String,
    pub total_lines: u64,
    pub valid_entries: u64,
    pub size_bytes: u64,
}

impl FileMetrics {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Outcome of an upload attempt pair against a single host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub host: String,
    pub url: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Which host a file routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Catbox,
    Gofile,
}

/// Files at or below the threshold go to the low-size host
pub fn host_for_size(size_bytes: u64, threshold_mb: f64) -> HostKind {
    let size_mb = size_bytes as f64 / (1024.0 * 1024.0);
    if size_mb <= threshold_mb {
        HostKind::Catbox
    } else {
        HostKind::Gofile
    }
}

/// Scan a file for its line metrics.
///
/// Lines are read as raw bytes and decoded lossily so a stray non-UTF-8 byte
/// never aborts the scan.
pub fn scan_file(path: &Path) -> Result<FileMetrics> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
    let size_bytes = std::fs::metadata(path)
        .with_context(|| format!("File not found: {}", path.display()))?
        .len();

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut total_lines = 0u64;
    let mut valid_entries = 0u64;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .context("Failed to read upload candidate")?;
        if read == 0 {
            break;
        }
        total_lines += 1;
        let line = String::from_utf8_lossy(&buf);
        if line.contains(ENTRY_DELIMITER) && !line.contains(SKIP_SENTINEL) {
            valid_entries += 1;
        }
    }

    Ok(FileMetrics {
        filename,
        total_lines,
        valid_entries,
        size_bytes,
    })
}

/// A public upload host: one attempt in, a download URL out
#[async_trait]
pub trait UploadHost: Send + Sync {
    fn name(&self) -> &'static str;
    async fn upload_once(&self, path: &Path) -> Result<String>;
}

/// Low-size host: plain multipart form, responds with the URL as text
pub struct CatboxHost {
    client: reqwest::Client,
    endpoint: String,
    userhash: Option<String>,
}

impl CatboxHost {
    pub fn new(userhash: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: CATBOX_ENDPOINT.to_string(),
            userhash,
        }
    }
}

#[async_trait]
impl UploadHost for CatboxHost {
    fn name(&self) -> &'static str {
        "Catbox"
    }

    async fn upload_once(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());

        let mut form = reqwest::multipart::Form::new().text("reqtype", "fileupload");
        if let Some(userhash) = &self.userhash {
            form = form.text("userhash", userhash.clone());
        }
        form = form.part(
            "fileToUpload",
            reqwest::multipart::Part::bytes(bytes).file_name(filename),
        );

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            bail!("Catbox upload failed: {status} {body}");
        }
        if !body.trim().starts_with("http") {
            bail!("Catbox upload failed: {body}");
        }
        Ok(body.trim().to_string())
    }
}

/// High-size host: multipart upload with a JSON envelope around the URL
pub struct GofileHost {
    client: reqwest::Client,
    endpoint: String,
}

impl GofileHost {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: GOFILE_ENDPOINT.to_string(),
        }
    }
}

impl Default for GofileHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadHost for GofileHost {
    fn name(&self) -> &'static str {
        "Gofile"
    }

    async fn upload_once(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename),
        );

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gofile upload failed: {status} {body}");
        }

        let payload: serde_json::Value = response.json().await?;
        if payload.get("status").and_then(|s| s.as_str()) != Some("ok") {
            bail!("Gofile upload failed: {payload}");
        }

        let data = payload.get("data").cloned().unwrap_or_default();
        let url = ["downloadPage", "downloadUrl", "directLink"]
            .iter()
            .find_map(|key| data.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .or_else(|| {
                data.get("fileId")
                    .and_then(|v| v.as_str())
                    .map(|id| format!("https://gofile.io/d/{id}"))
            });

        url.ok_or_else(|| anyhow!("Gofile response missing download URL"))
    }
}

/// One upload attempt pair: the first failure is retried exactly once, a
/// second failure is folded into the result text.
pub async fn upload_with_retry(host: &dyn UploadHost, path: &Path) -> UploadResult {
    match host.upload_once(path).await {
        Ok(url) => UploadResult {
            host: host.name().to_string(),
            url,
            success: true,
            error: None,
        },
        Err(e) => {
            warn!("{} upload failed, retrying: {e}", host.name());
            match host.upload_once(path).await {
                Ok(url) => UploadResult {
                    host: host.name().to_string(),
                    url,
                    success: true,
                    error: None,
                },
                Err(retry_err) => {
                    let error_text = retry_err.to_string().replace('\n', " ").trim().to_string();
                    UploadResult {
                        host: host.name().to_string(),
                        url: format!("Upload failed: {error_text}"),
                        success: false,
                        error: Some(error_text),
                    }
                }
            }
        }
    }
}

/// Size-gated router over the two public hosts
pub struct Uploader {
    threshold_mb: f64,
    catbox: CatboxHost,
    gofile: GofileHost,
}

impl Uploader {
    pub fn new(threshold_mb: f64, catbox_userhash: Option<String>) -> Self {
        Self {
            threshold_mb,
            catbox: CatboxHost::new(catbox_userhash),
            gofile: GofileHost::new(),
        }
    }

    pub async fn upload(&self, path: &Path, size_bytes: u64) -> UploadResult {
        match host_for_size(size_bytes, self.threshold_mb) {
            HostKind::Catbox => upload_with_retry(&self.catbox, path).await,
            HostKind::Gofile => upload_with_retry(&self.gofile, path).await,
        }
    }
}
