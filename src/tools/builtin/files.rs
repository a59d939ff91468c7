//! download_file / read_file tools - task attachments

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::documents::{self, DocumentKind};
use super::{status_failure, str_arg, truncate_chars};

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "jsonl", "xml", "html", "htm", "log", "py", "rs", "js", "yaml", "yml", "toml",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Download the file attached to a task from the scoring API
pub struct DownloadFileTool {
    client: reqwest::Client,
    api_url: String,
    download_dir: PathBuf,
}

impl DownloadFileTool {
    pub fn new(client: reqwest::Client, config: &ToolsConfig) -> Self {
        Self {
            client,
            api_url: config.scoring_api_url.trim_end_matches('/').to_string(),
            download_dir: config.download_dir(),
        }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "download_file",
            ToolCategory::Files,
            "Download the file associated with a task using its task_id. Returns the local \
             path of the downloaded file; use read_file afterwards to read it.",
        )
        .with_param(ParamSpec::required("task_id", ParamKind::String, "The task ID"))
    }
}

#[async_trait]
impl ToolHandler for DownloadFileTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let task_id = str_arg(&arguments, "task_id")?.trim();
        if task_id.is_empty() || task_id.contains(['/', '\\']) {
            return Err(ToolFailure::invalid_arguments(format!("invalid task_id '{}'", task_id)));
        }

        let url = format!("{}/files/{}", self.api_url, task_id);
        debug!("Downloading file for task: {}", task_id);

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(format!("No file found for task {}", task_id));
        }
        if !response.status().is_success() {
            return Err(status_failure("Scoring API", response).await);
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|h| h.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| task_id.to_string());

        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| ToolFailure::internal(format!("Failed to create download directory: {}", e)))?;

        let path = self.download_dir.join(filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ToolFailure::internal(format!("Failed to write {}: {}", path.display(), e)))?;

        info!("File downloaded to: {}", path.display());
        Ok(path.display().to_string())
    }
}

/// File name from a Content-Disposition header, reduced to its last
/// path component
fn filename_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let raw = rest.split(';').next()?.trim().trim_matches('"');
    let name = Path::new(raw).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Read text content from a local file, extracting it from documents
pub struct ReadFileTool {
    max_chars: usize,
}

impl ReadFileTool {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "read_file",
            ToolCategory::Files,
            "Read and extract the text content of a local file. Supports TXT, JSON, XML, HTML, \
             Markdown and source code, PDF, Word (DOCX), Excel (XLSX/XLS/ODS, one table per \
             sheet) and CSV/TSV (as a table). For images, returns basic information. Use this \
             after download_file.",
        )
        .with_param(ParamSpec::required("file_path", ParamKind::String, "Path to the file to read"))
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let file_path = str_arg(&arguments, "file_path")?;
        let path = Path::new(file_path);

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(ToolFailure::invalid_arguments(format!("Not a file: {}", file_path))),
            Err(_) => return Err(ToolFailure::invalid_arguments(format!("File not found: {}", file_path))),
        };

        debug!("Reading file: {}", file_path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or(file_path);
            return Ok(format!(
                "Image: {}\nFormat: {}\nFile size: {:.2} KB",
                name,
                extension.to_uppercase(),
                metadata.len() as f64 / 1024.0
            ));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ToolFailure::internal(format!("Failed to read file: {}", e)))?;

        if let Some(kind) = DocumentKind::from_extension(&extension) {
            let text = extract_document(kind, path, bytes).await?;
            if text.trim().is_empty() {
                return Ok(format!("No text could be extracted from {}", file_path));
            }
            return Ok(truncate_chars(&text, self.max_chars));
        }

        let content = if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            String::from_utf8(bytes).map_err(|_| {
                ToolFailure::invalid_arguments(format!("Unsupported file type: .{}", extension))
            })?
        };

        Ok(truncate_chars(&content, self.max_chars))
    }
}

/// Extract text with the format's extractor. The binary formats run on the
/// blocking pool; a crashing extractor is reported like a parse error.
async fn extract_document(kind: DocumentKind, path: &Path, bytes: Vec<u8>) -> Result<String, ToolFailure> {
    let path = path.to_path_buf();
    let extracted = match kind {
        DocumentKind::Delimited(delimiter) => {
            return Ok(documents::delimited_text(&bytes, delimiter)
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned()));
        }
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || documents::pdf_text(&bytes)).await,
        DocumentKind::Docx => tokio::task::spawn_blocking(move || documents::docx_text(&bytes)).await,
        DocumentKind::Spreadsheet => tokio::task::spawn_blocking(move || documents::spreadsheet_text(&path)).await,
    };

    match extracted {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(message)) => Err(ToolFailure::invalid_arguments(message)),
        Err(e) => {
            warn!("{:?} extraction crashed: {}", kind, e);
            Err(ToolFailure::invalid_arguments(format!("Could not extract text from {:?} file", kind)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolFailureKind;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn args(path: &Path) -> Map<String, Value> {
        json!({ "file_path": path.to_str().unwrap() }).as_object().unwrap().clone()
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"data.xlsx\""),
            Some("data.xlsx".to_string())
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=notes.txt; size=3"),
            Some("notes.txt".to_string())
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"../../etc/passwd\""),
            Some("passwd".to_string())
        );
        assert_eq!(filename_from_disposition("inline"), None);
        assert_eq!(filename_from_disposition("attachment; filename=\"..\""), None);
    }

    #[tokio::test]
    async fn test_read_text_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "line one\nline two").unwrap();

        let out = ReadFileTool::new(10_000).call(args(&path)).await.unwrap();
        assert_eq!(out, "line one\nline two");
    }

    #[tokio::test]
    async fn test_read_truncates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.txt");
        fs::write(&path, "a,b,c\n".repeat(100)).unwrap();

        let out = ReadFileTool::new(10).call(args(&path)).await.unwrap();
        assert_eq!(out, "a,b,c\na,b,...");
    }

    #[tokio::test]
    async fn test_read_csv_as_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sales.csv");
        fs::write(&path, "item,units\nwidget,12\ngadget,7\n").unwrap();

        let out = ReadFileTool::new(10_000).call(args(&path)).await.unwrap();
        assert_eq!(out, "item    units\nwidget  12\ngadget  7");
    }

    #[tokio::test]
    async fn test_read_corrupt_spreadsheet() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.xlsx");
        fs::write(&path, b"not really a workbook").unwrap();

        let err = ReadFileTool::new(100).call(args(&path)).await.unwrap_err();
        assert_eq!(err.kind, ToolFailureKind::InvalidArguments);
    }

    #[tokio::test]
    async fn test_read_corrupt_pdf() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\ngarbage").unwrap();

        // Either a parse error or nothing extracted, never the raw bytes
        match ReadFileTool::new(100).call(args(&path)).await {
            Ok(out) => assert!(out.starts_with("No text could be extracted"), "{}", out),
            Err(err) => assert_eq!(err.kind, ToolFailureKind::InvalidArguments),
        }
    }

    #[tokio::test]
    async fn test_read_legacy_doc_unsupported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("old.doc");
        fs::write(&path, [0xd0u8, 0xcf, 0x11, 0xe0, 0xa1]).unwrap();

        let err = ReadFileTool::new(100).call(args(&path)).await.unwrap_err();
        assert!(err.message.contains("Unsupported file type: .doc"));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = ReadFileTool::new(100)
            .call(args(Path::new("/nonexistent/file.txt")))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolFailureKind::InvalidArguments);
        assert!(err.message.contains("File not found"));
    }

    #[tokio::test]
    async fn test_read_image_returns_info() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chart.png");
        fs::write(&path, [0u8; 2048]).unwrap();

        let out = ReadFileTool::new(100).call(args(&path)).await.unwrap();
        assert!(out.contains("Image: chart.png"));
        assert!(out.contains("2.00 KB"));
    }

    #[tokio::test]
    async fn test_read_binary_unsupported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.bin");
        fs::write(&path, [0xffu8, 0xfe, 0x00, 0x80]).unwrap();

        let err = ReadFileTool::new(100).call(args(&path)).await.unwrap_err();
        assert!(err.message.contains("Unsupported file type: .bin"));
    }

    #[tokio::test]
    async fn test_download_rejects_path_like_task_id() {
        let config = ToolsConfig::default();
        let tool = DownloadFileTool::new(reqwest::Client::new(), &config);
        let args = json!({ "task_id": "../secret" }).as_object().unwrap().clone();
        let err = tool.call(args).await.unwrap_err();
        assert_eq!(err.kind, ToolFailureKind::InvalidArguments);
    }
}
