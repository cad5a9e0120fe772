use crate::error::IngestError;
use crate::extractor::{extension_format, DocumentExtractor, FormatExtractor};
use crate::models::TextSegment;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Where the knowledge base comes from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn describe(&self) -> String;

    /// Per-file problems land in the report; only source-level failures are errors.
    async fn load(&self) -> Result<IngestionReport, IngestError>;
}

#[async_trait]
impl<T: DocumentSource + ?Sized> DocumentSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn load(&self) -> Result<IngestionReport, IngestError> {
        (**self).load().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingMetadata,
    UnsupportedExport(String),
    UnsupportedContentType(String),
    NoExtractor(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingMetadata => write!(f, "incomplete metadata (missing id, name or content type)"),
            SkipReason::UnsupportedExport(mime) => {
                write!(f, "native type not supported for export: {mime}")
            }
            SkipReason::UnsupportedContentType(mime) => {
                write!(f, "content type not supported for processing: {mime}")
            }
            SkipReason::NoExtractor(extension) => write!(f, "no extractor for extension {extension:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub name: String,
    pub segment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub name: String,
    pub reason: String,
}

/// Outcome of one ingestion pass, file by file.
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub segments: Vec<TextSegment>,
    pub loaded: Vec<LoadedFile>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
}

impl IngestionReport {
    pub fn document_count(&self) -> usize {
        self.segments.len()
    }

    pub fn record_loaded(&mut self, name: &str, segments: Vec<TextSegment>) {
        info!(file = name, parts = segments.len(), "loaded pages/parts");
        self.loaded.push(LoadedFile {
            name: name.to_string(),
            segment_count: segments.len(),
        });
        self.segments.extend(segments);
    }

    pub fn record_skip(&mut self, name: &str, reason: SkipReason) {
        warn!(file = name, %reason, "skipping file");
        self.skipped.push(SkippedFile {
            name: name.to_string(),
            reason,
        });
    }

    pub fn record_failure(&mut self, name: &str, reason: &IngestError) {
        error!(file = name, error = %reason, "failed to process file");
        self.failed.push(FailedFile {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Files under `folder` in a stable order.
pub fn discover_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

/// Reads the knowledge base from a local directory tree.
pub struct LocalFolderSource<X = FormatExtractor> {
    root: PathBuf,
    extractor: X,
}

impl LocalFolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extractor: FormatExtractor,
        }
    }
}

impl<X: DocumentExtractor> LocalFolderSource<X> {
    pub fn with_extractor<Y: DocumentExtractor>(self, extractor: Y) -> LocalFolderSource<Y> {
        LocalFolderSource {
            root: self.root,
            extractor,
        }
    }

    pub fn scan(&self) -> Result<IngestionReport, IngestError> {
        if !self.root.is_dir() {
            return Err(IngestError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("knowledge base folder not found: {}", self.root.display()),
            )));
        }

        let mut report = IngestionReport::default();
        for path in discover_files(&self.root) {
            let name = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .display()
                .to_string();

            let Some(format) = extension_format(&path) else {
                let extension = path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default();
                report.record_skip(&name, SkipReason::NoExtractor(extension));
                continue;
            };

            match self.extractor.extract(&path, format, &name) {
                Ok(segments) => report.record_loaded(&name, segments),
                Err(error) => report.record_failure(&name, &error),
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl<X: DocumentExtractor> DocumentSource for LocalFolderSource<X> {
    fn describe(&self) -> String {
        format!("local folder {}", self.root.display())
    }

    async fn load(&self) -> Result<IngestionReport, IngestError> {
        self.scan()
    }
}
