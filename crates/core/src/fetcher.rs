use crate::drive::{DriveApi, DriveListing};
use crate::error::IngestError;
use crate::extractor::{DocumentExtractor, FormatExtractor};
use crate::ingest::{DocumentSource, IngestionReport, SkipReason};
use crate::models::{DownloadPlan, FileFormat, RemoteFile, TextSegment};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{info, warn};

/// Downloaded bytes on disk, named `<base>-<random>.<ext>`. The file is
/// removed when the artifact is dropped.
pub struct LocalArtifact {
    file: NamedTempFile,
    format: FileFormat,
    source: String,
}

impl LocalArtifact {
    pub fn create_in(dir: &Path, source: &str, format: FileFormat) -> Result<Self, IngestError> {
        let file = Builder::new()
            .prefix(&format!("{}-", temp_base_name(source)))
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(dir)?;

        Ok(Self {
            file,
            format,
            source: source.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn writer(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    pub fn extract<X>(&self, extractor: &X) -> Result<Vec<TextSegment>, IngestError>
    where
        X: DocumentExtractor + ?Sized,
    {
        extractor.extract(self.path(), self.format, &self.source)
    }
}

fn temp_base_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();

    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

/// Lists a Drive folder and turns every supported file into text segments.
pub struct DriveFetcher<D, X = FormatExtractor> {
    drive: D,
    folder_id: String,
    extractor: X,
    temp_dir: PathBuf,
}

impl<D: DriveApi> DriveFetcher<D> {
    pub fn new(drive: D, folder_id: impl Into<String>) -> Self {
        Self {
            drive,
            folder_id: folder_id.into(),
            extractor: FormatExtractor,
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl<D: DriveApi, X: DocumentExtractor> DriveFetcher<D, X> {
    pub fn with_extractor<Y: DocumentExtractor>(self, extractor: Y) -> DriveFetcher<D, Y> {
        DriveFetcher {
            drive: self.drive,
            folder_id: self.folder_id,
            extractor,
            temp_dir: self.temp_dir,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub async fn fetch(&self) -> Result<IngestionReport, IngestError> {
        let listings = self.drive.list_folder(&self.folder_id).await?;
        let mut report = IngestionReport::default();

        if listings.is_empty() {
            warn!(folder_id = %self.folder_id, "no files found in the drive folder");
            return Ok(report);
        }

        for listing in &listings {
            self.process(listing, &mut report).await;
        }

        info!(
            documents = report.document_count(),
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "drive ingestion finished"
        );
        Ok(report)
    }

    async fn process(&self, listing: &DriveListing, report: &mut IngestionReport) {
        let Some(file) = listing.to_remote_file() else {
            report.record_skip(listing.display_name(), SkipReason::MissingMetadata);
            return;
        };

        let category = file.category();
        let Some(plan) = category.download_plan() else {
            report.record_skip(&file.name, SkipReason::UnsupportedExport(file.mime_type.clone()));
            return;
        };
        let Some(format) = category.file_format() else {
            report.record_skip(
                &file.name,
                SkipReason::UnsupportedContentType(file.mime_type.clone()),
            );
            return;
        };

        info!(file = %file.name, mime_type = %file.mime_type, "downloading file from drive");
        match self.download_and_extract(&file, plan, format).await {
            Ok(segments) => report.record_loaded(&file.name, segments),
            Err(error) => report.record_failure(&file.name, &error),
        }
    }

    async fn download_and_extract(
        &self,
        file: &RemoteFile,
        plan: DownloadPlan,
        format: FileFormat,
    ) -> Result<Vec<TextSegment>, IngestError> {
        let mut artifact = LocalArtifact::create_in(&self.temp_dir, &file.name, format)?;
        self.drive.download(file, plan, artifact.writer()).await?;
        artifact.extract(&self.extractor)
    }
}

#[async_trait]
impl<D: DriveApi, X: DocumentExtractor> DocumentSource for DriveFetcher<D, X> {
    fn describe(&self) -> String {
        format!("drive folder {}", self.folder_id)
    }

    async fn load(&self) -> Result<IngestionReport, IngestError> {
        self.fetch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DOCX_MIME_TYPE;
    use std::collections::HashMap;
    use std::fs;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Serves listings and file bodies from memory.
    #[derive(Default)]
    struct FakeDrive {
        listings: Vec<DriveListing>,
        bodies: HashMap<String, Vec<u8>>,
        broken: Vec<String>,
        requests: Mutex<Vec<(String, DownloadPlan)>>,
    }

    impl FakeDrive {
        fn with_file(mut self, id: &str, name: &str, mime_type: &str, body: &[u8]) -> Self {
            self.listings.push(DriveListing::new(id, name, mime_type));
            self.bodies.insert(id.to_string(), body.to_vec());
            self
        }
    }

    #[async_trait]
    impl DriveApi for FakeDrive {
        async fn list_folder(&self, _folder_id: &str) -> Result<Vec<DriveListing>, IngestError> {
            Ok(self.listings.clone())
        }

        async fn download(
            &self,
            file: &RemoteFile,
            plan: DownloadPlan,
            sink: &mut (dyn Write + Send),
        ) -> Result<u64, IngestError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push((file.id.clone(), plan));
            }
            let body = self.bodies.get(&file.id).cloned().unwrap_or_default();
            sink.write_all(&body)?;
            if self.broken.contains(&file.id) {
                return Err(IngestError::DriveStatus {
                    operation: "files.get".to_string(),
                    status: 503,
                    details: "backend error".to_string(),
                });
            }
            Ok(body.len() as u64)
        }
    }

    /// Pretends every PDF has five pages; other formats use the real extractors.
    struct FivePagePdf {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl DocumentExtractor for FivePagePdf {
        fn extract(
            &self,
            path: &Path,
            format: FileFormat,
            source: &str,
        ) -> Result<Vec<TextSegment>, IngestError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(path.to_path_buf());
            }
            match format {
                FileFormat::Pdf => Ok((1..=5)
                    .map(|page| TextSegment {
                        text: format!("page {page} of {source}"),
                        source: source.to_string(),
                        page: Some(page),
                    })
                    .collect()),
                other => FormatExtractor.extract(path, other, source),
            }
        }
    }

    fn temp_dir_is_empty(dir: &Path) -> bool {
        fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(false)
    }

    #[tokio::test]
    async fn mixed_folder_yields_six_segments_and_one_skip() -> Result<(), IngestError> {
        let temp = tempdir()?;
        let drive = FakeDrive::default()
            .with_file("1", "Test Strategy.pdf", "application/pdf", b"%PDF-1.4")
            .with_file("2", "diagram.png", "image/png", &[0x89, 0x50])
            .with_file("3", "cases.csv", "text/csv", b"id,title\n1,login\n");
        let extractor = FivePagePdf {
            seen: Mutex::new(Vec::new()),
        };

        let fetcher = DriveFetcher::new(drive, "folder")
            .with_extractor(extractor)
            .with_temp_dir(temp.path());
        let report = fetcher.fetch().await?;

        assert_eq!(report.document_count(), 6);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::UnsupportedContentType("image/png".to_string())
        );
        assert!(report.failed.is_empty());
        assert!(temp_dir_is_empty(temp.path()));

        let seen = fetcher
            .extractor
            .seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|path| !path.exists()));
        Ok(())
    }

    #[tokio::test]
    async fn native_documents_are_exported() -> Result<(), IngestError> {
        let temp = tempdir()?;
        let drive = FakeDrive::default()
            .with_file("doc", "Plan", "application/vnd.google-apps.document", b"")
            .with_file("sheet", "Matrix", "application/vnd.google-apps.spreadsheet", b"a,b\n")
            .with_file("form", "Survey", "application/vnd.google-apps.form", b"")
            .with_file("word", "Notes.docx", DOCX_MIME_TYPE, b"not a zip");

        let fetcher = DriveFetcher::new(drive, "folder").with_temp_dir(temp.path());
        let report = fetcher.fetch().await?;

        let requests = fetcher
            .drive
            .requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default();
        assert!(requests.contains(&(
            "doc".to_string(),
            DownloadPlan::Export {
                mime_type: "application/pdf"
            }
        )));
        assert!(requests.contains(&(
            "sheet".to_string(),
            DownloadPlan::Export {
                mime_type: "text/csv"
            }
        )));
        assert!(requests.contains(&("word".to_string(), DownloadPlan::Media)));
        assert!(!requests.iter().any(|(id, _)| id == "form"));

        assert_eq!(report.document_count(), 1);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::UnsupportedExport("application/vnd.google-apps.form".to_string())
        );
        let failed: Vec<&str> = report.failed.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(failed, vec!["Plan", "Notes.docx"]);
        assert!(temp_dir_is_empty(temp.path()));
        Ok(())
    }

    #[tokio::test]
    async fn incomplete_listing_and_download_failure_do_not_abort() -> Result<(), IngestError> {
        let temp = tempdir()?;
        let mut drive = FakeDrive::default()
            .with_file("ok", "readme.txt", "text/plain", b"Run the smoke suite first.")
            .with_file("bad", "flaky.txt", "text/plain", b"partial");
        drive.broken.push("bad".to_string());
        drive.listings.push(DriveListing {
            id: Some("orphan".to_string()),
            name: None,
            mime_type: Some("text/plain".to_string()),
        });

        let report = DriveFetcher::new(drive, "folder")
            .with_temp_dir(temp.path())
            .fetch()
            .await?;

        assert_eq!(report.document_count(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "flaky.txt");
        assert_eq!(report.skipped[0].reason, SkipReason::MissingMetadata);
        assert!(temp_dir_is_empty(temp.path()));
        Ok(())
    }

    #[tokio::test]
    async fn empty_folder_is_not_an_error() -> Result<(), IngestError> {
        let report = DriveFetcher::new(FakeDrive::default(), "folder").fetch().await?;
        assert_eq!(report.document_count(), 0);
        Ok(())
    }

    #[test]
    fn artifacts_with_the_same_name_get_distinct_paths() -> Result<(), IngestError> {
        let temp = tempdir()?;
        let first = LocalArtifact::create_in(temp.path(), "Report.pdf", FileFormat::Pdf)?;
        let second = LocalArtifact::create_in(temp.path(), "Report.pdf", FileFormat::Pdf)?;
        assert_ne!(first.path(), second.path());

        let name = first
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert!(name.starts_with("Report-"));
        assert!(name.ends_with(".pdf"));

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn unsafe_characters_are_replaced_in_temp_names() {
        assert_eq!(temp_base_name("Q3 plan/v2.pdf"), "v2");
        assert_eq!(temp_base_name("Q3: plan*.docx"), "Q3__plan_");
        assert_eq!(temp_base_name(""), "download");
    }
}
