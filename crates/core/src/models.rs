use serde::{Deserialize, Serialize};
use std::fmt;

pub const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A file entry discovered by a folder listing. Only built once all three
/// identity fields are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl RemoteFile {
    pub fn category(&self) -> ContentCategory {
        ContentCategory::from_mime(&self.mime_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    GoogleDocument,
    GoogleSpreadsheet,
    GooglePresentation,
    GoogleOther(String),
    Pdf,
    PlainText,
    Csv,
    Docx,
    Other(String),
}

impl ContentCategory {
    pub fn from_mime(mime_type: &str) -> Self {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if let Some(native) = essence.strip_prefix(GOOGLE_APPS_PREFIX) {
            return match native {
                "document" => ContentCategory::GoogleDocument,
                "spreadsheet" => ContentCategory::GoogleSpreadsheet,
                "presentation" => ContentCategory::GooglePresentation,
                _ => ContentCategory::GoogleOther(essence),
            };
        }

        match essence.as_str() {
            "application/pdf" => ContentCategory::Pdf,
            "text/plain" => ContentCategory::PlainText,
            "text/csv" => ContentCategory::Csv,
            DOCX_MIME_TYPE => ContentCategory::Docx,
            _ => ContentCategory::Other(essence),
        }
    }

    /// How the bytes are obtained. `None` means a native type with no export target.
    pub fn download_plan(&self) -> Option<DownloadPlan> {
        match self {
            ContentCategory::GoogleDocument | ContentCategory::GooglePresentation => {
                Some(DownloadPlan::Export {
                    mime_type: "application/pdf",
                })
            }
            ContentCategory::GoogleSpreadsheet => Some(DownloadPlan::Export {
                mime_type: "text/csv",
            }),
            ContentCategory::GoogleOther(_) => None,
            ContentCategory::Pdf
            | ContentCategory::PlainText
            | ContentCategory::Csv
            | ContentCategory::Docx
            | ContentCategory::Other(_) => Some(DownloadPlan::Media),
        }
    }

    /// Format of the bytes once downloaded or exported.
    pub fn file_format(&self) -> Option<FileFormat> {
        match self {
            ContentCategory::GoogleDocument
            | ContentCategory::GooglePresentation
            | ContentCategory::Pdf => Some(FileFormat::Pdf),
            ContentCategory::GoogleSpreadsheet | ContentCategory::Csv => Some(FileFormat::Csv),
            ContentCategory::PlainText => Some(FileFormat::Text),
            ContentCategory::Docx => Some(FileFormat::Docx),
            ContentCategory::GoogleOther(_) | ContentCategory::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPlan {
    Export { mime_type: &'static str },
    Media,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    Pdf,
    Text,
    Csv,
    Docx,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Text => "txt",
            FileFormat::Csv => "csv",
            FileFormat::Docx => "docx",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileFormat::Pdf),
            "txt" => Some(FileFormat::Text),
            "csv" => Some(FileFormat::Csv),
            "docx" => Some(FileFormat::Docx),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub source: String,
    pub page: Option<u32>,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_types_export_to_interchange_formats() {
        let doc = ContentCategory::from_mime("application/vnd.google-apps.document");
        assert_eq!(
            doc.download_plan(),
            Some(DownloadPlan::Export {
                mime_type: "application/pdf"
            })
        );
        assert_eq!(doc.file_format(), Some(FileFormat::Pdf));

        let sheet = ContentCategory::from_mime("application/vnd.google-apps.spreadsheet");
        assert_eq!(sheet.file_format(), Some(FileFormat::Csv));

        let form = ContentCategory::from_mime("application/vnd.google-apps.form");
        assert_eq!(form.download_plan(), None);
        assert_eq!(form.file_format(), None);
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert_eq!(
            ContentCategory::from_mime("text/plain; charset=UTF-8"),
            ContentCategory::PlainText
        );
    }

    #[test]
    fn unknown_media_downloads_but_has_no_format() {
        let image = ContentCategory::from_mime("image/png");
        assert_eq!(image.download_plan(), Some(DownloadPlan::Media));
        assert_eq!(image.file_format(), None);
    }

    #[test]
    fn extensions_round_through_format_table() {
        assert_eq!(FileFormat::from_extension("PDF"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_extension("md"), None);
        assert_eq!(FileFormat::Docx.to_string(), ".docx");
    }
}
