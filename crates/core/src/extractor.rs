use crate::error::IngestError;
use crate::models::{FileFormat, TextSegment};
use lopdf::Document;
use regex::Regex;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::debug;

const DOCX_BODY_ENTRY: &str = "word/document.xml";

/// Turns a local file of a known format into text segments.
pub trait DocumentExtractor: Send + Sync {
    fn extract(
        &self,
        path: &Path,
        format: FileFormat,
        source: &str,
    ) -> Result<Vec<TextSegment>, IngestError>;
}

/// Dispatches on the file format alone; content is never sniffed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatExtractor;

impl DocumentExtractor for FormatExtractor {
    fn extract(
        &self,
        path: &Path,
        format: FileFormat,
        source: &str,
    ) -> Result<Vec<TextSegment>, IngestError> {
        match format {
            FileFormat::Pdf => extract_pdf_pages(path, source),
            FileFormat::Text | FileFormat::Csv => extract_plain_text(path, source),
            FileFormat::Docx => extract_docx(path, source),
        }
    }
}

/// Format implied by the file extension, if an extractor exists for it.
pub fn extension_format(path: &Path) -> Option<FileFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(FileFormat::from_extension)
}

pub fn extract_pdf_pages(path: &Path, source: &str) -> Result<Vec<TextSegment>, IngestError> {
    let document =
        Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(TextSegment {
                text,
                source: source.to_string(),
                page: Some(page_no),
            });
        }
    }

    if pages.is_empty() {
        return Err(IngestError::PdfParse(format!(
            "pdf had no readable page text: {source}"
        )));
    }

    Ok(pages)
}

pub fn extract_plain_text(path: &Path, source: &str) -> Result<Vec<TextSegment>, IngestError> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    if text.trim().is_empty() {
        debug!(source, "text file is empty");
        return Ok(Vec::new());
    }

    Ok(vec![TextSegment {
        text,
        source: source.to_string(),
        page: None,
    }])
}

pub fn extract_docx(path: &Path, source: &str) -> Result<Vec<TextSegment>, IngestError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut xml = String::new();
    archive.by_name(DOCX_BODY_ENTRY)?.read_to_string(&mut xml)?;

    let text = docx_xml_to_text(&xml)?;
    if text.is_empty() {
        debug!(source, "docx has no body text");
        return Ok(Vec::new());
    }

    Ok(vec![TextSegment {
        text,
        source: source.to_string(),
        page: None,
    }])
}

/// Flattens WordprocessingML into plain text: one line per paragraph.
pub fn docx_xml_to_text(xml: &str) -> Result<String, IngestError> {
    let paragraph_end = Regex::new(r"</w:p>")?;
    let tab = Regex::new(r"<w:tab\s*/>")?;
    let line_break = Regex::new(r"<w:(?:br|cr)\b[^>]*/>")?;
    let any_tag = Regex::new(r"<[^>]*>")?;

    let text = paragraph_end.replace_all(xml, "\n");
    let text = tab.replace_all(&text, "\t");
    let text = line_break.replace_all(&text, "\n");
    let text = any_tag.replace_all(&text, "");

    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    Ok(text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string())
}
