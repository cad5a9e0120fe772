use crate::auth::CredentialProvider;
use crate::error::IngestError;
use crate::models::{DownloadPlan, RemoteFile, FOLDER_MIME_TYPE};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::io::Write;
use tracing::{debug, info};
use url::Url;

pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const PAGE_SIZE: &str = "100";

/// A raw listing entry; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveListing {
    pub id: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
}

impl DriveListing {
    pub fn new(id: &str, name: &str, mime_type: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            mime_type: Some(mime_type.to_string()),
        }
    }

    /// `None` unless id, name and content type are all present and non-empty.
    pub fn to_remote_file(&self) -> Option<RemoteFile> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Some(RemoteFile {
            id: present(&self.id)?,
            name: present(&self.name)?,
            mime_type: present(&self.mime_type)?,
        })
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveListing>,
    next_page_token: Option<String>,
}

/// Storage operations the fetcher needs.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Non-folder, non-trashed children of `folder_id`.
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveListing>, IngestError>;

    /// Streams the file (exported or raw) into `sink`, returning the byte count.
    async fn download(
        &self,
        file: &RemoteFile,
        plan: DownloadPlan,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, IngestError>;
}

/// Drive v3 REST client.
pub struct DriveClient<C: CredentialProvider> {
    client: Client,
    api_base: String,
    api_key: String,
    credentials: C,
}

impl<C: CredentialProvider> DriveClient<C> {
    pub fn new(api_key: impl Into<String>, credentials: C) -> Self {
        Self {
            client: Client::new(),
            api_base: DRIVE_API_BASE.to_string(),
            api_key: api_key.into(),
            credentials,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn list_url(&self, folder_id: &str, page_token: Option<&str>) -> Result<Url, IngestError> {
        let query = format!(
            "'{}' in parents and mimeType!='{FOLDER_MIME_TYPE}' and trashed=false",
            folder_id.replace('\'', "\\'")
        );

        let mut url = Url::parse(&self.api_base)?.join("files")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query)
                .append_pair("fields", LIST_FIELDS)
                .append_pair("spaces", "drive")
                .append_pair("pageSize", PAGE_SIZE)
                .append_pair("key", &self.api_key);
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    fn download_url(&self, file: &RemoteFile, plan: DownloadPlan) -> Result<Url, IngestError> {
        let mut url = Url::parse(&self.api_base)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                IngestError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?;
            segments.pop_if_empty().push("files").push(&file.id);
            if matches!(plan, DownloadPlan::Export { .. }) {
                segments.push("export");
            }
        }

        {
            let mut pairs = url.query_pairs_mut();
            match plan {
                DownloadPlan::Export { mime_type } => {
                    pairs.append_pair("mimeType", mime_type);
                }
                DownloadPlan::Media => {
                    pairs.append_pair("alt", "media");
                }
            }
            pairs.append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    async fn get(&self, url: Url, operation: &str) -> Result<Response, IngestError> {
        let token = self.credentials.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::DriveStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl<C: CredentialProvider> DriveApi for DriveClient<C> {
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveListing>, IngestError> {
        let mut listings = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(folder_id, page_token.as_deref())?;
            let page: FileList = self.get(url, "files.list").await?.json().await?;
            debug!(entries = page.files.len(), "listed drive page");
            listings.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(folder_id, entries = listings.len(), "listed drive folder");
        Ok(listings)
    }

    async fn download(
        &self,
        file: &RemoteFile,
        plan: DownloadPlan,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64, IngestError> {
        let operation = match plan {
            DownloadPlan::Export { .. } => "files.export",
            DownloadPlan::Media => "files.get",
        };
        let response = self.get(self.download_url(file, plan)?, operation).await?;
        let total = response.content_length().filter(|total| *total > 0);

        let mut stream = response.bytes_stream();
        let mut received = 0u64;
        let mut last_percent = None;

        while let Some(piece) = stream.next().await {
            let piece = piece?;
            sink.write_all(&piece)?;
            received += piece.len() as u64;

            if let Some(total) = total {
                let percent = (received * 10 / total).min(10) * 10;
                if last_percent != Some(percent) {
                    info!(file = %file.name, percent, "downloading");
                    last_percent = Some(percent);
                }
            }
        }

        sink.flush()?;
        Ok(received)
    }
}
