//! Credential providers for the Drive API.
//!
//! [`InstalledAppFlow`] reuses a persisted authorized-user token, refreshes it
//! when it has expired, and only falls back to an interactive consent
//! handshake (through an injected [`AuthorizationPrompt`]) when neither works.

use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
pub const DEFAULT_TOKEN_PATH: &str = "config/token.json";
pub const DEFAULT_CREDENTIALS_PATH: &str = "config/credentials.json";

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Produces a bearer token for the storage API, or fails.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// A fixed bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// Shows the consent URL to a human and returns the authorization code they paste back.
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    async fn authorization_code(&self, consent_url: &Url) -> Result<String, AuthError>;
}

/// On-disk authorized-user token, compatible with the Google client libraries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedUser {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    /// Access token if present and not about to expire.
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref()?;
        match self.expiry {
            Some(expiry) if now + Duration::seconds(EXPIRY_SKEW_SECONDS) >= expiry => None,
            _ => Some(token),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets, AuthError> {
    if !path.exists() {
        return Err(AuthError::MissingClientSecrets(path.display().to_string()));
    }
    let parsed: ClientSecretsFile = serde_json::from_slice(&fs::read(path)?)?;
    parsed
        .installed
        .or(parsed.web)
        .ok_or_else(|| AuthError::InvalidClientSecrets(path.display().to_string()))
}

pub fn consent_url(secrets: &ClientSecrets) -> Result<Url, AuthError> {
    Ok(Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", OOB_REDIRECT_URI),
            ("response_type", "code"),
            ("scope", DRIVE_READONLY_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )?)
}

/// Installed-application OAuth flow backed by a token file.
pub struct InstalledAppFlow<P: AuthorizationPrompt> {
    token_path: PathBuf,
    credentials_path: PathBuf,
    prompt: P,
    client: Client,
    cached: Mutex<Option<AuthorizedUser>>,
}

impl<P: AuthorizationPrompt> InstalledAppFlow<P> {
    pub fn new(token_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>, prompt: P) -> Self {
        Self {
            token_path: token_path.into(),
            credentials_path: credentials_path.into(),
            prompt,
            client: Client::new(),
            cached: Mutex::new(None),
        }
    }

    fn load_token_file(&self) -> Result<Option<AuthorizedUser>, AuthError> {
        if !self.token_path.exists() {
            return Ok(None);
        }
        match serde_json::from_slice(&fs::read(&self.token_path)?) {
            Ok(user) => Ok(Some(user)),
            Err(error) => {
                warn!(path = %self.token_path.display(), %error, "ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    fn persist(&self, user: &AuthorizedUser) -> Result<(), AuthError> {
        if let Some(parent) = self.token_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.token_path, serde_json::to_vec_pretty(user)?)?;
        info!(path = %self.token_path.display(), "saved credentials for the next session");
        Ok(())
    }

    async fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let response = self.client.post(token_uri).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn refresh(&self, user: AuthorizedUser, refresh_token: &str) -> Result<AuthorizedUser, AuthError> {
        info!("refreshing expired drive credentials");
        let response = self
            .request_token(
                &user.token_uri,
                &[
                    ("client_id", user.client_id.as_str()),
                    ("client_secret", user.client_secret.as_str()),
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token"),
                ],
            )
            .await?;

        Ok(AuthorizedUser {
            token: Some(response.access_token),
            refresh_token: response.refresh_token.or(user.refresh_token),
            expiry: response
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
            ..user
        })
    }

    async fn authorize(&self) -> Result<AuthorizedUser, AuthError> {
        let secrets = load_client_secrets(&self.credentials_path)?;
        let url = consent_url(&secrets)?;
        let code = self.prompt.authorization_code(&url).await?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::Authorization("empty authorization code".to_string()));
        }

        let response = self
            .request_token(
                &secrets.token_uri,
                &[
                    ("code", code),
                    ("client_id", secrets.client_id.as_str()),
                    ("client_secret", secrets.client_secret.as_str()),
                    ("redirect_uri", OOB_REDIRECT_URI),
                    ("grant_type", "authorization_code"),
                ],
            )
            .await?;

        Ok(AuthorizedUser {
            token: Some(response.access_token),
            refresh_token: response.refresh_token,
            token_uri: secrets.token_uri,
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
            expiry: response
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
        })
    }
}

#[async_trait]
impl<P: AuthorizationPrompt> CredentialProvider for InstalledAppFlow<P> {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.load_token_file()?;
        }

        if let Some(token) = cached.as_ref().and_then(|user| user.valid_token(Utc::now())) {
            return Ok(token.to_string());
        }

        let renewed = match cached.take() {
            Some(user) => match user.refresh_token.clone() {
                Some(refresh_token) => self.refresh(user, &refresh_token).await?,
                None => self.authorize().await?,
            },
            None => self.authorize().await?,
        };

        self.persist(&renewed)?;
        let token = renewed
            .token
            .clone()
            .ok_or_else(|| AuthError::Authorization("token endpoint returned no access token".to_string()))?;
        *cached = Some(renewed);
        Ok(token)
    }
}
