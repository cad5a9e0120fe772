use async_trait::async_trait;
use drive_qa_core::{AuthError, AuthorizationPrompt};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::Mutex;
use url::Url;

/// One buffered line reader over the terminal, shared by everything that reads input.
pub struct LineInput<R> {
    lines: Arc<Mutex<Lines<BufReader<R>>>>,
}

impl<R> Clone for LineInput<R> {
    fn clone(&self) -> Self {
        Self {
            lines: Arc::clone(&self.lines),
        }
    }
}

impl<R: AsyncRead + Unpin> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(reader).lines())),
        }
    }

    /// `None` at end of input.
    pub async fn next_line(&self) -> std::io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

/// Asks for the OAuth code on the terminal.
pub struct TerminalPrompt<R> {
    input: LineInput<R>,
}

impl<R> TerminalPrompt<R> {
    pub fn new(input: LineInput<R>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl<R> AuthorizationPrompt for TerminalPrompt<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn authorization_code(&self, consent_url: &Url) -> Result<String, AuthError> {
        println!("Open this URL in a browser and authorize access to Google Drive:\n\n{consent_url}\n");
        print!("Authorization code: ");
        std::io::stdout().flush()?;

        let code = self.input.next_line().await?.unwrap_or_default();
        Ok(code.trim().to_string())
    }
}
