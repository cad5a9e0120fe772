mod history;
mod terminal;

use chrono::Utc;
use clap::{Parser, Subcommand};
use drive_qa_core::config::{API_KEY_VAR, FOLDER_ID_VAR};
use drive_qa_core::{
    user_facing_message, CharacterNgramEmbedder, DocumentSource,
    DriveClient, DriveFetcher, Embedder, GeminiChat, GeminiEmbedder, IngestionReport,
    InstalledAppFlow, LocalFolderSource, QaConfig, QaSession, GEMINI_EMBEDDING_DIMENSIONS,
};
use history::ConversationHistory;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use terminal::{LineInput, TerminalPrompt};
use tokio::io::Stdin;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DOTENV_PATH: &str = "config/.env";

type Session = QaSession<Box<dyn DocumentSource>, dyn Embedder, GeminiChat>;

#[derive(Parser)]
#[command(name = "drive-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Google API key used for Drive and Gemini
    #[arg(long, env = API_KEY_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// Drive folder holding the knowledge base
    #[arg(long, env = FOLDER_ID_VAR)]
    folder_id: Option<String>,

    /// Read documents from a local folder instead of Drive.
    #[arg(long)]
    local_folder: Option<PathBuf>,

    /// Use the local hashing embedder instead of Gemini embeddings.
    #[arg(long, default_value_t = false)]
    offline_embeddings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat against the knowledge base.
    Chat,
    /// Answer a single question and exit.
    Ask {
        #[arg(long)]
        question: String,
        /// Print the retrieved passages after the answer.
        #[arg(long, default_value_t = false)]
        sources: bool,
    },
    /// Fetch and extract documents only, then print what happened to each file.
    Ingest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_loaded = dotenv::from_path(DOTENV_PATH).is_ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    if !dotenv_loaded {
        debug!(path = DOTENV_PATH, "no dotenv file loaded");
    }

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "drive-qa boot"
    );

    let input = LineInput::new(tokio::io::stdin());
    let source = document_source(&cli, &config, &input);
    let offline = cli.offline_embeddings;

    match cli.command {
        Command::Ingest => {
            let report = source.load().await?;
            print_report(&report);
        }
        Command::Ask { question, sources } => {
            let mut session = build_session(source, offline, &config);
            if sources {
                match session.answer(&question).await {
                    Ok(answer) => {
                        println!("{}", answer.text);
                        for hit in &answer.sources {
                            let page = hit
                                .chunk
                                .page
                                .map(|page| format!(" page={page}"))
                                .unwrap_or_default();
                            println!(
                                "[{}] score={:.4}{} chunk={}",
                                hit.chunk.source, hit.score, page, hit.chunk.chunk_index
                            );
                        }
                    }
                    Err(error) => {
                        error!(%error, "question failed");
                        println!("{}", user_facing_message(&error));
                    }
                }
            } else {
                println!("{}", session.ask(&question).await);
            }
        }
        Command::Chat => {
            let mut session = build_session(source, offline, &config);
            session.initialize().await?;
            chat(&mut session, &input).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<QaConfig> {
    let local_folder = cli
        .local_folder
        .as_ref()
        .map(|folder| folder.display().to_string());

    let config = QaConfig::from_lookup(|name| match name {
        API_KEY_VAR => cli.api_key.clone(),
        FOLDER_ID_VAR => cli.folder_id.clone().or_else(|| local_folder.clone()),
        other => std::env::var(other).ok(),
    })?;
    Ok(config)
}

fn document_source(cli: &Cli, config: &QaConfig, input: &LineInput<Stdin>) -> Box<dyn DocumentSource> {
    match &cli.local_folder {
        Some(folder) => Box::new(LocalFolderSource::new(folder.clone())),
        None => {
            let credentials = InstalledAppFlow::new(
                config.token_path.clone(),
                config.credentials_path.clone(),
                TerminalPrompt::new(input.clone()),
            );
            let drive = DriveClient::new(config.api_key.clone(), credentials);
            Box::new(DriveFetcher::new(drive, config.folder_id.clone()))
        }
    }
}

fn build_session(source: Box<dyn DocumentSource>, offline: bool, config: &QaConfig) -> Session {
    let embedder: Arc<dyn Embedder> = if offline {
        Arc::new(CharacterNgramEmbedder::default())
    } else {
        Arc::new(
            GeminiEmbedder::new(config.api_key.clone())
                .with_model(config.embedding_model.clone(), GEMINI_EMBEDDING_DIMENSIONS),
        )
    };
    let model = Arc::new(GeminiChat::new(config.api_key.clone()).with_model(config.chat_model.clone()));

    QaSession::new(source, embedder, model)
        .with_chunking(config.chunking)
        .with_answer_settings(config.answer)
}

async fn chat(session: &mut Session, input: &LineInput<Stdin>) -> anyhow::Result<()> {
    let mut history = ConversationHistory::default();

    println!("Ask a question about the knowledge base. Type /history to review, exit to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = input.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "/history" => {
                print!("{}", history.render());
                continue;
            }
            _ => {}
        }

        let answer = session.ask(question).await;
        println!("{answer}\n");
        history.record(question, &answer);
    }

    info!(turns = history.len(), "chat finished");
    Ok(())
}

fn print_report(report: &IngestionReport) {
    println!(
        "{} segments from {} files, {} skipped, {} failed",
        report.document_count(),
        report.loaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for loaded in &report.loaded {
        println!("  loaded  {} ({} parts)", loaded.name, loaded.segment_count);
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.name, skipped.reason);
    }
    for failed in &report.failed {
        println!("  failed  {}: {}", failed.name, failed.reason);
    }
}
