//! # Recall CLI Application
//!
//! This module implements the command-line interface for the recall pipeline,
//! providing access to its capabilities through a set of subcommands.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands for the pipeline operations:
//!   - `sync`: Reconcile a document directory with the knowledge base
//!   - `search`: Similarity search over indexed incidents
//!   - `chat`: One routed chat turn, blocking or streamed
//!   - `docs`: Knowledge-base inspection
//!   - `sessions` / `history` / `rename-session` / `delete-session`:
//!     Chat session management
//!
//! The API key is read from the `GEMINI_API_KEY` environment variable.

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::instrument;

use recall::chat::ChatPipeline;
use recall::config::PipelineConfig;
use recall::index::VectorIndex;
use recall::model::{GeminiModel, LanguageModel};
use recall::router::LlmIntentRouter;
use recall::search::SimilaritySearch;
use recall::source::DirSource;
use recall::store::Store;
use recall::sync::{SyncEvent, SyncPipeline};

#[derive(Parser)]
#[command(author, version, about = "An incident knowledge base with retrieval-augmented remediation recommendations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync a document directory into the knowledge base
    Sync(SyncArgs),

    /// Search the knowledge base for similar incidents
    Search(SearchArgs),

    /// Ask the assistant one question in a chat session
    Chat(ChatArgs),

    /// List indexed RCA documents
    Docs(DocsArgs),

    /// List chat sessions
    Sessions(SessionsArgs),

    /// Show the messages of a chat session
    History(HistoryArgs),

    /// Rename a chat session
    RenameSession(RenameSessionArgs),

    /// Delete a chat session and its messages
    DeleteSession(DeleteSessionArgs),
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Directory holding the RCA documents
    #[arg(required = true)]
    source: PathBuf,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Search query
    #[arg(required = true)]
    query: String,

    /// Limit results
    #[arg(short, long, default_value = "5")]
    limit: usize,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// The question or problem description
    #[arg(required = true)]
    message: String,

    /// Existing session id; a new session is created when omitted
    #[arg(short, long)]
    session: Option<String>,

    /// Stream the reply as it is generated
    #[arg(long)]
    stream: bool,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct DocsArgs {
    /// Show detailed information
    #[arg(short, long)]
    details: bool,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct SessionsArgs {
    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// Session id
    #[arg(required = true)]
    session_id: String,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct RenameSessionArgs {
    /// Session id
    #[arg(required = true)]
    session_id: String,

    /// New title
    #[arg(required = true)]
    title: String,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[derive(Args, Debug)]
struct DeleteSessionArgs {
    /// Session id
    #[arg(required = true)]
    session_id: String,

    /// Database path
    #[arg(long, default_value = "recall.db")]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    telemetry::init_tracing_subscriber();

    // Execute the appropriate command
    match cli.command {
        Some(Commands::Sync(args)) => {
            sync_command(args).await?;
        }
        Some(Commands::Search(args)) => {
            search_command(args).await?;
        }
        Some(Commands::Chat(args)) => {
            chat_command(args).await?;
        }
        Some(Commands::Docs(args)) => {
            docs_command(args).await?;
        }
        Some(Commands::Sessions(args)) => {
            sessions_command(args).await?;
        }
        Some(Commands::History(args)) => {
            history_command(args).await?;
        }
        Some(Commands::RenameSession(args)) => {
            let store = open_store(&args.database).await?;
            store.rename_session(&args.session_id, &args.title).await?;
            println!("Renamed session {}", args.session_id);
        }
        Some(Commands::DeleteSession(args)) => {
            let store = open_store(&args.database).await?;
            store.delete_session(&args.session_id).await?;
            println!("Deleted session {}", args.session_id);
        }
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["--help"]);
        }
    }

    Ok(())
}

fn model_from_env(config: &PipelineConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| anyhow!("GEMINI_API_KEY environment variable must be set"))?;
    let client = recall::gemini::Client::with_api_key_rate_limited(api_key);
    Ok(Arc::new(GeminiModel::new(client, config)))
}

async fn open_store(database: &PathBuf) -> anyhow::Result<Store> {
    let db = libsql::Builder::new_local(database).build().await?;
    Ok(Store::new(db.connect()?).await?)
}

async fn open_components(
    database: &PathBuf,
    config: &PipelineConfig,
) -> anyhow::Result<(Store, VectorIndex)> {
    let db = libsql::Builder::new_local(database).build().await?;
    let store = Store::new(db.connect()?).await?;
    let index = VectorIndex::new(db.connect()?, config.embedding_dimensions).await?;
    Ok((store, index))
}

#[instrument]
async fn sync_command(args: SyncArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::default();
    let model = model_from_env(&config)?;
    let (store, index) = open_components(&args.database, &config).await?;

    println!("Syncing {}...", args.source.display());

    let pipeline = SyncPipeline::new(store, index, model, &config);
    let source = DirSource::new(&args.source);

    // Create a channel for progress updates
    let (progress_sender, mut progress_receiver) = mpsc::channel::<SyncEvent>(100);

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {pos} documents {msg}")
            .unwrap(),
    );

    // Spawn a task to process progress updates
    let progress_handle = tokio::spawn({
        let progress_bar = progress_bar.clone();
        async move {
            while let Some(event) = progress_receiver.recv().await {
                progress_bar.inc(1);
                progress_bar.set_message(format!("({:?}: {})", event.outcome, event.filename));
            }
            progress_bar.finish_and_clear();
        }
    });

    let report = pipeline
        .run_with_progress(&source, Some(progress_sender))
        .await?;

    // Wait for progress task to complete (it ends when all senders are dropped)
    let _ = progress_handle.await;

    println!(
        "Sync completed: {} processed, {} updated, {} skipped, {} errors",
        report.processed, report.updated, report.skipped, report.errors
    );

    Ok(())
}

#[instrument]
async fn search_command(args: SearchArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::default();
    let model = model_from_env(&config)?;
    let (store, index) = open_components(&args.database, &config).await?;

    println!("Searching for: {}", args.query);

    let search = SimilaritySearch::new(store, index, model);
    let results = search.search(&args.query, args.limit).await?;

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        _ => {
            println!("Found {} similar incidents", results.len());
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. {} ({:.2}%)",
                    i + 1,
                    result.filename,
                    result.similarity_score
                );
                println!(
                    "   Project: {}",
                    result.project_name.as_deref().unwrap_or("N/A")
                );
                println!("   Problems: {}", result.problems.join("; "));
                println!("   Solutions: {}", result.solutions.join("; "));
                println!();
            }
        }
    }

    Ok(())
}

#[instrument]
async fn chat_command(args: ChatArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::default();
    let model = model_from_env(&config)?;
    let (store, index) = open_components(&args.database, &config).await?;

    let session_id = match args.session {
        Some(id) => id,
        None => {
            let session = store.create_session(None).await?;
            println!("Created session {}", session.id);
            session.id
        }
    };

    let router = Arc::new(LlmIntentRouter::new(model.clone()));
    let pipeline = ChatPipeline::new(store, index, model, router, &config);

    if args.stream {
        use std::io::Write;

        let mut stream = pipeline.respond_stream(&session_id, &args.message).await?;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            print!("{}", fragment);
            std::io::stdout().flush()?;
        }
        println!();
    } else {
        let reply = pipeline.respond(&session_id, &args.message).await?;
        println!("{}", reply.text);

        if let Some(matches) = reply.matches {
            println!("\nMatched incidents:");
            for m in matches {
                println!("  {} ({:.2}%)", m.filename, m.similarity_score);
            }
        }
    }

    Ok(())
}

#[instrument]
async fn docs_command(args: DocsArgs) -> anyhow::Result<()> {
    let store = open_store(&args.database).await?;
    let documents = store.list_documents().await?;

    println!("Indexed RCA documents: {}", documents.len());

    for doc in documents {
        if args.details {
            println!("File: {}", doc.filename);
            println!("Project: {}", doc.project_name.as_deref().unwrap_or("N/A"));
            println!("Problems: {}", doc.problems.join("; "));
            println!("Root causes: {}", doc.root_causes.join("; "));
            println!("Solutions: {}", doc.solutions.join("; "));
            println!("Updated: {}", doc.updated_at.format("%Y-%m-%d %H:%M:%S"));
            println!();
        } else {
            println!(
                "{} - {} (Updated: {})",
                doc.filename,
                doc.project_name.as_deref().unwrap_or("N/A"),
                doc.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}

#[instrument]
async fn sessions_command(args: SessionsArgs) -> anyhow::Result<()> {
    let store = open_store(&args.database).await?;
    let sessions = store.list_sessions().await?;

    println!("Chat sessions: {}", sessions.len());
    for session in sessions {
        println!(
            "{} - {} (Updated: {})",
            session.id,
            session.title,
            session.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

#[instrument]
async fn history_command(args: HistoryArgs) -> anyhow::Result<()> {
    let store = open_store(&args.database).await?;
    let messages = store.list_messages(&args.session_id).await?;

    for message in messages {
        println!(
            "[{}] {}:",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.role.as_str()
        );
        println!("{}", message.content);
        if let Some(matches) = &message.matched_rcas {
            println!(
                "(matched: {})",
                matches
                    .iter()
                    .map(|m| m.filename.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        println!();
    }

    Ok(())
}
