use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use doc_quiz::clients::{OpenAIClient, OpenAIConfig, OpenAIModel};
use doc_quiz::config::{AppConfig, KeyFromEnv};
use doc_quiz::core::{LowLevelClient, QuizGenerator};
use doc_quiz::document::HttpDocumentSource;
use doc_quiz::interceptors::FileInterceptor;
use doc_quiz::pipeline::{Submission, SubmissionPipeline};
use doc_quiz::server::{self, SharedPipeline};
use doc_quiz::store::{MemoryStore, QuizStore, SqliteStore};

#[derive(Parser)]
#[command(author, version, about = "Turn a documentation page into five multiple-choice quizzes", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    OPENAI_API_KEY           API key for the chat completions endpoint (required)
    OPENAI_BASE_URL          Override the API root
    DOC_QUIZ_MODEL           Model id [default: gpt-4o-mini]
    DOC_QUIZ_DATABASE_URL    SQLite URL [default: sqlite://doc-quiz.db?mode=rwc]
    DOC_QUIZ_QUOTA_CEILING   Maximum stored quiz sets [default: 100]
    DOC_QUIZ_QUOTA_SCOPE     global | per-owner [default: global]
    DOC_QUIZ_TRANSCRIPT_DIR  Write each model exchange here as markdown
    RUST_LOG                 Log filter [default: doc_quiz=info]")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on [default: DOC_QUIZ_BIND or 0.0.0.0:8000]
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Keep quiz sets in memory instead of SQLite
        #[arg(long)]
        memory: bool,
    },
    /// Run one submission and print the quiz set as JSON
    Generate {
        url: String,

        /// Record the quiz set under this owner
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("doc_quiz=info")),
        )
        .try_init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("reading configuration")?;

    match args.command {
        Command::Serve { bind, memory } => {
            let store: Arc<dyn QuizStore> = if memory {
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(SqliteStore::connect(&config.database_url).await?)
            };
            let pipeline = build_pipeline(&config, store)?;
            let addr = bind.unwrap_or(config.bind);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {}", addr))?;
            info!(addr = %addr, "Listening");
            axum::serve(listener, server::router(pipeline)).await?;
        }
        Command::Generate { url, owner } => {
            let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
            let pipeline = build_pipeline(&config, store)?;

            let mut submission = Submission::new(url);
            submission.owner = owner;
            let set = pipeline.run(submission).await?;
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
    }

    Ok(())
}

fn build_pipeline(config: &AppConfig, store: Arc<dyn QuizStore>) -> anyhow::Result<SharedPipeline> {
    let client = OpenAIClient::new(OpenAIConfig {
        api_key: OpenAIClient::require_key()?,
        model: OpenAIModel::from_id(&config.model),
        base_url: config.base_url.clone(),
    });
    let client: Box<dyn LowLevelClient> = Box::new(client);

    let mut generator = QuizGenerator::new(client);
    if let Some(dir) = &config.transcript_dir {
        info!(dir = %dir.display(), "Recording model exchanges");
        generator = generator.with_interceptor(Arc::new(FileInterceptor::new(dir.clone())));
    }

    Ok(SubmissionPipeline::new(
        generator,
        Arc::new(HttpDocumentSource::new()?),
        store,
        config.quota,
    ))
}
