use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use errorrag::config::{Config, DEFAULT_CONFIG_PATH, Provider};
use errorrag::embedder::Embedder;
use errorrag::ingest;
use errorrag::pipeline::RetrievalPipeline;
use errorrag::repl;
use errorrag::server::{self, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "errorrag",
    version,
    about = "Answer questions about integration error records"
)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the CSV file to index.
    #[arg(long, global = true)]
    csv: Option<String>,

    /// Use the offline mock embedder instead of the configured provider.
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /ask` over HTTP.
    Serve {
        /// Address to bind (host:port).
        #[arg(long, env = "ERRORRAG_BIND")]
        bind: Option<String>,
    },
    /// Interactive question loop (default).
    Chat,
    /// Answer a single question and exit.
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // 1. Load config
    let mut config = Config::load(&cli.config)?;
    if let Some(csv) = &cli.csv {
        config.csv_path = csv.clone();
    }
    if cli.mock {
        config.embedding.provider = Provider::Mock;
    }
    if let Some(Command::Serve { bind: Some(bind) }) = &cli.command {
        config.bind = bind.clone();
    }
    config.validate().context("invalid configuration")?;

    // 2. Init embedder. Built outside any async runtime: the HTTP client is blocking.
    let embedder: Arc<dyn Embedder> = Arc::from(config.embedding.build_embedder()?);

    // 3. Build the index
    let store = ingest::load_and_build(Path::new(&config.csv_path), &*embedder)?;
    info!("Index ready with {} records", store.len());

    // 4. Run the front end
    match cli.command.unwrap_or(Command::Chat) {
        Command::Serve { .. } => {
            let state = AppState {
                store: Arc::new(store),
                embedder: embedder.clone(),
                thresholds: config.thresholds(),
                top_k: config.retrieval.top_k,
            };
            let cors = server::cors_layer(&config.cors_origins)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(server::serve(state, &config.bind, cors))?;
        }
        Command::Chat => {
            let pipeline = RetrievalPipeline::new(&store, &*embedder)
                .with_thresholds(config.thresholds())
                .with_top_k(config.retrieval.top_k);
            let stdin = std::io::stdin();
            repl::run(&pipeline, stdin.lock(), std::io::stdout())?;
        }
        Command::Ask { question } => {
            let pipeline = RetrievalPipeline::new(&store, &*embedder)
                .with_thresholds(config.thresholds())
                .with_top_k(config.retrieval.top_k);
            let answer = pipeline
                .answer(&question.join(" "))
                .context("failed to answer the question")?;
            println!("{}", answer.trim_end());
        }
    }

    Ok(())
}
