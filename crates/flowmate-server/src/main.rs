//! FlowMate: document upload + retrieval-augmented chat server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use flowmate_chat::{CompletionModel, GroqClient, LlmSettings};
use flowmate_core::{FlowMateConfig, VectorBackend};
use flowmate_infer::{EmbedderBackend, UpstageEmbedder};
use flowmate_server::{build_router, AppState};
use flowmate_store::{InMemoryVectorDatabase, IndexManager, PineconeClient, VectorDatabase};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Interval between index/session sweeps. The first sweep runs at startup.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

fn resolve_data_dir() -> PathBuf {
    std::env::var("FLOWMATE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("FlowMate: document chat and one-minute speech reports");
    println!();
    println!("Usage: flowmate [help]");
    println!();
    println!("Environment:");
    println!("  GROQ_API_KEY, UPSTAGE_API_KEY   required");
    println!("  PINECONE_API_KEY                required unless FLOWMATE_VECTOR_BACKEND=memory");
    println!("  FLOWMATE_DATA_DIR               data root (default ./data)");
    println!("  PORT                            listen port (default 5000)");
    println!("  RUST_LOG                        log filter (default info)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}. Use 'flowmate help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = FlowMateConfig::from_env(&data_dir)
        .map_err(|e| anyhow::anyhow!("{}. Check your environment and restart.", e))?;
    let port = config.port;

    let upstage = UpstageEmbedder::new(&config.upstage_api_key, &config.embedding)?;
    match upstage.test_connection().await {
        Ok(dim) => info!("Upstage embeddings reachable (dim={})", dim),
        Err(e) => warn!("Upstage embedding test failed: {}", e),
    }
    let embedder: Arc<dyn EmbedderBackend> = Arc::new(upstage);

    let groq = GroqClient::new(
        &config.groq_api_key,
        LlmSettings {
            model: config.llm_model.clone(),
            timeout_secs: config.llm_timeout_secs,
            ..LlmSettings::default()
        },
    )?;
    if let Err(e) = groq.test_connection().await {
        warn!("Groq connection test failed: {}", e);
    }
    let llm: Arc<dyn CompletionModel> = Arc::new(groq);

    let db: Arc<dyn VectorDatabase> = match config.vector_backend {
        VectorBackend::Pinecone => {
            let key = config.pinecone_api_key.clone().unwrap_or_default();
            Arc::new(PineconeClient::new(key)?)
        }
        VectorBackend::Memory => Arc::new(InMemoryVectorDatabase::new()),
    };
    info!("Vector backend: {}", db.backend_name());
    let indexes = IndexManager::new(db, embedder.clone());

    let state = Arc::new(AppState::new(config, embedder, llm, indexes));

    let sweeper = {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                state.sweep().await;
            }
        })
    };

    let app = build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("FlowMate server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    state.shutdown().await;
    info!("FlowMate stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
