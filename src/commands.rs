use console::style;
use dialoguer::Confirm;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::answer::{Answerer, RagAnswerer};
use crate::config::Config;
use crate::embeddings::TokenChunker;
use crate::ingest::Ingestor;
use crate::openai::OpenAiClient;
use crate::server::{AppState, QueryLimits, build_router};
use crate::session::InMemorySessionStore;
use crate::vector_store::{PineconeClient, VectorIndex};
use crate::{PaddleError, Result};

/// Clients for both upstream services, built from the config and the API keys in the environment
struct Upstreams {
    openai: Arc<OpenAiClient>,
    pinecone: Arc<PineconeClient>,
}

impl Upstreams {
    fn connect(config: &Config) -> Result<Self> {
        let openai_key = Config::openai_api_key()?;
        let pinecone_key = Config::pinecone_api_key()?;

        let openai = OpenAiClient::new(&config.openai, openai_key)
            .map_err(|e| PaddleError::Config(format!("{:#}", e)))?;
        let pinecone = PineconeClient::new(&config.pinecone, pinecone_key)
            .map_err(|e| PaddleError::Config(format!("{:#}", e)))?;

        Ok(Self {
            openai: Arc::new(openai),
            pinecone: Arc::new(pinecone),
        })
    }

    fn answerer(&self, config: &Config) -> RagAnswerer {
        RagAnswerer::from_config(
            self.openai.clone(),
            self.pinecone.clone(),
            self.openai.clone(),
            &config.prompt,
            config.pinecone.top_k,
        )
    }
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PaddleError::Other(anyhow::anyhow!("Background task failed: {}", e)))?
}

/// Start the HTTP API
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let upstreams = Upstreams::connect(config)?;
    let answerer: Arc<dyn Answerer> = Arc::new(upstreams.answerer(config));

    info!(
        "Answering with {} over index '{}' (top {} chunks, {:?} relevance policy)",
        upstreams.openai.chat_model(),
        upstreams.pinecone.index_name(),
        config.pinecone.top_k,
        config.prompt.policy
    );
    if config.server.production {
        info!(
            "Production mode: CORS limited to {}",
            config.server.allowed_origins.join(", ")
        );
    }

    let state = AppState::new(
        answerer,
        Arc::new(InMemorySessionStore::new()),
        QueryLimits::from_config(&config.server, &config.session),
    )
    .with_error_details(config.server.expose_error_details);

    let router = build_router(state, &config.server);
    crate::server::serve(router, &config.server.bind_address()).await?;
    Ok(())
}

/// Index every PDF in `folder`
#[inline]
pub async fn ingest(config: &Config, folder: &Path) -> Result<()> {
    let upstreams = Upstreams::connect(config)?;
    let chunker = TokenChunker::new(&config.chunking)
        .map_err(|e| PaddleError::Config(format!("{:#}", e)))?;

    let pinecone = upstreams.pinecone.clone();
    let description = blocking(move || {
        pinecone
            .ensure_index()
            .map_err(|e| PaddleError::upstream(&e))
    })
    .await?;
    info!("Using index '{}' at {}", description.name, description.host);

    let ingestor = Ingestor::new(chunker, upstreams.openai.clone(), upstreams.pinecone.clone());
    let source = folder.to_path_buf();
    let stats = blocking(move || ingestor.ingest_folder(&source)).await?;

    println!(
        "{} Ingested {} documents from {} ({} chunks, {} skipped)",
        style("✓").green(),
        stats.documents,
        folder.display(),
        stats.chunks,
        stats.skipped
    );
    Ok(())
}

/// Delete every vector in the configured namespace
#[inline]
pub async fn purge(config: &Config, yes: bool) -> Result<()> {
    let upstreams = Upstreams::connect(config)?;
    let pinecone = upstreams.pinecone;

    let namespace = if pinecone.namespace().is_empty() {
        "(default)".to_string()
    } else {
        pinecone.namespace().to_string()
    };

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete ALL vectors from index '{}' namespace {}?",
                pinecone.index_name(),
                namespace
            ))
            .default(false)
            .interact()
            .map_err(|e| PaddleError::Other(e.into()))?;
        if !confirmed {
            println!("Purge cancelled.");
            return Ok(());
        }
    }

    let index = pinecone.clone();
    blocking(move || index.delete_all()).await?;

    println!(
        "{} Deleted all vectors from '{}' namespace {}",
        style("✓").green(),
        pinecone.index_name(),
        namespace
    );
    Ok(())
}

/// Answer one question without any conversation history
#[inline]
pub async fn ask(config: &Config, question: &str) -> Result<()> {
    let question = question.trim().to_string();
    if question.is_empty() {
        return Err(PaddleError::Validation(
            "Question cannot be empty".to_string(),
        ));
    }

    let upstreams = Upstreams::connect(config)?;
    let answerer = upstreams.answerer(config);
    let answer = blocking(move || answerer.answer(&question, &[])).await?;

    println!("{}", answer);
    Ok(())
}
