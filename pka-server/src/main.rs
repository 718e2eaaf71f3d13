use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pka_agent::KnowledgeAgent;
use pka_model::{OpenAIClient, OpenAIConfig};
use pka_rag::{
    ContextRetriever, KnowledgePipeline, OpenAIEmbeddingConfig, OpenAIEmbeddingProvider, RagConfig,
};
use pka_server::{AppState, Settings, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::parse();

    let llm_config = match &settings.openai_api_base {
        Some(base) => OpenAIConfig::compatible(settings.openai_api_key.clone(), base.clone()),
        None => OpenAIConfig::new(settings.openai_api_key.clone()),
    };
    let llm = Arc::new(OpenAIClient::new(llm_config).context("building generation backend")?);

    let retriever = match &settings.corpus_dir {
        Some(corpus_dir) => Some(Arc::new(
            build_retriever(&settings, corpus_dir).await.context("building corpus index")?,
        )),
        None => {
            info!("no corpus directory configured, retrieval disabled");
            None
        }
    };

    let mut builder =
        KnowledgeAgent::builder().llm(llm).context_top_k(settings.top_k);
    if let Some(retriever) = retriever {
        builder = builder.retriever(retriever);
    }
    let agent = Arc::new(builder.build().context("building agent")?);

    let app = router(AppState::new(agent, settings.model.clone()));
    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, model = %settings.model, "serving");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Build (or reload) the corpus index and wrap it in a retriever.
async fn build_retriever(
    settings: &Settings,
    corpus_dir: &std::path::Path,
) -> anyhow::Result<ContextRetriever> {
    let mut embed_config = OpenAIEmbeddingConfig::new(settings.openai_api_key.clone())
        .with_model(settings.embedding_model.clone());
    if let Some(base) = &settings.openai_api_base {
        embed_config = embed_config.with_base_url(base.clone());
    }
    let provider = Arc::new(OpenAIEmbeddingProvider::new(embed_config)?);

    let config = RagConfig::builder()
        .chunk_size(settings.chunk_size)
        .chunk_overlap(settings.chunk_overlap)
        .top_k(settings.top_k)
        .build()?;
    let pipeline =
        KnowledgePipeline::builder().config(config).embedding_provider(provider).build()?;

    let index = match &settings.index_path {
        Some(index_path) => pipeline.load_or_build(corpus_dir, index_path).await?,
        None => pipeline.index_directory(corpus_dir).await?,
    };
    info!(entries = index.len(), "corpus index ready");

    Ok(pipeline.retriever(index))
}
