use crate::classifier::Classifier;
use crate::config::AppConfig;
use crate::evaluator::{Evaluation, Evaluator};
use crate::retrieval::VectorIndexRetriever;
use crate::scanner::{Scan, ScanItem};
use crate::vulns::VulnerabilityChecker;
use anyhow::Context;
use providers::ollama::{OllamaConfig, OllamaProvider};
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::osv::{OsvClient, OsvConfig};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::{GenerateOptions, ProviderRegistry};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com";

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let chat = OllamaProvider::new(OllamaConfig {
        base_url: config.llm.base_url.clone(),
        embedding_model: config.embeddings.model.clone(),
        chat_model: config.llm.model.clone(),
    });
    let embed = OllamaProvider::new(OllamaConfig {
        base_url: config.embeddings.base_url.clone(),
        embedding_model: config.embeddings.model.clone(),
        chat_model: config.llm.model.clone(),
    });
    let mut reg = ProviderRegistry::new()
        .with_llm("ollama", Arc::new(chat))
        .with_embedding("ollama", Arc::new(embed));

    if let Some(key) = std::env::var_os("OPENAI_API_KEY") {
        let base = std::env::var("OPENAI_BASE_URL")
            .ok()
            .or_else(|| (config.llm.provider == "openai").then(|| config.llm.base_url.clone()))
            .unwrap_or_else(|| OPENAI_DEFAULT_BASE.to_string());
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base,
            embedding_model: config.embeddings.model.clone(),
            chat_model: config.llm.model.clone(),
        });
        reg = reg
            .with_embedding("openai", Arc::new(provider.clone()))
            .with_llm("openai", Arc::new(provider));
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
        .set_preferred_llm(&config.llm.provider)
}

pub fn build_retriever(
    config: &AppConfig,
    registry: &ProviderRegistry,
) -> anyhow::Result<VectorIndexRetriever> {
    let embedder = registry
        .embedding(None)
        .context("embedding provider")?;
    let index = QdrantClient::new(QdrantConfig {
        url: config.vectors.url.clone(),
        collection: config.vectors.collection.clone(),
        api_key: std::env::var("QDRANT_API_KEY").ok(),
    });
    Ok(VectorIndexRetriever::new(embedder, index))
}

/// One classifier per run; its retrieval and model handles are shared by every file.
pub fn build_classifier(config: &AppConfig) -> anyhow::Result<Classifier> {
    let registry = build_registry(config);
    let retriever = build_retriever(config, &registry)?;
    let llm = registry.llm(None).context("llm provider")?;
    info!(
        llm = %config.llm.provider,
        model = %config.llm.model,
        collection = %config.vectors.collection,
        k = config.classification.k,
        fallback = ?config.classification.fallback,
        "classifier ready"
    );
    Ok(Classifier::new(
        Arc::new(retriever),
        llm,
        config.classification.fallback,
        config.classification.k,
    )
    .with_options(GenerateOptions {
        temperature: config.llm.temperature,
    }))
}

pub fn build_vuln_checker(config: &AppConfig) -> anyhow::Result<VulnerabilityChecker> {
    let registry = build_registry(config);
    let llm = registry.llm(None).context("llm provider")?;
    let osv = OsvClient::new(OsvConfig {
        base_url: config.vulns.osv_url.clone(),
    });
    Ok(VulnerabilityChecker::new(Arc::new(osv), llm).with_options(GenerateOptions {
        temperature: config.llm.temperature,
    }))
}

/// Scans `root` and scores every prediction against its path-derived label.
/// `on_item` sees each result as it resolves.
pub async fn evaluate_tree(
    classifier: &Classifier,
    root: &Path,
    excludes: &[String],
    evaluator: Evaluator,
    mut on_item: impl FnMut(&ScanItem),
) -> anyhow::Result<Evaluation> {
    let mut evaluator = evaluator;
    let mut scan = Scan::new(classifier, root, excludes)?;
    while let Some(item) = scan.next().await {
        let item = item?;
        on_item(&item);
        evaluator.record(&item.path, item.category())?;
    }
    let evaluation = evaluator.finish();
    info!(
        total = evaluation.total,
        correct = evaluation.correct,
        "evaluation complete"
    );
    Ok(evaluation)
}
