use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub vectors: VectorConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub scan: ScanPaths,
    #[serde(default)]
    pub vulns: VulnConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub url: String,
    pub collection: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "CodeSamples".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnConfig {
    pub osv_url: String,
}

impl Default for VulnConfig {
    fn default() -> Self {
        Self {
            osv_url: providers::osv::OSV_DEFAULT_URL.to_string(),
        }
    }
}

/// What to do when the neighbor vote is split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    FreeText,
    ToolCall,
    /// Label every split vote `NOCRYPTO` without calling the model.
    NoCrypto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Neighbors per query; constant for the whole run.
    pub k: usize,
    pub fallback: FallbackPolicy,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            k: 4,
            fallback: FallbackPolicy::FreeText,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanPaths {
    #[serde(default)]
    pub exclude: Vec<String>,
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("CRYPTOSCAN")
            .separator("__")
            .try_parsing(true),
    );
    let cfg = settings.build()?;
    let app: AppConfig = cfg.try_deserialize()?;
    if app.classification.k == 0 {
        anyhow::bail!("classification.k must be at least 1");
    }
    Ok(app)
}
