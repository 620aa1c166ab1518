use crate::config::FallbackPolicy;
use crate::consensus::unanimous_vote;
use crate::disambiguator::{Disambiguator, FreeText, Resolution, ToolCall};
use crate::error::ClassifyError;
use crate::retrieval::{RawNeighbors, Retriever};
use crate::taxonomy::{self, Category};
use crate::vote::QueryResult;
use providers::{GenerateOptions, LlmProvider};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a label came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every neighbor agreed.
    Unanimous(String),
    /// The vote split and the model settled it.
    Disambiguated(Resolution),
    /// The vote split and the policy assigns a fixed label without asking.
    Defaulted(Category),
}

impl Outcome {
    pub fn label(&self) -> String {
        match self {
            Outcome::Unanimous(category) => category.clone(),
            Outcome::Disambiguated(resolution) => resolution.label(),
            Outcome::Defaulted(category) => category.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    /// Normalized label, as printed and evaluated.
    pub category: String,
}

impl From<Outcome> for Classification {
    fn from(outcome: Outcome) -> Self {
        let category = taxonomy::normalize(&outcome.label()).to_string();
        Self { outcome, category }
    }
}

/// Explicit context for one run: the shared retrieval and model handles plus
/// the vote size and fallback policy.
pub struct Classifier {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmProvider>,
    disambiguator: Option<Box<dyn Disambiguator>>,
    k: usize,
    opts: GenerateOptions,
}

impl Classifier {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmProvider>,
        policy: FallbackPolicy,
        k: usize,
    ) -> Self {
        let disambiguator: Option<Box<dyn Disambiguator>> = match policy {
            FallbackPolicy::FreeText => Some(Box::new(FreeText)),
            FallbackPolicy::ToolCall => Some(Box::new(ToolCall)),
            FallbackPolicy::NoCrypto => None,
        };
        Self {
            retriever,
            llm,
            disambiguator,
            k,
            opts: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: GenerateOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Raw neighbors for `text`, without voting.
    pub async fn neighbors(&self, text: &str) -> Result<RawNeighbors, ClassifyError> {
        Ok(self.retriever.query(text, self.k).await?)
    }

    pub async fn classify_text(&self, text: &str) -> Result<Classification, ClassifyError> {
        let raw = self.neighbors(text).await?;
        if raw.ids.len() != self.k {
            warn!(
                expected = self.k,
                returned = raw.ids.len(),
                "retriever returned a different number of neighbors than requested"
            );
        }
        let result = QueryResult::from_raw(text, raw)?;
        self.decide(&result).await.map(Classification::from)
    }

    /// Gate first; only a split vote reaches the model.
    pub async fn decide(&self, result: &QueryResult) -> Result<Outcome, ClassifyError> {
        if let Some(category) = unanimous_vote(result) {
            debug!(category, k = result.k(), "unanimous vote");
            return Ok(Outcome::Unanimous(category.to_string()));
        }
        let Some(disambiguator) = &self.disambiguator else {
            return Ok(Outcome::Defaulted(Category::NoCrypto));
        };
        debug!(
            strategy = disambiguator.name(),
            split = ?result.distinct_categories(),
            "vote split, asking model"
        );
        let resolution = disambiguator
            .resolve(self.llm.as_ref(), result, self.opts)
            .await?;
        Ok(Outcome::Disambiguated(resolution))
    }
}
