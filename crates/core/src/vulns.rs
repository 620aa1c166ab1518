//! Checking a dependency's known vulnerabilities against one algorithm.
//!
//! The package's advisories come from OSV; each one's summary and details are
//! put to the model as a yes/no question, and only a bare `yes` keeps it.

use providers::osv::OsvClient;
pub use providers::osv::Vulnerability;
use providers::{GenerateOptions, LlmProvider, ProviderError};
use std::sync::Arc;
use tracing::{debug, info};

/// OSV ecosystem for a project language. Anything unrecognized is treated as
/// a JavaScript project.
pub fn ecosystem_for_language(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "python" => "PyPI",
        "java" => "Maven",
        _ => "npm",
    }
}

#[async_trait::async_trait]
pub trait VulnSource: Send + Sync {
    async fn package_vulns(
        &self,
        name: &str,
        ecosystem: &str,
    ) -> Result<Vec<Vulnerability>, ProviderError>;

    async fn details(&self, id: &str) -> Result<Vulnerability, ProviderError>;
}

#[async_trait::async_trait]
impl VulnSource for OsvClient {
    async fn package_vulns(
        &self,
        name: &str,
        ecosystem: &str,
    ) -> Result<Vec<Vulnerability>, ProviderError> {
        self.query_package(name, ecosystem).await
    }

    async fn details(&self, id: &str) -> Result<Vulnerability, ProviderError> {
        self.vulnerability(id).await
    }
}

pub struct VulnerabilityChecker {
    source: Arc<dyn VulnSource>,
    llm: Arc<dyn LlmProvider>,
    opts: GenerateOptions,
}

impl VulnerabilityChecker {
    pub fn new(source: Arc<dyn VulnSource>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            source,
            llm,
            opts: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: GenerateOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Advisories for `package` that the model judges to affect `algorithm`,
    /// in the order OSV lists them. One detail fetch and one model call per
    /// advisory; the first failure ends the check.
    pub async fn affecting(
        &self,
        package: &str,
        language: &str,
        algorithm: &str,
    ) -> Result<Vec<Vulnerability>, ProviderError> {
        let ecosystem = ecosystem_for_language(language);
        let listed = self.source.package_vulns(package, ecosystem).await?;
        debug!(package, ecosystem, count = listed.len(), "osv advisories");

        let mut kept = Vec::new();
        for entry in listed {
            let vuln = self.source.details(&entry.id).await?;
            let prompt = vulnerability_prompt(package, &vuln, algorithm);
            let answer = self.llm.generate(&prompt, self.opts).await?;
            info!(id = %vuln.id, answer = %answer.trim(), "advisory checked");
            if is_yes(&answer) {
                kept.push(vuln);
            }
        }
        Ok(kept)
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

pub fn vulnerability_prompt(package: &str, vuln: &Vulnerability, algorithm: &str) -> String {
    format!(
        "The package {package} was found a vulnerability in the OSV database.\n\
         The vulnerability is described as follows:\n\n\
         Summary: {summary}\n\
         Details: {details}\n\n\
         Does the vulnerability affect the algorithm {algorithm}?\n\
         Output a single word and only a single word: 'yes' or 'no'.\n",
        summary = vuln.summary.as_deref().unwrap_or(""),
        details = vuln.details.as_deref().unwrap_or(""),
    )
}
