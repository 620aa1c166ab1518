use crate::{ensure_success, ProviderError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const OSV_DEFAULT_URL: &str = "https://api.osv.dev";

#[derive(Clone)]
pub struct OsvConfig {
    pub base_url: String,
}

impl Default for OsvConfig {
    fn default() -> Self {
        Self {
            base_url: OSV_DEFAULT_URL.to_string(),
        }
    }
}

/// Client for the OSV vulnerability database.
#[derive(Clone)]
pub struct OsvClient {
    client: Client,
    cfg: OsvConfig,
}

impl OsvClient {
    pub fn new(cfg: OsvConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    /// Vulnerabilities recorded for a package, as summary entries.
    pub async fn query_package(
        &self,
        name: &str,
        ecosystem: &str,
    ) -> Result<Vec<Vulnerability>, ProviderError> {
        #[derive(Serialize)]
        struct Package<'a> {
            name: &'a str,
            ecosystem: &'a str,
        }
        #[derive(Serialize)]
        struct QueryRequest<'a> {
            package: Package<'a>,
        }
        let body = QueryRequest {
            package: Package { name, ecosystem },
        };
        let resp = self
            .client
            .post(self.url("/v1/query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let parsed: QueryResponse = read_json(resp).await?;
        Ok(parsed.vulns)
    }

    /// Full record for one vulnerability id.
    pub async fn vulnerability(&self, id: &str) -> Result<Vulnerability, ProviderError> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/vulns/{}", id)))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        read_json(resp).await
    }
}

async fn read_json<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ProviderError> {
    let resp = ensure_success(resp).await?;
    resp.json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

/// An empty match comes back as `{}`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub vulns: Vec<Vulnerability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub affected: Vec<Affected>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affected {
    #[serde(default)]
    pub package: Option<AffectedPackage>,
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedPackage {
    pub name: String,
    pub ecosystem: String,
}

impl Vulnerability {
    /// Whether `version` is listed among the explicitly affected versions.
    pub fn lists_version(&self, version: &str) -> bool {
        self.affected
            .iter()
            .any(|a| a.versions.iter().any(|v| v == version))
    }
}
