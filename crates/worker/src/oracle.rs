//! Vulnerability lookups for inventory records.
//!
//! `HttpOracle` calls the enrichment service; `CachedOracle` wraps any
//! oracle with a read-through moka cache keyed by (name, version).

use async_trait::async_trait;
use inventory_core::{Error, Finding, Result, Severity};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Looks up known vulnerabilities for a package version.
#[async_trait]
pub trait VulnerabilityOracle: Send + Sync {
    async fn lookup_vulnerabilities(&self, name: &str, version: &str) -> Result<Vec<Finding>>;
}

#[derive(Debug, Serialize)]
struct SoftwareQuery<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    success: bool,
    #[serde(default)]
    data: Vec<SoftwareVulnerabilities>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SoftwareVulnerabilities {
    name: String,
    version: String,
    #[serde(default)]
    cves: Vec<CveInfo>,
}

#[derive(Debug, Deserialize)]
struct CveInfo {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    cvss_score: f64,
}

impl From<CveInfo> for Finding {
    fn from(cve: CveInfo) -> Self {
        Finding::new(
            cve.id,
            Severity::from_label_or_score(&cve.severity, cve.cvss_score),
            cve.cvss_score,
        )
        .with_description(cve.description)
    }
}

/// Picks the entry for the requested package, falling back to the first.
fn findings_from_response(
    response: EnrichResponse,
    name: &str,
    version: &str,
) -> Result<Vec<Finding>> {
    if !response.success {
        return Err(Error::enrichment(
            name,
            version,
            response
                .message
                .unwrap_or_else(|| "enrichment service reported failure".to_string()),
        ));
    }

    let mut data = response.data;
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let position = data
        .iter()
        .position(|s| s.name == name && s.version == version)
        .unwrap_or(0);

    Ok(data
        .swap_remove(position)
        .cves
        .into_iter()
        .map(Finding::from)
        .collect())
}

/// Compares dotted versions numerically, segment by segment.
///
/// Segments that are not numbers compare as strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Canned findings used when no enrichment service is configured.
fn simulated_findings(name: &str, version: &str) -> Vec<Finding> {
    if name.eq_ignore_ascii_case("nginx") && compare_versions(version, "1.20.0") == Ordering::Less {
        return vec![Finding::new("CVE-2021-23017", Severity::High, 8.1)
            .with_title("nginx resolver off-by-one")
            .with_description("1-byte memory overwrite in the nginx DNS resolver")];
    }
    Vec::new()
}

/// Oracle backed by the enrichment service's HTTP API.
///
/// An empty base URL or `"mock"` switches to canned findings.
pub struct HttpOracle {
    base_url: String,
    http_client: reqwest::Client,
    mock_mode: bool,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mock_mode = base_url.is_empty() || base_url == "mock";

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            mock_mode,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.mock_mode
    }

    async fn remote_lookup(&self, name: &str, version: &str) -> Result<Vec<Finding>> {
        let url = format!("{}/enrich/software", self.base_url);
        let request = [SoftwareQuery { name, version }];

        debug!(url = %url, name = name, version = version, "Calling enrichment service");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Enrichment request failed");
                Error::enrichment(name, version, format!("service unavailable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Enrichment service returned error");
            return Err(Error::enrichment(
                name,
                version,
                format!("service returned {}: {}", status, body),
            ));
        }

        let parsed: EnrichResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse enrichment response");
            Error::enrichment(name, version, format!("invalid response: {}", e))
        })?;

        findings_from_response(parsed, name, version)
    }
}

#[async_trait]
impl VulnerabilityOracle for HttpOracle {
    async fn lookup_vulnerabilities(&self, name: &str, version: &str) -> Result<Vec<Finding>> {
        if self.mock_mode {
            return Ok(simulated_findings(name, version));
        }
        self.remote_lookup(name, version).await
    }
}

/// Read-through cache in front of another oracle. Errors are not cached.
pub struct CachedOracle {
    inner: Arc<dyn VulnerabilityOracle>,
    cache: Cache<(String, String), Vec<Finding>>,
}

impl CachedOracle {
    pub fn new(inner: Arc<dyn VulnerabilityOracle>, ttl: Duration, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl VulnerabilityOracle for CachedOracle {
    async fn lookup_vulnerabilities(&self, name: &str, version: &str) -> Result<Vec<Finding>> {
        let key = (name.to_string(), version.to_string());

        if let Some(cached) = self.cache.get(&key).await {
            debug!(name = name, version = version, "Enrichment cache hit");
            return Ok(cached);
        }

        let findings = self.inner.lookup_vulnerabilities(name, version).await?;
        self.cache.insert(key, findings.clone()).await;
        Ok(findings)
    }
}
