//! Mock collaborators for testing.

use async_trait::async_trait;
use inventory_core::{EnrichedResult, Error, Finding, Result, ResultStore, Severity};
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stream::{EntryId, LogBounds, LogEntry, StreamLog};
use worker::{compare_versions, VulnerabilityOracle};

/// Oracle with canned answers.
///
/// Fails every lookup for `nginx` below 1.20.0 and returns one finding for
/// everything else. Tracks how many lookups run at once.
#[derive(Default)]
pub struct StubOracle {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Option<Duration>,
}

impl StubOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every lookup take `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most lookups observed in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VulnerabilityOracle for StubOracle {
    async fn lookup_vulnerabilities(&self, name: &str, version: &str) -> Result<Vec<Finding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if name == "nginx" && compare_versions(version, "1.20.0") == CmpOrdering::Less {
            return Err(Error::enrichment(name, version, "vulnerability service rejected lookup"));
        }

        Ok(vec![Finding::new(
            format!("CVE-TEST-{}", name),
            Severity::Medium,
            5.0,
        )])
    }
}

/// Oracle that fails a fixed number of times per package before answering.
pub struct FlakyOracle {
    failures_per_package: usize,
    seen: Mutex<HashMap<String, usize>>,
}

impl FlakyOracle {
    pub fn new(failures_per_package: usize) -> Self {
        Self {
            failures_per_package,
            seen: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VulnerabilityOracle for FlakyOracle {
    async fn lookup_vulnerabilities(&self, name: &str, version: &str) -> Result<Vec<Finding>> {
        let attempt = {
            let mut seen = self.seen.lock();
            let count = seen.entry(format!("{}@{}", name, version)).or_insert(0);
            *count += 1;
            *count
        };

        if attempt <= self.failures_per_package {
            return Err(Error::enrichment(name, version, "connection reset"));
        }
        Ok(Vec::new())
    }
}

/// Result store that rejects every write.
#[derive(Clone, Default)]
pub struct FailingStore {
    attempts: Arc<AtomicUsize>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultStore for FailingStore {
    async fn persist(&self, _results: &[EnrichedResult]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::persist("result store unavailable"))
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}

/// Log whose broker is unreachable.
pub struct UnavailableLog;

#[async_trait]
impl StreamLog for UnavailableLog {
    async fn append(&self, _entry: LogEntry) -> Result<EntryId> {
        Err(Error::append("broker unreachable"))
    }

    async fn read(
        &self,
        _from: EntryId,
        _max_count: usize,
        _block: Duration,
    ) -> Result<Vec<(EntryId, LogEntry)>> {
        Err(Error::read("broker unreachable"))
    }

    async fn trim(&self, _max_len: u64) -> Result<u64> {
        Err(Error::trim("broker unreachable"))
    }

    async fn bounds(&self) -> Result<LogBounds> {
        Err(Error::read("broker unreachable"))
    }

    fn backend(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_oracle_fails_old_nginx_only() {
        let oracle = StubOracle::new();

        assert!(oracle.lookup_vulnerabilities("nginx", "1.18.0").await.is_err());
        assert_eq!(
            oracle.lookup_vulnerabilities("nginx", "1.20.1").await.unwrap().len(),
            1
        );
        assert_eq!(oracle.lookup_vulnerabilities("curl", "7.0").await.unwrap().len(), 1);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn test_flaky_oracle_recovers() {
        let oracle = FlakyOracle::new(2);

        assert!(oracle.lookup_vulnerabilities("curl", "8.0").await.is_err());
        assert!(oracle.lookup_vulnerabilities("curl", "8.0").await.is_err());
        assert!(oracle.lookup_vulnerabilities("curl", "8.0").await.is_ok());
    }
}
