//! Vulnerability reports consumed by the pull policy.

use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use db::artifact;
use derive_more::Display;
use tokio::sync::RwLock;

use crate::{manifest::ARTIFACT_TYPE_IMAGE, project::CveAllowlist, Error};

/// Vulnerability severity, ordered from the least to the most severe.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    None,
    Unknown,
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Severity::None),
            "unknown" => Ok(Severity::Unknown),
            "negligible" => Ok(Severity::Negligible),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(Error::bad_request(format!("unknown severity {s}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vulnerability {
    pub id: String,
    pub severity: Severity,
}

impl Vulnerability {
    pub fn new(id: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            severity,
        }
    }
}

#[async_trait]
pub trait VulnerabilityChecker: Send + Sync {
    /// Check if the scanner supports the artifact.
    async fn is_scannable(&self, artifact: &artifact::Model) -> Result<bool, Error>;

    /// Get the vulnerabilities found in the artifact.
    ///
    /// Returns `None` if the artifact was never scanned.
    async fn vulnerabilities(
        &self,
        artifact: &artifact::Model,
    ) -> Result<Option<Vec<Vulnerability>>, Error>;
}

/// Vulnerabilities at or above the threshold that the allow-list doesn't cover.
pub fn violations<'a>(
    vulnerabilities: &'a [Vulnerability],
    threshold: Severity,
    allowlist: &CveAllowlist,
) -> Vec<&'a Vulnerability> {
    vulnerabilities
        .iter()
        .filter(|vulnerability| vulnerability.severity >= threshold)
        .filter(|vulnerability| !allowlist.contains(&vulnerability.id))
        .collect()
}

/// Scan reports kept in memory, keyed by artifact digest.
#[derive(Default)]
pub struct ReportStore {
    reports: RwLock<HashMap<String, Vec<Vulnerability>>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, digest: impl Into<String>, vulnerabilities: Vec<Vulnerability>) {
        self.reports
            .write()
            .await
            .insert(digest.into(), vulnerabilities);
    }
}

#[async_trait]
impl VulnerabilityChecker for ReportStore {
    async fn is_scannable(&self, artifact: &artifact::Model) -> Result<bool, Error> {
        Ok(artifact.artifact_type == ARTIFACT_TYPE_IMAGE)
    }

    async fn vulnerabilities(
        &self,
        artifact: &artifact::Model,
    ) -> Result<Option<Vec<Vulnerability>>, Error> {
        Ok(self.reports.read().await.get(&artifact.digest).cloned())
    }
}
