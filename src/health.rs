//! Composite health aggregation.
//!
//! Each configured dependency is probed and contributes a severity; the
//! overall status is the worst contribution. The relational store is a hard
//! dependency, so its failure makes the service `Unhealthy`. The cache is
//! best-effort: its failure caps at `Degraded`. Unconfigured dependencies
//! contribute nothing.

use std::collections::BTreeMap;
use std::fmt;

use futures::future::join_all;
use serde::{Serialize, Serializer};

use crate::dependency::{DependencyHandle, DependencyKind, ProbeResult};

/// Service severity, ordered `Healthy < Degraded < Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Severity {
    /// Only `Unhealthy` is reported as unavailable to HTTP clients.
    pub fn is_unavailable(self) -> bool {
        self == Severity::Unhealthy
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Healthy => f.write_str("healthy"),
            Severity::Degraded => f.write_str("degraded"),
            Severity::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// Severity a failed probe of this kind contributes.
pub fn failure_severity(kind: DependencyKind) -> Severity {
    match kind {
        DependencyKind::RelationalStore => Severity::Unhealthy,
        DependencyKind::CacheStore => Severity::Degraded,
    }
}

/// Per-dependency state as shown in the health payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckState {
    Healthy,
    Unhealthy(String),
    NotConfigured,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Healthy => f.write_str("healthy"),
            CheckState::Unhealthy(cause) => write!(f, "unhealthy: {}", cause),
            CheckState::NotConfigured => f.write_str("not configured"),
        }
    }
}

impl Serialize for CheckState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<ProbeResult> for CheckState {
    fn from(result: ProbeResult) -> Self {
        match result {
            ProbeResult::Ok => CheckState::Healthy,
            ProbeResult::Failed { cause } => CheckState::Unhealthy(cause),
            ProbeResult::NotConfigured => CheckState::NotConfigured,
        }
    }
}

/// Composite health result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    #[serde(rename = "status")]
    pub overall: Severity,
    pub checks: BTreeMap<DependencyKind, CheckState>,
}

impl HealthStatus {
    pub fn check(&self, kind: DependencyKind) -> Option<&CheckState> {
        self.checks.get(&kind)
    }
}

/// Probe every handle and fold the results into one [`HealthStatus`].
pub async fn aggregate(handles: &[DependencyHandle]) -> HealthStatus {
    let probes = handles.iter().map(|handle| async move {
        let result = handle.probe().await;
        (handle.kind(), result)
    });
    let results = join_all(probes).await;

    let mut overall = Severity::Healthy;
    let mut checks = BTreeMap::new();
    for (kind, result) in results {
        if let ProbeResult::Failed { .. } = result {
            overall = overall.max(failure_severity(kind));
        }
        checks.insert(kind, CheckState::from(result));
    }

    HealthStatus { overall, checks }
}
