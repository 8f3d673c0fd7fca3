//! Operational status snapshot.
//!
//! Combines uptime, memory counters, runtime facts and raw dependency
//! connectivity. Connectivity is probed here independently of the health
//! aggregator, so the two endpoints may briefly disagree while a dependency
//! is flapping.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::dependency::{DependencyHandle, DependencyKind};
use crate::memory::{self, MemoryStats};

/// Host and build facts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFacts {
    /// Release of this service binary, not of the toolchain that built it
    pub service_version: String,
    pub env: String,
    /// Logical CPUs available to the process
    pub num_cpu: usize,
    pub os: String,
    pub arch: String,
}

impl RuntimeFacts {
    pub fn current(environment: &str) -> Self {
        Self {
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            env: environment.to_string(),
            num_cpu: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub service: String,
    pub status: &'static str,
    /// Seconds since startup
    pub uptime: f64,
    pub memory: MemoryStats,
    pub environment: RuntimeFacts,
    pub connections: BTreeMap<DependencyKind, bool>,
    pub timestamp: String,
}

/// Build a fresh snapshot. Every handle is probed once.
pub async fn report(
    service: &ServiceConfig,
    handles: &[DependencyHandle],
    started_at: Instant,
) -> StatusSnapshot {
    let probes = handles.iter().map(|handle| async move {
        let connected = handle.is_configured() && handle.probe().await.is_ok();
        (handle.kind(), connected)
    });
    let connections = join_all(probes).await.into_iter().collect();

    StatusSnapshot {
        service: service.name.clone(),
        status: "running",
        uptime: started_at.elapsed().as_secs_f64(),
        memory: memory::snapshot(),
        environment: RuntimeFacts::current(&service.environment),
        connections,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}
