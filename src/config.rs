/*!
Runtime configuration for a discovery run.

- `SnmpAcquisitionConfig`: how to reach devices (port, community, version, bulk size).
- `QueryPolicy`: timeout and retry behaviour applied to every remote query.
- `ExplorerConfig`: crawl-wide limits (concurrency, deadline).
- `SourceSpec`: which acquisition backend to build connectors for.
*/

use std::{path::PathBuf, sync::Arc, time::Duration};

use snmp2::Version;

use crate::data_aquisition::{
    core::Connector,
    replay::{ReplayConnector, ReplayError},
    snmp::SnmpConnector,
};

pub const DEFAULT_SNMP_PORT: u16 = 161;
pub const DEFAULT_MAX_REPETITIONS: u32 = 32;

#[derive(Clone, Debug)]
pub struct SnmpAcquisitionConfig {
    pub port: u16,
    pub community: String,
    pub snmp_version: Version,
    /// Rows requested per GetBulk PDU.
    pub max_repetitions: u32,
}

impl Default for SnmpAcquisitionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SNMP_PORT,
            community: "public".to_string(),
            snmp_version: Version::V2C,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
        }
    }
}

/// Timeout and retry behaviour of a single remote query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryPolicy {
    pub timeout: Duration,
    /// Attempts after the first one.
    pub retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            retries: 2,
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(5),
        }
    }
}

impl QueryPolicy {
    /// Exponential backoff before retry number `attempt` (1-based), capped at `backoff_max`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }
}

#[derive(Clone, Debug)]
pub struct ExplorerConfig {
    /// Upper bound on devices being queried at the same time.
    pub concurrency: usize,
    /// Wall-clock limit for the whole crawl.
    pub deadline: Option<Duration>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            deadline: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum SourceSpec {
    Snmp(SnmpAcquisitionConfig),
    Replay(PathBuf),
}

impl SourceSpec {
    pub fn build_connector(&self, policy: QueryPolicy) -> Result<Arc<dyn Connector>, ReplayError> {
        match self {
            SourceSpec::Snmp(config) => Ok(Arc::new(SnmpConnector::new(config.clone(), policy))),
            SourceSpec::Replay(path) => {
                let connector = ReplayConnector::from_file(path)?.with_policy(policy);
                Ok(Arc::new(connector))
            }
        }
    }
}
