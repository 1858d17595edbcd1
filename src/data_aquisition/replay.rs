/*!
Offline acquisition from recorded device dumps.

A dump is a JSON document mapping each device address to the objects it
answered with, keyed by numeric OID:

```json
{
  "devices": {
    "10.0.12.1": {
      "objects": { "1.3.6.1.2.1.1.5.0": { "type": "text", "value": "R1" } },
      "silent": ["1.3.6.1.2.1.4.24.4.1"]
    }
  }
}
```

A device answers on its key and on every address listed in its
ipAdEntIfIndex rows, the way a router answers on any of its interfaces.
Objects below a `silent` prefix never answer, which lets a dump reproduce an
agent that drops requests. Addresses missing from the dump behave like
unreachable hosts.
*/

use std::{collections::BTreeMap, net::Ipv4Addr, path::Path, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::QueryPolicy,
    data_aquisition::{
        core::{Connector, QueryClient, QueryError, QueryResult, QueryRow, QueryValue},
        oids,
        retry::RetryingClient,
    },
    network::address::Address,
};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read dump: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed dump: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed OID {0:?} in dump")]
    Oid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceDump {
    #[serde(default)]
    pub objects: BTreeMap<String, QueryValue>,
    #[serde(default)]
    pub silent: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDump {
    pub devices: BTreeMap<Address, DeviceDump>,
}

fn parse_components(oid: &str) -> Option<Vec<u64>> {
    oid.trim_start_matches('.')
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

/// One recorded device with its objects sorted in OID order.
#[derive(Debug)]
struct RecordedDevice {
    objects: Vec<(Vec<u64>, QueryValue)>,
    silent: Vec<Vec<u64>>,
}

impl RecordedDevice {
    fn from_dump(dump: DeviceDump) -> Result<Self, ReplayError> {
        let mut objects = dump
            .objects
            .into_iter()
            .map(|(oid, value)| {
                parse_components(&oid)
                    .map(|parts| (parts, value))
                    .ok_or(ReplayError::Oid(oid))
            })
            .collect::<Result<Vec<_>, _>>()?;
        objects.sort_by(|a, b| a.0.cmp(&b.0));
        let silent = dump
            .silent
            .into_iter()
            .map(|oid| parse_components(&oid).ok_or(ReplayError::Oid(oid)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { objects, silent })
    }

    /// Local addresses taken from the recorded ipAdEntIfIndex rows.
    fn bound_addresses(&self) -> Vec<Address> {
        let Some(column) = parse_components(oids::IP_AD_ENT_IF_INDEX) else {
            return Vec::new();
        };
        self.objects
            .iter()
            .filter_map(|(oid, _)| oid.strip_prefix(column.as_slice()))
            .filter_map(|index| match index {
                [a, b, c, d] => {
                    let octets = [*a, *b, *c, *d].map(|o| u8::try_from(o).ok());
                    match octets {
                        [Some(a), Some(b), Some(c), Some(d)] => Some(Address::from(Ipv4Addr::new(a, b, c, d))),
                        _ => None,
                    }
                }
                _ => None,
            })
            .collect()
    }

    fn is_silent(&self, oid: &[u64]) -> bool {
        self.silent.iter().any(|prefix| oid.starts_with(prefix))
    }
}

/// Query client answering from a [`RecordedDevice`].
pub struct ReplayClient {
    address: Address,
    device: Option<Arc<RecordedDevice>>,
}

impl ReplayClient {
    fn device(&self) -> QueryResult<&RecordedDevice> {
        self.device.as_deref().ok_or_else(|| QueryError::Transport {
            address: self.address,
            message: "no response from host".to_string(),
        })
    }

    async fn hang_if_silent(&self, device: &RecordedDevice, oid: &[u64]) {
        if device.is_silent(oid) {
            debug!(address = %self.address, "replayed agent drops this request");
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl QueryClient for ReplayClient {
    fn address(&self) -> Address {
        self.address
    }

    async fn get(&self, oid: &str) -> QueryResult<QueryValue> {
        let device = self.device()?;
        let parts = parse_components(oid).ok_or_else(|| QueryError::InvalidOid(oid.to_string()))?;
        self.hang_if_silent(device, &parts).await;
        device
            .objects
            .binary_search_by(|(candidate, _)| candidate.as_slice().cmp(parts.as_slice()))
            .map(|i| device.objects[i].1.clone())
            .map_err(|_| QueryError::NoSuchObject {
                address: self.address,
                oid: oid.to_string(),
            })
    }

    /// A recorded subtree is always served as a single page.
    async fn walk_page(&self, prefix: &str, after: Option<&str>) -> QueryResult<Vec<QueryRow>> {
        let device = self.device()?;
        let root = parse_components(prefix).ok_or_else(|| QueryError::InvalidOid(prefix.to_string()))?;
        let after = match after {
            Some(index) => parse_components(index).ok_or_else(|| QueryError::InvalidOid(index.to_string()))?,
            None => Vec::new(),
        };
        self.hang_if_silent(device, &root).await;
        Ok(device
            .objects
            .iter()
            .filter(|(oid, _)| oid.len() > root.len() && oid.starts_with(&root))
            .filter(|(oid, _)| &oid[root.len()..] > after.as_slice())
            .map(|(oid, value)| {
                let index = oid[root.len()..]
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                QueryRow::new(index, value.clone())
            })
            .collect())
    }
}

/// Hands out [`ReplayClient`]s for the devices of a [`NetworkDump`].
pub struct ReplayConnector {
    devices: BTreeMap<Address, Arc<RecordedDevice>>,
    policy: QueryPolicy,
}

impl ReplayConnector {
    pub fn new(dump: NetworkDump) -> Result<Self, ReplayError> {
        let recorded = dump
            .devices
            .into_iter()
            .map(|(address, device)| Ok((address, Arc::new(RecordedDevice::from_dump(device)?))))
            .collect::<Result<Vec<_>, ReplayError>>()?;

        let mut devices = BTreeMap::new();
        for (_, device) in &recorded {
            for alias in device.bound_addresses() {
                devices.entry(alias).or_insert_with(|| Arc::clone(device));
            }
        }
        // Explicit keys win over aliases
        for (address, device) in recorded {
            devices.insert(address, device);
        }
        Ok(Self {
            devices,
            policy: QueryPolicy::default(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn with_policy(mut self, policy: QueryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self, address: Address) -> ReplayClient {
        ReplayClient {
            address,
            device: self.devices.get(&address).cloned(),
        }
    }
}

#[async_trait]
impl Connector for ReplayConnector {
    async fn connect(&self, address: Address) -> QueryResult<Arc<dyn QueryClient>> {
        Ok(Arc::new(RetryingClient::new(self.client(address), self.policy)))
    }
}
