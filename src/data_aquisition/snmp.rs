use std::{net::SocketAddr, str::FromStr, sync::Arc};

use async_trait::async_trait;
use snmp2::{AsyncSession, MessageType, Oid, Value, Version};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::{
    config::{QueryPolicy, SnmpAcquisitionConfig},
    data_aquisition::{
        core::{Connector, QueryClient, QueryError, QueryResult, QueryRow, QueryValue},
        retry::RetryingClient,
    },
    network::address::Address,
};

/// SNMP client for retrieving data from a single network device.
///
/// The session is opened lazily on the first query and reused afterwards.
/// Timeouts and retries are applied by the wrapping [`RetryingClient`].
pub struct SnmpClient {
    address: SocketAddr,
    device: Address,
    community: String,
    snmp_version: Version,
    max_repetitions: u32,
    session: Mutex<Option<AsyncSession>>,
}

impl SnmpClient {
    /// Creates a new SNMP client for a single network device.
    pub fn new(device: Address, config: &SnmpAcquisitionConfig) -> Self {
        Self {
            address: SocketAddr::new(std::net::Ipv4Addr::from(device).into(), config.port),
            device,
            community: config.community.clone(),
            snmp_version: config.snmp_version,
            max_repetitions: config.max_repetitions.max(1),
            session: Mutex::new(None),
        }
    }

    async fn open_session(&self) -> QueryResult<AsyncSession> {
        let session = match self.snmp_version {
            Version::V1 => AsyncSession::new_v1(self.address, self.community.as_bytes(), 0).await,
            Version::V2C => AsyncSession::new_v2c(self.address, self.community.as_bytes(), 0).await,
            _ => {
                return Err(QueryError::Transport {
                    address: self.device,
                    message: "only SNMP v1 and v2c are supported".to_string(),
                });
            }
        };
        session.map_err(|e| QueryError::Transport {
            address: self.device,
            message: e.to_string(),
        })
    }

    /// Start building a new query.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder {
            client: self,
            oid: None,
            operation: None,
            non_repeaters: 0,
            max_repetitions: 0,
        }
    }
}

/// A varbind from a response. `None` marks endOfMibView / noSuchObject / noSuchInstance.
type Varbind = (Oid<'static>, Option<QueryValue>);

pub struct QueryBuilder<'c> {
    client: &'c SnmpClient,
    oid: Option<Oid<'static>>,
    operation: Option<MessageType>,
    non_repeaters: u32,
    max_repetitions: u32,
}

impl QueryBuilder<'_> {
    pub fn get(mut self) -> Self {
        self.operation = Some(MessageType::GetRequest);
        self
    }

    pub fn get_next(mut self) -> Self {
        self.operation = Some(MessageType::GetNextRequest);
        self
    }

    pub fn get_bulk(mut self, non_repeaters: u32, max_repetitions: u32) -> Self {
        self.operation = Some(MessageType::GetBulkRequest);
        self.non_repeaters = non_repeaters;
        self.max_repetitions = max_repetitions;
        self
    }

    pub fn oid(mut self, oid: Oid<'static>) -> Self {
        self.oid = Some(oid);
        self
    }

    pub fn oid_str(self, oid_str: &str) -> QueryResult<Self> {
        Ok(self.oid(parse_oid(oid_str)?))
    }

    pub async fn execute(self) -> QueryResult<Vec<Varbind>> {
        let (Some(operation), Some(oid)) = (self.operation, self.oid) else {
            return Err(QueryError::InvalidOid("query built without operation or oid".into()));
        };
        let client = self.client;
        let (non_repeaters, max_repetitions) = (self.non_repeaters, self.max_repetitions);
        {
            let mut guard = client.session.lock().await;
            if guard.is_none() {
                debug!(address = %client.device, "opening SNMP session");
                *guard = Some(client.open_session().await?);
            }
            let Some(session) = guard.as_mut() else {
                return Err(QueryError::Transport {
                    address: client.device,
                    message: "session unavailable".into(),
                });
            };

            let transport = |e: snmp2::Error| QueryError::Transport {
                address: client.device,
                message: format!("{e:?}"),
            };

            let response = match operation {
                MessageType::GetRequest => session.get(&oid).await.map_err(transport)?,
                MessageType::GetNextRequest => session.getnext(&oid).await.map_err(transport)?,
                MessageType::GetBulkRequest => session
                    .getbulk(&[&oid], non_repeaters, max_repetitions)
                    .await
                    .map_err(transport)?,
                _ => return Err(QueryError::InvalidOid(format!("unsupported operation for {oid}"))),
            };

            // Convert while the session buffer is still borrowed
            let varbinds: Vec<Varbind> = response
                .varbinds
                .map(|(oid, value)| {
                    let value = match value {
                        Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => None,
                        other => Some(QueryValue::from(&other)),
                    };
                    (oid.to_owned(), value)
                })
                .collect();
            Ok(varbinds)
        }
    }
}

fn parse_oid(oid: &str) -> QueryResult<Oid<'static>> {
    Oid::from_str(oid).map_err(|_| QueryError::InvalidOid(oid.to_string()))
}

fn components(oid: &Oid<'_>) -> QueryResult<Vec<u64>> {
    oid.iter()
        .map(|iter| iter.collect())
        .ok_or_else(|| QueryError::InvalidOid(oid.to_string()))
}

#[async_trait]
impl QueryClient for SnmpClient {
    fn address(&self) -> Address {
        self.device
    }

    async fn get(&self, oid: &str) -> QueryResult<QueryValue> {
        trace!(address = %self.device, oid, "get");
        let varbinds = self.query().oid_str(oid)?.get().execute().await?;
        match varbinds.into_iter().next() {
            Some((_, Some(value))) => Ok(value),
            _ => Err(QueryError::NoSuchObject {
                address: self.device,
                oid: oid.to_string(),
            }),
        }
    }

    /// One GetBulk PDU (GetNext on v1) below `prefix`.
    async fn walk_page(&self, prefix: &str, after: Option<&str>) -> QueryResult<Vec<QueryRow>> {
        trace!(address = %self.device, prefix, ?after, "walk page");
        let root_parts = components(&parse_oid(prefix)?)?;
        let cursor = match after {
            Some(index) => parse_oid(&format!("{prefix}.{index}"))?,
            None => parse_oid(prefix)?,
        };
        let mut last = components(&cursor)?;

        let builder = self.query().oid(cursor);
        let builder = match self.snmp_version {
            Version::V1 => builder.get_next(),
            _ => builder.get_bulk(0, self.max_repetitions),
        };
        let mut rows = Vec::new();
        for (oid, value) in builder.execute().await? {
            let Some(value) = value else { break };
            let current = components(&oid)?;
            // Agents that do not move forward would loop forever
            if !current.starts_with(&root_parts) || current <= last {
                break;
            }
            let index = current[root_parts.len()..]
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(".");
            rows.push(QueryRow::new(index, value));
            last = current;
        }
        debug!(address = %self.device, prefix, rows = rows.len(), "walk page received");
        Ok(rows)
    }
}

/// Opens one [`SnmpClient`] per device, wrapped in the retry policy.
pub struct SnmpConnector {
    config: SnmpAcquisitionConfig,
    policy: QueryPolicy,
}

impl SnmpConnector {
    pub fn new(config: SnmpAcquisitionConfig, policy: QueryPolicy) -> Self {
        Self { config, policy }
    }
}

#[async_trait]
impl Connector for SnmpConnector {
    async fn connect(&self, address: Address) -> QueryResult<Arc<dyn QueryClient>> {
        let client = SnmpClient::new(address, &self.config);
        Ok(Arc::new(RetryingClient::new(client, self.policy)))
    }
}
