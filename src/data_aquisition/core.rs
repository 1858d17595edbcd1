use std::{net::Ipv4Addr, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snmp2::Value;
use thiserror::Error;

use crate::network::address::{Address, ParseError};

/// Replacement for the snmp2::Value type due to lifetime shenanigans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QueryValue {
    Integer(i64),           // ifType, ifOperStatus, ipCidrRouteType, ipAdEntIfIndex
    IpAddress(Ipv4Addr),    // ipAdEntNetMask, ipCidrRouteDest/Mask/NextHop, ospfNbrIpAddr
    Text(String),           // sysName, ifDescr
    Counter32(u32),
    Unsigned32(u32),        // ifSpeed (Gauge32)
    Timeticks(u32),
    Counter64(u64),
    Unknown,
}

impl From<&Value<'_>> for QueryValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Integer(i) => QueryValue::Integer(*i),
            Value::IpAddress(ip) => QueryValue::IpAddress(Ipv4Addr::from(*ip)),
            Value::OctetString(s) => QueryValue::Text(String::from_utf8_lossy(s).to_string()),
            Value::Counter32(c) => QueryValue::Counter32(*c),
            Value::Unsigned32(u) => QueryValue::Unsigned32(*u),
            Value::Timeticks(t) => QueryValue::Timeticks(*t),
            Value::Counter64(c) => QueryValue::Counter64(*c),
            _ => QueryValue::Unknown,
        }
    }
}

impl QueryValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            QueryValue::Counter32(v) | QueryValue::Unsigned32(v) | QueryValue::Timeticks(v) => {
                Some(i64::from(*v))
            }
            QueryValue::Counter64(v) => i64::try_from(*v).ok(),
            QueryValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Rendering used for names and descriptions.
    pub fn as_text(&self) -> String {
        match self {
            QueryValue::Integer(i) => i.to_string(),
            QueryValue::IpAddress(ip) => ip.to_string(),
            QueryValue::Text(s) => s.clone(),
            QueryValue::Counter32(v) | QueryValue::Unsigned32(v) | QueryValue::Timeticks(v) => {
                v.to_string()
            }
            QueryValue::Counter64(v) => v.to_string(),
            QueryValue::Unknown => String::new(),
        }
    }

    /// Agents report addresses either as IpAddress or as dotted OctetStrings.
    pub fn as_address(&self) -> Result<Address, ParseError> {
        match self {
            QueryValue::IpAddress(ip) => Ok(Address::from(*ip)),
            other => other.as_text().parse(),
        }
    }
}

/// One row of an enumeration: the identifier suffix below the walked prefix and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub index: String,
    pub value: QueryValue,
}

impl QueryRow {
    pub fn new(index: impl Into<String>, value: QueryValue) -> Self {
        Self {
            index: index.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("transport error talking to {address}: {message}")]
    Transport { address: Address, message: String },
    #[error("query for {oid} on {address} timed out after {attempts} attempt(s)")]
    Timeout {
        address: Address,
        oid: String,
        attempts: u32,
    },
    #[error("{address} has no object {oid}")]
    NoSuchObject { address: Address, oid: String },
    #[error("unexpected value for {oid}: {value:?}")]
    WrongType { oid: String, value: QueryValue },
    #[error("malformed identifier {0}")]
    InvalidOid(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl QueryError {
    /// Errors worth another attempt; missing objects and bad values will not change.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::Transport { .. } | QueryError::Timeout { .. })
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Represents a client that can read attributes from one network device.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Address of the device this client talks to.
    fn address(&self) -> Address;
    /// Reads a single scalar.
    async fn get(&self, oid: &str) -> QueryResult<QueryValue>;
    /// Next batch of objects below `prefix`, starting after the row indexed `after`.
    /// An empty batch ends the enumeration.
    async fn walk_page(&self, prefix: &str, after: Option<&str>) -> QueryResult<Vec<QueryRow>>;

    /// Enumerates every object below `prefix` in identifier order.
    async fn walk(&self, prefix: &str) -> QueryResult<Vec<QueryRow>> {
        let mut rows: Vec<QueryRow> = Vec::new();
        loop {
            let after = rows.last().map(|row| row.index.clone());
            let page = self.walk_page(prefix, after.as_deref()).await?;
            if page.is_empty() {
                return Ok(rows);
            }
            rows.extend(page);
        }
    }
}

/// Opens query clients for device addresses found during discovery.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, address: Address) -> QueryResult<Arc<dyn QueryClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversion_from_snmp() {
        let ip = Value::IpAddress([10, 0, 0, 1]);
        assert_eq!(
            QueryValue::from(&ip),
            QueryValue::IpAddress(Ipv4Addr::new(10, 0, 0, 1))
        );
        let name = Value::OctetString(b"R1");
        assert_eq!(QueryValue::from(&name), QueryValue::Text("R1".into()));
        assert_eq!(QueryValue::from(&Value::Null), QueryValue::Unknown);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(QueryValue::Unsigned32(100_000_000).as_integer(), Some(100_000_000));
        assert_eq!(QueryValue::Text(" 24 ".into()).as_integer(), Some(24));
        assert_eq!(QueryValue::Unknown.as_integer(), None);
        assert_eq!(
            QueryValue::Text("255.255.255.0".into()).as_address().unwrap(),
            "255.255.255.0".parse().unwrap()
        );
        assert!(QueryValue::Text("GigabitEthernet0/0".into()).as_address().is_err());
    }

    #[test]
    fn test_value_json_shape() {
        let v: QueryValue = serde_json::from_str(r#"{"type":"ip_address","value":"10.0.0.1"}"#).unwrap();
        assert_eq!(v, QueryValue::IpAddress(Ipv4Addr::new(10, 0, 0, 1)));
        let v: QueryValue = serde_json::from_str(r#"{"type":"text","value":"R1"}"#).unwrap();
        assert_eq!(v.as_text(), "R1");
    }
}
