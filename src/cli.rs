use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Parser, ValueEnum};
use snmp2::Version;

use crate::{
    config::{DEFAULT_MAX_REPETITIONS, DEFAULT_SNMP_PORT, ExplorerConfig, QueryPolicy, SnmpAcquisitionConfig, SourceSpec},
    network::address::Address,
};

/// Seed used by `--all` when no address is given: the agent on this machine.
pub const LOCAL_AGENT: Address = Address::from_bits(0x7f00_0001);

/// Output target meaning "standard output".
pub const STDOUT: &str = "-";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl From<SnmpVersion> for Version {
    fn from(value: SnmpVersion) -> Self {
        match value {
            SnmpVersion::V1 => Version::V1,
            SnmpVersion::V2c => Version::V2C,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ospf-discovery")]
#[command(about = "Discovers a routed IPv4 network over SNMP by following OSPF neighbors.")]
pub struct Cli {
    /// Address of the first router to query
    #[arg(short, long, value_name = "ADDR")]
    pub seed: Option<Address>,

    /// SNMP community string
    #[arg(short, long, default_value = "public")]
    pub community: String,

    #[arg(long = "snmp-version", value_enum, default_value_t = SnmpVersion::V2c)]
    pub snmp_version: SnmpVersion,

    #[arg(short, long, default_value_t = DEFAULT_SNMP_PORT)]
    pub port: u16,

    /// Rows requested per GetBulk request (v2c)
    #[arg(long, default_value_t = DEFAULT_MAX_REPETITIONS)]
    pub max_repetitions: u32,

    /// Time allowed for a single query attempt (e.g. "2s", "500ms")
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Extra attempts for a query that timed out or failed in transport
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Devices queried at the same time
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Stop discovery after this long and report what was found
    #[arg(long, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Answer queries from a recorded JSON dump instead of the network
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// List every discovered network with its routers
    #[arg(long)]
    pub print_networks: bool,

    /// List every discovered router with its interfaces and routing table
    #[arg(long)]
    pub print_routers: bool,

    /// Write the topology as Graphviz DOT (stdout when FILE is omitted)
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = STDOUT)]
    pub render: Option<PathBuf>,

    /// Write the topology as JSON (stdout when FILE is omitted)
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = STDOUT)]
    pub json: Option<PathBuf>,

    /// Print the shortest path between two addresses
    #[arg(long, num_args = 2, value_names = ["ORIGIN", "DEST"])]
    pub path: Option<Vec<Address>>,

    /// Print networks, routers and the DOT rendering; seeds from 127.0.0.1 without --seed
    #[arg(short, long)]
    pub all: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// `None` means the invocation is a usage error.
    pub fn seed_address(&self) -> Option<Address> {
        self.seed.or(self.all.then_some(LOCAL_AGENT))
    }

    pub fn snmp_config(&self) -> SnmpAcquisitionConfig {
        SnmpAcquisitionConfig {
            port: self.port,
            community: self.community.clone(),
            snmp_version: self.snmp_version.into(),
            max_repetitions: self.max_repetitions,
        }
    }

    pub fn query_policy(&self) -> QueryPolicy {
        QueryPolicy {
            timeout: self.timeout,
            retries: self.retries,
            ..QueryPolicy::default()
        }
    }

    pub fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            concurrency: self.concurrency,
            deadline: self.deadline,
        }
    }

    pub fn source(&self) -> SourceSpec {
        match &self.replay {
            Some(path) => SourceSpec::Replay(path.clone()),
            None => SourceSpec::Snmp(self.snmp_config()),
        }
    }

    pub fn wants_networks(&self) -> bool {
        self.print_networks || self.all
    }

    /// Routers are listed when nothing else was asked for.
    pub fn wants_routers(&self) -> bool {
        self.print_routers
            || self.all
            || !(self.print_networks || self.render.is_some() || self.json.is_some() || self.path.is_some())
    }

    pub fn render_target(&self) -> Option<PathBuf> {
        self.render
            .clone()
            .or_else(|| self.all.then(|| PathBuf::from(STDOUT)))
    }

    pub fn path_query(&self) -> Option<(Address, Address)> {
        match self.path.as_deref() {
            Some([origin, destination]) => Some((*origin, *destination)),
            _ => None,
        }
    }
}
