//! Numeric identifiers of the MIB objects read during discovery.

/// SNMPv2-MIB::sysName.0
pub const SYS_NAME: &str = "1.3.6.1.2.1.1.5.0";

/// IP-MIB::ipAdEntIfIndex, indexed by the local address
pub const IP_AD_ENT_IF_INDEX: &str = "1.3.6.1.2.1.4.20.1.2";
/// IP-MIB::ipAdEntNetMask, indexed by the local address
pub const IP_AD_ENT_NET_MASK: &str = "1.3.6.1.2.1.4.20.1.3";

// IF-MIB::ifTable columns, indexed by ifIndex
pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_TYPE: &str = "1.3.6.1.2.1.2.2.1.3";
pub const IF_SPEED: &str = "1.3.6.1.2.1.2.2.1.5";
pub const IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";

// IP-FORWARD-MIB::ipCidrRouteTable columns, indexed by dest.mask.tos.nexthop
pub const IP_CIDR_ROUTE_DEST: &str = "1.3.6.1.2.1.4.24.4.1.1";
pub const IP_CIDR_ROUTE_MASK: &str = "1.3.6.1.2.1.4.24.4.1.2";
pub const IP_CIDR_ROUTE_NEXT_HOP: &str = "1.3.6.1.2.1.4.24.4.1.4";
pub const IP_CIDR_ROUTE_TYPE: &str = "1.3.6.1.2.1.4.24.4.1.6";

/// OSPF-MIB::ospfNbrIpAddr
pub const OSPF_NBR_IP_ADDR: &str = "1.3.6.1.2.1.14.10.1.1";

/// IANAifType softwareLoopback
pub const IF_TYPE_SOFTWARE_LOOPBACK: i64 = 24;
/// ifOperStatus down
pub const IF_STATUS_DOWN: i64 = 2;

/// Column OID with a row index appended.
pub fn instance(column: &str, index: &str) -> String {
    format!("{column}.{index}")
}
