//! Plain-text listings of a discovered topology.

use std::io::{self, Write};

use crate::{
    network::{address::Address, router::Router},
    topology::store::Topology,
};

/// One line per canonical network with the routers recorded on it.
pub fn write_networks(topology: &Topology, out: &mut impl Write) -> io::Result<()> {
    for network in topology.networks() {
        let hosts: Vec<String> = network
            .hosts()
            .iter()
            .map(|h| {
                let addresses: Vec<String> = h.addresses().map(|a| a.to_string()).collect();
                format!("{} ({})", h.router, addresses.join(", "))
            })
            .collect();
        writeln!(out, "{network}, Hosts: {}", hosts.join(", "))?;
    }
    Ok(())
}

/// Router details followed by its routing table.
pub fn write_router(router: &Router, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{router}")?;
    for failure in &router.failures {
        writeln!(out, "  Incomplete {}: {}", failure.step, failure.reason)?;
    }
    if router.routes.is_empty() {
        return Ok(());
    }
    writeln!(out, "  Routing table:")?;
    for route in &router.routes {
        writeln!(out, "    {route}")?;
    }
    let summary: Vec<String> = router.routes.iter().map(|r| r.destination.to_string()).collect();
    writeln!(out, "  Destinations: {}", summary.join(" "))
}

pub fn write_routers(topology: &Topology, out: &mut impl Write) -> io::Result<()> {
    for router in topology.routers() {
        write_router(router, out)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Hop list of a path, or the reason there is none.
pub fn write_path(path: &[&Router], destination: Address, out: &mut impl Write) -> io::Result<()> {
    let hops: Vec<String> = path.iter().map(|r| r.id.to_string()).collect();
    writeln!(out, "Path to {destination}: {}", hops.join(" -> "))
}
