use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use clap::{CommandFactory, error::ErrorKind};
use ospf_discovery::{
    cli::{Cli, STDOUT},
    logging,
    topology::{Explorer, PathFinder, render::TopologyGraph, report},
};
use tokio::sync::watch;
use tracing::{info, warn};

fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new(STDOUT) {
        Ok(Box::new(io::stdout().lock()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let Some(seed) = cli.seed_address() else {
        Cli::command()
            .error(ErrorKind::MissingRequiredArgument, "a --seed address is required unless --all is given")
            .exit();
    };

    let connector = cli
        .source()
        .build_connector(cli.query_policy())
        .context("could not set up query source")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping discovery");
            let _ = cancel_tx.send(true);
        }
    });

    let topology = Explorer::new(connector, cli.explorer_config())
        .with_cancellation(cancel_rx)
        .explore(seed)
        .await
        .with_context(|| format!("discovery from {seed} failed"))?;

    let partial = topology.partial_routers().count();
    info!(
        routers = topology.routers().len(),
        networks = topology.networks().count(),
        partial,
        "topology ready"
    );

    let mut stdout = io::stdout().lock();
    if cli.wants_networks() {
        report::write_networks(&topology, &mut stdout)?;
        writeln!(stdout)?;
    }
    if cli.wants_routers() {
        report::write_routers(&topology, &mut stdout)?;
    }
    if let Some((origin, destination)) = cli.path_query() {
        match PathFinder::new(&topology).shortest_path(origin, destination) {
            Ok(path) => report::write_path(&path, destination, &mut stdout)?,
            Err(reason) => writeln!(stdout, "No path from {origin} to {destination}: {reason}")?,
        }
    }
    stdout.flush()?;
    drop(stdout);

    if let Some(target) = cli.render_target() {
        let mut out = open_output(&target).with_context(|| format!("cannot write {}", target.display()))?;
        writeln!(out, "{}", TopologyGraph::build(&topology).to_dot())?;
        out.flush()?;
    }
    if let Some(target) = &cli.json {
        let mut out = open_output(target).with_context(|| format!("cannot write {}", target.display()))?;
        writeln!(out, "{}", topology.to_json()?)?;
        out.flush()?;
    }

    if topology.is_interrupted() {
        warn!("discovery was interrupted, the topology is incomplete");
    }
    Ok(())
}
