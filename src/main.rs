use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tokio::runtime::Builder;

use lsr_router::config::{NamesFile, TopologyFile};
use lsr_router::control_server::ControlServer;
use lsr_router::network::{AddressBook, TcpTransport};
use lsr_router::{Router, RouterConfig};

#[derive(Parser)]
#[command(name = "lsr-router", about = "Link-state routing daemon")]
struct Cli {
    /// Identifier of this node in the topology
    #[arg(long, env = "LSR_NODE")]
    node: String,

    /// Topology file ({"type": "topo", "config": {...}})
    #[arg(long, env = "LSR_TOPOLOGY")]
    topology: PathBuf,

    /// Names file mapping node ids to host:port
    #[arg(long)]
    names: Option<PathBuf>,

    /// Router configuration file; defaults are derived from the topology
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 8000)]
    base_port: u16,

    #[arg(long)]
    control_port: Option<u16>,

    /// Seconds between LSP generations
    #[arg(long)]
    lsp_interval: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let topology = TopologyFile::load(&cli.topology)?;
    let mut config = match &cli.config {
        Some(path) => RouterConfig::load(path)
            .with_context(|| format!("loading router config {}", path.display()))?,
        None => RouterConfig::from_topology(&cli.node, &topology)?,
    };
    config.check_node_id(&cli.node)?;
    if let Some(secs) = cli.lsp_interval {
        config.timers.lsp_interval_secs = secs;
    }
    config.validate()?;

    let book = match &cli.names {
        Some(path) => NamesFile::load(path)?.to_address_book()?,
        None => AddressBook::sequential(&topology.nodes(), cli.base_port),
    };
    info!("Starting {} with {} known addresses", config.node_id, book.len());

    let rt = Builder::new_multi_thread().enable_all().build()?;

    rt.block_on(async {
        let transport = TcpTransport::new(&config.node_id, book, config.timers.connect_timeout());
        let router = Router::new(config, transport);

        if let Err(e) = router.start().await {
            error!("Startup failed: {}", e);
            return Err(anyhow::Error::from(e));
        }

        if let Some(port) = cli.control_port {
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
            let control = ControlServer::new(addr, router.clone());
            tokio::spawn(async move {
                if let Err(e) = control.start().await {
                    error!("Control server failed: {}", e);
                }
            });
        }

        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received, stopping {}", router.id());
                if let Err(e) = router.stop().await {
                    warn!("{}", e);
                }
            }
            _ = router.wait_stopped() => {
                info!("{} stopped through the control interface", router.id());
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
