//! # Coliseum Mesh Node
//!
//! Runs one host or client on the mesh and logs what it hears.
//!
//! ## Usage
//!
//! ```bash
//! mesh_node --host --port 50007 --data-dir SavedGames
//! mesh_node --peer 10.0.0.7:50007 --duration 30
//! mesh_node --config node.toml
//! ```

use std::process::ExitCode;
use std::time::{Duration, Instant};

use coliseum_ledger::{FileIdentityDirectory, Ledger};
use coliseum_networking::{MeshConfig, MeshError, MeshNode, MeshResult, PeerAddress, Role};
use tracing_subscriber::EnvFilter;

/// Main loop cadence.
const TICK: Duration = Duration::from_millis(16);

/// Seconds between status lines.
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

struct Args {
    config: MeshConfig,
    duration: Option<Duration>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         COLISEUM MESH NODE                                       ║");
    println!("║         NO SERVERS. EVERY NODE ROUTES.                           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args = match parse_args(std::env::args().skip(1).collect()) {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bad arguments");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "node stopped");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> MeshResult<Option<Args>> {
    let mut config = MeshConfig::default();
    let mut duration = None;
    let mut host = false;
    let mut port = None;
    let mut peer = None;
    let mut data_dir = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or_else(|| missing("--config"))?;
                config = MeshConfig::load(path)?;
            }
            "--host" => host = true,
            "--port" | "-p" => {
                let value = iter.next().ok_or_else(|| missing("--port"))?;
                port = Some(value.parse::<u16>().map_err(|e| MeshError::InvalidConfig(format!("--port: {e}")))?);
            }
            "--peer" => {
                let value = iter.next().ok_or_else(|| missing("--peer"))?;
                peer = Some(parse_peer(&value)?);
            }
            "--data-dir" | "-d" => {
                data_dir = Some(iter.next().ok_or_else(|| missing("--data-dir"))?);
            }
            "--duration" => {
                let value = iter.next().ok_or_else(|| missing("--duration"))?;
                let secs = value
                    .parse::<u64>()
                    .map_err(|e| MeshError::InvalidConfig(format!("--duration: {e}")))?;
                duration = Some(Duration::from_secs(secs));
            }
            "--help" | "-h" => {
                println!("Usage: mesh_node [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>        TOML config (flags below override it)");
                println!("      --host                 Run as host (default: client)");
                println!("  -p, --port <PORT>          Host port / discovery port (default: 50007)");
                println!("      --peer <HOST:PORT>     Peer a client talks to");
                println!("  -d, --data-dir <DIR>       Directory for nodes.json and ledger files");
                println!("      --duration <SECS>      Run for N seconds then exit");
                println!("  -h, --help                 Show this help");
                return Ok(None);
            }
            other => {
                return Err(MeshError::InvalidConfig(format!("unknown argument: {other}")));
            }
        }
    }

    // Flags override the file
    if host {
        config.role = Role::Host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(peer) = peer {
        config.peer_address = Some(peer);
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir.into();
    }
    config.validate()?;

    Ok(Some(Args { config, duration }))
}

fn missing(flag: &str) -> MeshError {
    MeshError::InvalidConfig(format!("{flag} needs a value"))
}

fn parse_peer(value: &str) -> MeshResult<PeerAddress> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| MeshError::InvalidConfig(format!("--peer expects HOST:PORT, got {value}")))?;
    let port = port
        .parse()
        .map_err(|e| MeshError::InvalidConfig(format!("--peer port: {e}")))?;
    Ok(PeerAddress::new(host, port))
}

fn run(args: &Args) -> MeshResult<()> {
    let mut node = MeshNode::bind(&args.config)?;
    let data = args.config.data();
    node.attach_ledger(Ledger::open(&data, FileIdentityDirectory::in_data_dir(&data)));

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Role:               {:?}", node.role());
    println!("│ Local Address:      {}", node.local_addr());
    println!("│ Peer:               {:?}", node.peer());
    println!("│ Data Dir:           {}", args.config.data_dir.display());
    println!("│ Chain Length:       {}", node.ledger().map_or(0, |l| l.chain().len()));
    match args.duration {
        Some(d) => println!("│ Duration:           {} seconds", d.as_secs()),
        None => println!("│ Duration:           infinite"),
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    if let Some(peer) = node.peer() {
        node.announce(peer)?;
        node.join_router(peer)?;
        node.request_chain(peer)?;
    }

    let start = Instant::now();
    let mut last_status = start;

    loop {
        if args.duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }

        for (from, payload) in node.poll() {
            tracing::info!(%from, fields = payload.len(), "payload received");
        }
        node.process_reliable();

        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            let stats = node.stats();
            tracing::info!(
                uptime_s = start.elapsed().as_secs(),
                clients = node.clients().len(),
                games = node.known_games().len(),
                live_clients = node.live_clients().len(),
                pending_acks = node.reliability().pending_count(),
                sent = stats.packets_sent,
                received = stats.packets_received,
                dropped = stats.dropped,
                resent = stats.resent,
                "status"
            );
        }

        std::thread::sleep(TICK);
    }

    let stats = node.stats();
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                        FINAL STATISTICS                          ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║ Packets Sent:       {:>10}                                   ║", stats.packets_sent);
    println!("║ Packets Received:   {:>10}                                   ║", stats.packets_received);
    println!("║ Bytes Sent:         {:>10}                                   ║", stats.bytes_sent);
    println!("║ Bytes Received:     {:>10}                                   ║", stats.bytes_received);
    println!("║ Send Errors:        {:>10}                                   ║", stats.send_errors);
    println!("║ Dropped:            {:>10}                                   ║", stats.dropped);
    println!("║ Resent:             {:>10}                                   ║", stats.resent);
    println!("╚══════════════════════════════════════════════════════════════════╝");

    Ok(())
}
