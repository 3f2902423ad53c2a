//! Mesh Monitor - listens to mesh-radio UDP multicast traffic, decrypts what it can,
//! and prints every packet. Can also capture raw traffic and replay it later.

use anyhow::Context;
use clap::Parser;
use mesh_udp_monitor::config::MonitorConfig;
use mesh_udp_monitor::format::{describe_hops, format_capture_time, format_rssi, format_snr, hex_dump};
use mesh_udp_monitor::keys::KeyCatalog;
use mesh_udp_monitor::listener::{bind_multicast, run_live};
use mesh_udp_monitor::monitor::TrafficMonitor;
use mesh_udp_monitor::nodes::NodeDirectory;
use mesh_udp_monitor::orchestrator::{PacketOrchestrator, PacketReport};
use mesh_udp_monitor::parser::envelope::Envelope;
use mesh_udp_monitor::replay::{ReplaySource, Replayer, REPLAY_SOURCE};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Print full packet details and a hex dump
    #[arg(short, long)]
    verbose: bool,

    /// Print one JSON object per packet
    #[arg(long)]
    json: bool,

    /// Directory for daily raw capture logs
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Replay a capture file, a directory of captures, or `-` for stdin
    #[arg(long)]
    replay: Option<String>,

    /// Multicast group to join
    #[arg(long)]
    group: Option<Ipv4Addr>,

    /// UDP port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print statistics every N seconds
    #[arg(long)]
    stats_interval: Option<u64>,
}

struct Printer {
    verbose: bool,
    json: bool,
    nodes: Arc<NodeDirectory>,
}

impl Printer {
    fn print(&self, report: &PacketReport) {
        if self.json {
            println!("{}", report.to_json());
            return;
        }

        println!(
            "[{}] Packet #{} from {} ({} bytes)",
            format_capture_time(report.timestamp),
            report.number,
            report.source,
            report.size
        );

        let Some(envelope) = &report.envelope else {
            println!("  Envelope: unparseable ({})", report.envelope_error.as_deref().unwrap_or("unknown"));
            if self.verbose {
                println!("{}", hex_dump(&report.raw, 16));
            }
            println!();
            return;
        };

        self.print_envelope(envelope);

        if let Some(attempt) = &report.decryption {
            println!("  Decryption: {}", attempt.status_line(envelope.channel_hash));
            if self.verbose {
                if let Some(index) = attempt.candidate_index {
                    println!("  Key Index: {} of {} tried", index, attempt.attempts_tried);
                }
            }
        }

        if let Some(decoded) = &report.decoded {
            for (label, value) in decoded.fields.iter() {
                println!("  {}: {}", label, value);
            }
        }

        if self.verbose {
            println!("  Raw:");
            println!("{}", hex_dump(&report.raw, 16));
        }
        println!();
    }

    fn print_envelope(&self, envelope: &Envelope) {
        let to = if envelope.is_broadcast() {
            "broadcast".to_string()
        } else {
            self.nodes.display_name(envelope.dest)
        };
        println!(
            "  From: {} -> To: {} | Channel: {} | ID: 0x{:08x}",
            self.nodes.display_name(envelope.sender),
            to,
            envelope.channel_hash,
            envelope.packet_id
        );

        let mut signal = Vec::new();
        if let Some(hops) = describe_hops(envelope.hop_limit, envelope.hop_start) {
            signal.push(hops);
        }
        if envelope.rssi != 0 {
            signal.push(format!("RSSI: {}", format_rssi(envelope.rssi)));
        }
        if envelope.snr != 0.0 {
            signal.push(format!("SNR: {}", format_snr(envelope.snr)));
        }
        if !signal.is_empty() {
            println!("  {}", signal.join(" | "));
        }

        if self.verbose {
            let priority = envelope
                .priority_level()
                .map(|p| p.as_str_name().to_string())
                .unwrap_or_else(|| envelope.priority.to_string());
            println!(
                "  Priority: {} | Want ACK: {} | Via MQTT: {}",
                priority, envelope.want_ack, envelope.via_mqtt
            );
        }
    }
}

fn spawn_stats_reporter(monitor: Arc<TrafficMonitor>, running: Arc<AtomicBool>, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs.max(1));
    thread::spawn(move || {
        let mut waited = Duration::ZERO;
        while running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(250));
            waited += Duration::from_millis(250);
            if waited >= interval {
                waited = Duration::ZERO;
                println!("{}", monitor.render());
            }
        }
    });
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    // 1. Config: file first, flags on top
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(group) = args.group {
        config.multicast_group = group;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.capture.is_some() {
        config.capture_dir = args.capture.clone();
    }
    if args.stats_interval.is_some() {
        config.stats_interval_secs = args.stats_interval;
    }

    // 2. Shared state
    let catalog = KeyCatalog::new();
    info!("Key catalog ready: {} keys ({} per sweep)", catalog.len(), catalog.total_candidates());

    let monitor = Arc::new(TrafficMonitor::new());
    let nodes = Arc::new(NodeDirectory::new());
    let mut orchestrator = PacketOrchestrator::new(catalog, config.thresholds)
        .with_monitor(Arc::clone(&monitor))
        .with_nodes(Arc::clone(&nodes));

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrlc = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\n[Shutdown] Stop signal received. Finishing current packet...");
        running_ctrlc.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    if let Some(secs) = config.stats_interval_secs {
        spawn_stats_reporter(Arc::clone(&monitor), Arc::clone(&running), secs);
    }

    let printer = Printer { verbose: args.verbose, json: args.json, nodes };

    // 3. Replay or live
    if let Some(arg) = &args.replay {
        let source = ReplaySource::from_arg(arg);
        let replayer = Replayer::new(Arc::clone(&running));
        let summary = replayer.replay(&source, |record| {
            let report = orchestrator.process(&record.payload, REPLAY_SOURCE, record.timestamp);
            printer.print(&report);
        })?;
        info!(
            "Replay finished: {} files ({} unreadable), {} records, {} skipped",
            summary.files, summary.failed_files, summary.records, summary.skipped
        );
    } else {
        if let Some(dir) = &config.capture_dir {
            orchestrator.start_capture(dir);
        }
        let socket = bind_multicast(&config)?;
        run_live(&socket, &mut orchestrator, &running, config.recv_buffer_size, |report| {
            printer.print(report)
        });
    }

    running.store(false, Ordering::SeqCst);
    orchestrator.shutdown();

    if !args.json {
        println!("{}", monitor.render());
    }
    Ok(())
}
