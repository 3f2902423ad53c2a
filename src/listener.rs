// Multicast receive loop for live traffic.
use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::orchestrator::{PacketOrchestrator, PacketReport};

/// Binds the group port with address reuse, joins the group, and sets a bounded read timeout.
pub fn bind_multicast(config: &MonitorConfig) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("creating UDP socket")?;
    socket.set_reuse_address(true).context("setting SO_REUSEADDR")?;
    #[cfg(unix)]
    socket.set_reuse_port(true).context("setting SO_REUSEPORT")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
    socket
        .bind(&SocketAddr::V4(bind_addr).into())
        .with_context(|| format!("binding {}", bind_addr))?;
    socket
        .join_multicast_v4(&config.multicast_group, &Ipv4Addr::UNSPECIFIED)
        .with_context(|| format!("joining multicast group {}", config.multicast_group))?;
    socket
        .set_read_timeout(Some(config.recv_timeout()))
        .context("setting read timeout")?;

    info!("Listening on {}:{}", config.multicast_group, config.port);
    Ok(socket.into())
}

/// Consecutive hard receive errors tolerated before the loop gives up.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Tracks back-to-back receive failures. Any successful receive resets it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveBackoff {
    consecutive: u32,
}

impl ReceiveBackoff {
    /// Delay before the next receive, or `None` once the error limit is reached.
    pub fn on_error(&mut self) -> Option<Duration> {
        self.consecutive += 1;
        if self.consecutive >= MAX_CONSECUTIVE_ERRORS {
            return None;
        }
        Some(Duration::from_millis(50 * (1u64 << self.consecutive.min(5))))
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Receives until `running` is cleared, handing each report to `on_report`.
///
/// Hard receive errors back off; after `MAX_CONSECUTIVE_ERRORS` in a row the loop stops.
pub fn run_live<F>(
    socket: &UdpSocket,
    orchestrator: &mut PacketOrchestrator,
    running: &Arc<AtomicBool>,
    buffer_size: usize,
    mut on_report: F,
) -> u64
where
    F: FnMut(&PacketReport),
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut received = 0u64;
    let mut backoff = ReceiveBackoff::default();

    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                backoff.reset();
                received += 1;
                let report = orchestrator.handle_live(&buf[..len], source);
                on_report(&report);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => match backoff.on_error() {
                Some(delay) => {
                    warn!("Receive error ({} in a row): {}", backoff.consecutive(), e);
                    thread::sleep(delay);
                }
                None => {
                    error!("Receive failed {} times in a row, stopping: {}", backoff.consecutive(), e);
                    break;
                }
            },
        }
    }

    info!("Receive loop stopped after {} datagrams", received);
    orchestrator.shutdown();
    received
}
