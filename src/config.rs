use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 69);
pub const DEFAULT_PORT: u16 = 4403;

/// Open intervals a manual fallback value must fall inside before it is reported.
///
/// These bounds are heuristics, not wire-format facts; they live here so they can be
/// tuned from the config file without touching the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityThresholds {
    pub voltage_min: f32,
    pub voltage_max: f32,
    pub temperature_min: f32,
    pub temperature_max: f32,
}

impl Default for PlausibilityThresholds {
    fn default() -> Self {
        Self {
            voltage_min: 0.0,
            voltage_max: 10.0,
            temperature_min: -50.0,
            temperature_max: 100.0,
        }
    }
}

impl PlausibilityThresholds {
    pub fn plausible_voltage(&self, v: f32) -> bool {
        v > self.voltage_min && v < self.voltage_max
    }

    pub fn plausible_temperature(&self, t: f32) -> bool {
        t > self.temperature_min && t < self.temperature_max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub multicast_group: Ipv4Addr,
    pub port: u16,
    /// Upper bound on a single blocking receive, so a stop request is seen promptly.
    pub recv_timeout_ms: u64,
    pub recv_buffer_size: usize,
    pub capture_dir: Option<PathBuf>,
    pub stats_interval_secs: Option<u64>,
    pub thresholds: PlausibilityThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_MULTICAST_GROUP,
            port: DEFAULT_PORT,
            recv_timeout_ms: 1000,
            recv_buffer_size: 4096,
            capture_dir: None,
            stats_interval_secs: None,
            thresholds: PlausibilityThresholds::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms.max(1))
    }
}
