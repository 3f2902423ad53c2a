use dashmap::DashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::decrypt::{Confidence, DecryptionAttempt, FailureKind};
use crate::format::format_node_id;

/// Running totals. Every read-modify-write happens under the monitor's lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounters {
    pub packets: u64,
    pub bytes: u64,
    pub plaintext: u64,
    pub decrypted: u64,
    pub partial: u64,
    pub undecryptable: u64,
    pub malformed: u64,
    pub capture_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficSnapshot {
    pub counters: TrafficCounters,
    pub elapsed: Duration,
}

impl TrafficSnapshot {
    pub fn packets_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.counters.packets as f64 / secs } else { 0.0 }
    }

    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.counters.bytes as f64 / secs } else { 0.0 }
    }

    /// Definite decryptions as a share of every encrypted packet seen.
    pub fn decrypt_rate(&self) -> f64 {
        let c = &self.counters;
        let encrypted = c.decrypted + c.partial + c.undecryptable;
        if encrypted > 0 { c.decrypted as f64 / encrypted as f64 * 100.0 } else { 0.0 }
    }
}

/// Distinct senders tracked before the leaderboard is reset.
pub const LEADERBOARD_CAP: usize = 100_000;

pub struct TrafficMonitor {
    counters: Mutex<TrafficCounters>,
    // Sender -> packets heard
    pub leaderboard: DashMap<u32, u64>,
    leaderboard_cap: usize,
    pub start_time: Instant,
}

impl Default for TrafficMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficMonitor {
    pub fn new() -> Self {
        Self::with_leaderboard_cap(LEADERBOARD_CAP)
    }

    pub fn with_leaderboard_cap(cap: usize) -> Self {
        Self {
            counters: Mutex::new(TrafficCounters::default()),
            leaderboard: DashMap::with_capacity(256),
            leaderboard_cap: cap.max(1),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrafficCounters> {
        self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_packet(&self, size: usize) {
        let mut c = self.lock();
        c.packets += 1;
        c.bytes += size as u64;
    }

    pub fn record_sender(&self, sender: u32) {
        // Reset once the cap is reached.
        if self.leaderboard.len() >= self.leaderboard_cap && !self.leaderboard.contains_key(&sender) {
            self.leaderboard.clear();
        }
        *self.leaderboard.entry(sender).or_insert(0) += 1;
    }

    pub fn record_plaintext(&self) {
        self.lock().plaintext += 1;
    }

    pub fn record_decryption(&self, attempt: &DecryptionAttempt) {
        let mut c = self.lock();
        match (attempt.confidence, attempt.failure) {
            (Some(Confidence::Definite), _) => c.decrypted += 1,
            (Some(Confidence::Partial), _) => c.partial += 1,
            (None, Some(FailureKind::MalformedCiphertext)) => c.malformed += 1,
            _ => c.undecryptable += 1,
        }
    }

    pub fn record_malformed(&self) {
        self.lock().malformed += 1;
    }

    pub fn record_capture_error(&self) {
        self.lock().capture_errors += 1;
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot { counters: *self.lock(), elapsed: self.start_time.elapsed() }
    }

    /// Busiest senders, most packets first.
    pub fn top_senders(&self, n: usize) -> Vec<(u32, u64)> {
        let mut board: Vec<_> = self.leaderboard.iter().map(|kv| (*kv.key(), *kv.value())).collect();
        board.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        board.truncate(n);
        board
    }

    /// Multi-line statistics block.
    pub fn render(&self) -> String {
        let snap = self.snapshot();
        let c = &snap.counters;
        let mut out = String::new();

        // 1. Totals
        out.push_str("=== Traffic Statistics ===\n");
        out.push_str(&format!("Runtime:        {:.1}s\n", snap.elapsed.as_secs_f64()));
        out.push_str(&format!("Total packets:  {}\n", c.packets));
        out.push_str(&format!("Total bytes:    {}\n", c.bytes));
        out.push_str(&format!(
            "Rates:          {:.2} packets/sec, {:.1} bytes/sec\n",
            snap.packets_per_sec(),
            snap.bytes_per_sec()
        ));

        // 2. Decryption breakdown
        out.push_str(&format!(
            "Payloads:       {} plaintext | {} decrypted | {} partial | {} undecryptable | {} malformed\n",
            c.plaintext, c.decrypted, c.partial, c.undecryptable, c.malformed
        ));
        out.push_str(&format!("Decrypt rate:   [{}] {:.1}%\n", make_bar(snap.decrypt_rate(), 30), snap.decrypt_rate()));
        if c.capture_errors > 0 {
            out.push_str(&format!("Capture errors: {}\n", c.capture_errors));
        }

        // 3. Top talkers
        let top = self.top_senders(5);
        if !top.is_empty() {
            out.push_str("Top senders:\n");
            for (i, (id, count)) in top.iter().enumerate() {
                out.push_str(&format!("  {:>2}. {} {:>6} packets\n", i + 1, format_node_id(*id), count));
            }
        }
        out
    }
}

fn make_bar(pct: f64, width: usize) -> String {
    let filled = ((pct / 100.0) * width as f64).round().clamp(0.0, width as f64) as usize;
    let mut bar = String::with_capacity(width * 3);
    for i in 0..width {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar
}
