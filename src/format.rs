//! Text renderings shared by the decoder and the console output.

use chrono::{Local, TimeZone};

/// Bytes of payload shown in a raw summary before it is elided.
pub const RAW_PREVIEW_BYTES: usize = 20;

/// Canonical node id: `!` followed by 8 lowercase hex digits.
pub fn format_node_id(node_id: u32) -> String {
    format!("!{:08x}", node_id)
}

pub fn format_route(nodes: &[u32]) -> String {
    nodes.iter().map(|n| format_node_id(*n)).collect::<Vec<_>>().join(" → ")
}

/// SNR values travel as dB scaled by 4.
pub fn format_snr_list(raw: &[i32]) -> String {
    raw.iter()
        .map(|snr| format!("{:.1}dB", *snr as f64 / 4.0))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// `bytes(N): <hex of the first 20 bytes>` with a trailing `...` when truncated.
pub fn raw_summary(data: &[u8]) -> String {
    let shown = &data[..data.len().min(RAW_PREVIEW_BYTES)];
    let ellipsis = if data.len() > RAW_PREVIEW_BYTES { "..." } else { "" };
    format!("bytes({}): {}{}", data.len(), hex::encode(shown), ellipsis)
}

/// Classic offset / hex / ASCII dump, one line per `bytes_per_line` bytes.
pub fn hex_dump(data: &[u8], bytes_per_line: usize) -> String {
    let width = bytes_per_line.max(1);
    let mut lines = Vec::with_capacity(data.len() / width + 1);
    for (i, chunk) in data.chunks(width).enumerate() {
        let hex_part = chunk.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
        let ascii: String = chunk
            .iter()
            .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
            .collect();
        lines.push(format!(
            "  {:04x}: {:<pad$} |{}|",
            i * width,
            hex_part,
            ascii,
            pad = width * 3 - 1
        ));
    }
    lines.join("\n")
}

/// Local wall-clock rendering of a unix timestamp, keeping the raw value alongside.
pub fn format_timestamp(timestamp: u32) -> String {
    match Local.timestamp_opt(timestamp as i64, 0).single() {
        Some(dt) => format!("{} ({})", dt.format("%Y-%m-%d %H:%M:%S"), timestamp),
        None => format!("Invalid timestamp ({})", timestamp),
    }
}

/// Millisecond-precision local time for fractional capture timestamps.
pub fn format_capture_time(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    match Local.timestamp_opt(secs as i64, nanos).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{}", timestamp),
    }
}

pub fn format_rssi(rssi: i32) -> String {
    let quality = match rssi {
        r if r >= -50 => "Excellent",
        r if r >= -60 => "Very Good",
        r if r >= -70 => "Good",
        r if r >= -80 => "Fair",
        r if r >= -90 => "Poor",
        _ => "Very Poor",
    };
    format!("{} dBm ({})", rssi, quality)
}

pub fn format_snr(snr: f32) -> String {
    let quality = if snr >= 10.0 {
        "Excellent"
    } else if snr >= 5.0 {
        "Good"
    } else if snr >= 0.0 {
        "Fair"
    } else if snr >= -5.0 {
        "Poor"
    } else {
        "Very Poor"
    };
    format!("{:.1} dB ({})", snr, quality)
}

/// `Hops: used of start`, `Hops: N remaining`, or nothing when the packet carries no hop data.
pub fn describe_hops(hop_limit: u8, hop_start: u8) -> Option<String> {
    if hop_limit > 0 && hop_start > 0 {
        Some(format!("Hops: {} of {}", hop_start.saturating_sub(hop_limit), hop_start))
    } else if hop_limit > 0 {
        Some(format!("Hops: {} remaining", hop_limit))
    } else {
        None
    }
}
