//! Resource snapshot enricher (§4.3 step 6): resident memory and CPU
//! percent for the current process. Best-effort and Linux-only, reading
//! `/proc/self/statm` and `/proc/self/stat` directly rather than pulling in
//! a process-inspection crate neither this workspace nor its pack uses
//! elsewhere; on any other platform or parse failure it contributes
//! nothing rather than failing the event.

use std::time::Instant;

use fapilog_core::Event;
use serde_json::json;

pub struct ResourceSnapshot {
    started_at: Instant,
    clock_ticks_per_sec: f64,
    page_size_bytes: f64,
}

impl ResourceSnapshot {
    pub fn new() -> Self {
        ResourceSnapshot {
            started_at: Instant::now(),
            clock_ticks_per_sec: 100.0,
            page_size_bytes: 4096.0,
        }
    }

    /// Adds `rss_mb` and `cpu_percent` if not already present on `event`
    /// (§4.3's "enrichers only add keys they do not already find").
    pub fn enrich(&self, event: &mut Event) {
        if let Some(rss_mb) = self.resident_memory_mb() {
            event.set_if_absent("rss_mb", json!(round2(rss_mb)));
        }
        if let Some(cpu_percent) = self.cpu_percent() {
            event.set_if_absent("cpu_percent", json!(round2(cpu_percent)));
        }
    }

    fn resident_memory_mb(&self) -> Option<f64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let rss_pages: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(rss_pages * self.page_size_bytes / (1024.0 * 1024.0))
    }

    fn cpu_percent(&self) -> Option<f64> {
        let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
        // Fields after the `(comm)` parenthesized group are space-separated
        // and stable in position; utime/stime are fields 14/15 (1-indexed).
        let after_comm = stat.rsplit_once(')')?.1;
        let fields: Vec<&str> = after_comm.split_whitespace().collect();
        let utime: f64 = fields.get(11)?.parse().ok()?;
        let stime: f64 = fields.get(12)?.parse().ok()?;
        let cpu_secs = (utime + stime) / self.clock_ticks_per_sec;
        let wall_secs = self.started_at.elapsed().as_secs_f64();
        if wall_secs <= 0.0 {
            return Some(0.0);
        }
        Some((cpu_secs / wall_secs) * 100.0)
    }
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
