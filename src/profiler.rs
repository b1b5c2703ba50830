//! Lightweight timing for system passes.
//!
//! Compiled unconditionally; `World::update` only feeds it when the
//! `profile` feature is enabled:
//!
//! ```bash
//! cargo test --release --features profile
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Accumulates wall-clock time for named sections.
#[derive(Default)]
pub struct Profiler {
    sections: HashMap<String, SectionStats>,
    current_section: Option<(String, Instant)>,
}

/// Aggregated statistics for one section.
#[derive(Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a named section; `end_section` stops it.
    pub fn begin_section(&mut self, name: &str) {
        self.current_section = Some((name.to_string(), Instant::now()));
    }

    /// End the current section and record its duration.
    pub fn end_section(&mut self) {
        if let Some((name, start)) = self.current_section.take() {
            let elapsed = start.elapsed();
            let stats = self.sections.entry(name).or_default();
            stats.total_time += elapsed;
            stats.call_count += 1;
            stats.max_time = Some(stats.max_time.map_or(elapsed, |m| m.max(elapsed)));
        }
    }

    pub fn section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    /// Human-readable per-section report, slowest first.
    pub fn report(&self) -> String {
        let mut rows: Vec<(&String, &SectionStats)> = self.sections.iter().collect();
        rows.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));

        let mut out = String::from("section              total      avg        calls\n");
        for (name, stats) in rows {
            out.push_str(&format!(
                "{:<20} {:<10.2?} {:<10.2?} {}\n",
                name,
                stats.total_time,
                stats.avg_time(),
                stats.call_count
            ));
        }
        out
    }
}
