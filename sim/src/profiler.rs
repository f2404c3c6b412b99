//! Simple profiling utility for measuring tick performance.
//!
//! Collects per-section timings and whole-tick durations, and counts ticks that
//! overran their wall-clock budget. With the `profile` feature the engine logs
//! [`Profiler::log_summary`] when it stops.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Statistics for a profiled section
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
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

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

/// Named section timings plus tick totals against a budget.
#[derive(Debug)]
pub struct Profiler {
    sections: HashMap<&'static str, SectionStats>,
    ticks: SectionStats,
    budget: Duration,
    overruns: u64,
}

impl Profiler {
    pub fn new(budget: Duration) -> Self {
        Self {
            sections: HashMap::new(),
            ticks: SectionStats::default(),
            budget,
            overruns: 0,
        }
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.sections.entry(name).or_default().record(start.elapsed());
        result
    }

    /// Record a whole tick. Returns `true` if it exceeded the budget.
    pub fn record_tick(&mut self, elapsed: Duration) -> bool {
        self.ticks.record(elapsed);
        let overrun = elapsed > self.budget;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.call_count
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn ticks(&self) -> &SectionStats {
        &self.ticks
    }

    /// Get statistics for a specific section.
    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> Vec<&'static str> {
        self.sections.keys().copied().collect()
    }

    /// Log a summary of all profiled sections, slowest first.
    pub fn log_summary(&self) {
        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));
        let total: Duration = sections.iter().map(|(_, s)| s.total_time).sum();

        for (name, stats) in &sections {
            let pct = if total.as_nanos() > 0 {
                (stats.total_time.as_nanos() as f64 / total.as_nanos() as f64) * 100.0
            } else {
                0.0
            };
            info!(
                section = *name,
                total = ?stats.total_time,
                avg = ?stats.avg_time(),
                min = ?stats.min_time.unwrap_or(Duration::ZERO),
                max = ?stats.max_time.unwrap_or(Duration::ZERO),
                pct = format_args!("{pct:.1}%"),
                "profiled section"
            );
        }

        info!(
            ticks = self.ticks.call_count,
            avg_tick = ?self.ticks.avg_time(),
            max_tick = ?self.ticks.max_time.unwrap_or(Duration::ZERO),
            budget = ?self.budget,
            overruns = self.overruns,
            "tick summary"
        );
    }

    /// Reset all profiling data.
    pub fn reset(&mut self) {
        self.sections.clear();
        self.ticks = SectionStats::default();
        self.overruns = 0;
    }
}
