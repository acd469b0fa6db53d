use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a run was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Rows farmed out to workers over a link.
    Distributed,
    /// Every row computed by the coordinator itself.
    SingleParticipant,
}

/// What the scheduler did during one run.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    pub mode: RunMode,
    /// Participating workers (the coordinator is not counted).
    pub workers: usize,
    pub rows: u32,
    pub rows_assigned: u32,
    pub rows_completed: u32,
    /// Row ids in the order they were assigned.
    pub assignment_order: Vec<u32>,
    /// Completed rows per worker, keyed by worker name.
    pub results_per_worker: BTreeMap<String, u64>,
    /// Workers that received the termination sentinel, in order.
    pub terminated: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Option<Duration>,
}

impl SchedulerMetrics {
    pub fn new(mode: RunMode, workers: usize, rows: u32) -> Self {
        Self {
            mode,
            workers,
            rows,
            rows_assigned: 0,
            rows_completed: 0,
            assignment_order: Vec::with_capacity(rows as usize),
            results_per_worker: BTreeMap::new(),
            terminated: Vec::with_capacity(workers),
            started_at: Utc::now(),
            elapsed: None,
        }
    }

    pub fn record_assignment(&mut self, row: u32) {
        self.rows_assigned += 1;
        self.assignment_order.push(row);
    }

    pub fn record_result(&mut self, worker: &str) {
        self.rows_completed += 1;
        *self.results_per_worker.entry(worker.to_string()).or_default() += 1;
    }

    pub fn record_termination(&mut self, worker: &str) {
        self.terminated.push(worker.to_string());
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = Some(elapsed);
    }

    /// Rows per second over the whole run, once finished.
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.elapsed?.as_secs_f64();
        (secs > 0.0).then(|| f64::from(self.rows_completed) / secs)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_assignments_and_results() {
        let mut m = SchedulerMetrics::new(RunMode::Distributed, 2, 3);
        for row in 0..3 {
            m.record_assignment(row);
        }
        m.record_result("w0");
        m.record_result("w0");
        m.record_result("w1");
        m.record_termination("w1");

        assert_eq!(m.assignment_order, vec![0, 1, 2]);
        assert_eq!(m.rows_completed, 3);
        assert_eq!(m.results_per_worker["w0"], 2);
        assert_eq!(m.terminated, vec!["w1".to_string()]);
    }

    #[test]
    fn throughput_needs_elapsed() {
        let mut m = SchedulerMetrics::new(RunMode::SingleParticipant, 0, 10);
        m.rows_completed = 10;
        assert!(m.throughput().is_none());
        m.finish(Duration::from_secs(2));
        assert_eq!(m.throughput(), Some(5.0));
    }

    #[test]
    fn serializes_to_json() {
        let m = SchedulerMetrics::new(RunMode::SingleParticipant, 0, 1);
        let json = m.to_json().unwrap();
        assert!(json.contains("\"mode\": \"single_participant\""));
        assert!(json.contains("\"rows\": 1"));
    }
}
