use serde::{Deserialize, Serialize};

/// Row id the coordinator sends for "no more work". Workers treat any
/// negative row the same way.
pub const TERMINATE_SENTINEL: i32 = -1;

/// Largest row count an [`AssignRow`] can address.
pub const MAX_ROWS: u32 = i32::MAX as u32;

/// Bootstrap announcement from a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Human-readable worker name, for logs and metrics.
    pub worker: String,
}

/// Next row to compute, or the termination sentinel.
///
/// Kept as a signed integer on the wire; use [`AssignRow::assignment`] to
/// interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRow {
    pub row: i32,
}

/// Decoded meaning of an [`AssignRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Row(u32),
    Terminate,
}

impl AssignRow {
    /// Callers keep `row < MAX_ROWS`; the scheduler checks this once per run.
    pub fn row(row: u32) -> Self {
        debug_assert!(row < MAX_ROWS);
        Self { row: row as i32 }
    }

    pub fn terminate() -> Self {
        Self {
            row: TERMINATE_SENTINEL,
        }
    }

    pub fn assignment(&self) -> Assignment {
        match u32::try_from(self.row) {
            Ok(row) => Assignment::Row(row),
            Err(_) => Assignment::Terminate,
        }
    }
}

/// A finished row. `row` names the row that was computed; the coordinator
/// files the counts under it regardless of who sent them or when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowResult {
    pub row: u32,
    pub counts: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_rows_terminate() {
        assert_eq!(AssignRow::terminate().assignment(), Assignment::Terminate);
        assert_eq!(AssignRow { row: -42 }.assignment(), Assignment::Terminate);
    }

    #[test]
    fn non_negative_rows_are_work() {
        assert_eq!(AssignRow::row(0).assignment(), Assignment::Row(0));
        assert_eq!(AssignRow::row(599).assignment(), Assignment::Row(599));
    }
}
