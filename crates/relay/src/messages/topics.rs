//! Topic constants, one per payload type.
//!
//! Topics follow the pattern `farm.<subject>.<event>`.

/// Worker -> coordinator, once, before any assignment: [`super::Join`].
pub const WORKER_JOIN: &str = "farm.worker.join";

/// Coordinator -> worker: [`super::AssignRow`], a row or the sentinel.
pub const ROW_ASSIGN: &str = "farm.row.assign";

/// Worker -> coordinator: [`super::RowResult`].
pub const ROW_RESULT: &str = "farm.row.result";
