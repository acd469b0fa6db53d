//! Dynamic row scheduler run by the coordinator.
//!
//! The [`Scheduler`] owns all coordinator-side state for one run: the
//! [`AssignmentTable`] (which worker holds which row), the [`RowCursor`]
//! (next row to hand out), the [`CompletionSet`] and the output buffer.
//! Nothing here is shared; a single task drives it from join to
//! termination.

pub mod metrics;
pub mod progress;
pub mod roster;
pub mod runner;
pub mod slots;

#[cfg(test)]
mod tests;

pub use metrics::{RunMode, SchedulerMetrics};
pub use progress::{CompletionSet, RowCursor};
pub use roster::{Member, Roster};
pub use runner::{RunOutput, Scheduler};
pub use slots::{AssignmentTable, SlotState};
