pub mod assembler;
pub mod error;
pub mod farm;
pub mod image;
pub mod kernel;
pub mod scheduler;
pub mod worker;

pub use assembler::ResultAssembler;
pub use error::ClusterError;
pub use farm::{run_local, run_single, LocalRun};
pub use kernel::{compute_all, EscapeTimeKernel, RowKernel};
pub use scheduler::{Roster, RunMode, RunOutput, Scheduler, SchedulerMetrics};
pub use worker::{WorkerLoop, WorkerReport, WorkerState};
