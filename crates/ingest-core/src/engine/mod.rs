//! Step scheduling: dependency graph, scheduler, builder and run report.

pub mod builder;
pub mod graph;
pub mod report;
pub mod scheduler;

pub use builder::SchedulerBuilder;
pub use graph::StepGraph;
pub use report::{RunReport, StepOutcome};
pub use scheduler::{ExecutionMode, Scheduler};
