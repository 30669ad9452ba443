#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod data;
pub mod design;
pub mod evaluate;
pub mod ols;
pub mod partition;
pub mod progress;
pub mod reference;
pub mod report;
pub mod stats;
pub mod summary;

pub use design::ModelSpec;
pub use evaluate::{Evaluator, IterationRecord, MutateError, ResultTable, run};
pub use partition::{OffsetSeeds, SeedSchedule};
pub use reference::{compare, reference_fit};
pub use summary::{SummaryStats, summarize};
