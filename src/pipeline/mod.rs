mod context;
mod loader;
mod report;
mod teardown;
mod verifier;

pub use context::{aggregate, connect, run_plan, Pipeline, StagePlan};
pub use loader::{BatchLoader, LoadError, LoadStats, WindowFailure, DEFAULT_BATCH_SIZE};
pub use report::{Outcome, PipelineSummary, Stage, StageReport, StageStatus};
pub use teardown::drop_tables;
pub use verifier::{canned_queries, verify, CannedQuery, QueryOutcome, VerificationKeys, VerifyReport};
