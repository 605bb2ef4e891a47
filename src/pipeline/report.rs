use std::fmt;

/// Result of an operation whose failure is reported but not fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub target: String,
    pub error: Option<String>,
}

impl Outcome {
    pub fn ok(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            error: None,
        }
    }

    pub fn failed(target: impl Into<String>, error: impl ToString) -> Self {
        Self {
            target: target.into(),
            error: Some(error.to_string()),
        }
    }

    pub fn from_result<E: ToString>(target: impl Into<String>, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::ok(target),
            Err(e) => Self::failed(target, e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Aggregate,
    Connect,
    InitSchema,
    Load,
    Verify,
    Teardown,
    Release,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Aggregate => "aggregate",
            Stage::Connect => "connect",
            Stage::InitSchema => "init-schema",
            Stage::Load => "load",
            Stage::Verify => "verify",
            Stage::Teardown => "teardown",
            Stage::Release => "release",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed(String),
    /// The stage ran to the end but some of its operations failed.
    Partial {
        failures: usize,
        detail: String,
    },
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
}

/// Per-stage status of a pipeline run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub stages: Vec<StageReport>,
}

impl PipelineSummary {
    pub fn record(&mut self, stage: Stage, status: StageStatus) {
        self.stages.push(StageReport { stage, status });
    }

    pub fn status_of(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|report| report.stage == stage)
            .map(|report| &report.status)
    }

    pub fn has_fatal_failure(&self) -> bool {
        self.stages
            .iter()
            .any(|report| matches!(report.status, StageStatus::Failed(_)))
    }
}

/// Collects `Outcome`s into a stage status.
pub fn status_from_outcomes(outcomes: &[Outcome], detail: String) -> StageStatus {
    let failures = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failures == 0 {
        StageStatus::Completed(detail)
    } else {
        StageStatus::Partial { failures, detail }
    }
}
