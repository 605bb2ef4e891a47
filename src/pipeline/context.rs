use super::loader::{BatchLoader, LoadError, LoadStats};
use super::report::{status_from_outcomes, Outcome, PipelineSummary, Stage, StageStatus};
use super::teardown::drop_tables;
use super::verifier::{verify, VerifyReport};
use crate::config::{AppConfig, StoreBackend, StoreSettings};
use crate::event_store::{
    EventStore, MemoryEventStore, ScyllaEventStore, StoreError, EVENT_TABLES,
};
use crate::events::{AggregateError, AggregateStats, Aggregator};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which stages a run executes, in pipeline order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagePlan {
    pub aggregate: bool,
    pub init_schema: bool,
    pub load: bool,
    pub verify: bool,
    pub drop_tables: bool,
}

impl StagePlan {
    /// Every stage. With `keep_tables` the tables are left in place and only
    /// the session is released at the end.
    pub fn full(keep_tables: bool) -> Self {
        Self {
            aggregate: true,
            init_schema: true,
            load: true,
            verify: true,
            drop_tables: !keep_tables,
        }
    }

    pub fn only(stage: Stage) -> Self {
        let mut plan = Self::default();
        match stage {
            Stage::Aggregate => plan.aggregate = true,
            Stage::InitSchema => plan.init_schema = true,
            Stage::Load => plan.load = true,
            Stage::Verify => plan.verify = true,
            Stage::Teardown => plan.drop_tables = true,
            Stage::Connect | Stage::Release => {}
        }
        plan
    }

    pub fn needs_store(&self) -> bool {
        self.init_schema || self.load || self.verify || self.drop_tables
    }

    fn store_stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        if self.init_schema {
            stages.push(Stage::InitSchema);
        }
        if self.load {
            stages.push(Stage::Load);
        }
        if self.verify {
            stages.push(Stage::Verify);
        }
        if self.drop_tables {
            stages.push(Stage::Teardown);
        }
        stages
    }
}

/// Opens the store selected by `settings`.
pub async fn connect(settings: &StoreSettings) -> Result<Arc<dyn EventStore>, StoreError> {
    match settings.backend {
        StoreBackend::Cql => {
            let store = ScyllaEventStore::connect(
                &settings.address(),
                settings.connect_timeout(),
                settings.keyspace(),
            )
            .await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store, nothing will be persisted");
            Ok(Arc::new(MemoryEventStore::new(settings.keyspace())))
        }
    }
}

/// Runs the aggregation stage on its own; it needs no store.
pub fn aggregate(config: &AppConfig) -> Result<AggregateStats, AggregateError> {
    Aggregator::new(&config.input_dir, &config.event_filter).aggregate_to(&config.output_file)
}

/// Holds the store session for the duration of a run.
///
/// Every stage receives the store through this context. `release` must be
/// called once the stages are done; `run_plan` does so on every path.
pub struct Pipeline {
    config: AppConfig,
    store: Arc<dyn EventStore>,
    released: AtomicBool,
}

impl Pipeline {
    pub fn new(config: AppConfig, store: Arc<dyn EventStore>) -> Self {
        Self {
            config,
            store,
            released: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// Creates the keyspace and the event tables, stopping at the first error.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        self.store.ensure_keyspace().await?;
        for &table in EVENT_TABLES {
            self.store.ensure_table(table).await?;
            info!("Table {} ready", table.name);
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<LoadStats, LoadError> {
        let loader = BatchLoader::new(self.store(), EVENT_TABLES, self.config.batch_size)?;
        loader.load_file(&self.config.output_file).await
    }

    pub async fn verify(&self) -> VerifyReport {
        verify(self.store(), &self.config.verification).await
    }

    pub async fn drop_tables(&self) -> Vec<Outcome> {
        drop_tables(self.store(), EVENT_TABLES).await
    }

    /// Releases the store session. Only the first call reaches the store.
    pub async fn release(&self) -> Outcome {
        if self.released.swap(true, Ordering::SeqCst) {
            return Outcome::ok("session");
        }
        let result = self.store.close().await;
        if let Err(e) = &result {
            error!("Failed to release store session: {}", e);
        }
        Outcome::from_result("session", result)
    }

    async fn run_store_stages(&self, plan: &StagePlan, summary: &mut PipelineSummary) {
        let mut halted = false;
        for stage in plan.store_stages() {
            if halted {
                summary.record(stage, StageStatus::Skipped);
                continue;
            }
            let status = match stage {
                Stage::InitSchema => match self.init_schema().await {
                    Ok(()) => StageStatus::Completed(format!(
                        "{} tables ready",
                        EVENT_TABLES.len()
                    )),
                    Err(e) => {
                        error!("Schema initialization failed: {}", e);
                        StageStatus::Failed(e.to_string())
                    }
                },
                Stage::Load => match self.load().await {
                    Ok(stats) => load_status(&stats),
                    Err(e) => {
                        error!("Load failed: {}", e);
                        StageStatus::Failed(e.to_string())
                    }
                },
                Stage::Verify => {
                    let report = self.verify().await;
                    status_from_outcomes(
                        &report.outcomes(),
                        format!(
                            "{} queries, {} rows",
                            report.queries.len(),
                            report.rows_returned()
                        ),
                    )
                }
                Stage::Teardown => {
                    let outcomes = self.drop_tables().await;
                    status_from_outcomes(
                        &outcomes,
                        format!("{} tables dropped", outcomes.iter().filter(|o| o.is_ok()).count()),
                    )
                }
                Stage::Aggregate | Stage::Connect | Stage::Release => continue,
            };
            halted = matches!(status, StageStatus::Failed(_));
            summary.record(stage, status);
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.released.load(Ordering::SeqCst) {
            warn!("Pipeline dropped without releasing the store session");
        }
    }
}

fn load_status(stats: &LoadStats) -> StageStatus {
    let detail = format!(
        "{} records, {} batches submitted, {} inserts attempted",
        stats.records_read, stats.batches_submitted, stats.inserts_attempted
    );
    if stats.batches_failed == 0 {
        StageStatus::Completed(detail)
    } else {
        StageStatus::Partial {
            failures: stats.batches_failed,
            detail,
        }
    }
}

/// Runs the stages of `plan` in order.
///
/// Aggregation runs before the store is touched. `connect` is only called
/// when a store stage is planned, and once it succeeds the session is
/// released whatever the stages do. A fatal stage failure skips the stages
/// after it. Failures never escape as errors; they are all in the summary.
pub async fn run_plan<F, Fut>(config: AppConfig, plan: &StagePlan, connect: F) -> PipelineSummary
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn EventStore>, StoreError>>,
{
    let mut summary = PipelineSummary::default();

    if plan.aggregate {
        match aggregate(&config) {
            Ok(stats) => summary.record(
                Stage::Aggregate,
                StageStatus::Completed(format!(
                    "{} files, {} read, {} written, {} discarded",
                    stats.files_scanned,
                    stats.records_read,
                    stats.records_written,
                    stats.records_discarded()
                )),
            ),
            Err(e) => {
                error!("Aggregation failed: {}", e);
                summary.record(Stage::Aggregate, StageStatus::Failed(e.to_string()));
                for stage in plan.store_stages() {
                    summary.record(stage, StageStatus::Skipped);
                }
                return summary;
            }
        }
    }

    if !plan.needs_store() {
        return summary;
    }

    let store = match connect().await {
        Ok(store) => {
            summary.record(
                Stage::Connect,
                StageStatus::Completed(config.store.address()),
            );
            store
        }
        Err(e) => {
            error!("Could not connect to the store: {}", e);
            summary.record(Stage::Connect, StageStatus::Failed(e.to_string()));
            for stage in plan.store_stages() {
                summary.record(stage, StageStatus::Skipped);
            }
            return summary;
        }
    };

    let pipeline = Pipeline::new(config, store);
    pipeline.run_store_stages(plan, &mut summary).await;
    let released = pipeline.release().await;
    let release_status = status_from_outcomes(std::slice::from_ref(&released), "session released".to_string());
    summary.record(Stage::Release, release_status);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliConfig;
    use crate::event_store::MockEventStore;

    #[test]
    fn full_plan_can_keep_tables() {
        assert!(StagePlan::full(false).drop_tables);
        assert!(!StagePlan::full(true).drop_tables);
        assert_eq!(
            StagePlan::full(true).store_stages(),
            vec![Stage::InitSchema, Stage::Load, Stage::Verify]
        );
    }

    #[test]
    fn aggregate_only_needs_no_store() {
        assert!(!StagePlan::only(Stage::Aggregate).needs_store());
        assert!(StagePlan::only(Stage::Teardown).needs_store());
    }

    #[tokio::test]
    async fn schema_failure_halts_store_stages_but_releases_session() {
        let mut store = MockEventStore::new();
        store.expect_ensure_keyspace().times(1).returning(|| Ok(()));
        store
            .expect_ensure_table()
            .times(1)
            .returning(|table| Err(StoreError::Query(format!("cannot create {}", table.name))));
        store.expect_close().times(1).returning(|| Ok(()));
        let store: Arc<dyn EventStore> = Arc::new(store);
        let config = AppConfig::resolve(&CliConfig::default(), None).unwrap();
        let plan = StagePlan {
            aggregate: false,
            ..StagePlan::full(false)
        };

        let summary = run_plan(config, &plan, || async move { Ok(store) }).await;

        assert!(matches!(
            summary.status_of(Stage::InitSchema),
            Some(StageStatus::Failed(e)) if e.contains("cannot create songs_by_session")
        ));
        for stage in [Stage::Load, Stage::Verify, Stage::Teardown] {
            assert_eq!(summary.status_of(stage), Some(&StageStatus::Skipped));
        }
        assert_eq!(
            summary.status_of(Stage::Release),
            Some(&StageStatus::Completed("session released".to_string()))
        );
    }
}
