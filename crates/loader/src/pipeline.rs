//! Load orchestration: verify, wait, create schema, load, finish.

use crate::error::{OrchestratorError, TableFailure};
use crate::loader::{DatabaseLoader, LoadJob};
use crate::report::LoadReport;
use bts_bench_core::Dataset;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// What one load run does.
#[derive(Clone, Debug)]
pub struct LoadPlan {
    pub dataset: Dataset,
    pub readiness_timeout: Duration,
    pub skip_schema: bool,
    pub skip_post_load: bool,
    /// Upper bound on concurrent table loads for parallel-capable loaders.
    pub workers: usize,
}

impl LoadPlan {
    pub fn new(dataset: Dataset, readiness_timeout: Duration) -> Self {
        let workers = dataset.tables.len();
        Self {
            dataset,
            readiness_timeout,
            skip_schema: false,
            skip_post_load: false,
            workers,
        }
    }

    pub fn with_skip_schema(mut self, skip: bool) -> Self {
        self.skip_schema = skip;
        self
    }

    pub fn with_skip_post_load(mut self, skip: bool) -> Self {
        self.skip_post_load = skip;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Concurrent loads actually used: at least one, at most one per table.
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, self.dataset.tables.len().max(1))
    }
}

/// Drives one [`DatabaseLoader`] through a full load run.
pub struct LoadPipeline {
    loader: Arc<dyn DatabaseLoader>,
    plan: LoadPlan,
}

impl LoadPipeline {
    pub fn new(loader: Arc<dyn DatabaseLoader>, plan: LoadPlan) -> Self {
        Self { loader, plan }
    }

    /// Run the complete load.
    ///
    /// Source files are checked before anything touches the backend; a
    /// readiness timeout, a schema failure or a failed table ends the run.
    pub async fn run(&self) -> Result<LoadReport, OrchestratorError> {
        let start = Instant::now();
        self.plan.dataset.verify()?;

        let backend = self.loader.backend();
        let family = self.loader.family();
        info!(
            "Loading {} into {backend} ({family})",
            self.plan.dataset.table_names().join(", ")
        );

        if !self.loader.probe_ready(self.plan.readiness_timeout).await {
            return Err(OrchestratorError::NotReady {
                backend,
                timeout: self.plan.readiness_timeout,
            });
        }

        if self.plan.skip_schema {
            info!("Skipping schema creation");
        } else {
            self.loader.create_schema().await?;
        }

        self.loader.prepare_load().await?;

        let workers = self.plan.effective_workers();
        let jobs = if self.loader.supports_parallel_load() && workers > 1 {
            self.load_parallel(workers).await?
        } else {
            self.load_sequential().await?
        };

        if self.plan.skip_post_load {
            info!("Skipping post-load step");
        } else {
            self.loader.post_load().await?;
        }

        let report = LoadReport::new(backend, family, jobs, start.elapsed());
        info!(
            "Load into {backend} completed in {:.1}s",
            report.total_elapsed.as_secs_f64()
        );
        Ok(report)
    }

    async fn load_sequential(&self) -> Result<Vec<LoadJob>, OrchestratorError> {
        let mut jobs = Vec::with_capacity(self.plan.dataset.tables.len());
        for source in &self.plan.dataset.tables {
            let job = self.loader.load_table(&source.table, &source.path).await?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Loads every table concurrently, bounded by `workers`. Every task runs to
    /// completion; failures are reported together.
    async fn load_parallel(&self, workers: usize) -> Result<Vec<LoadJob>, OrchestratorError> {
        info!("Loading tables in parallel with {workers} worker(s)");
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for (index, source) in self.plan.dataset.tables.iter().cloned().enumerate() {
            let loader = self.loader.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = loader.load_table(&source.table, &source.path).await;
                (index, source.table, result)
            });
        }

        let mut jobs: Vec<(usize, LoadJob)> = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(job))) => jobs.push((index, job)),
                Ok((index, table, Err(error))) => {
                    error!("Loading {table} failed: {error}");
                    failures.push((index, TableFailure { table, error }));
                }
                Err(e) => return Err(OrchestratorError::Worker(e.to_string())),
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            return Err(OrchestratorError::TableLoads(
                failures.into_iter().map(|(_, f)| f).collect(),
            ));
        }

        jobs.sort_by_key(|(index, _)| *index);
        Ok(jobs.into_iter().map(|(_, job)| job).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoadError, SchemaError};
    use crate::loader::LoaderFamily;
    use async_trait::async_trait;
    use bts_bench_core::{Backend, TableSource};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records calls; `fail_table` makes one table fail.
    struct ScriptedLoader {
        parallel: bool,
        ready: bool,
        fail_table: Option<&'static str>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedLoader {
        fn new(parallel: bool) -> Self {
            Self {
                parallel,
                ready: true,
                fail_table: None,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl DatabaseLoader for ScriptedLoader {
        fn backend(&self) -> Backend {
            Backend::Doris
        }

        fn family(&self) -> LoaderFamily {
            if self.parallel {
                LoaderFamily::StreamingIngestion
            } else {
                LoaderFamily::ExternalBulkTool
            }
        }

        async fn probe_ready(&self, _timeout: Duration) -> bool {
            self.record("probe");
            self.ready
        }

        async fn create_schema(&self) -> Result<(), SchemaError> {
            self.record("schema");
            Ok(())
        }

        async fn prepare_load(&self) -> Result<(), LoadError> {
            self.record("prepare");
            Ok(())
        }

        async fn load_table(&self, table: &str, source: &Path) -> Result<LoadJob, LoadError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.record(format!("load {table}"));
            if self.fail_table == Some(table) {
                return Err(LoadError::ContainerMissing("mcs1".into()));
            }
            Ok(LoadJob::new(table, source, Some(1), Duration::from_millis(30)))
        }

        async fn post_load(&self) -> Result<(), LoadError> {
            self.record("post");
            Ok(())
        }
    }

    fn dataset() -> (tempfile::TempDir, Dataset) {
        let dir = tempfile::tempdir().unwrap();
        for (_, file) in bts_bench_core::dataset::BTS_TABLES {
            std::fs::write(dir.path().join(file), "x\n").unwrap();
        }
        let dataset = Dataset::bts(dir.path());
        (dir, dataset)
    }

    #[tokio::test]
    async fn test_sequential_run_order() {
        let (_dir, dataset) = dataset();
        let loader = Arc::new(ScriptedLoader::new(false));
        let plan = LoadPlan::new(dataset, Duration::from_secs(1));
        let report = LoadPipeline::new(loader.clone(), plan).run().await.unwrap();

        assert_eq!(
            loader.calls(),
            vec![
                "probe",
                "schema",
                "prepare",
                "load airlines",
                "load airports",
                "load flights",
                "post"
            ]
        );
        assert_eq!(loader.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(report.jobs.len(), 3);
        assert_eq!(report.total_rows(), 3);
    }

    #[tokio::test]
    async fn test_skip_flags() {
        let (_dir, dataset) = dataset();
        let loader = Arc::new(ScriptedLoader::new(false));
        let plan = LoadPlan::new(dataset, Duration::from_secs(1))
            .with_skip_schema(true)
            .with_skip_post_load(true);
        LoadPipeline::new(loader.clone(), plan).run().await.unwrap();

        let calls = loader.calls();
        assert!(!calls.contains(&"schema".to_string()));
        assert!(!calls.contains(&"post".to_string()));
    }

    #[tokio::test]
    async fn test_parallel_run_keeps_dataset_order() {
        let (_dir, dataset) = dataset();
        let loader = Arc::new(ScriptedLoader::new(true));
        let plan = LoadPlan::new(dataset, Duration::from_secs(1));
        let report = LoadPipeline::new(loader.clone(), plan).run().await.unwrap();

        assert!(loader.max_in_flight.load(Ordering::SeqCst) > 1);
        let tables: Vec<&str> = report.jobs.iter().map(|j| j.table.as_str()).collect();
        assert_eq!(tables, vec!["airlines", "airports", "flights"]);
    }

    #[tokio::test]
    async fn test_worker_bound_is_respected() {
        let (_dir, dataset) = dataset();
        let loader = Arc::new(ScriptedLoader::new(true));
        let plan = LoadPlan::new(dataset, Duration::from_secs(1)).with_workers(2);
        LoadPipeline::new(loader.clone(), plan).run().await.unwrap();
        assert!(loader.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_parallel_failure_lets_others_finish() {
        let (_dir, dataset) = dataset();
        let mut loader = ScriptedLoader::new(true);
        loader.fail_table = Some("airports");
        let loader = Arc::new(loader);
        let plan = LoadPlan::new(dataset, Duration::from_secs(1));

        let err = LoadPipeline::new(loader.clone(), plan).run().await.unwrap_err();
        match err {
            OrchestratorError::TableLoads(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].table, "airports");
            }
            other => panic!("unexpected error: {other}"),
        }
        let calls = loader.calls();
        assert!(calls.contains(&"load flights".to_string()));
        assert!(!calls.contains(&"post".to_string()));
    }

    #[tokio::test]
    async fn test_not_ready_stops_before_schema() {
        let (_dir, dataset) = dataset();
        let mut loader = ScriptedLoader::new(false);
        loader.ready = false;
        let loader = Arc::new(loader);
        let plan = LoadPlan::new(dataset, Duration::from_secs(1));

        let err = LoadPipeline::new(loader.clone(), plan).run().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NotReady { .. }));
        assert_eq!(loader.calls(), vec!["probe"]);
    }

    #[tokio::test]
    async fn test_missing_files_fail_before_probing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(ScriptedLoader::new(false));
        let plan = LoadPlan::new(
            Dataset {
                tables: vec![TableSource::new("flights", dir.path().join("missing.csv"))],
            },
            Duration::from_secs(1),
        );

        let err = LoadPipeline::new(loader.clone(), plan).run().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Precondition(_)));
        assert!(loader.calls().is_empty());
    }

    #[test]
    fn test_effective_workers() {
        let (_dir, dataset) = dataset();
        let plan = LoadPlan::new(dataset, Duration::ZERO);
        assert_eq!(plan.effective_workers(), 3);
        assert_eq!(plan.clone().with_workers(0).effective_workers(), 1);
        assert_eq!(plan.clone().with_workers(8).effective_workers(), 3);
    }
}
