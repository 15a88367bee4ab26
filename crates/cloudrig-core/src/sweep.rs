//! Sweepers remove resources leaked by interrupted acceptance tests.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Error fragments meaning the service is not available in a region or
/// partition; a sweeper hitting one of them is skipped instead of failing.
const SKIP_SWEEP_MESSAGES: &[&str] = &[
    "AccessDeniedException",
    "InternalFailure",
    "InvalidAction",
    "is not authorized",
    "is not supported",
    "not supported in this region",
    "UnknownOperationException",
    "UnrecognizedClientException",
    "UnsupportedOperation",
];

/// Whether a sweeper error means the sweep should be skipped.
pub fn skip_sweep_error(err: &CloudError) -> bool {
    let text = err.to_string();
    SKIP_SWEEP_MESSAGES.iter().any(|m| text.contains(m))
}

/// Outcome of one sweeper run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Identifiers that were deleted
    pub deleted: Vec<String>,
    /// Per-resource deletion errors; the sweep continues past them
    pub failed: Vec<String>,
}

impl SweepReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: impl Into<String>, outcome: Result<()>) {
        let id = id.into();
        match outcome {
            Ok(()) => {
                tracing::info!("Deleted {id}");
                self.deleted.push(id);
            }
            Err(e) => {
                tracing::error!("Failed to delete {id}: {e}");
                self.failed.push(format!("{id}: {e}"));
            }
        }
    }
}

/// Deletes every leftover resource of one type in a region.
#[async_trait]
pub trait Sweeper: Send + Sync {
    /// Usually the resource type name
    fn name(&self) -> &str;

    /// Sweepers that must run before this one
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    async fn sweep(&self, region: &str) -> Result<SweepReport>;
}

/// Result of running several sweepers
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub reports: BTreeMap<String, SweepReport>,
    pub skipped: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

impl SweepSummary {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.reports.values().all(|r| r.failed.is_empty())
    }
}

#[derive(Default, Clone)]
pub struct SweeperRegistry {
    sweepers: BTreeMap<String, Arc<dyn Sweeper>>,
}

impl SweeperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sweeper: Arc<dyn Sweeper>) {
        self.sweepers.insert(sweeper.name().to_string(), sweeper);
    }

    pub fn names(&self) -> Vec<&str> {
        self.sweepers.keys().map(String::as_str).collect()
    }

    /// Sweepers to run for `only` (all when empty), dependencies first.
    pub fn ordered(&self, only: &[String]) -> Result<Vec<Arc<dyn Sweeper>>> {
        let roots: Vec<&str> = if only.is_empty() {
            self.sweepers.keys().map(String::as_str).collect()
        } else {
            only.iter().map(String::as_str).collect()
        };

        let mut ordered = Vec::new();
        let mut done = HashSet::new();
        for name in roots {
            let sweeper = self.sweepers.get(name).ok_or_else(|| {
                CloudError::InvalidConfig(format!("sweeper {name} is not registered"))
            })?;
            self.visit(sweeper, &mut Vec::new(), &mut done, &mut ordered)?;
        }
        Ok(ordered)
    }

    fn visit(
        &self,
        sweeper: &Arc<dyn Sweeper>,
        path: &mut Vec<String>,
        done: &mut HashSet<String>,
        ordered: &mut Vec<Arc<dyn Sweeper>>,
    ) -> Result<()> {
        let name = sweeper.name().to_string();
        if done.contains(&name) {
            return Ok(());
        }
        if path.contains(&name) {
            path.push(name);
            return Err(CloudError::InvalidConfig(format!(
                "sweeper dependency cycle: {}",
                path.join(" -> ")
            )));
        }

        path.push(name.clone());
        for dep in sweeper.dependencies() {
            match self.sweepers.get(*dep) {
                Some(dep) => self.visit(dep, path, done, ordered)?,
                None => tracing::warn!("Sweeper {name} depends on unregistered sweeper {dep}"),
            }
        }
        path.pop();

        done.insert(name);
        ordered.push(sweeper.clone());
        Ok(())
    }

    /// Run the selected sweepers for `region`.
    pub async fn run(&self, region: &str, only: &[String]) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();

        for sweeper in self.ordered(only)? {
            let name = sweeper.name().to_string();
            tracing::info!("Running sweeper {name} in {region}");
            match sweeper.sweep(region).await {
                Ok(report) => {
                    summary.reports.insert(name, report);
                }
                Err(e) if skip_sweep_error(&e) => {
                    tracing::warn!("Skipping {name} sweep for {region}: {e}");
                    summary.skipped.insert(name, e.to_string());
                }
                Err(e) => {
                    summary.errors.insert(name, e.to_string());
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        deps: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
        outcome: Outcome,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Ok,
        Unsupported,
        Broken,
    }

    #[async_trait]
    impl Sweeper for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> &[&str] {
            &self.deps
        }

        async fn sweep(&self, _region: &str) -> Result<SweepReport> {
            self.log.lock().unwrap().push(self.name.to_string());
            match self.outcome {
                Outcome::Ok => {
                    let mut report = SweepReport::new();
                    report.record("a", Ok(()));
                    Ok(report)
                }
                Outcome::Unsupported => {
                    Err(CloudError::api("UnsupportedOperation", "not available"))
                }
                Outcome::Broken => Err(CloudError::api("ValidationException", "bad input")),
            }
        }
    }

    fn registry(
        log: &Arc<Mutex<Vec<String>>>,
        entries: Vec<(&'static str, Vec<&'static str>, Outcome)>,
    ) -> SweeperRegistry {
        let mut registry = SweeperRegistry::new();
        for (name, deps, outcome) in entries {
            registry.register(Arc::new(Recording {
                name,
                deps,
                log: log.clone(),
                outcome,
            }));
        }
        registry
    }

    #[tokio::test]
    async fn test_dependencies_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(
            &log,
            vec![
                ("aws_ecs_task_definition", vec!["aws_ecs_service"], Outcome::Ok),
                ("aws_ecs_service", vec![], Outcome::Ok),
                ("aws_glue_workflow", vec![], Outcome::Ok),
            ],
        );

        let summary = registry
            .run("us-west-2", &["aws_ecs_task_definition".to_string()])
            .await
            .unwrap();
        assert!(summary.is_success());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["aws_ecs_service", "aws_ecs_task_definition"]
        );
    }

    #[tokio::test]
    async fn test_skip_and_error_are_collected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(
            &log,
            vec![
                ("a", vec![], Outcome::Unsupported),
                ("b", vec![], Outcome::Broken),
                ("c", vec![], Outcome::Ok),
            ],
        );

        let summary = registry.run("us-west-2", &[]).await.unwrap();
        assert!(summary.skipped.contains_key("a"));
        assert!(summary.errors.contains_key("b"));
        assert_eq!(summary.reports["c"].deleted, vec!["a"]);
        assert!(!summary.is_success());
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_cycle_detected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(
            &log,
            vec![("a", vec!["b"], Outcome::Ok), ("b", vec!["a"], Outcome::Ok)],
        );
        let err = registry.ordered(&[]).err().unwrap();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_unknown_sweeper() {
        let registry = SweeperRegistry::new();
        assert!(registry.ordered(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_skip_sweep_error() {
        assert!(skip_sweep_error(&CloudError::api(
            "InternalFailure",
            "The request processing has failed"
        )));
        assert!(!skip_sweep_error(&CloudError::api("ThrottlingException", "slow")));
    }
}
