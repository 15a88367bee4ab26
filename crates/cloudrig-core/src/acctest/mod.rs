//! Acceptance-test harness
//!
//! A [`TestCase`] provisions real resources through a provider's
//! [`ResourceRegistry`], asserts on the recorded attributes after every
//! step, then destroys everything and verifies that the vendor API no longer
//! reports the resources. Cases only run when `CLOUDRIG_ACC=1`.

pub mod check;
pub mod flatmap;

pub use check::{
    Check, check_no_resource_attr, check_resource_attr, check_resource_attr_pair,
    check_resource_attr_set, check_resource_disappears, check_resource_exists,
    match_resource_attr,
};

use crate::action::Action;
use crate::engine;
use crate::error::{CloudError, Result};
use crate::provider::{ResourceRegistry, ResourceSet};
use crate::state::ProjectState;
use flatmap::flatten_state;
use rand::Rng;
use regex::Regex;

/// Environment variable enabling acceptance tests
pub const ACC_ENV: &str = "CLOUDRIG_ACC";

/// Whether acceptance tests are enabled.
pub fn acc_enabled() -> bool {
    std::env::var(ACC_ENV).is_ok_and(|v| v == "1")
}

/// Random lowercase string of `len` characters.
pub fn rand_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Random integer in `lo..hi`, or `lo` when the range is empty.
pub fn rand_int_range(lo: i64, hi: i64) -> i64 {
    if lo >= hi {
        return lo;
    }
    rand::thread_rng().gen_range(lo..hi)
}

/// `<prefix>-<random number>`, used for resource names in acceptance tests.
pub fn rand_name_with_prefix(prefix: &str) -> String {
    format!("{prefix}-{}", rand::thread_rng().gen_range(0..u32::MAX))
}

/// Maps a step failure to a skip reason, or `None` to fail the test.
pub type ErrorCheck = Box<dyn Fn(&CloudError) -> Option<String> + Send + Sync>;

/// Skip the test when the error text contains one of `needles`, e.g. a
/// service that is not available in the test region.
pub fn error_check_skip_messages_containing(needles: &[&str]) -> ErrorCheck {
    let needles: Vec<String> = needles.iter().map(|s| s.to_string()).collect();
    Box::new(move |err| {
        let text = err.to_string();
        needles
            .iter()
            .find(|n| text.contains(n.as_str()))
            .map(|n| format!("skipping test: error contains \"{n}\": {text}"))
    })
}

/// One apply (or import) step of a [`TestCase`].
pub struct TestStep {
    config: ResourceSet,
    checks: Vec<Check>,
    expect_error: Option<Regex>,
    expect_non_empty_plan: bool,
    import: Option<ImportStep>,
}

struct ImportStep {
    key: String,
    id_attribute: Option<String>,
    verify: bool,
    ignore: Vec<String>,
}

impl TestStep {
    pub fn new(config: ResourceSet) -> Self {
        Self {
            config,
            checks: Vec::new(),
            expect_error: None,
            expect_non_empty_plan: false,
            import: None,
        }
    }

    /// Import the resource recorded under `key` by its id instead of
    /// applying a configuration.
    pub fn import(key: &str) -> Self {
        Self {
            import: Some(ImportStep {
                key: key.to_string(),
                id_attribute: None,
                verify: false,
                ignore: Vec::new(),
            }),
            ..Self::new(ResourceSet::new())
        }
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn checks(mut self, checks: Vec<Check>) -> Self {
        self.checks.extend(checks);
        self
    }

    /// The apply must fail with an error matching `pattern`.
    pub fn expect_error(mut self, pattern: Regex) -> Self {
        self.expect_error = Some(pattern);
        self
    }

    /// Allow a non-empty plan after apply, e.g. after a disappears check.
    pub fn expect_non_empty_plan(mut self) -> Self {
        self.expect_non_empty_plan = true;
        self
    }

    /// Import by the value of `attribute` (e.g. `arn`) instead of the id.
    pub fn import_id_from(mut self, attribute: &str) -> Self {
        if let Some(import) = self.import.as_mut() {
            import.id_attribute = Some(attribute.to_string());
        }
        self
    }

    /// Compare the imported attributes with the recorded ones, skipping
    /// `ignore` paths (prefix match) and write-only attributes.
    pub fn import_state_verify(mut self, ignore: &[&str]) -> Self {
        if let Some(import) = self.import.as_mut() {
            import.verify = true;
            import.ignore = ignore.iter().map(|s| s.to_string()).collect();
        }
        self
    }
}

/// Result of an acceptance test that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Skipped(String),
}

type PreCheck = Box<dyn Fn() -> Result<()> + Send + Sync>;

pub struct TestCase {
    registry: ResourceRegistry,
    pre_check: Option<PreCheck>,
    error_check: Option<ErrorCheck>,
    check_destroy: Vec<Check>,
    steps: Vec<TestStep>,
}

impl TestCase {
    pub fn new(registry: ResourceRegistry) -> Self {
        Self {
            registry,
            pre_check: None,
            error_check: None,
            check_destroy: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Run before any step; an error fails the test.
    pub fn pre_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.pre_check = Some(Box::new(f));
        self
    }

    pub fn error_check(mut self, check: ErrorCheck) -> Self {
        self.error_check = Some(check);
        self
    }

    /// Extra checks against the state recorded before destruction. Every
    /// destroyed resource is also read back and must be gone.
    pub fn check_destroy(mut self, check: Check) -> Self {
        self.check_destroy.push(check);
        self
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Run the case unless acceptance tests are disabled.
    pub async fn run(self) -> Result<Outcome> {
        if !acc_enabled() {
            return Ok(Outcome::Skipped(format!(
                "acceptance tests skipped unless env '{ACC_ENV}' set to 1"
            )));
        }
        self.execute().await
    }

    /// Run the case and panic on failure; the usual entry point in tests.
    pub async fn test(self) {
        match self.run().await {
            Ok(Outcome::Passed) => {}
            Ok(Outcome::Skipped(reason)) => eprintln!("{reason}"),
            Err(e) => panic!("{e}"),
        }
    }

    /// Run every step, then destroy. Ignores [`ACC_ENV`].
    pub async fn execute(self) -> Result<Outcome> {
        if let Some(pre_check) = &self.pre_check {
            pre_check()?;
        }

        let mut state = ProjectState::new();
        let steps_result = self.run_steps(&mut state).await;

        let recorded = state.clone();
        let destroyed = engine::destroy_all(&self.registry, &mut state).await;
        let destroy_result = if let Some(e) = destroyed.first_error() {
            Err(CloudError::StateError(format!(
                "error destroying resources: {e}"
            )))
        } else {
            self.verify_destroyed(&recorded).await
        };

        match steps_result.and(destroy_result) {
            Ok(()) => Ok(Outcome::Passed),
            Err(e) => match self.error_check.as_ref().and_then(|check| check(&e)) {
                Some(reason) => Ok(Outcome::Skipped(reason)),
                None => Err(e),
            },
        }
    }

    async fn run_steps(&self, state: &mut ProjectState) -> Result<()> {
        for (i, step) in self.steps.iter().enumerate() {
            let n = i + 1;
            tracing::info!("Running acceptance step {n}/{}", self.steps.len());
            let result = match &step.import {
                Some(import) => self.run_import(import, state).await,
                None => self.run_apply(step, state).await,
            };
            result.map_err(|e| e.context(format!("step {n}/{}", self.steps.len())))?;
        }
        Ok(())
    }

    async fn run_apply(&self, step: &TestStep, state: &mut ProjectState) -> Result<()> {
        match (self.apply_config(step, state).await, &step.expect_error) {
            (Err(e), Some(pattern)) if pattern.is_match(&e.to_string()) => return Ok(()),
            (Err(e), _) => return Err(e),
            (Ok(()), Some(pattern)) => {
                return Err(CloudError::CheckFailed(format!(
                    "expected an error matching {pattern:?}, got none"
                )));
            }
            (Ok(()), None) => {}
        }

        check::run_all(&step.checks, state).await?;

        let follow_up = engine::plan(&self.registry, &step.config, state, true).await?;
        let pending: Vec<String> = follow_up.changes().map(Action::description).collect();
        if !pending.is_empty() && !step.expect_non_empty_plan {
            return Err(CloudError::CheckFailed(format!(
                "after applying this step, the plan was not empty: {}",
                pending.join(", ")
            )));
        }
        Ok(())
    }

    async fn apply_config(&self, step: &TestStep, state: &mut ProjectState) -> Result<()> {
        let plan = engine::plan(&self.registry, &step.config, state, false).await?;
        let applied = engine::apply(&self.registry, &plan, &step.config, state).await;
        match applied.first_error() {
            Some(e) => Err(CloudError::Api {
                code: None,
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn run_import(&self, import: &ImportStep, state: &ProjectState) -> Result<()> {
        let recorded = state.get_resource(&import.key).ok_or_else(|| {
            CloudError::CheckFailed(format!("Not found: {} in state", import.key))
        })?;
        let module = self.registry.get(&recorded.resource_type)?;
        let id = match &import.id_attribute {
            Some(attribute) => flatten_state(recorded).remove(attribute).ok_or_else(|| {
                let key = &import.key;
                CloudError::CheckFailed(format!("{key}: no attribute '{attribute}' to import by"))
            })?,
            None => recorded.id.clone(),
        };
        let imported = module.import(&id).await?;

        if !import.verify {
            return Ok(());
        }

        let skip = |path: &str| {
            import
                .ignore
                .iter()
                .map(String::as_str)
                .chain(module.write_only_attributes().iter().copied())
                .any(|prefix| path.starts_with(prefix))
        };
        let expected: Vec<(String, String)> = flatten_state(recorded)
            .into_iter()
            .filter(|(k, _)| !skip(k))
            .collect();
        let actual: Vec<(String, String)> = flatten_state(&imported)
            .into_iter()
            .filter(|(k, _)| !skip(k))
            .collect();

        if expected != actual {
            let diff: Vec<String> = expected
                .iter()
                .filter(|e| !actual.contains(e))
                .map(|(k, v)| format!("{k}: recorded \"{v}\""))
                .chain(
                    actual
                        .iter()
                        .filter(|a| !expected.contains(a))
                        .map(|(k, v)| format!("{k}: imported \"{v}\"")),
                )
                .collect();
            return Err(CloudError::CheckFailed(format!(
                "import of {} differs from state:\n{}",
                import.key,
                diff.join("\n")
            )));
        }
        Ok(())
    }

    async fn verify_destroyed(&self, recorded: &ProjectState) -> Result<()> {
        check::run_all(&self.check_destroy, recorded).await?;

        for (key, resource) in &recorded.resources {
            let module = self.registry.get(&resource.resource_type)?;
            if module.read(&resource.id).await?.is_some() {
                return Err(CloudError::CheckFailed(format!(
                    "{key} ({}) still exists after destroy",
                    resource.id
                )));
            }
        }
        Ok(())
    }
}
