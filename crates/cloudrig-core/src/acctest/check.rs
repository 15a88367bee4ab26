//! Attribute assertions run after each acceptance test step

use super::flatmap::{flatten_state, is_count_path};
use crate::error::{CloudError, Result};
use crate::provider::ResourceRegistry;
use crate::state::{ProjectState, ResourceState};
use futures_util::future::BoxFuture;
use regex::Regex;

type CheckFn = Box<dyn for<'a> Fn(&'a ProjectState) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// An assertion over the state recorded by a test step.
pub struct Check(CheckFn);

impl Check {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ProjectState) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_async(move |state| Box::pin(std::future::ready(f(state))))
    }

    /// A check that needs to call the vendor API.
    pub fn from_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a ProjectState) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    pub async fn run(&self, state: &ProjectState) -> Result<()> {
        (self.0)(state).await
    }
}

/// Run every check and report all failures together.
pub async fn run_all(checks: &[Check], state: &ProjectState) -> Result<()> {
    let mut failures = Vec::new();
    for (i, check) in checks.iter().enumerate() {
        if let Err(e) = check.run(state).await {
            failures.push(format!("check {} of {}: {e}", i + 1, checks.len()));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CloudError::CheckFailed(failures.join("\n")))
    }
}

fn primary<'a>(state: &'a ProjectState, key: &str) -> Result<&'a ResourceState> {
    state
        .get_resource(key)
        .ok_or_else(|| CloudError::CheckFailed(format!("Not found: {key} in state")))
}

fn attribute(state: &ProjectState, key: &str, path: &str) -> Result<Option<String>> {
    let resource = primary(state, key)?;
    Ok(flatten_state(resource).remove(path))
}

/// `key` has attribute `path` equal to `value`.
///
/// A missing collection counts as empty, so `tags.%` = `0` passes when no
/// tags are recorded.
pub fn check_resource_attr(key: &str, path: &str, value: &str) -> Check {
    let (key, path, value) = (key.to_string(), path.to_string(), value.to_string());
    Check::new(move |state| match attribute(state, &key, &path)? {
        Some(actual) if actual == value => Ok(()),
        None if value == "0" && is_count_path(&path) => Ok(()),
        Some(actual) => Err(CloudError::CheckFailed(format!(
            "{key}: Attribute '{path}' expected \"{value}\", got \"{actual}\""
        ))),
        None => Err(CloudError::CheckFailed(format!(
            "{key}: Attribute '{path}' expected \"{value}\", got no value"
        ))),
    })
}

/// `key` has a non-empty value at `path`.
pub fn check_resource_attr_set(key: &str, path: &str) -> Check {
    let (key, path) = (key.to_string(), path.to_string());
    Check::new(move |state| match attribute(state, &key, &path)? {
        Some(actual) if !actual.is_empty() => Ok(()),
        _ => Err(CloudError::CheckFailed(format!(
            "{key}: Attribute '{path}' expected to be set"
        ))),
    })
}

/// `key` has an attribute at `path` matching `pattern`.
pub fn match_resource_attr(key: &str, path: &str, pattern: Regex) -> Check {
    let (key, path) = (key.to_string(), path.to_string());
    Check::new(move |state| match attribute(state, &key, &path)? {
        Some(actual) if pattern.is_match(&actual) => Ok(()),
        Some(actual) => Err(CloudError::CheckFailed(format!(
            "{key}: Attribute '{path}' didn't match {pattern:?}, got \"{actual}\""
        ))),
        None => Err(CloudError::CheckFailed(format!(
            "{key}: Attribute '{path}' not found"
        ))),
    })
}

/// Two resources share an attribute value, e.g. a route and its table id.
pub fn check_resource_attr_pair(key: &str, path: &str, other_key: &str, other_path: &str) -> Check {
    let (key, path) = (key.to_string(), path.to_string());
    let (other_key, other_path) = (other_key.to_string(), other_path.to_string());
    Check::new(move |state| {
        let left = attribute(state, &key, &path)?;
        let right = attribute(state, &other_key, &other_path)?;
        if left.is_some() && left == right {
            Ok(())
        } else {
            Err(CloudError::CheckFailed(format!(
                "{key}: Attribute '{path}' = {left:?} does not match \
                 {other_key}: Attribute '{other_path}' = {right:?}"
            )))
        }
    })
}

/// `key` has no value at `path`.
pub fn check_no_resource_attr(key: &str, path: &str) -> Check {
    let (key, path) = (key.to_string(), path.to_string());
    Check::new(move |state| match attribute(state, &key, &path)? {
        None => Ok(()),
        Some(actual) if actual == "0" && is_count_path(&path) => Ok(()),
        Some(actual) => Err(CloudError::CheckFailed(format!(
            "{key}: Attribute '{path}' found when not expected (\"{actual}\")"
        ))),
    })
}

/// The resource recorded under `key` still exists in the vendor API.
pub fn check_resource_exists(registry: &ResourceRegistry, key: &str) -> Check {
    let registry = registry.clone();
    let key = key.to_string();
    Check::from_async(move |state| {
        let registry = registry.clone();
        let key = key.clone();
        Box::pin(async move {
            let resource = primary(state, &key)?;
            let module = registry.get(&resource.resource_type)?;
            match module.read(&resource.id).await? {
                Some(_) => Ok(()),
                None => Err(CloudError::CheckFailed(format!(
                    "{key} ({}) not found",
                    resource.id
                ))),
            }
        })
    })
}

/// Delete the resource out of band, so the next plan must recreate it.
pub fn check_resource_disappears(registry: &ResourceRegistry, key: &str) -> Check {
    let registry = registry.clone();
    let key = key.to_string();
    Check::from_async(move |state| {
        let registry = registry.clone();
        let key = key.clone();
        Box::pin(async move {
            let resource = primary(state, &key)?;
            let module = registry.get(&resource.resource_type)?;
            module.delete(resource).await
        })
    })
}
