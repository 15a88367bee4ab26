//! Tag reconciliation
//!
//! [`KeyValueTags`] is the vendor-neutral tag set. Each vendor service
//! implements [`TagService`]; [`update_tags`] diffs the previously applied set
//! against the desired one and issues at most one untag and one tag call.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix reserved by AWS for system tags; these can never be set or removed.
pub const AWS_TAG_PREFIX: &str = "aws:";

/// An ordered set of key/value tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags from a JSON object; non-string values are rendered as JSON text.
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        let Some(serde_json::Value::Object(map)) = value else {
            return Self::new();
        };
        map.iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn map(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags present here but absent from `new`.
    pub fn removed(&self, new: &KeyValueTags) -> KeyValueTags {
        self.0
            .iter()
            .filter(|(k, _)| !new.0.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Tags in `new` that are absent here or carry a different value.
    pub fn updated(&self, new: &KeyValueTags) -> KeyValueTags {
        new.0
            .iter()
            .filter(|(k, v)| self.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop AWS-reserved tags.
    pub fn ignore_aws(&self) -> KeyValueTags {
        self.ignore_prefixes(&[AWS_TAG_PREFIX])
    }

    pub fn ignore_prefixes<S: AsRef<str>>(&self, prefixes: &[S]) -> KeyValueTags {
        self.0
            .iter()
            .filter(|(k, _)| !prefixes.iter().any(|p| k.starts_with(p.as_ref())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ignore_keys<S: AsRef<str>>(&self, keys: &[S]) -> KeyValueTags {
        self.0
            .iter()
            .filter(|(k, _)| !keys.iter().any(|i| i.as_ref() == k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ignore_config(&self, config: &IgnoreConfig) -> KeyValueTags {
        self.ignore_keys(config.keys.as_slice())
            .ignore_prefixes(config.key_prefixes.as_slice())
    }

    /// Union of both sets; `other` wins on conflicting keys.
    pub fn merge(&self, other: &KeyValueTags) -> KeyValueTags {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        KeyValueTags(merged)
    }

    /// Whether every tag of `other` is present here with the same value.
    pub fn contains_all(&self, other: &KeyValueTags) -> bool {
        other.0.iter().all(|(k, v)| self.0.get(k) == Some(v))
    }
}

impl FromIterator<(String, String)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for KeyValueTags {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<std::collections::HashMap<String, String>> for KeyValueTags {
    fn from(map: std::collections::HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for KeyValueTags {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Tags the provider must never manage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub key_prefixes: Vec<String>,
}

/// Provider-wide tag handling: default tags and ignored tags.
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    pub default_tags: KeyValueTags,
    pub ignore: IgnoreConfig,
}

impl TagPolicy {
    /// The full set to apply for a resource's declared tags.
    pub fn resolve(&self, declared: &KeyValueTags) -> KeyValueTags {
        self.default_tags
            .merge(declared)
            .ignore_aws()
            .ignore_config(&self.ignore)
    }

    /// Remote tags with everything the provider does not manage removed.
    pub fn remote_view(&self, remote: &KeyValueTags) -> KeyValueTags {
        remote.ignore_aws().ignore_config(&self.ignore)
    }

    /// Remote tags without the default tags that still carry their default
    /// value, i.e. what the resource itself declared.
    pub fn declared_view(&self, remote: &KeyValueTags) -> KeyValueTags {
        self.remote_view(remote)
            .iter()
            .filter(|(k, v)| self.default_tags.get(k) != Some(v.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Tagging API of one vendor service.
///
/// The identifier is typically the ARN, although some services use a
/// different identifier.
#[async_trait]
pub trait TagService: Send + Sync {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags>;

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()>;

    async fn untag_resource(&self, identifier: &str, keys: &[String]) -> Result<()>;
}

/// Converge the remote tags of `identifier` from `old` to `new`.
pub async fn update_tags<S: TagService + ?Sized>(
    service: &S,
    identifier: &str,
    old: &KeyValueTags,
    new: &KeyValueTags,
) -> Result<()> {
    let removed = old.removed(new).ignore_aws();
    if !removed.is_empty() {
        tracing::debug!("Untagging {identifier}: {:?}", removed.keys());
        service
            .untag_resource(identifier, &removed.keys())
            .await
            .map_err(|e| e.context(format!("error untagging resource ({identifier})")))?;
    }

    let updated = old.updated(new).ignore_aws();
    if !updated.is_empty() {
        tracing::debug!("Tagging {identifier}: {:?}", updated.keys());
        service
            .tag_resource(identifier, &updated)
            .await
            .map_err(|e| e.context(format!("error tagging resource ({identifier})")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use crate::testing::{MemoryTagService, TagCall};

    #[test]
    fn test_removed() {
        let old = KeyValueTags::from([("key1", "value1"), ("key2", "value2")]);
        let new = KeyValueTags::from([("key1", "changed")]);
        assert_eq!(old.removed(&new).keys(), vec!["key2"]);
        assert!(new.removed(&new).is_empty());
    }

    #[test]
    fn test_updated() {
        let old = KeyValueTags::from([("key1", "value1"), ("key2", "value2")]);
        let new = KeyValueTags::from([("key1", "value1"), ("key2", "changed"), ("key3", "v3")]);
        let updated = old.updated(&new);
        assert_eq!(updated.keys(), vec!["key2", "key3"]);
        assert_eq!(updated.get("key2"), Some("changed"));
    }

    #[test]
    fn test_ignore_aws_and_config() {
        let tags = KeyValueTags::from([
            ("aws:cloudformation:stack-name", "x"),
            ("Name", "test"),
            ("team:owner", "infra"),
            ("CostCenter", "42"),
        ]);
        assert_eq!(tags.ignore_aws().len(), 3);

        let ignore = IgnoreConfig {
            keys: vec!["CostCenter".to_string()],
            key_prefixes: vec!["team:".to_string()],
        };
        assert_eq!(tags.ignore_aws().ignore_config(&ignore).keys(), vec!["Name"]);
    }

    #[test]
    fn test_from_json() {
        let value = serde_json::json!({"Name": "test", "Count": 3});
        let tags = KeyValueTags::from_json(Some(&value));
        assert_eq!(tags.get("Count"), Some("3"));
        assert!(KeyValueTags::from_json(None).is_empty());
    }

    #[test]
    fn test_policy_resolve() {
        let policy = TagPolicy {
            default_tags: KeyValueTags::from([("Environment", "test"), ("Owner", "platform")]),
            ignore: IgnoreConfig::default(),
        };
        let declared = KeyValueTags::from([("Owner", "data"), ("aws:foo", "bar")]);
        let resolved = policy.resolve(&declared);
        assert_eq!(resolved.get("Environment"), Some("test"));
        assert_eq!(resolved.get("Owner"), Some("data"));
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_policy_declared_view() {
        let policy = TagPolicy {
            default_tags: KeyValueTags::from([("Environment", "test"), ("Owner", "platform")]),
            ignore: IgnoreConfig {
                keys: vec![],
                key_prefixes: vec!["kubernetes.io/".to_string()],
            },
        };
        let remote = KeyValueTags::from([
            ("Environment", "test"),
            ("Owner", "data"),
            ("Name", "x"),
            ("aws:cloudformation:stack-name", "s"),
            ("kubernetes.io/cluster/c", "owned"),
        ]);
        let declared = policy.declared_view(&remote);
        assert_eq!(declared, KeyValueTags::from([("Owner", "data"), ("Name", "x")]));
        assert_eq!(policy.remote_view(&remote).len(), 3);
    }

    #[tokio::test]
    async fn test_update_tags_issues_untag_then_tag() {
        let svc = MemoryTagService::new();
        svc.seed("arn:test", &[("key1", "value1"), ("key2", "value2")]);

        let old = KeyValueTags::from([("key1", "value1"), ("key2", "value2")]);
        let new = KeyValueTags::from([("key1", "value1updated"), ("key3", "value3")]);
        update_tags(&svc, "arn:test", &old, &new).await.unwrap();

        assert_eq!(
            svc.calls(),
            vec![
                TagCall::Untag("arn:test".to_string(), vec!["key2".to_string()]),
                TagCall::Tag(
                    "arn:test".to_string(),
                    [("key1", "value1updated"), ("key3", "value3")]
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                ),
            ]
        );
        assert_eq!(svc.current("arn:test").len(), 2);
    }

    #[tokio::test]
    async fn test_update_tags_no_changes_no_calls() {
        let svc = MemoryTagService::new();
        let tags = KeyValueTags::from([("key1", "value1")]);
        update_tags(&svc, "arn:test", &tags, &tags).await.unwrap();
        assert!(svc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_tags_never_sends_aws_keys() {
        let svc = MemoryTagService::new();
        let old = KeyValueTags::from([("aws:createdBy", "x")]);
        let new = KeyValueTags::from([("aws:other", "y")]);
        update_tags(&svc, "arn:test", &old, &new).await.unwrap();
        assert!(svc.calls().is_empty());
    }

    struct FailingTags;

    #[async_trait]
    impl TagService for FailingTags {
        async fn list_tags(&self, _: &str) -> Result<KeyValueTags> {
            Ok(KeyValueTags::new())
        }
        async fn tag_resource(&self, _: &str, _: &KeyValueTags) -> Result<()> {
            Err(CloudError::api("AccessDeniedException", "denied"))
        }
        async fn untag_resource(&self, _: &str, _: &[String]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_update_tags_wraps_errors() {
        let new = KeyValueTags::from([("key1", "value1")]);
        let err = update_tags(&FailingTags, "arn:x", &KeyValueTags::new(), &new)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "error tagging resource (arn:x): AccessDeniedException: denied"
        );
        assert!(err.code_equals("AccessDeniedException"));
    }
}
