//! Mapping types carried by an invocation: the input context and the result
//! metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw key/value input for a task invocation.
///
/// Parameters are read from the context by name. Tasks may also write into it;
/// batch members share a single context so later members observe earlier
/// writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Non-object values yield an empty context.
impl From<Value> for Context {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Free-form details attached to a skipped or failed result.
///
/// `reason` and `messages` are the conventional keys; anything else is passed
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn reason(&self) -> Option<&str> {
        self.0.get("reason").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: Metadata) {
        self.0.extend(other.0);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A bare string is shorthand for `{"reason": ...}`.
impl From<&str> for Metadata {
    fn from(reason: &str) -> Self {
        Self::new().with("reason", reason)
    }
}

impl From<String> for Metadata {
    fn from(reason: String) -> Self {
        Self::new().with("reason", reason)
    }
}

impl From<Value> for Metadata {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Null => Self::default(),
            other => Self::new().with("reason", other.to_string()),
        }
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn context_from_non_object_is_empty() {
        assert!(Context::from(json!([1, 2])).is_empty());
        let ctx = Context::from(json!({"order_id": 7}));
        assert_eq!(ctx.get("order_id"), Some(&json!(7)));
    }

    #[test]
    fn metadata_from_str_sets_reason() {
        let meta = Metadata::from("out of stock");
        assert_eq!(meta.reason(), Some("out of stock"));
    }

    #[test]
    fn merge_overlays_keys() {
        let mut meta = Metadata::from("first").with("code", 1);
        meta.merge(Metadata::from("second"));
        assert_eq!(meta.reason(), Some("second"));
        assert_eq!(meta.get("code"), Some(&json!(1)));
    }
}
