//! Parameter declaration, coercion and validation.
//!
//! - [`node`]/[`tree`]: immutable declarations built once per task type.
//! - [`coercion`]: raw value -> declared type.
//! - [`validators`]: pluggable constraints.
//! - [`pipeline`]: walks a tree against a live context, collecting every
//!   error before deciding whether the invocation fails.

pub mod coercion;
pub mod node;
pub mod pipeline;
pub mod tree;
pub mod validators;

use anyhow::{Context as _, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Coerced parameter values for one invocation.
///
/// Absent optional parameters without a default have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Deserialize a parameter into `T`.
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| anyhow!("parameter `{name}` is not set"))?;
        serde_json::from_value(value.clone()).with_context(|| format!("read parameter `{name}`"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
