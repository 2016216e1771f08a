//! A single declared parameter slot.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DeclarationError;
use crate::params::coercion::{CoercionError, coerce};
use crate::params::validators::{self, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Passed through untouched.
    Virtual,
    String,
    Integer,
    Float,
    BigDecimal,
    Boolean,
    Array,
    Hash,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Virtual => "virtual",
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::BigDecimal => "big_decimal",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Hash => "hash",
            ParamType::Date => "date",
            ParamType::DateTime => "datetime",
        }
    }

    /// Human-readable name used in messages.
    pub fn label(self) -> &'static str {
        match self {
            ParamType::BigDecimal => "big decimal",
            other => other.as_str(),
        }
    }

    pub fn article(self) -> &'static str {
        match self.label().chars().next() {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        }
    }

    /// Only hashes and arrays may own child parameters.
    pub fn accepts_children(self) -> bool {
        matches!(self, ParamType::Hash | ParamType::Array)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter's raw value is read from.
///
/// Serialized as `"context"` or `{"parent": "<name>"}`, so a parent that is
/// itself named `context` stays distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// The invocation context; always the source of top-level parameters.
    Context,
    /// The coerced value of the named enclosing parameter.
    Parent(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Context => f.write_str("context"),
            Source::Parent(name) => f.write_str(name),
        }
    }
}

/// Typed option record for a parameter.
#[derive(Clone, Default)]
pub struct ParamOptions {
    default: Option<Value>,
    desc: Option<String>,
    validators: Vec<Arc<dyn Validator>>,
}

impl ParamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// `default`, `desc`, then `validators` as an ordered list of
    /// single-key objects, one per declared validator.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(default) = &self.default {
            map.insert("default".to_string(), default.clone());
        }
        if let Some(desc) = &self.desc {
            map.insert("desc".to_string(), Value::String(desc.clone()));
        }
        if !self.validators.is_empty() {
            let validators = self
                .validators
                .iter()
                .map(|validator| {
                    let mut entry = Map::new();
                    entry.insert(validator.key().to_string(), validator.describe());
                    Value::Object(entry)
                })
                .collect();
            map.insert("validators".to_string(), Value::Array(validators));
        }
        map
    }

    /// Inverse of [`ParamOptions::to_map`]. Custom validators are dropped.
    pub fn from_map(param: &str, map: &Map<String, Value>) -> Result<Self, DeclarationError> {
        let mut options = ParamOptions::new();
        for (key, value) in map {
            match key.as_str() {
                "default" => options.default = Some(value.clone()),
                "desc" => options.desc = value.as_str().map(str::to_string),
                "validators" => {
                    let entries = value
                        .as_array()
                        .ok_or_else(|| malformed(param, "validators", "must be an array"))?;
                    for entry in entries {
                        let entry = entry
                            .as_object()
                            .filter(|entry| entry.len() == 1)
                            .ok_or_else(|| malformed(param, "validators", "entries must be single-key objects"))?;
                        for (kind, described) in entry {
                            if let Some(validator) = validators::from_option(param, kind, described)? {
                                options.validators.push(validator);
                            }
                        }
                    }
                }
                other => return Err(malformed(param, other, "unknown option")),
            }
        }
        Ok(options)
    }
}

fn malformed(param: &str, option: &str, reason: &str) -> DeclarationError {
    DeclarationError::InvalidValidator {
        name: param.to_string(),
        validator: option.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Debug for ParamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.to_map()).finish()
    }
}

/// Immutable declared parameter.
#[derive(Debug, Clone)]
pub struct ParamNode {
    name: String,
    kind: ParamType,
    source: Source,
    required: bool,
    options: ParamOptions,
    children: Vec<ParamNode>,
}

impl ParamNode {
    /// Validate and construct a node.
    ///
    /// Children must be sourced from this node, may only hang off hashes and
    /// arrays, and must have unique names. Validator options and the default
    /// value are checked here rather than at coercion time.
    pub fn declare(
        name: impl Into<String>,
        kind: ParamType,
        required: bool,
        options: ParamOptions,
        source: Source,
        children: Vec<ParamNode>,
    ) -> Result<Self, DeclarationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DeclarationError::EmptyName);
        }
        if !children.is_empty() && !kind.accepts_children() {
            return Err(DeclarationError::ChildrenOnScalar { name, kind });
        }
        let expected = Source::Parent(name.clone());
        for (i, child) in children.iter().enumerate() {
            if child.source != expected {
                return Err(DeclarationError::SourceMismatch {
                    name: child.name.clone(),
                    expected,
                    actual: child.source.clone(),
                });
            }
            if children[..i].iter().any(|other| other.name == child.name) {
                return Err(DeclarationError::DuplicateName(child.name.clone()));
            }
        }
        for validator in &options.validators {
            validator.verify(&name)?;
        }
        if let Some(default) = &options.default {
            coerce(kind, default).map_err(|err| DeclarationError::InvalidDefault {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        }
        Ok(Self {
            name,
            kind,
            source,
            required,
            options,
            children,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamType {
        self.kind
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn options(&self) -> &ParamOptions {
        &self.options
    }

    pub fn children(&self) -> &[ParamNode] {
        &self.children
    }

    /// Coerce a raw value; `None` and `null` count as absent.
    ///
    /// Absent optional parameters fall back to their default. Absent required
    /// parameters stay absent so the caller can report them.
    pub fn coerce(&self, raw: Option<&Value>) -> Result<Option<Value>, CoercionError> {
        match raw.filter(|value| !value.is_null()) {
            Some(value) => coerce(self.kind, value).map(Some),
            None if !self.required => self
                .options
                .default
                .as_ref()
                .map(|default| coerce(self.kind, default))
                .transpose(),
            None => Ok(None),
        }
    }
}

impl PartialEq for ParamNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.source == other.source
            && self.required == other.required
            && self.options.to_map() == other.options.to_map()
            && self.children == other.children
    }
}

/// Declaration builder used by [`Task::declare`](crate::task::Task::declare).
///
/// ```ignore
/// params
///     .add(Param::required("order_id", ParamType::Integer).validate(Numeric::at_least(1.0)))
///     .add(
///         Param::optional("shipping", ParamType::Hash)
///             .child(Param::required("zip", ParamType::String).validate(Format::matching(r"^\d{5}$"))),
///     );
/// ```
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    kind: ParamType,
    required: bool,
    options: ParamOptions,
    children: Vec<Param>,
}

impl Param {
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self::new(name, kind, true)
    }

    pub fn optional(name: impl Into<String>, kind: ParamType) -> Self {
        Self::new(name, kind, false)
    }

    fn new(name: impl Into<String>, kind: ParamType, required: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            required,
            options: ParamOptions::new(),
            children: Vec::new(),
        }
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.options = self.options.with_default(value);
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.options = self.options.with_desc(desc);
        self
    }

    pub fn validate(mut self, validator: impl Validator + 'static) -> Self {
        self.options = self.options.with_validator(Arc::new(validator));
        self
    }

    pub fn child(mut self, child: Param) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build this declaration and its children into immutable nodes.
    pub fn build(self, source: Source) -> Result<ParamNode, DeclarationError> {
        let parent = Source::Parent(self.name.clone());
        let children = self
            .children
            .into_iter()
            .map(|child| child.build(parent.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        ParamNode::declare(self.name, self.kind, self.required, self.options, source, children)
    }
}
