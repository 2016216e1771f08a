//! Pluggable per-parameter constraints.
//!
//! Every validator is a typed option record implementing [`Validator`].
//! Options are verified when the owning parameter is declared; `check` only
//! runs against values that are present after coercion and defaulting.
//!
//! Each validator accepts an optional `message` override which replaces the
//! translated text (with the same `%{...}` interpolation).

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::error::DeclarationError;
use crate::locale::{Locale, interpolate};

#[derive(Error, Debug)]
pub enum CheckError {
    /// The value violates the constraint; carries the user-facing message.
    #[error("{0}")]
    Invalid(String),

    /// The validator itself broke. Propagated unchanged by the pipeline.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub trait Validator: Send + Sync {
    /// Option key under which the validator appears in snapshots.
    fn key(&self) -> &'static str;

    /// Reject malformed options at declaration time.
    fn verify(&self, _param: &str) -> Result<(), DeclarationError> {
        Ok(())
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError>;

    /// Options as JSON, for snapshots and display.
    fn describe(&self) -> Value;
}

fn invalid(locale: &Locale, message: Option<&str>, key: &str, vars: &[(&str, String)]) -> CheckError {
    let text = match message {
        Some(message) => interpolate(message, vars),
        None => locale.translate(key, vars),
    };
    CheckError::Invalid(text)
}

fn invalid_options(param: &str, validator: &str, reason: impl Into<String>) -> DeclarationError {
    DeclarationError::InvalidValidator {
        name: param.to_string(),
        validator: validator.to_string(),
        reason: reason.into(),
    }
}

fn with_message(mut options: Map<String, Value>, message: Option<&String>) -> Value {
    if let Some(message) = message {
        options.insert("message".to_string(), json!(message));
    }
    Value::Object(options)
}

/// Scalar text form: strings verbatim, other scalars via JSON.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Value must be non-blank: not null, not whitespace-only, not an empty
/// collection.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    message: Option<String>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for Presence {
    fn key(&self) -> &'static str {
        "presence"
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        let present = match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Bool(_) | Value::Number(_) => true,
        };
        if present {
            Ok(())
        } else {
            Err(invalid(locale, self.message.as_deref(), "taskchain.validators.presence", &[]))
        }
    }

    fn describe(&self) -> Value {
        with_message(Map::new(), self.message.as_ref())
    }
}

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    compiled: Result<Regex, regex::Error>,
}

impl Pattern {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            compiled: Regex::new(source),
        }
    }

    fn verify(&self) -> Result<(), DeclarationError> {
        match &self.compiled {
            Ok(_) => Ok(()),
            Err(err) => Err(DeclarationError::InvalidPattern {
                pattern: self.source.clone(),
                source: err.clone(),
            }),
        }
    }

    fn is_match(&self, text: &str) -> bool {
        self.compiled.as_ref().is_ok_and(|re| re.is_match(text))
    }
}

/// Textual value must match `with` and must not match `without`.
#[derive(Debug, Clone, Default)]
pub struct Format {
    with: Option<Pattern>,
    without: Option<Pattern>,
    message: Option<String>,
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Format::new().with(pattern)`.
    pub fn matching(pattern: &str) -> Self {
        Self::new().with(pattern)
    }

    pub fn with(mut self, pattern: &str) -> Self {
        self.with = Some(Pattern::new(pattern));
        self
    }

    pub fn without(mut self, pattern: &str) -> Self {
        self.without = Some(Pattern::new(pattern));
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for Format {
    fn key(&self) -> &'static str {
        "format"
    }

    fn verify(&self, param: &str) -> Result<(), DeclarationError> {
        if self.with.is_none() && self.without.is_none() {
            return Err(invalid_options(param, "format", "requires `with` or `without`"));
        }
        for pattern in [&self.with, &self.without].into_iter().flatten() {
            pattern.verify()?;
        }
        Ok(())
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        let valid = scalar_text(value).is_some_and(|text| {
            self.with.as_ref().is_none_or(|p| p.is_match(&text))
                && self.without.as_ref().is_none_or(|p| !p.is_match(&text))
        });
        if valid {
            Ok(())
        } else {
            Err(invalid(locale, self.message.as_deref(), "taskchain.validators.format", &[]))
        }
    }

    fn describe(&self) -> Value {
        let mut options = Map::new();
        if let Some(with) = &self.with {
            options.insert("with".to_string(), json!(with.source));
        }
        if let Some(without) = &self.without {
            options.insert("without".to_string(), json!(without.source));
        }
        with_message(options, self.message.as_ref())
    }
}

/// Numeric type usable as a bound.
pub trait BoundValue: Copy + PartialOrd + fmt::Display + Into<Value> {
    fn from_json(value: &Value) -> Option<Self>;
}

impl BoundValue for usize {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_u64().and_then(|n| usize::try_from(n).ok())
    }
}

impl BoundValue for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

/// Range constraints shared by [`Length`] and [`Numeric`].
///
/// `min` and `max` together behave like `within`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds<T> {
    pub within: Option<(T, T)>,
    pub not_within: Option<(T, T)>,
    pub min: Option<T>,
    pub max: Option<T>,
    pub is: Option<T>,
    pub is_not: Option<T>,
}

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Self {
            within: None,
            not_within: None,
            min: None,
            max: None,
            is: None,
            is_not: None,
        }
    }
}

type Violation = (&'static str, Vec<(&'static str, String)>);

impl<T: BoundValue> Bounds<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn within(mut self, min: T, max: T) -> Self {
        self.within = Some((min, max));
        self
    }

    pub fn not_within(mut self, min: T, max: T) -> Self {
        self.not_within = Some((min, max));
        self
    }

    pub fn min(mut self, min: T) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn is(mut self, is: T) -> Self {
        self.is = Some(is);
        self
    }

    pub fn is_not(mut self, is_not: T) -> Self {
        self.is_not = Some(is_not);
        self
    }

    fn verify(&self) -> Result<(), String> {
        let empty = self.within.is_none()
            && self.not_within.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.is.is_none()
            && self.is_not.is_none();
        if empty {
            return Err("requires at least one bound".to_string());
        }
        let ranges = [self.within, self.not_within, self.min.zip(self.max)];
        if ranges.into_iter().flatten().any(|(min, max)| min > max) {
            return Err("minimum exceeds maximum".to_string());
        }
        Ok(())
    }

    /// First violated bound and its interpolation values.
    fn violation(&self, actual: T) -> Option<Violation> {
        if let Some((min, max)) = self.within.or(self.min.zip(self.max)) {
            if actual < min || actual > max {
                return Some(("within", vec![("min", min.to_string()), ("max", max.to_string())]));
            }
        } else if let Some(min) = self.min
            && actual < min
        {
            return Some(("min", vec![("min", min.to_string())]));
        } else if let Some(max) = self.max
            && actual > max
        {
            return Some(("max", vec![("max", max.to_string())]));
        }
        if let Some((min, max)) = self.not_within
            && actual >= min
            && actual <= max
        {
            return Some((
                "not_within",
                vec![("min", min.to_string()), ("max", max.to_string())],
            ));
        }
        if let Some(is) = self.is
            && actual != is
        {
            return Some(("is", vec![("is", is.to_string())]));
        }
        if let Some(is_not) = self.is_not
            && actual == is_not
        {
            return Some(("is_not", vec![("is_not", is_not.to_string())]));
        }
        None
    }

    fn describe(&self) -> Map<String, Value> {
        let mut options = Map::new();
        let pairs = [("within", self.within), ("not_within", self.not_within)];
        for (key, range) in pairs {
            if let Some((min, max)) = range {
                options.insert(key.to_string(), Value::Array(vec![min.into(), max.into()]));
            }
        }
        let singles = [
            ("min", self.min),
            ("max", self.max),
            ("is", self.is),
            ("is_not", self.is_not),
        ];
        for (key, bound) in singles {
            if let Some(bound) = bound {
                options.insert(key.to_string(), bound.into());
            }
        }
        options
    }

    fn from_options(options: &Map<String, Value>) -> Result<Self, String> {
        let range = |key: &str| -> Result<Option<(T, T)>, String> {
            match options.get(key) {
                None => Ok(None),
                Some(Value::Array(pair)) if pair.len() == 2 => {
                    let min = T::from_json(&pair[0]);
                    let max = T::from_json(&pair[1]);
                    min.zip(max)
                        .map(Some)
                        .ok_or_else(|| format!("`{key}` bounds are not numeric"))
                }
                Some(_) => Err(format!("`{key}` must be a two-element array")),
            }
        };
        let single = |key: &str| -> Result<Option<T>, String> {
            match options.get(key) {
                None => Ok(None),
                Some(value) => T::from_json(value)
                    .map(Some)
                    .ok_or_else(|| format!("`{key}` is not numeric")),
            }
        };
        Ok(Self {
            within: range("within")?,
            not_within: range("not_within")?,
            min: single("min")?,
            max: single("max")?,
            is: single("is")?,
            is_not: single("is_not")?,
        })
    }
}

/// Character count of strings, element count of arrays and hashes.
#[derive(Debug, Clone, Default)]
pub struct Length {
    bounds: Bounds<usize>,
    message: Option<String>,
}

impl Length {
    pub fn new(bounds: Bounds<usize>) -> Self {
        Self {
            bounds,
            message: None,
        }
    }

    pub fn within(min: usize, max: usize) -> Self {
        Self::new(Bounds::new().within(min, max))
    }

    pub fn at_least(min: usize) -> Self {
        Self::new(Bounds::new().min(min))
    }

    pub fn at_most(max: usize) -> Self {
        Self::new(Bounds::new().max(max))
    }

    pub fn exactly(is: usize) -> Self {
        Self::new(Bounds::new().is(is))
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn measure(value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            other => scalar_text(other).map(|text| text.chars().count()),
        }
    }
}

impl Validator for Length {
    fn key(&self) -> &'static str {
        "length"
    }

    fn verify(&self, param: &str) -> Result<(), DeclarationError> {
        self.bounds
            .verify()
            .map_err(|reason| invalid_options(param, "length", reason))
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        let Some(actual) = Self::measure(value) else {
            return Ok(());
        };
        match self.bounds.violation(actual) {
            None => Ok(()),
            Some((rule, vars)) => Err(invalid(
                locale,
                self.message.as_deref(),
                &format!("taskchain.validators.length.{rule}"),
                &vars,
            )),
        }
    }

    fn describe(&self) -> Value {
        with_message(self.bounds.describe(), self.message.as_ref())
    }
}

/// Numeric range checks; numeric strings are parsed.
#[derive(Debug, Clone, Default)]
pub struct Numeric {
    bounds: Bounds<f64>,
    message: Option<String>,
}

impl Numeric {
    pub fn new(bounds: Bounds<f64>) -> Self {
        Self {
            bounds,
            message: None,
        }
    }

    pub fn within(min: f64, max: f64) -> Self {
        Self::new(Bounds::new().within(min, max))
    }

    pub fn at_least(min: f64) -> Self {
        Self::new(Bounds::new().min(min))
    }

    pub fn at_most(max: f64) -> Self {
        Self::new(Bounds::new().max(max))
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for Numeric {
    fn key(&self) -> &'static str {
        "numeric"
    }

    fn verify(&self, param: &str) -> Result<(), DeclarationError> {
        self.bounds
            .verify()
            .map_err(|reason| invalid_options(param, "numeric", reason))
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        let Some(actual) = numeric(value) else {
            return Err(invalid(locale, self.message.as_deref(), "taskchain.validators.numeric.nan", &[]));
        };
        match self.bounds.violation(actual) {
            None => Ok(()),
            Some((rule, vars)) => Err(invalid(
                locale,
                self.message.as_deref(),
                &format!("taskchain.validators.numeric.{rule}"),
                &vars,
            )),
        }
    }

    fn describe(&self) -> Value {
        with_message(self.bounds.describe(), self.message.as_ref())
    }
}

/// Allowed (or forbidden) values, either enumerated or as a numeric range.
#[derive(Debug, Clone, Default)]
struct Membership {
    of: Vec<Value>,
    within: Option<(f64, f64)>,
    message: Option<String>,
}

impl Membership {
    fn verify(&self, param: &str, validator: &str) -> Result<(), DeclarationError> {
        match self.within {
            None if self.of.is_empty() => Err(invalid_options(param, validator, "requires `of` or `within`")),
            Some((min, max)) if min > max => Err(invalid_options(param, validator, "minimum exceeds maximum")),
            _ => Ok(()),
        }
    }

    /// Whether `value` is a member.
    fn contains(&self, value: &Value) -> bool {
        if let Some((min, max)) = self.within {
            return numeric(value).is_some_and(|n| n >= min && n <= max);
        }
        self.of.contains(value)
    }

    fn vars(&self) -> Vec<(&'static str, String)> {
        match self.within {
            Some((min, max)) => vec![("min", min.to_string()), ("max", max.to_string())],
            None => {
                let values: Vec<String> = self
                    .of
                    .iter()
                    .map(|v| scalar_text(v).unwrap_or_else(|| v.to_string()))
                    .collect();
                vec![("values", values.join(", "))]
            }
        }
    }

    fn rule(&self) -> &'static str {
        if self.within.is_some() { "within" } else { "of" }
    }

    fn describe(&self) -> Value {
        let mut options = Map::new();
        if !self.of.is_empty() {
            options.insert("of".to_string(), Value::Array(self.of.clone()));
        }
        if let Some((min, max)) = self.within {
            options.insert("within".to_string(), json!([min, max]));
        }
        with_message(options, self.message.as_ref())
    }

    fn from_options(options: &Map<String, Value>) -> Result<Self, String> {
        let of = match options.get("of") {
            None => Vec::new(),
            Some(Value::Array(values)) => values.clone(),
            Some(_) => return Err("`of` must be an array".to_string()),
        };
        let within = Bounds::<f64>::from_options(options)?.within;
        Ok(Self {
            of,
            within,
            message: message_option(options),
        })
    }
}

fn message_option(options: &Map<String, Value>) -> Option<String> {
    options
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Clone, Default)]
pub struct Inclusion(Membership);

impl Inclusion {
    pub fn of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self(Membership {
            of: values.into_iter().map(Into::into).collect(),
            ..Membership::default()
        })
    }

    pub fn within(min: f64, max: f64) -> Self {
        Self(Membership {
            within: Some((min, max)),
            ..Membership::default()
        })
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.0.message = Some(message.into());
        self
    }
}

impl Validator for Inclusion {
    fn key(&self) -> &'static str {
        "inclusion"
    }

    fn verify(&self, param: &str) -> Result<(), DeclarationError> {
        self.0.verify(param, "inclusion")
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        if self.0.contains(value) {
            return Ok(());
        }
        let key = format!("taskchain.validators.inclusion.{}", self.0.rule());
        Err(invalid(locale, self.0.message.as_deref(), &key, &self.0.vars()))
    }

    fn describe(&self) -> Value {
        self.0.describe()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Exclusion(Membership);

impl Exclusion {
    pub fn of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self(Membership {
            of: values.into_iter().map(Into::into).collect(),
            ..Membership::default()
        })
    }

    pub fn within(min: f64, max: f64) -> Self {
        Self(Membership {
            within: Some((min, max)),
            ..Membership::default()
        })
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.0.message = Some(message.into());
        self
    }
}

impl Validator for Exclusion {
    fn key(&self) -> &'static str {
        "exclusion"
    }

    fn verify(&self, param: &str) -> Result<(), DeclarationError> {
        self.0.verify(param, "exclusion")
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        if !self.0.contains(value) {
            return Ok(());
        }
        let key = format!("taskchain.validators.exclusion.{}", self.0.rule());
        Err(invalid(locale, self.0.message.as_deref(), &key, &self.0.vars()))
    }

    fn describe(&self) -> Value {
        self.0.describe()
    }
}

pub type CustomCheck = Arc<dyn Fn(&Value) -> anyhow::Result<bool> + Send + Sync>;

/// Caller-supplied check. `Ok(false)` is a validation error; `Err` is an
/// unexpected error and aborts validation.
#[derive(Clone)]
pub struct Custom {
    name: String,
    check: CustomCheck,
    message: Option<String>,
}

impl Custom {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Custom").field("name", &self.name).finish()
    }
}

impl Validator for Custom {
    fn key(&self) -> &'static str {
        "custom"
    }

    fn check(&self, value: &Value, locale: &Locale) -> Result<(), CheckError> {
        if (self.check)(value)? {
            Ok(())
        } else {
            Err(invalid(locale, self.message.as_deref(), "taskchain.validators.custom", &[]))
        }
    }

    fn describe(&self) -> Value {
        with_message(
            Map::from_iter([("name".to_string(), json!(self.name))]),
            self.message.as_ref(),
        )
    }
}

/// Rebuild a validator from its snapshot options.
///
/// Custom validators carry code and cannot be rebuilt; they yield `None`.
pub fn from_option(param: &str, key: &str, value: &Value) -> Result<Option<Arc<dyn Validator>>, DeclarationError> {
    let empty = Map::new();
    let options = value.as_object().unwrap_or(&empty);
    let message = message_option(options);
    let rebuilt: Arc<dyn Validator> = match key {
        "presence" => Arc::new(Presence { message }),
        "format" => {
            let pattern = |name: &str| options.get(name).and_then(Value::as_str).map(Pattern::new);
            Arc::new(Format {
                with: pattern("with"),
                without: pattern("without"),
                message,
            })
        }
        "length" => Arc::new(Length {
            bounds: Bounds::from_options(options).map_err(|r| invalid_options(param, key, r))?,
            message,
        }),
        "numeric" => Arc::new(Numeric {
            bounds: Bounds::from_options(options).map_err(|r| invalid_options(param, key, r))?,
            message,
        }),
        "inclusion" => Arc::new(Inclusion(
            Membership::from_options(options).map_err(|r| invalid_options(param, key, r))?,
        )),
        "exclusion" => Arc::new(Exclusion(
            Membership::from_options(options).map_err(|r| invalid_options(param, key, r))?,
        )),
        "custom" => return Ok(None),
        other => return Err(invalid_options(param, other, "unknown validator")),
    };
    rebuilt.verify(param)?;
    Ok(Some(rebuilt))
}
