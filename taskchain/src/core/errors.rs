//! Per-invocation collection of parameter error messages.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Ordered mapping from parameter name to its messages.
///
/// Attribute order is first-insertion order; messages for one attribute keep
/// their insertion order and are deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Errors {
    messages: IndexMap<String, Vec<String>>,
}

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        let entry = self.messages.entry(attribute.into()).or_default();
        if !entry.contains(&message) {
            entry.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of attributes with at least one message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, attribute: &str) -> &[String] {
        self.messages.get(attribute).map_or(&[], Vec::as_slice)
    }

    pub fn messages(&self) -> &IndexMap<String, Vec<String>> {
        &self.messages
    }

    /// `"<attribute> <message>"` for every message, in insertion order.
    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|(attribute, messages)| {
                messages
                    .iter()
                    .map(move |message| format!("{attribute} {message}"))
            })
            .collect()
    }

    /// Full messages joined with `". "`.
    pub fn to_sentence(&self) -> String {
        self.full_messages().join(". ")
    }

    /// The structured mapping as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.messages
                .iter()
                .map(|(attribute, messages)| {
                    let list = messages.iter().cloned().map(Value::String).collect();
                    (attribute.clone(), Value::Array(list))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn full_messages_follow_insertion_order() {
        let mut errors = Errors::new();
        errors.add("order_id", "is a required parameter");
        errors.add("email", "is invalid");
        assert_eq!(
            errors.full_messages(),
            vec!["order_id is a required parameter", "email is invalid"]
        );
        assert_eq!(
            errors.to_sentence(),
            "order_id is a required parameter. email is invalid"
        );
    }

    #[test]
    fn duplicate_messages_are_dropped() {
        let mut errors = Errors::new();
        errors.add("sku", "cannot be empty");
        errors.add("sku", "cannot be empty");
        errors.add("sku", "is an invalid format");
        assert_eq!(errors.get("sku").len(), 2);
        assert_eq!(
            errors.to_value(),
            json!({"sku": ["cannot be empty", "is an invalid format"]})
        );
    }

    #[test]
    fn missing_attribute_has_no_messages() {
        let errors = Errors::new();
        assert!(errors.is_empty());
        assert!(errors.get("anything").is_empty());
    }
}
