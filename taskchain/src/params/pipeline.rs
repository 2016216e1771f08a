//! Coercion and validation of a parameter tree against a live context.
//!
//! The walk is depth-first in declaration order and never stops early: every
//! node is visited once and all of its errors are collected. Only afterwards
//! does the pipeline decide, calling the target's failure path at most once
//! with a composed `reason` and the structured `messages` mapping.
//!
//! Unexpected validator errors abort the walk and propagate unchanged.

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::context::{Context, Metadata};
use crate::core::errors::Errors;
use crate::error::TaskError;
use crate::locale::Locale;
use crate::params::Params;
use crate::params::node::{ParamNode, ParamType};
use crate::params::tree::ParamTree;
use crate::params::validators::CheckError;

/// What the pipeline needs from an invocation.
pub trait ValidationTarget {
    fn parameters(&self) -> &ParamTree;

    fn validation_context(&self) -> &Context;

    fn locale(&self) -> &Locale;

    fn validation_errors(&self) -> &Errors;

    fn validation_errors_mut(&mut self) -> &mut Errors;

    /// Receive the coerced values.
    fn assign(&mut self, params: Params);

    /// Transition to failed; the returned error is propagated by the caller.
    fn fail_validation(&mut self, metadata: Metadata) -> TaskError;
}

pub fn validate<T: ValidationTarget + ?Sized>(target: &mut T) -> Result<(), TaskError> {
    let mut collected = Errors::new();
    let values = {
        let mut walker = Walker {
            locale: target.locale(),
            errors: &mut collected,
        };
        walker.walk(target.parameters().nodes(), target.validation_context().as_map(), true)?
    };

    let errors = target.validation_errors_mut();
    for (attribute, messages) in collected.messages() {
        for message in messages {
            errors.add(attribute.clone(), message.clone());
        }
    }
    target.assign(Params::from(values));

    if target.validation_errors().is_empty() {
        return Ok(());
    }
    let errors = target.validation_errors();
    debug!(attributes = errors.len(), "parameter validation failed");
    let metadata = Metadata::new()
        .with("reason", errors.to_sentence())
        .with("messages", errors.to_value());
    Err(target.fail_validation(metadata))
}

struct Walker<'a> {
    locale: &'a Locale,
    errors: &'a mut Errors,
}

impl Walker<'_> {
    /// `active` is false under an absent optional parent, where required
    /// children are not enforced.
    fn walk(
        &mut self,
        nodes: &[ParamNode],
        source: &Map<String, Value>,
        active: bool,
    ) -> Result<Map<String, Value>, TaskError> {
        let mut values = Map::new();
        for node in nodes {
            if let Some(value) = self.visit(node, source.get(node.name()), active)? {
                values.insert(node.name().to_string(), value);
            }
        }
        Ok(values)
    }

    fn visit(&mut self, node: &ParamNode, raw: Option<&Value>, active: bool) -> Result<Option<Value>, TaskError> {
        let present = raw.is_some_and(|value| !value.is_null());
        let value = match node.coerce(raw) {
            Ok(value) => value,
            Err(err) => {
                // Children have nothing to read from.
                self.errors.add(node.name(), err.message(self.locale));
                return Ok(None);
            }
        };

        if !present && value.is_none() && node.is_required() && active {
            self.errors
                .add(node.name(), self.locale.translate("taskchain.params.required", &[]));
        }

        if let Some(value) = &value {
            for validator in node.options().validators() {
                match validator.check(value, self.locale) {
                    Ok(()) => {}
                    Err(CheckError::Invalid(message)) => self.errors.add(node.name(), message),
                    Err(CheckError::Unexpected(err)) => return Err(TaskError::Unexpected(err)),
                }
            }
        }

        if node.children().is_empty() {
            return Ok(value);
        }
        let child_active = present || value.is_some() || (node.is_required() && active);
        match node.kind() {
            ParamType::Array => self.visit_elements(node, value, child_active),
            _ => {
                let empty = Map::new();
                let object = value.as_ref().and_then(Value::as_object).unwrap_or(&empty);
                let children = self.walk(node.children(), object, child_active)?;
                match value {
                    Some(Value::Object(mut map)) => {
                        map.extend(children);
                        Ok(Some(Value::Object(map)))
                    }
                    other => Ok(other),
                }
            }
        }
    }

    /// Validate children against every object element of an array.
    fn visit_elements(
        &mut self,
        node: &ParamNode,
        value: Option<Value>,
        active: bool,
    ) -> Result<Option<Value>, TaskError> {
        let items = match value {
            Some(Value::Array(items)) => items,
            other => {
                // Nothing to iterate; still report required children when the
                // array itself is missing.
                self.walk(node.children(), &Map::new(), active && other.is_none())?;
                return Ok(other);
            }
        };
        let mut coerced = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(mut map) => {
                    let children = self.walk(node.children(), &map, true)?;
                    map.extend(children);
                    coerced.push(Value::Object(map));
                }
                other => coerced.push(other),
            }
        }
        Ok(Some(Value::Array(coerced)))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use serde_json::json;

    use super::*;
    use crate::params::node::Param;
    use crate::params::tree::ParamsBuilder;
    use crate::params::validators::{Custom, Format, Length, Numeric};
    use crate::test_support::RecordingTarget;

    fn tree(params: Vec<Param>) -> ParamTree {
        let mut builder = ParamsBuilder::new();
        for param in params {
            builder.add(param);
        }
        builder.build().expect("tree")
    }

    #[test]
    fn valid_input_leaves_target_untouched() {
        let tree = tree(vec![
            Param::required("order_id", ParamType::Integer),
            Param::optional("note", ParamType::String).default("none"),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"order_id": "17"}));
        assert!(validate(&mut target).is_ok());
        assert!(target.fail_calls().is_empty());
        assert!(target.errors().is_empty());
        assert_eq!(target.params().get("order_id"), Some(&json!(17)));
        assert_eq!(target.params().get("note"), Some(&json!("none")));
    }

    /// Example from the reason composition rule: two errors in two
    /// parameters produce one fail call.
    #[test]
    fn errors_compose_single_fail_with_reason_and_messages() {
        let tree = tree(vec![
            Param::required("order_id", ParamType::Integer),
            Param::required("email", ParamType::String).validate(Format::matching("@").message("is invalid")),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"email": "nobody"}));
        let err = validate(&mut target).expect_err("invalid");
        assert!(matches!(err, TaskError::Fault(_)));

        let calls = target.fail_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].reason(),
            Some("order_id is a required parameter. email is invalid")
        );
        assert_eq!(
            calls[0].get("messages"),
            Some(&json!({"order_id": ["is a required parameter"], "email": ["is invalid"]}))
        );
    }

    #[test]
    fn walk_is_not_fail_fast() {
        let tree = tree(vec![
            Param::required("a", ParamType::Integer),
            Param::required("b", ParamType::Integer),
            Param::required("c", ParamType::String).validate(Length::at_least(3)),
            Param::required("d", ParamType::Float).validate(Numeric::at_most(1.0)),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"b": "x", "c": "ab", "d": 2}));
        validate(&mut target).expect_err("invalid");
        assert_eq!(
            target.errors().full_messages(),
            vec![
                "a is a required parameter",
                "b could not coerce into an integer",
                "c length must be at least 3",
                "d must be at most 1",
            ]
        );
        assert_eq!(target.fail_calls().len(), 1);
    }

    #[test]
    fn nested_required_children_follow_parent_presence() {
        let tree = tree(vec![
            Param::required("billing", ParamType::Hash).child(Param::required("zip", ParamType::String)),
            Param::optional("shipping", ParamType::Hash).child(Param::required("zip", ParamType::String)),
        ]);

        let mut absent = RecordingTarget::new(tree.clone(), json!({}));
        validate(&mut absent).expect_err("billing missing");
        assert_eq!(
            absent.errors().messages()["billing"],
            vec!["is a required parameter"]
        );
        assert_eq!(absent.errors().get("zip"), ["is a required parameter"]);

        let mut shipping_only = RecordingTarget::new(tree, json!({"billing": {"zip": "12345"}, "shipping": {}}));
        validate(&mut shipping_only).expect_err("shipping zip missing");
        assert_eq!(shipping_only.errors().full_messages(), vec!["zip is a required parameter"]);
    }

    #[test]
    fn uncoercible_parent_reports_only_itself() {
        let tree = tree(vec![
            Param::optional("shipping", ParamType::Hash).child(Param::required("zip", ParamType::String)),
            Param::required("lines", ParamType::Array).child(Param::required("sku", ParamType::String)),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"shipping": 5, "lines": {"sku": "A"}}));
        validate(&mut target).expect_err("invalid");
        assert_eq!(
            target.errors().full_messages(),
            vec![
                "shipping could not coerce into a hash",
                "lines could not coerce into an array",
            ]
        );
        assert_eq!(target.fail_calls().len(), 1);
    }

    #[test]
    fn optional_absent_parent_skips_children() {
        let tree = tree(vec![
            Param::optional("shipping", ParamType::Hash).child(Param::required("zip", ParamType::String)),
        ]);
        let mut target = RecordingTarget::new(tree, json!({}));
        assert!(validate(&mut target).is_ok());
        assert!(!target.params().contains("shipping"));
    }

    #[test]
    fn nested_values_are_coerced_in_place() {
        let tree = tree(vec![
            Param::required("item", ParamType::Hash)
                .child(Param::required("qty", ParamType::Integer))
                .child(Param::optional("gift", ParamType::Boolean).default(false)),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"item": {"qty": "2", "sku": "A1"}}));
        validate(&mut target).expect("valid");
        assert_eq!(
            target.params().get("item"),
            Some(&json!({"qty": 2, "sku": "A1", "gift": false}))
        );
    }

    #[test]
    fn array_children_validate_each_element() {
        let tree = tree(vec![
            Param::required("lines", ParamType::Array).child(Param::required("sku", ParamType::String)),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"lines": [{"sku": "A"}, {"qty": 1}, {}]}));
        validate(&mut target).expect_err("missing sku");
        assert_eq!(target.errors().full_messages(), vec!["sku is a required parameter"]);

        let tree = self::tree(vec![
            Param::required("lines", ParamType::Array).child(Param::required("qty", ParamType::Integer)),
        ]);
        let mut valid = RecordingTarget::new(tree, json!({"lines": [{"qty": "3"}]}));
        validate(&mut valid).expect("valid");
        assert_eq!(valid.params().get("lines"), Some(&json!([{"qty": 3}])));
    }

    #[test]
    fn unexpected_validator_errors_propagate_without_fail() {
        let tree = tree(vec![
            Param::required("qty", ParamType::Integer)
                .validate(Custom::new("broken", |_| Err(anyhow!("lookup service down")))),
        ]);
        let mut target = RecordingTarget::new(tree, json!({"qty": 1}));
        let err = validate(&mut target).expect_err("unexpected");
        match err {
            TaskError::Unexpected(err) => assert_eq!(err.to_string(), "lookup service down"),
            other => panic!("expected unexpected error, got {other:?}"),
        }
        assert!(target.fail_calls().is_empty());
    }

    #[test]
    fn validators_skip_absent_optional_values() {
        let tree = tree(vec![Param::optional("code", ParamType::String).validate(Length::exactly(4))]);
        let mut target = RecordingTarget::new(tree, json!({"code": null}));
        assert!(validate(&mut target).is_ok());
    }
}
