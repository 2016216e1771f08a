//! Ordered collection of top-level parameters declared for a task type.
//!
//! Trees are built once per task type and shared read-only (behind `Arc`)
//! across every invocation. Iteration, display and snapshots all follow
//! declaration order.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DeclarationError;
use crate::params::node::{Param, ParamNode, ParamOptions, ParamType, Source};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTree {
    nodes: Vec<ParamNode>,
}

impl ParamTree {
    /// Top-level nodes must read from the context and have unique names.
    pub fn new(nodes: Vec<ParamNode>) -> Result<Self, DeclarationError> {
        for (i, node) in nodes.iter().enumerate() {
            if node.source() != &Source::Context {
                return Err(DeclarationError::SourceMismatch {
                    name: node.name().to_string(),
                    expected: Source::Context,
                    actual: node.source().clone(),
                });
            }
            if nodes[..i].iter().any(|other| other.name() == node.name()) {
                return Err(DeclarationError::DuplicateName(node.name().to_string()));
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[ParamNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParamNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    pub fn snapshot(&self) -> Vec<ParamSnapshot> {
        self.nodes.iter().map(ParamSnapshot::from).collect()
    }

    /// Rebuild a tree from its snapshot.
    ///
    /// Yields the same structural shape; custom validators cannot be
    /// reconstructed and are dropped.
    pub fn from_snapshots(snapshots: &[ParamSnapshot]) -> Result<Self, DeclarationError> {
        let nodes = snapshots
            .iter()
            .map(ParamSnapshot::to_node)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(nodes)
    }
}

impl<'a> IntoIterator for &'a ParamTree {
    type Item = &'a ParamNode;
    type IntoIter = std::slice::Iter<'a, ParamNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl fmt::Display for ParamTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        for node in &self.nodes {
            describe(node, 0, &mut lines)?;
        }
        f.write_str(&lines.join("\n"))
    }
}

fn describe(node: &ParamNode, depth: usize, lines: &mut Vec<String>) -> fmt::Result {
    let options = serde_json::to_string(&node.options().to_map()).map_err(|_| fmt::Error)?;
    lines.push(format!(
        "{}Parameter: name={} type={} source={} required={} options={}",
        "  ".repeat(depth),
        node.name(),
        node.kind(),
        node.source(),
        node.is_required(),
        options,
    ));
    for child in node.children() {
        describe(child, depth + 1, lines)?;
    }
    Ok(())
}

/// Structural projection of a parameter and its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub source: Source,
    pub required: bool,
    pub options: Map<String, Value>,
    pub children: Vec<ParamSnapshot>,
}

impl ParamSnapshot {
    fn to_node(&self) -> Result<ParamNode, DeclarationError> {
        let children = self
            .children
            .iter()
            .map(ParamSnapshot::to_node)
            .collect::<Result<Vec<_>, _>>()?;
        ParamNode::declare(
            self.name.clone(),
            self.kind,
            self.required,
            ParamOptions::from_map(&self.name, &self.options)?,
            self.source.clone(),
            children,
        )
    }
}

impl From<&ParamNode> for ParamSnapshot {
    fn from(node: &ParamNode) -> Self {
        Self {
            name: node.name().to_string(),
            kind: node.kind(),
            source: node.source().clone(),
            required: node.is_required(),
            options: node.options().to_map(),
            children: node.children().iter().map(ParamSnapshot::from).collect(),
        }
    }
}

/// Collects declarations for one task type.
#[derive(Debug, Default)]
pub struct ParamsBuilder {
    params: Vec<Param>,
}

impl ParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, param: Param) -> &mut Self {
        self.params.push(param);
        self
    }

    pub fn build(self) -> Result<ParamTree, DeclarationError> {
        let nodes = self
            .params
            .into_iter()
            .map(|param| param.build(Source::Context))
            .collect::<Result<Vec<_>, _>>()?;
        ParamTree::new(nodes)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params::validators::{Custom, Inclusion, Length, Presence};

    fn order_tree() -> ParamTree {
        let mut builder = ParamsBuilder::new();
        builder
            .add(Param::required("order_id", ParamType::Integer))
            .add(
                Param::required("address", ParamType::Hash)
                    .child(Param::required("street", ParamType::String).validate(Presence::new()))
                    .child(Param::optional("zip", ParamType::String).validate(Length::exactly(5))),
            )
            .add(
                Param::optional("method", ParamType::String)
                    .default("card")
                    .validate(Inclusion::of(["card", "cash"])),
            );
        builder.build().expect("tree")
    }

    #[test]
    fn snapshot_preserves_declaration_order_and_nesting() {
        let snapshot = order_tree().snapshot();
        let names: Vec<_> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["order_id", "address", "method"]);
        let children: Vec<_> = snapshot[1].children.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(children, ["street", "zip"]);
        assert_eq!(snapshot[1].children[0].source, Source::Parent("address".to_string()));
        assert_eq!(
            serde_json::to_value(&snapshot[2]).expect("json"),
            json!({
                "name": "method",
                "type": "string",
                "source": "context",
                "required": false,
                "options": {"default": "card", "validators": [{"inclusion": {"of": ["card", "cash"]}}]},
                "children": []
            })
        );
    }

    #[test]
    fn rebuilding_from_snapshot_yields_equal_shape() {
        let tree = order_tree();
        let rebuilt = ParamTree::from_snapshots(&tree.snapshot()).expect("rebuild");
        assert_eq!(rebuilt, tree);
        assert_eq!(rebuilt.snapshot(), tree.snapshot());
    }

    #[test]
    fn snapshot_survives_json_round_trip() {
        let tree = order_tree();
        let json = serde_json::to_string(&tree.snapshot()).expect("json");
        let parsed: Vec<ParamSnapshot> = serde_json::from_str(&json).expect("parse");
        assert_eq!(ParamTree::from_snapshots(&parsed).expect("rebuild"), tree);
    }

    #[test]
    fn parent_named_context_survives_json_round_trip() {
        let mut builder = ParamsBuilder::new();
        builder.add(Param::required("context", ParamType::Hash).child(Param::required("id", ParamType::Integer)));
        let tree = builder.build().expect("tree");
        let json = serde_json::to_value(tree.snapshot()).expect("json");
        assert_eq!(json[0]["children"][0]["source"], json!({"parent": "context"}));

        let parsed: Vec<ParamSnapshot> = serde_json::from_value(json).expect("parse");
        assert_eq!(ParamTree::from_snapshots(&parsed).expect("rebuild"), tree);
    }

    #[test]
    fn custom_validators_are_dropped_on_rebuild() {
        let mut builder = ParamsBuilder::new();
        builder.add(Param::required("qty", ParamType::Integer).validate(Custom::new("odd", |_| Ok(true))));
        let tree = builder.build().expect("tree");
        let rebuilt = ParamTree::from_snapshots(&tree.snapshot()).expect("rebuild");
        assert!(rebuilt.nodes()[0].options().validators().is_empty());
    }

    #[test]
    fn duplicate_top_level_names_are_rejected() {
        let mut builder = ParamsBuilder::new();
        builder
            .add(Param::required("sku", ParamType::String))
            .add(Param::optional("sku", ParamType::String));
        assert!(matches!(builder.build(), Err(DeclarationError::DuplicateName(_))));
    }

    #[test]
    fn display_indents_children() {
        let text = order_tree().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Parameter: name=order_id type=integer source=context required=true options={}"
        );
        assert_eq!(
            lines[2],
            r#"  Parameter: name=street type=string source=address required=true options={"validators":[{"presence":{}}]}"#
        );
        assert_eq!(lines.len(), 5);
    }
}
