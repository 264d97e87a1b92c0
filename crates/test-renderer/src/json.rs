use std::fmt::{self, Write as _};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::{
    node::{CHILDREN_PROP, Node, NodeId, Props},
    tree::HostTree,
};

/// Marker carried by every serialized element so snapshot printers render it as JSX.
pub const SNAPSHOT_TAG: &str = "react.test.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonNode {
    Element(JsonElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonElement {
    #[serde(rename = "type")]
    pub element_type: SmolStr,
    pub props: Props,
    pub children: Option<Vec<JsonNode>>,
    #[serde(rename = "$$typeof", default = "snapshot_tag")]
    pub snapshot_tag: SmolStr,
}

fn snapshot_tag() -> SmolStr {
    SmolStr::new_static(SNAPSHOT_TAG)
}

impl JsonElement {
    pub fn new(element_type: impl Into<SmolStr>, props: Props, children: Option<Vec<JsonNode>>) -> Self {
        Self {
            element_type: element_type.into(),
            props,
            children,
            snapshot_tag: snapshot_tag(),
        }
    }
}

impl JsonNode {
    pub fn as_element(&self) -> Option<&JsonElement> {
        match self {
            JsonNode::Element(element) => Some(element),
            JsonNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            JsonNode::Element(_) => None,
            JsonNode::Text(text) => Some(text),
        }
    }
}

impl From<JsonElement> for JsonNode {
    fn from(element: JsonElement) -> Self {
        JsonNode::Element(element)
    }
}

/// Serializes `node` and its visible descendants.
///
/// Returns `None` when the node is hidden or unknown. The container always
/// becomes a wrapper element typed with the configured container label.
pub fn to_json(tree: &HostTree, node_id: NodeId) -> Option<JsonNode> {
    match tree.node(node_id)? {
        Node::Container(container) => Some(
            JsonElement::new(
                container.config.container_type_label.clone(),
                Props::new(),
                children_to_json(tree, node_id),
            )
            .into(),
        ),
        Node::Instance(instance) if !instance.hidden => {
            let props = instance
                .props
                .iter()
                .filter(|(key, _)| key.as_str() != CHILDREN_PROP)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Some(JsonElement::new(instance.element_type.clone(), props, children_to_json(tree, node_id)).into())
        }
        Node::Text(text) if !text.hidden => Some(JsonNode::Text(text.text.clone())),
        Node::Instance(_) | Node::Text(_) => None,
    }
}

fn children_to_json(tree: &HostTree, node_id: NodeId) -> Option<Vec<JsonNode>> {
    let children = tree
        .children(node_id)
        .iter()
        .filter_map(|child| to_json(tree, *child))
        .collect::<Vec<_>>();

    if children.is_empty() { None } else { Some(children) }
}

const INDENT: &str = "  ";

impl fmt::Display for JsonNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_node(&mut out, self, 0)?;
        f.write_str(&out)
    }
}

impl fmt::Display for JsonElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_element(&mut out, self, 0)?;
        f.write_str(&out)
    }
}

fn write_node(out: &mut String, node: &JsonNode, depth: usize) -> fmt::Result {
    match node {
        JsonNode::Element(element) => write_element(out, element, depth),
        JsonNode::Text(text) => {
            write_indent(out, depth);
            out.push_str(text);
            Ok(())
        }
    }
}

fn write_element(out: &mut String, element: &JsonElement, depth: usize) -> fmt::Result {
    write_indent(out, depth);
    write!(out, "<{}", element.element_type)?;

    for (key, value) in element.props.iter().sorted_by(|(a, _), (b, _)| a.cmp(b)) {
        out.push('\n');
        write_indent(out, depth + 1);
        match value {
            serde_json::Value::String(s) => write!(out, "{key}={}", serde_json::Value::from(s.as_str()))?,
            other => write!(out, "{key}={{{other}}}")?,
        }
    }

    let has_props = !element.props.is_empty();
    if has_props {
        out.push('\n');
        write_indent(out, depth);
    }

    match &element.children {
        None => out.push_str(if has_props { "/>" } else { " />" }),
        Some(children) => {
            out.push('>');
            for child in children {
                out.push('\n');
                write_node(out, child, depth + 1)?;
            }
            out.push('\n');
            write_indent(out, depth);
            write!(out, "</{}>", element.element_type)?;
        }
    }

    Ok(())
}

fn write_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}
