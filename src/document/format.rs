use crate::error::DocumentError;
use crate::graph::{
    ANY_TYPE, Group, InputSlot, Link, LinkId, Node, NodeId, OutputSlot, ParamSpec, Rect, Subgraph,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// The host's saved workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub last_node_id: NodeId,
    #[serde(default)]
    pub last_link_id: LinkId,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One node as saved by the host. Controller fields land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub pos: [f32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[f32; 2]>,
    #[serde(default)]
    pub mode: u8,
    #[serde(default)]
    pub inputs: Vec<InputRecord>,
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub widgets_values: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<SubgraphRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "any_type")]
    pub type_tag: String,
    #[serde(default)]
    pub link: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<ParamSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "any_type")]
    pub type_tag: String,
    #[serde(default)]
    pub links: Option<Vec<LinkId>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphRecord {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

/// `[id, origin_id, origin_slot, target_id, target_slot, type]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord(
    pub LinkId,
    pub NodeId,
    pub usize,
    pub NodeId,
    pub usize,
    pub Value,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(default)]
    pub title: String,
    /// `[x, y, width, height]`
    pub bounding: [f32; 4],
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn any_type() -> String {
    ANY_TYPE.to_string()
}

impl WorkflowDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DocumentError::ValidationError(e.to_string()))
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DocumentError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?).map_err(|e| DocumentError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl NodeRecord {
    /// Snapshots a node. Widget values are written positionally; a node
    /// without widgets keeps whatever values it was loaded with.
    pub fn from_node(node: &Node) -> Self {
        let mut extra = node.extra.clone();
        let saved_values = extra.remove("widgets_values").unwrap_or(Value::Null);
        let widgets_values = if node.widgets.is_empty() {
            saved_values
        } else {
            Value::Array(node.widgets.iter().map(|w| w.value.clone()).collect())
        };
        Self {
            id: node.id,
            type_tag: node.type_tag.clone(),
            title: Some(node.title.clone()),
            pos: node.pos,
            size: Some(node.size),
            mode: node.host_mode_code(),
            inputs: node
                .inputs
                .iter()
                .map(|slot| InputRecord {
                    name: slot.name.clone(),
                    type_tag: slot.type_tag.clone(),
                    link: slot.link,
                    param: slot.param.clone(),
                    extra: Map::new(),
                })
                .collect(),
            outputs: node
                .outputs
                .iter()
                .map(|slot| OutputRecord {
                    name: slot.name.clone(),
                    type_tag: slot.type_tag.clone(),
                    links: Some(slot.links.clone()),
                    extra: Map::new(),
                })
                .collect(),
            widgets_values,
            subgraph: node.subgraph.as_ref().map(|sub| SubgraphRecord {
                nodes: sub.nodes.iter().map(NodeRecord::from_node).collect(),
            }),
            extra,
        }
    }

    /// Builds a detached node. Port link references are left empty; links are
    /// restored separately once every node exists.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(&self.type_tag).with_id(self.id);
        self.apply_to(&mut node);
        node
    }

    /// Overwrites a node's saved state the way the host's configure step does.
    ///
    /// Widgets created by the node itself are kept; their values are restored
    /// separately through [`NodeRecord::apply_widget_values`].
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(title) = &self.title {
            node.title = title.clone();
        }
        node.pos = self.pos;
        node.restore_host_mode(self.mode);
        node.inputs = self
            .inputs
            .iter()
            .map(|record| {
                let mut slot = InputSlot::new(&record.name, &record.type_tag);
                slot.param = record.param.clone();
                slot
            })
            .collect();
        node.outputs = self
            .outputs
            .iter()
            .map(|record| OutputSlot::new(&record.name, &record.type_tag))
            .collect();
        node.subgraph = self.subgraph.as_ref().map(|sub| Subgraph {
            nodes: sub.nodes.iter().map(NodeRecord::to_node).collect(),
        });
        node.extra = self.extra.clone();
        if node.widgets.is_empty() && !self.widgets_values.is_null() {
            node.extra
                .insert("widgets_values".to_string(), self.widgets_values.clone());
        }
        node.size = self.size.unwrap_or_else(|| node.natural_size());
    }

    /// Restores widget values by position. Extra values are ignored.
    pub fn apply_widget_values(&self, node: &mut Node) {
        let Value::Array(values) = &self.widgets_values else {
            return;
        };
        for (widget, value) in node.widgets.iter_mut().zip(values) {
            widget.value = value.clone();
        }
    }

    /// The record as a JSON object, the shape controllers read and write.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::ValidationError(e.to_string()))
    }
}

impl LinkRecord {
    pub fn from_link(link: &Link) -> Self {
        Self(
            link.id,
            link.origin_id,
            link.origin_slot,
            link.target_id,
            link.target_slot,
            Value::String(link.type_tag.clone()),
        )
    }

    pub fn to_link(&self) -> Link {
        Link {
            id: self.0,
            origin_id: self.1,
            origin_slot: self.2,
            target_id: self.3,
            target_slot: self.4,
            type_tag: self.5.as_str().unwrap_or(ANY_TYPE).to_string(),
        }
    }
}

impl GroupRecord {
    pub fn from_group(group: &Group) -> Self {
        let r = &group.bounding;
        Self {
            title: group.title.clone(),
            bounding: [r.x, r.y, r.width, r.height],
            extra: Map::new(),
        }
    }

    pub fn to_group(&self) -> Group {
        let [x, y, width, height] = self.bounding;
        Group::new(&self.title, Rect::new(x, y, width, height))
    }
}
