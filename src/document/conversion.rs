use super::format::WorkflowDocument;
use crate::error::DocumentError;
use ahash::AHashSet;
use serde_json::Value;

/// A trait for saved-graph formats that can be converted into a `WorkflowDocument`.
///
/// This is the extension point for loading graphs that were not written by
/// the host editor itself. Implement it on your own format and hand the value
/// to `Session::load_document`; every implementation is validated the same way.
///
/// # Example
///
/// ```rust,no_run
/// use switchyard::document::{IntoWorkflow, LinkRecord, NodeRecord, WorkflowDocument};
/// use switchyard::error::DocumentError;
///
/// struct Pipeline {
///     stages: Vec<(u32, String)>,
/// }
///
/// impl IntoWorkflow for Pipeline {
///     fn into_workflow(self) -> Result<WorkflowDocument, DocumentError> {
///         let mut doc = WorkflowDocument::default();
///         for (id, kind) in self.stages {
///             let node = switchyard::graph::Node::new(&kind).with_id(id);
///             doc.nodes.push(NodeRecord::from_node(&node));
///         }
///         Ok(doc)
///     }
/// }
/// ```
pub trait IntoWorkflow {
    /// Consumes the value and converts it into the host's workflow shape.
    fn into_workflow(self) -> Result<WorkflowDocument, DocumentError>;
}

impl IntoWorkflow for WorkflowDocument {
    fn into_workflow(self) -> Result<WorkflowDocument, DocumentError> {
        Ok(self)
    }
}

impl IntoWorkflow for &str {
    fn into_workflow(self) -> Result<WorkflowDocument, DocumentError> {
        WorkflowDocument::from_json(self)
    }
}

impl IntoWorkflow for Value {
    fn into_workflow(self) -> Result<WorkflowDocument, DocumentError> {
        serde_json::from_value(self).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }
}

/// Checks node id uniqueness and that every link joins two nodes of the document.
pub fn validate(doc: &WorkflowDocument) -> Result<(), DocumentError> {
    let mut ids = AHashSet::with_capacity(doc.nodes.len());
    for node in &doc.nodes {
        if !ids.insert(node.id) {
            return Err(DocumentError::DuplicateNode { node_id: node.id });
        }
    }
    for link in &doc.links {
        for endpoint in [link.1, link.3] {
            if !ids.contains(&endpoint) {
                return Err(DocumentError::DanglingLink {
                    link_id: link.0,
                    node_id: endpoint,
                });
            }
        }
    }
    Ok(())
}
