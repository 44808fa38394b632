use crate::controller::WidgetRole;
use crate::graph::{LinkId, NodeId};
use thiserror::Error;

/// Errors that can occur while parsing a rule source text.
///
/// A failed parse never touches the active rule table; the caller surfaces the
/// message to the user and keeps whatever was active before.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("Rule source is not valid JSON: {0}")]
    Syntax(String),

    #[error("Rule source must be a JSON object, but found {found}")]
    NotAnObject { found: &'static str },

    #[error("Rule '{key}' must map to an array, but found {found}")]
    NotAnArray { key: String, found: &'static str },

    #[error("Rule '{key}' has an invalid entry at position {index}: {reason}")]
    InvalidEntry {
        key: String,
        index: usize,
        reason: String,
    },
}

impl RuleParseError {
    /// The rule name the error points at, if the failure is tied to one.
    pub fn key(&self) -> Option<&str> {
        match self {
            RuleParseError::NotAnArray { key, .. } | RuleParseError::InvalidEntry { key, .. } => {
                Some(key.as_str())
            }
            RuleParseError::Syntax(_) | RuleParseError::NotAnObject { .. } => None,
        }
    }
}

/// Errors raised while restoring a controller from its saved record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Saved field '{field}' is invalid: {message}")]
    InvalidField { field: &'static str, message: String },
}

/// Errors that can occur when loading or converting a workflow document.
#[derive(Error, Debug, Clone)]
pub enum DocumentError {
    #[error("Failed to parse workflow JSON: {0}")]
    JsonParseError(String),

    #[error("Could not access '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Link {link_id} references node {node_id}, which is not part of the workflow")]
    DanglingLink { link_id: LinkId, node_id: NodeId },

    #[error("Node {node_id} appears more than once in the workflow")]
    DuplicateNode { node_id: NodeId },

    #[error("Invalid workflow data: {0}")]
    ValidationError(String),
}

/// Errors returned by the `Session` entry points.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("Unknown controller type '{0}'")]
    UnknownControllerType(String),

    #[error("Node {0} does not exist in the graph")]
    NodeNotFound(NodeId),

    #[error("Node {0} is not a controller node")]
    NotAController(NodeId),

    #[error("Node {node} has no widget named '{name}'")]
    WidgetNotFound { node: NodeId, name: String },

    #[error("Node {node} has no {role:?} widget")]
    MissingWidget { node: NodeId, role: WidgetRole },

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}
