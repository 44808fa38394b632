//! Prelude module for convenient imports
//!
//! Re-exports the types most sessions need: the session itself, the graph
//! model, the controllers and the error types.
//!
//! # Example
//!
//! ```rust,no_run
//! use switchyard::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let mut session = Session::new();
//! session.load_file("path/to/workflow.json")?;
//! session.settle();
//! println!("{}", ModeReport::format(session.graph()));
//! # Ok(())
//! # }
//! ```

// Host model
pub use crate::host::{Canvas, HostContext, Notice};
pub use crate::session::{LoadSummary, Session, SessionBuilder};
pub use crate::settings::Settings;

// Graph
pub use crate::graph::{Graph, Group, LinkId, Mode, Node, NodeId, Rect, WidgetId, WidgetKind};

// Controllers
pub use crate::controller::{
    Controller, GroupRuleController, GroupToggleController, IndexRuleController,
    InputToggleController, NonNullSwitch, ParameterDistributor, WidgetRole,
};

// Rules and persistence
pub use crate::document::{IntoWorkflow, WorkflowDocument};
pub use crate::rules::{GroupRuleTable, IndexRuleTable, RuleTable};

// Error types
pub use crate::error::{DocumentError, RuleParseError, SessionError, StateError};

// Reporting
pub use crate::report::ModeReport;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
