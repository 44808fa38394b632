//! # Switchyard - Bypass Controllers for Node-Graph Editors
//!
//! **Switchyard** implements the controller nodes of a node-graph editor that
//! switch other nodes on and off, plus the self-stabilizing dynamic ports those
//! controllers are built on. It models the editor host in memory, so the whole
//! behaviour runs and tests without a UI.
//!
//! ## Core Workflow
//!
//! 1.  **Build a Session**: `Session::builder()` configures debounce, width decay,
//!     group polling and which node types count as transparent relays.
//! 2.  **Populate the Graph**: add nodes and groups, or load a saved workflow via
//!     `Session::load_document` (any type implementing `IntoWorkflow`).
//! 3.  **Drive Events**: connect ports, change widgets, select rules. Controllers
//!     react through their `Controller` hooks.
//! 4.  **Advance Time**: all deferred work is a timer on a virtual clock.
//!     `Session::advance(ms)` or `Session::settle()` fires what is due.
//! 5.  **Save**: `Session::to_document` writes every controller's state back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchyard::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::builder().with_stabilize_delay(50).build();
//!
//!     let sampler = session.add_node(Node::new("KSampler").titled("Sampler"));
//!     let upscale = session.add_node(Node::new("Upscale").with_output("IMAGE", "IMAGE"));
//!     let controller = session.add_controller(IndexRuleController::TYPE_NAME)?;
//!
//!     session.connect(upscale, 0, controller, 0);
//!     session.settle();
//!
//!     session.set_rules_source(controller, r#"{"fast": [1], "none": []}"#)?;
//!     session.refresh_rules(controller)?;
//!     session.select_rule(controller, "none")?;
//!
//!     println!("{}", ModeReport::format(session.graph()));
//!     let _ = sampler;
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod document;
pub mod error;
pub mod graph;
pub mod host;
pub mod prelude;
pub mod reconciler;
pub mod report;
pub mod resolver;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod width;
