use super::widget::{ParamSpec, Widget, WidgetId, WidgetKind};
use super::{LinkId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Host layout metrics used by the natural size computation.
const SLOT_HEIGHT: f32 = 20.0;
const WIDGET_HEIGHT: f32 = 24.0;
const CHAR_WIDTH: f32 = 7.0;
const TITLE_PADDING: f32 = 40.0;
const MIN_WIDTH: f32 = 50.0;
const WIDGET_MIN_WIDTH: f32 = 210.0;

/// Execution mode of a node, collapsed to the two states this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Active,
    Bypassed,
}

impl Mode {
    /// Collapses a host mode code: `0` runs, everything else counts as bypassed.
    pub fn from_host(code: u8) -> Self {
        if code == 0 {
            Mode::Active
        } else {
            Mode::Bypassed
        }
    }

    pub fn host_code(self) -> u8 {
        match self {
            Mode::Active => 0,
            Mode::Bypassed => 4,
        }
    }

    pub fn from_active(active: bool) -> Self {
        if active { Mode::Active } else { Mode::Bypassed }
    }
}

/// An input port. Inputs accept at most one link.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSlot {
    pub name: String,
    pub type_tag: String,
    pub link: Option<LinkId>,
    pub param: Option<ParamSpec>,
}

impl InputSlot {
    pub fn new(name: &str, type_tag: &str) -> Self {
        Self {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            link: None,
            param: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

/// An output port. Outputs may fan out to any number of links.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSlot {
    pub name: String,
    pub type_tag: String,
    pub links: Vec<LinkId>,
}

impl OutputSlot {
    pub fn new(name: &str, type_tag: &str) -> Self {
        Self {
            name: name.to_string(),
            type_tag: type_tag.to_string(),
            links: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.links.is_empty()
    }
}

/// Nodes embedded inside a container node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub type_tag: String,
    pub title: String,
    pub pos: [f32; 2],
    pub size: [f32; 2],
    pub mode: Mode,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSlot>,
    pub widgets: Vec<Widget>,
    pub subgraph: Option<Subgraph>,
    /// Saved-record fields this crate does not interpret, kept for round trips.
    pub extra: Map<String, Value>,
    /// Mode code loaded from the host, kept until the mode is next written.
    host_mode: Option<u8>,
    next_widget_id: u32,
}

impl Node {
    /// Creates a node of the given host type, titled after the type.
    pub fn new(type_tag: &str) -> Self {
        let mut node = Self {
            id: 0,
            type_tag: type_tag.to_string(),
            title: type_tag.to_string(),
            pos: [0.0, 0.0],
            size: [0.0, 0.0],
            mode: Mode::Active,
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            subgraph: None,
            extra: Map::new(),
            host_mode: None,
            next_widget_id: 0,
        };
        node.size = node.natural_size();
        node
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.pos = [x, y];
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.size = [width, height];
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.set_mode(mode);
        self
    }

    /// Writes the mode. Returns `true` if it changed. Any loaded host code is
    /// dropped, so the next save writes the code of the new mode.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        self.host_mode = None;
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    /// Restores a saved host mode code, keeping it verbatim for the next save.
    pub fn restore_host_mode(&mut self, code: u8) {
        self.mode = Mode::from_host(code);
        self.host_mode = Some(code);
    }

    /// The host mode code to save: the loaded code while the mode is untouched.
    pub fn host_mode_code(&self) -> u8 {
        self.host_mode.unwrap_or(self.mode.host_code())
    }

    pub fn with_input(mut self, name: &str, type_tag: &str) -> Self {
        self.inputs.push(InputSlot::new(name, type_tag));
        self
    }

    pub fn with_param_input(mut self, name: &str, type_tag: &str, param: ParamSpec) -> Self {
        let mut slot = InputSlot::new(name, type_tag);
        slot.param = Some(param);
        self.inputs.push(slot);
        self
    }

    pub fn with_output(mut self, name: &str, type_tag: &str) -> Self {
        self.outputs.push(OutputSlot::new(name, type_tag));
        self
    }

    /// Embeds `nodes` as this node's subgraph. Nested nodes without an id
    /// (id `0`) get fresh ids after the largest id already in the list.
    pub fn with_subgraph(mut self, mut nodes: Vec<Node>) -> Self {
        let mut next_id = nodes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        for node in nodes.iter_mut().filter(|n| n.id == 0) {
            node.id = next_id;
            next_id += 1;
        }
        self.subgraph = Some(Subgraph { nodes });
        self
    }

    /// Center point used for group membership.
    pub fn center(&self) -> [f32; 2] {
        [
            self.pos[0] + self.size[0] / 2.0,
            self.pos[1] + self.size[1] / 2.0,
        ]
    }

    pub fn width(&self) -> f32 {
        self.size[0]
    }

    /// The size the host would pick for this node from its title, slots and widgets.
    pub fn natural_size(&self) -> [f32; 2] {
        let text_width = |text: &str| text.chars().count() as f32 * CHAR_WIDTH;

        let title_width = text_width(&self.title) + TITLE_PADDING;
        let input_width = self
            .inputs
            .iter()
            .map(|slot| text_width(&slot.name))
            .fold(0.0, f32::max);
        let output_width = self
            .outputs
            .iter()
            .map(|slot| text_width(&slot.name))
            .fold(0.0, f32::max);

        let mut width = (input_width + output_width + 10.0)
            .max(title_width)
            .max(MIN_WIDTH);
        if !self.widgets.is_empty() {
            width = width.max(WIDGET_MIN_WIDTH);
        }

        let rows = self.inputs.len().max(self.outputs.len()).max(1) as f32;
        let mut height = rows * SLOT_HEIGHT + 6.0;
        if !self.widgets.is_empty() {
            height += self.widgets.len() as f32 * WIDGET_HEIGHT + 8.0;
        }
        [width, height]
    }

    // --- Widgets ---

    pub fn add_widget(&mut self, name: &str, kind: WidgetKind, value: Value) -> WidgetId {
        let id = WidgetId(self.next_widget_id);
        self.next_widget_id += 1;
        self.widgets.push(Widget {
            id,
            name: name.to_string(),
            kind,
            value,
        });
        id
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    pub fn widget_named(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn widget_index(&self, id: WidgetId) -> Option<usize> {
        self.widgets.iter().position(|w| w.id == id)
    }

    pub fn remove_widget(&mut self, id: WidgetId) -> Option<Widget> {
        let index = self.widget_index(id)?;
        Some(self.widgets.remove(index))
    }

    /// Moves a widget to the end of the list. Returns `false` if it does not exist.
    pub fn move_widget_to_end(&mut self, id: WidgetId) -> bool {
        match self.widget_index(id) {
            Some(index) => {
                let widget = self.widgets.remove(index);
                self.widgets.push(widget);
                true
            }
            None => false,
        }
    }
}
