use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Stable identity of a widget within its node. Survives reordering and removal
/// of sibling widgets, unlike the widget's position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WidgetId(pub u32);

/// The kind of a host UI control, together with its kind-specific options.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetKind {
    Combo {
        values: Vec<String>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: f64,
        precision: u32,
    },
    Text {
        multiline: bool,
    },
    Toggle {
        on: String,
        off: String,
    },
    Button,
}

impl WidgetKind {
    /// Host name of the widget type (`combo`, `number`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            WidgetKind::Combo { .. } => "combo",
            WidgetKind::Number { .. } => "number",
            WidgetKind::Text { .. } => "text",
            WidgetKind::Toggle { .. } => "toggle",
            WidgetKind::Button => "button",
        }
    }

    /// The options object the host stores next to the widget type.
    pub fn options(&self) -> Value {
        match self {
            WidgetKind::Combo { values } => json!({ "values": values }),
            WidgetKind::Number {
                min,
                max,
                step,
                precision,
            } => json!({ "min": min, "max": max, "step": step, "precision": precision }),
            WidgetKind::Text { multiline } => json!({ "multiline": multiline }),
            WidgetKind::Toggle { on, off } => json!({ "on": on, "off": off }),
            WidgetKind::Button => json!({}),
        }
    }

    /// Rebuilds a kind from its saved type name and options. Unknown types yield `None`.
    pub fn from_parts(type_name: &str, options: &Value) -> Option<Self> {
        let f64_field = |name: &str| options.get(name).and_then(Value::as_f64);
        let str_field = |name: &str, fallback: &str| {
            options
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        match type_name {
            "combo" => {
                let values = options
                    .get("values")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                Some(WidgetKind::Combo { values })
            }
            "number" => Some(WidgetKind::Number {
                min: f64_field("min"),
                max: f64_field("max"),
                step: f64_field("step").unwrap_or(1.0),
                precision: options
                    .get("precision")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            }),
            "text" => Some(WidgetKind::Text {
                multiline: options
                    .get("multiline")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }),
            "toggle" => Some(WidgetKind::Toggle {
                on: str_field("on", "true"),
                off: str_field("off", "false"),
            }),
            "button" => Some(WidgetKind::Button),
            _ => None,
        }
    }
}

/// A host UI control attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: WidgetId,
    pub name: String,
    pub kind: WidgetKind,
    pub value: Value,
}

impl Widget {
    pub fn as_bool(&self) -> bool {
        self.value.as_bool().unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        self.value.as_str().unwrap_or("")
    }

    /// Options offered by a combo widget; empty for every other kind.
    pub fn combo_values(&self) -> &[String] {
        match &self.kind {
            WidgetKind::Combo { values } => values,
            _ => &[],
        }
    }
}

/// The expected value of a node input, as declared by the host node definition.
/// Used to materialize a matching control for parameter distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ParamSpec {
    Combo {
        options: Vec<String>,
    },
    Int {
        default: Option<i64>,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    Float {
        default: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
    String {
        default: Option<String>,
        #[serde(default)]
        multiline: bool,
    },
    Boolean {
        default: Option<bool>,
    },
}

impl ParamSpec {
    /// The widget kind and initial value mirroring this input definition.
    pub fn widget_template(&self) -> (WidgetKind, Value) {
        match self {
            ParamSpec::Combo { options } => (
                WidgetKind::Combo {
                    values: options.clone(),
                },
                options.first().map(|o| json!(o)).unwrap_or(json!("")),
            ),
            ParamSpec::Int {
                default,
                min,
                max,
                step,
            } => (
                WidgetKind::Number {
                    min: *min,
                    max: *max,
                    step: step.unwrap_or(1.0),
                    precision: 0,
                },
                json!(default.unwrap_or(0)),
            ),
            ParamSpec::Float {
                default,
                min,
                max,
                step,
            } => (
                WidgetKind::Number {
                    min: *min,
                    max: *max,
                    step: step.unwrap_or(0.01),
                    precision: 2,
                },
                json!(default.unwrap_or(0.0)),
            ),
            ParamSpec::String { default, multiline } => (
                WidgetKind::Text {
                    multiline: *multiline,
                },
                json!(default.clone().unwrap_or_default()),
            ),
            ParamSpec::Boolean { default } => (
                WidgetKind::Toggle {
                    on: "true".to_string(),
                    off: "false".to_string(),
                },
                json!(default.unwrap_or(false)),
            ),
        }
    }
}
