//! User-editable rule tables: parsing, selection and application.
//!
//! A rule table maps a rule name to a set of targets. Group-rule controllers
//! target group titles, index-rule controllers target 1-based input slots.
//! Tables are replaced wholesale on every successful parse; a failed parse
//! leaves the previous table untouched.

use crate::error::RuleParseError;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

mod apply;
mod selector;

pub use apply::{
    ApplyOutcome, apply_group_rule, apply_group_toggle, apply_index_rule, apply_toggle,
    connected_sources, set_nodes_mode, toggle_display,
};
pub use selector::{RuleSelector, SelectionChange};

/// An element type a rule may list.
pub trait RuleTarget: Clone + PartialEq + Debug + Serialize {
    /// Validates and converts one JSON array element, or explains why it is rejected.
    fn from_json(value: &Value) -> Result<Self, String>;
}

/// Short description of a JSON value's type for error messages.
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Group titles.
impl RuleTarget for String {
    fn from_json(value: &Value) -> Result<Self, String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("expected a group title string, found {}", describe(value)))
    }
}

/// 1-based input slot indices. Any integer is accepted; indices without a
/// matching slot simply select nothing.
impl RuleTarget for i64 {
    fn from_json(value: &Value) -> Result<Self, String> {
        let integer = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        };
        integer.ok_or_else(|| {
            format!(
                "expected an integer slot index, found {}",
                match value {
                    Value::Number(n) => n.to_string(),
                    other => describe(other).to_string(),
                }
            )
        })
    }
}

/// Ordered mapping of rule name to targets. Insertion order is display order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable<T> {
    rules: IndexMap<String, Vec<T>>,
}

impl<T> Default for RuleTable<T> {
    fn default() -> Self {
        Self {
            rules: IndexMap::new(),
        }
    }
}

impl<T: RuleTarget> RuleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses rule source text. See [`RuleTable::from_value`] for the accepted shape.
    pub fn parse(text: &str) -> Result<Self, RuleParseError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RuleParseError::Syntax(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validates a JSON object of `name -> [targets]`.
    ///
    /// Every value must be an array whose elements are all valid targets of
    /// type `T`; the first violation is reported with the offending rule name.
    pub fn from_value(value: &Value) -> Result<Self, RuleParseError> {
        let object = value.as_object().ok_or(RuleParseError::NotAnObject {
            found: describe(value),
        })?;

        let mut rules = IndexMap::with_capacity(object.len());
        for (key, entries) in object {
            let entries = entries.as_array().ok_or_else(|| RuleParseError::NotAnArray {
                key: key.clone(),
                found: describe(entries),
            })?;
            let targets = entries
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    T::from_json(entry).map_err(|reason| RuleParseError::InvalidEntry {
                        key: key.clone(),
                        index,
                        reason,
                    })
                })
                .collect::<Result<Vec<T>, _>>()?;
            rules.insert(key.clone(), targets);
        }
        Ok(Self { rules })
    }

    pub fn insert(&mut self, name: &str, targets: Vec<T>) {
        self.rules.insert(name.to_string(), targets);
    }

    pub fn get(&self, name: &str) -> Option<&[T]> {
        self.rules.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.rules.len());
        for (name, targets) in &self.rules {
            let entries = targets
                .iter()
                .map(|t| serde_json::to_value(t).unwrap_or(Value::Null))
                .collect();
            object.insert(name.clone(), Value::Array(entries));
        }
        Value::Object(object)
    }

    /// Serializes the table as rule source text that [`RuleTable::parse`] accepts.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Rule table whose rules list group titles.
pub type GroupRuleTable = RuleTable<String>;

/// Rule table whose rules list 1-based input slot indices.
pub type IndexRuleTable = RuleTable<i64>;
