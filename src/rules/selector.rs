/// The option list of a rule selector, rebuilt from the rule names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSelector {
    options: Vec<String>,
    selected: String,
}

/// What happened to the selection when the option list was rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    /// The previous selection still exists.
    Kept(String),
    /// The previous selection disappeared; the first option was selected and must be applied.
    Switched(String),
    /// No options are left.
    Cleared,
}

impl RuleSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a saved selection without validating it against the options.
    pub fn with_selected(selected: &str) -> Self {
        Self {
            options: Vec::new(),
            selected: selected.to_string(),
        }
    }

    /// Rebuilds the option list, keeping the selection if it is still offered.
    pub fn rebuild<I, S>(&mut self, names: I) -> SelectionChange
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = names.into_iter().map(Into::into).collect();
        if !self.selected.is_empty() && self.options.contains(&self.selected) {
            return SelectionChange::Kept(self.selected.clone());
        }
        match self.options.first() {
            Some(first) => {
                self.selected = first.clone();
                SelectionChange::Switched(first.clone())
            }
            None => {
                self.selected.clear();
                SelectionChange::Cleared
            }
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Values shown by the combo widget. An empty list displays a single blank entry.
    pub fn display_values(&self) -> Vec<String> {
        if self.options.is_empty() {
            vec![String::new()]
        } else {
            self.options.clone()
        }
    }

    pub fn selected(&self) -> Option<&str> {
        if self.selected.is_empty() {
            None
        } else {
            Some(&self.selected)
        }
    }

    /// Sets the selection from saved state without checking it against the options.
    pub fn restore(&mut self, name: &str) {
        self.selected = name.to_string();
    }

    /// Selects an offered option. Returns `false` for names that are not offered.
    pub fn select(&mut self, name: &str) -> bool {
        if self.options.iter().any(|o| o == name) {
            self.selected = name.to_string();
            true
        } else {
            false
        }
    }
}
