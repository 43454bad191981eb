//! Parameter metadata declared by task handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named, loosely-typed parameters (insertion ordered).
pub type TaskParams = serde_json::Map<String, Value>;

/// Declared type of a task parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    /// Any JSON value.
    Json,
}

impl ParamType {
    /// Can a parameter declared as `self` be handed to an argument of type `arg`?
    pub fn is_assignable_to(self, arg: ParamType) -> bool {
        arg == ParamType::Json || self == arg
    }
}

/// Declared parameter of a task handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamConfig {
    pub name: String,
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// UI editor hint (e.g. `!ui-date`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,

    /// Metadata only: a missing mandatory parameter still gets its zero value.
    #[serde(default)]
    pub mandatory: bool,
}

impl ParamConfig {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            editor: None,
            mandatory: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_editor(mut self, editor: impl Into<String>) -> Self {
        self.editor = Some(editor.into());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}
