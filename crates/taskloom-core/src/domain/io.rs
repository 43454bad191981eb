//! TaskInput / TaskOutput - named bags crossing the handler boundary.
//!
//! Values are `serde_json::Value` so handlers and callers are not coupled at
//! compile time; typed access goes through serde.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::params::{ParamConfig, TaskParams};
use crate::error::TaskError;

/// Output key holding the return value of an adapted taskable method.
pub const RESULT_KEY: &str = "result";

/// Convert a loosely-typed value.
///
/// Strings holding JSON scalars (`"42"`, `"true"`) are accepted for non-string
/// targets; numbers and booleans are accepted for string targets.
pub(crate) fn convert_value<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Ok(v),
        Err(err) => match value {
            Value::String(s) => serde_json::from_str(s).map_err(|_| err),
            Value::Number(_) | Value::Bool(_) => {
                serde_json::from_value(Value::String(value.to_string())).map_err(|_| err)
            }
            _ => Err(err),
        },
    }
}

/// Read-only input for one task unit execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInput {
    task_name: String,
    params: TaskParams,
}

impl TaskInput {
    pub fn new(task_name: impl Into<String>, params: TaskParams) -> Self {
        Self {
            task_name: task_name.into(),
            params,
        }
    }

    /// Build an input filtered through declared parameters.
    ///
    /// - no declarations: everything supplied passes through
    /// - declared: unknown keys are dropped, missing ones stay absent (the
    ///   typed adapter turns absence into the argument's default or `None`)
    pub fn from_declared(
        task_name: impl Into<String>,
        declared: &[ParamConfig],
        supplied: &TaskParams,
    ) -> Self {
        if declared.is_empty() {
            return Self::new(task_name, supplied.clone());
        }

        let params = declared
            .iter()
            .filter_map(|pc| {
                supplied
                    .get(&pc.name)
                    .map(|value| (pc.name.clone(), value.clone()))
            })
            .collect();
        Self::new(task_name, params)
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Typed read. Missing and `null` both read as `None`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TaskError> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => convert_value(value)
                .map(Some)
                .map_err(|e| TaskError::InvalidParam {
                    name: name.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    pub fn get_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, TaskError> {
        Ok(self.get(name)?.unwrap_or_default())
    }
}

/// Named results written by a task unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOutput {
    values: TaskParams,
}

impl TaskOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result; fails only if `value` cannot be serialized.
    pub fn set_result<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), TaskError> {
        let value = serde_json::to_value(value).map_err(|source| TaskError::ResultConversion {
            name: name.to_string(),
            source,
        })?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Builder form of [`TaskOutput::set_result`].
    pub fn with_result<T: Serialize>(mut self, name: &str, value: T) -> Result<Self, TaskError> {
        self.set_result(name, value)?;
        Ok(self)
    }

    pub(crate) fn insert_raw(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Typed read of a stored result.
    ///
    /// `Ok(None)` when the name was never written; `ResultConversion` when the
    /// stored value does not fit `T`.
    pub fn result<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, TaskError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) => convert_value(value)
                .map(Some)
                .map_err(|source| TaskError::ResultConversion {
                    name: name.to_string(),
                    source,
                }),
        }
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &TaskParams {
        &self.values
    }
}
