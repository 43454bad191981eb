//! Taskable methods - plain typed functions adapted into task units.
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskableFn<Args>` - `Fn(&TaskMonitor, A1, .., An) -> Result<R, TaskError>`
//! - **内部（Dyn）**: `MethodTask<F, Args>` が `TaskUnit` を実装して type erasure
//!
//! The declared parameter names are bound at registration time; at execution
//! the named input values are handed over positionally in that order.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use super::unit::TaskUnit;
use super::value::FromTaskValue;
use crate::app::monitor::TaskMonitor;
use crate::domain::{RESULT_KEY, TaskInput, TaskOutput};
use crate::error::TaskError;

/// A typed function usable as a taskable method.
///
/// Implemented for `Fn(&TaskMonitor, A1, .., An) -> Result<R, TaskError>` with
/// up to six arguments, where every `Ai: FromTaskValue` and `R: Serialize`.
/// Closures need their monitor argument annotated (`|m: &TaskMonitor, ..|`).
pub trait TaskableFn<Args>: Send + Sync + 'static {
    /// Parameter types in positional order.
    fn param_types() -> Vec<crate::domain::ParamType>;

    /// Call with arguments pulled from `input` by `names` (positional).
    fn invoke(&self, monitor: &TaskMonitor, input: &TaskInput, names: &[String])
    -> Result<Value, TaskError>;
}

macro_rules! impl_taskable_fn {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, $($arg,)*> TaskableFn<($($arg,)*)> for F
        where
            F: Fn(&TaskMonitor, $($arg),*) -> Result<R, TaskError> + Send + Sync + 'static,
            R: Serialize,
            $($arg: FromTaskValue,)*
        {
            fn param_types() -> Vec<crate::domain::ParamType> {
                vec![$(<$arg as FromTaskValue>::param_type()),*]
            }

            fn invoke(
                &self,
                monitor: &TaskMonitor,
                input: &TaskInput,
                names: &[String],
            ) -> Result<Value, TaskError> {
                let mut names = names.iter();
                $(
                    let $arg = {
                        let name = names.next().map(String::as_str).unwrap_or_default();
                        <$arg as FromTaskValue>::from_task_value(name, input.raw(name))?
                    };
                )*
                let ret = (self)(monitor, $($arg),*)?;
                serde_json::to_value(ret).map_err(|source| TaskError::ResultConversion {
                    name: RESULT_KEY.to_string(),
                    source,
                })
            }
        }
    };
}

impl_taskable_fn!();
impl_taskable_fn!(A1);
impl_taskable_fn!(A1, A2);
impl_taskable_fn!(A1, A2, A3);
impl_taskable_fn!(A1, A2, A3, A4);
impl_taskable_fn!(A1, A2, A3, A4, A5);
impl_taskable_fn!(A1, A2, A3, A4, A5, A6);

/// Adapter: taskable function + declared parameter names → [`TaskUnit`].
pub struct MethodTask<F, Args> {
    method: F,
    param_names: Vec<String>,
    _marker: PhantomData<fn() -> Args>,
}

impl<F, Args> MethodTask<F, Args>
where
    F: TaskableFn<Args>,
{
    pub fn new(method: F, param_names: Vec<String>) -> Self {
        Self {
            method,
            param_names,
            _marker: PhantomData,
        }
    }
}

impl<F, Args> TaskUnit for MethodTask<F, Args>
where
    F: TaskableFn<Args>,
    Args: 'static,
{
    fn execute(&self, monitor: &TaskMonitor, input: &TaskInput) -> Result<TaskOutput, TaskError> {
        let value = self.method.invoke(monitor, input, &self.param_names)?;

        let mut output = TaskOutput::new();
        // unit / Option::None は結果なし
        if !value.is_null() {
            output.insert_raw(RESULT_KEY, value);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamType, TaskParams};
    use serde_json::json;

    fn input(v: Value) -> TaskInput {
        match v {
            Value::Object(map) => TaskInput::new("t", map),
            _ => TaskInput::new("t", TaskParams::new()),
        }
    }

    fn param_types_of<Args, F: TaskableFn<Args>>(_f: &F) -> Vec<ParamType> {
        F::param_types()
    }

    #[test]
    fn param_types_follow_signature() {
        let f = |_m: &TaskMonitor, _name: String, _factor: f64| -> Result<i64, TaskError> { Ok(0) };
        assert_eq!(
            param_types_of(&f),
            vec![ParamType::String, ParamType::Decimal]
        );
    }

    #[test]
    fn positional_arguments_follow_declared_names() {
        let task = MethodTask::new(
            |_m: &TaskMonitor, a: String, b: String| -> Result<String, TaskError> {
                Ok(format!("{a}-{b}"))
            },
            vec!["second".to_string(), "first".to_string()],
        );
        let monitor = TaskMonitor::detached(&["t"]);
        let out = task
            .execute(&monitor, &input(json!({ "first": "x", "second": "y" })))
            .unwrap();
        assert_eq!(out.result::<String>(RESULT_KEY).unwrap().as_deref(), Some("y-x"));
    }

    #[test]
    fn unit_return_stores_no_result() {
        let task = MethodTask::new(|_m: &TaskMonitor| -> Result<(), TaskError> { Ok(()) }, vec![]);
        let monitor = TaskMonitor::detached(&["t"]);
        let out = task.execute(&monitor, &input(json!({}))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn method_error_propagates() {
        let task = MethodTask::new(
            |_m: &TaskMonitor, _n: i64| -> Result<i64, TaskError> { Err(TaskError::failed("nope")) },
            vec!["n".to_string()],
        );
        let monitor = TaskMonitor::detached(&["t"]);
        let err = task.execute(&monitor, &input(json!({ "n": 1 }))).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
