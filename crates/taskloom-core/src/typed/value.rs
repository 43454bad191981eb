//! FromTaskValue - named input value → positional argument.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::ParamType;
use crate::domain::io::convert_value;
use crate::error::TaskError;

/// Argument types a taskable method may take.
///
/// A missing or `null` value turns into the type's default (`0`, `""`, `false`,
/// epoch, `None`) instead of an error.
pub trait FromTaskValue: Sized {
    fn param_type() -> ParamType;

    fn from_task_value(name: &str, value: Option<&Value>) -> Result<Self, TaskError>;
}

fn convert_or_default<T: DeserializeOwned + Default>(
    name: &str,
    value: Option<&Value>,
) -> Result<T, TaskError> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => convert_value(v).map_err(|e| TaskError::InvalidParam {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

macro_rules! impl_from_task_value {
    ($param_type:expr => $($ty:ty),+) => {
        $(
            impl FromTaskValue for $ty {
                fn param_type() -> ParamType {
                    $param_type
                }

                fn from_task_value(name: &str, value: Option<&Value>) -> Result<Self, TaskError> {
                    convert_or_default(name, value)
                }
            }
        )+
    };
}

impl_from_task_value!(ParamType::String => String);
impl_from_task_value!(ParamType::Integer => i8, i16, i32, i64, u8, u16, u32, u64, usize);
impl_from_task_value!(ParamType::Decimal => f32, f64);
impl_from_task_value!(ParamType::Boolean => bool);
impl_from_task_value!(ParamType::Date => DateTime<Utc>);
impl_from_task_value!(ParamType::Json => Value);

impl<T: FromTaskValue> FromTaskValue for Option<T> {
    fn param_type() -> ParamType {
        T::param_type()
    }

    fn from_task_value(name: &str, value: Option<&Value>) -> Result<Self, TaskError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(v) => T::from_task_value(name, Some(v)).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_values_become_defaults() {
        assert_eq!(String::from_task_value("name", None).unwrap(), "");
        assert_eq!(f64::from_task_value("factor", Some(&Value::Null)).unwrap(), 0.0);
        assert!(!bool::from_task_value("flag", None).unwrap());
        assert_eq!(Option::<i64>::from_task_value("n", None).unwrap(), None);
        assert_eq!(
            DateTime::<Utc>::from_task_value("workingDt", None).unwrap(),
            DateTime::<Utc>::default()
        );
    }

    #[test]
    fn present_values_convert() {
        assert_eq!(String::from_task_value("name", Some(&json!("Earth"))).unwrap(), "Earth");
        assert_eq!(i32::from_task_value("n", Some(&json!("7"))).unwrap(), 7);
        assert_eq!(Option::<f64>::from_task_value("f", Some(&json!(0.5))).unwrap(), Some(0.5));
    }

    #[test]
    fn scalars_stringify_for_string_arguments() {
        assert_eq!(String::from_task_value("s", Some(&json!(42))).unwrap(), "42");
        assert_eq!(String::from_task_value("s", Some(&json!(0.25))).unwrap(), "0.25");
        assert_eq!(String::from_task_value("s", Some(&json!(true))).unwrap(), "true");
        assert_eq!(
            Option::<String>::from_task_value("s", Some(&json!(7))).unwrap().as_deref(),
            Some("7")
        );
    }

    #[test]
    fn structured_value_is_not_a_string() {
        let err = String::from_task_value("s", Some(&json!([1, 2]))).unwrap_err();
        assert!(matches!(err, TaskError::InvalidParam { .. }));
    }

    #[test]
    fn wrong_shape_is_invalid_param() {
        let err = i64::from_task_value("n", Some(&json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, TaskError::InvalidParam { .. }));
    }

    #[test]
    fn param_types_follow_rust_types() {
        assert_eq!(<String as FromTaskValue>::param_type(), ParamType::String);
        assert_eq!(<u64 as FromTaskValue>::param_type(), ParamType::Integer);
        assert_eq!(<Option<f32> as FromTaskValue>::param_type(), ParamType::Decimal);
        assert_eq!(<Value as FromTaskValue>::param_type(), ParamType::Json);
    }
}
