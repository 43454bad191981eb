//! Typed - task units, taskable methods and the handler registry.
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskableFn<Args>` - plain typed functions, checked at registration
//! - **内部（Dyn）**: `TaskUnit` - object-safe, stored as `Arc<dyn TaskUnit>`

pub mod method;
pub mod registry;
pub mod unit;
pub mod value;

pub use self::method::{MethodTask, TaskableFn};
pub use self::registry::{ExecLimit, HandlerKind, TaskHandlerDescriptor, TaskRegistry};
pub use self::unit::TaskUnit;
pub use self::value::FromTaskValue;
