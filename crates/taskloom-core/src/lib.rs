//! taskloom-core
//!
//! Core building blocks for the taskloom task engine: register named units of
//! work, submit ordered chains of them, and watch each chain through a shared
//! monitor.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, params, io, setup）
//! - **typed**: TaskUnit trait, taskable method adapter, TaskRegistry
//! - **app**: monitor, periodic, manager, launcher, builder
//! - **ports**: 抽象化レイヤー（TaskStatusLogger）
//! - **impls**: ports の実装（TracingStatusLogger）
//! - **config**: EngineConfig
//! - **error**: TaskError

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

#[cfg(test)]
mod fixtures;

pub use app::{
    BuildError, Engine, EngineBuilder, PeriodicRun, TaskLauncher, TaskManager, TaskMonitor,
};
pub use config::{ConfigError, EngineConfig};
pub use domain::{TaskInput, TaskOutput, TaskParams, TaskSetup, TaskStatus};
pub use error::TaskError;
pub use ports::TaskStatusLogger;
pub use typed::{TaskHandlerDescriptor, TaskRegistry, TaskUnit};
