//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **TracingStatusLogger**: tracing へ出力するデフォルトの status logger

pub mod tracing_logger;

pub use self::tracing_logger::TracingStatusLogger;
