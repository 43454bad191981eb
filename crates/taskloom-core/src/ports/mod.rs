//! Ports - 抽象化レイヤー
//!
//! 外部への出口を trait として定義します。実装は `impls` に置きます。

pub mod status_logger;

pub use self::status_logger::{LoggerError, TaskStatusLogger};
