//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **TaskMonitor**: チェーンの状態を共有するハンドル
//! - **TaskManager**: 解決・検証・ワーカーへの配送
//! - **PeriodicRun**: 周期実行ごとの monitor をまとめるハンドル
//! - **TaskLauncher**: TaskSetup の入口
//! - **EngineBuilder**: registry / manager / launcher のワイヤリング

pub mod builder;
pub mod launcher;
pub mod manager;
pub mod monitor;
pub mod periodic;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Engine, EngineBuilder};
pub use self::launcher::TaskLauncher;
pub use self::manager::TaskManager;
pub use self::monitor::{MonitorSnapshot, TaskMonitor, TaskSnapshot};
pub use self::periodic::PeriodicRun;
