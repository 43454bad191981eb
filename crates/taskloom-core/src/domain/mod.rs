//! Domain model (ids, status, parameters, input/output, setups).

pub mod ids;
pub mod io;
pub mod params;
pub mod setup;
pub mod status;

pub use self::ids::MonitorId;
pub use self::io::{RESULT_KEY, TaskInput, TaskOutput};
pub use self::params::{ParamConfig, ParamType, TaskParams};
pub use self::setup::{TaskSetup, TaskSetupBuilder, TaskSpec};
pub use self::status::TaskStatus;
