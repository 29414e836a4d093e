// Persistent barrier-synchronized worker pools
pub mod work_dispatcher;
pub mod work_unit;

pub use work_dispatcher::{DispatcherConfig, DispatcherStats, WorkDispatcher};
pub use work_unit::{work_unit, FnWorkUnit, WorkUnit};
