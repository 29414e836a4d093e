//! Dambreak: a 2D cellular fluid simulator
//!
//! Cells hold a wall/air/fluid marker, a pressure and a velocity per
//! cardinal direction. Each tick moves momentum under gravity and pressure
//! gradients, then moves fluid between cells at random along its velocity.
//! Row-parallel phases run on a persistent barrier-synchronized worker pool;
//! rendering of one tick overlaps the computation of the next.

pub mod config;
pub mod constants;
pub mod error;
pub mod fluid;
pub mod grid;
pub mod numeric;
pub mod persistence;
pub mod thread_pool;

pub use config::{OutputTarget, SimulationConfig, SimulationTypes};
pub use error::{SimResult, SimulationError};
pub use fluid::{create_simulation, FluidEngine, FluidSimulation, TickReport};
pub use grid::{CellIndex, CellMarker, DirVector, Direction, DirectionalField, Grid2D};
pub use numeric::{Numeric, NumericKind, StorageType};
pub use persistence::StateSnapshot;
pub use thread_pool::{DispatcherConfig, WorkDispatcher, WorkUnit};
