//! Cellular dam-break fluid simulation
//!
//! A tick runs seven steps in fixed order:
//! 1. gravity (row-parallel)
//! 2. pressure diffusion (row-parallel)
//! 3. flow settling by augmenting-path search
//! 4. pressure recalculation from the settled flow (row-parallel)
//! 5. wait for the previous tick's render
//! 6. stochastic advection
//! 7. render dispatch to the output pool
//!
//! The engine is generic over the pressure (`P`), velocity (`V`) and flow
//! (`VF`) representations; [`create_simulation`] picks the instantiation at
//! run time.

pub mod advection;
pub mod engine;
pub mod flow;
pub mod row_units;
pub mod simulation;
pub mod state;

pub use advection::{Advection, AdvectionSummary};
pub use engine::{FluidEngine, TickReport};
pub use flow::{FlowOutcome, FlowSearch};
pub use simulation::{create_simulation, FluidSimulation};
pub use state::FluidState;
