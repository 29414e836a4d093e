//! Type-erased simulations
//!
//! The numeric representations are picked at startup from type specifiers.
//! [`create_simulation`] maps each specifier to one member of the compiled
//! registry and instantiates the matching [`FluidEngine`]; the rest of the
//! program only sees [`FluidSimulation`].

use super::engine::{FluidEngine, TickReport};
use crate::config::{SimulationConfig, SimulationTypes};
use crate::error::SimResult;
use crate::grid::{CellMarker, Direction};
use crate::numeric::{Fixed32x16, Fixed64x16, Fixed64x32, Numeric, StorageType};
use crate::persistence::StateSnapshot;
use std::io::{BufRead, Write};

/// Object-safe view of a running simulation
pub trait FluidSimulation: Send {
    fn advance(&mut self, tick: u64) -> SimResult<TickReport>;

    /// Write the state; waits for the pending render first
    fn save(&mut self, sink: &mut dyn Write) -> SimResult<()>;

    fn reload(&mut self, source: &mut dyn BufRead) -> SimResult<()>;

    fn flush_output(&mut self) -> SimResult<()>;

    fn set_output_sink(&mut self, sink: Box<dyn Write + Send>) -> SimResult<()>;

    fn snapshot(&self) -> StateSnapshot;

    fn dimensions(&self) -> (usize, usize);

    fn tick_counter(&self) -> i64;

    fn marker(&self, row: usize, col: usize) -> CellMarker;

    fn pressure(&self, row: usize, col: usize) -> f64;

    fn velocity(&self, row: usize, col: usize, dir: Direction) -> f64;

    fn neighbor_open_count(&self, row: usize, col: usize) -> u8;

    fn marker_counts(&self) -> [usize; 3];

    /// Labels of the pressure, velocity and flow representations
    fn type_labels(&self) -> [String; 3];
}

impl<P: Numeric, V: Numeric, VF: Numeric> FluidSimulation for FluidEngine<P, V, VF> {
    fn advance(&mut self, tick: u64) -> SimResult<TickReport> {
        FluidEngine::advance(self, tick)
    }

    fn save(&mut self, sink: &mut dyn Write) -> SimResult<()> {
        FluidEngine::save(self, sink)
    }

    fn reload(&mut self, source: &mut dyn BufRead) -> SimResult<()> {
        FluidEngine::reload(self, source)
    }

    fn flush_output(&mut self) -> SimResult<()> {
        FluidEngine::flush_output(self)
    }

    fn set_output_sink(&mut self, sink: Box<dyn Write + Send>) -> SimResult<()> {
        FluidEngine::set_output_sink(self, sink)
    }

    fn snapshot(&self) -> StateSnapshot {
        FluidEngine::snapshot(self)
    }

    fn dimensions(&self) -> (usize, usize) {
        FluidEngine::dimensions(self)
    }

    fn tick_counter(&self) -> i64 {
        FluidEngine::tick_counter(self)
    }

    fn marker(&self, row: usize, col: usize) -> CellMarker {
        FluidEngine::marker(self, row, col)
    }

    fn pressure(&self, row: usize, col: usize) -> f64 {
        FluidEngine::pressure(self, row, col).to_f64()
    }

    fn velocity(&self, row: usize, col: usize, dir: Direction) -> f64 {
        FluidEngine::velocity(self, row, col, dir).to_f64()
    }

    fn neighbor_open_count(&self, row: usize, col: usize) -> u8 {
        FluidEngine::neighbor_open_count(self, row, col)
    }

    fn marker_counts(&self) -> [usize; 3] {
        FluidEngine::marker_counts(self)
    }

    fn type_labels(&self) -> [String; 3] {
        [P::type_label(), V::type_label(), VF::type_label()]
    }
}

/// Bind `$alias` to the Rust type of a [`StorageType`] and evaluate `$body`
macro_rules! with_storage {
    ($storage:expr, $alias:ident, $body:block) => {
        match $storage {
            StorageType::F32 => {
                type $alias = f32;
                $body
            }
            StorageType::F64 => {
                type $alias = f64;
                $body
            }
            StorageType::I32Q16 => {
                type $alias = Fixed32x16;
                $body
            }
            StorageType::I64Q16 => {
                type $alias = Fixed64x16;
                $body
            }
            StorageType::I64Q32 => {
                type $alias = Fixed64x32;
                $body
            }
        }
    };
}

/// Build the engine instantiation named by `types` and load it from `source`
pub fn create_simulation(
    types: &SimulationTypes,
    config: &SimulationConfig,
    source: &mut dyn BufRead,
) -> SimResult<Box<dyn FluidSimulation>> {
    let pressure = types.pressure.storage()?;
    let velocity = types.velocity.storage()?;
    let velocity_flow = types.velocity_flow.storage()?;

    log::info!("[Factory] Instantiating simulation with {}", types);

    with_storage!(pressure, P, {
        with_storage!(velocity, V, {
            with_storage!(velocity_flow, VF, {
                let engine = FluidEngine::<P, V, VF>::load(source, config.clone())?;
                Ok(Box::new(engine) as Box<dyn FluidSimulation>)
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputTarget;
    use crate::error::SimulationError;
    use crate::numeric::NumericKind;
    use std::io::Cursor;

    const STATE: &str = "3 3 0\n###\n#.#\n###\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n0 2.5 0\n0 0 0\n\
0 0 0 0 0 0 0 0 0 0 0 0\n0 0 0 0 0 0 0 0 0 0 0 0\n0 0 0 0 0 0 0 0 0 0 0 0\n";

    fn config() -> SimulationConfig {
        SimulationConfig {
            worker_count: 1,
            output: OutputTarget::Discard,
            ..Default::default()
        }
    }

    #[test]
    fn test_factory_picks_requested_types() {
        let types = SimulationTypes::parse("DOUBLE", "FIXED(32,16)", "FAST_FIXED(32,16)")
            .expect("Failed to parse types for test");
        let sim = create_simulation(&types, &config(), &mut Cursor::new(STATE))
            .expect("Failed to create simulation for test");
        assert_eq!(
            sim.type_labels(),
            ["DOUBLE".to_string(), "FIXED(32,16)".to_string(), "FIXED(64,16)".to_string()]
        );
        assert_eq!(sim.pressure(1, 1), 2.5);
        assert_eq!(sim.dimensions(), (3, 3));
    }

    #[test]
    fn test_factory_rejects_unregistered_types() {
        let types = SimulationTypes {
            pressure: NumericKind::Fixed { bits: 16, frac: 8 },
            ..Default::default()
        };
        let result = create_simulation(&types, &config(), &mut Cursor::new(STATE));
        assert!(matches!(result, Err(SimulationError::UnknownType { .. })));
    }
}
