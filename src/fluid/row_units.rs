//! Row work units for the parallel phases of a tick
//!
//! Every parallel phase splits the grid into one unit per row. A unit reads
//! the markers through a shared lock and touches pressure and velocity one
//! cell lock at a time.

use super::state::FluidState;
use crate::constants::physics;
use crate::error::SimulationError;
use crate::grid::{CellIndex, CellMarker, Direction};
use crate::numeric::Numeric;
use crate::thread_pool::WorkUnit;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;

pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Step 1: add gravity to the downward velocity of cells resting on an open cell
pub struct GravityUnit<P: Numeric, V: Numeric, VF: Numeric> {
    pub state: Arc<FluidState<P, V, VF>>,
    pub row: usize,
}

impl<P: Numeric, V: Numeric, VF: Numeric> WorkUnit for GravityUnit<P, V, VF> {
    fn execute(&self) {
        let state = &*self.state;
        let markers = state.markers.read();
        for col in 0..markers.cols() {
            let cell = CellIndex::new(self.row, col);
            if markers[cell].is_wall() {
                continue;
            }
            if let Some(below) = markers.neighbor(cell, Direction::Down) {
                if markers[below].is_open() {
                    state.velocity[cell].lock().add(Direction::Down, state.gravity);
                }
            }
        }
    }

    fn label(&self) -> &'static str {
        "gravity"
    }
}

/// Step 2: let pressure differences push on velocities.
///
/// Reads only the pressure snapshot taken before the phase; the live
/// pressure of the unit's own cells is lowered by what was turned into
/// outgoing velocity.
pub struct PressureDiffusionUnit<P: Numeric, V: Numeric, VF: Numeric> {
    pub state: Arc<FluidState<P, V, VF>>,
    pub row: usize,
}

impl<P: Numeric, V: Numeric, VF: Numeric> WorkUnit for PressureDiffusionUnit<P, V, VF> {
    fn execute(&self) {
        let state = &*self.state;
        let markers = state.markers.read();
        let previous = state.previous_pressure.read();
        let mut drift = P::zero();

        for col in 0..markers.cols() {
            let cell = CellIndex::new(self.row, col);
            let marker = markers[cell];
            if marker.is_wall() {
                continue;
            }
            let own_pressure = previous[cell];
            let open_count = state.open_neighbors[cell];

            for dir in Direction::ALL {
                let Some(neighbor) = markers.neighbor(cell, dir) else {
                    continue;
                };
                let neighbor_marker = markers[neighbor];
                if neighbor_marker.is_wall() || previous[neighbor] >= own_pressure {
                    continue;
                }

                let mut force = own_pressure - previous[neighbor];
                let neighbor_density = state.density(neighbor_marker);
                {
                    // Cancel the neighbour's velocity pointing back at us first
                    let mut contra = state.velocity[neighbor].lock();
                    let back = contra.get_mut(dir.opposite());
                    let capacity = P::convert(*back) * neighbor_density;
                    if capacity >= force {
                        *back -= V::convert(force / neighbor_density);
                        continue;
                    }
                    force -= capacity;
                    *back = V::zero();
                }

                state.velocity[cell]
                    .lock()
                    .add(dir, V::convert(force / state.density(marker)));

                if open_count > 0 {
                    let share = force / P::from_int(open_count as i64);
                    state.add_pressure(cell, -share);
                    drift -= share;
                }
            }
        }

        state.record_drift(self.row, drift);
    }

    fn label(&self) -> &'static str {
        "pressure-diffusion"
    }
}

/// Step 4: turn unused velocity back into pressure.
///
/// Each positive velocity component is replaced by the settled flow. The
/// difference becomes pressure, handed to the neighbour when it is open and
/// kept by the cell otherwise. The pressure is queued for the engine to apply
/// once every row has finished.
pub struct RecalcPressureUnit<P: Numeric, V: Numeric, VF: Numeric> {
    pub state: Arc<FluidState<P, V, VF>>,
    pub row: usize,
}

impl<P: Numeric, V: Numeric, VF: Numeric> WorkUnit for RecalcPressureUnit<P, V, VF> {
    fn execute(&self) {
        let state = &*self.state;
        let markers = state.markers.read();
        let flow = state.velocity_flow.read();
        let damping = P::from_f64(physics::FLUID_DAMPING);
        let strict = V::is_fixed_point() && VF::is_fixed_point();
        let epsilon = V::from_f64(physics::FLOW_EPSILON);
        let mut drift = P::zero();

        for col in 0..markers.cols() {
            let cell = CellIndex::new(self.row, col);
            let marker = markers[cell];
            if marker.is_wall() {
                continue;
            }

            for dir in Direction::ALL {
                let (old_velocity, new_velocity) = {
                    let mut velocity = state.velocity[cell].lock();
                    let old = velocity.get(dir);
                    if old <= V::zero() {
                        continue;
                    }
                    let new = V::convert(flow[cell].get(dir));
                    velocity.set(dir, new);
                    (old, new)
                };

                if new_velocity > old_velocity {
                    if strict {
                        state.raise_fault(SimulationError::InvariantViolation {
                            message: format!(
                                "settled flow {} exceeds velocity {} at ({}, {}) {:?}",
                                new_velocity, old_velocity, cell.row, cell.col, dir
                            ),
                        });
                    } else if new_velocity - old_velocity > epsilon {
                        log::warn!(
                            "[Recalc] Flow {} above velocity {} at ({}, {})",
                            new_velocity,
                            old_velocity,
                            cell.row,
                            cell.col
                        );
                    }
                }

                let mut force = P::convert(old_velocity - new_velocity) * state.density(marker);
                if marker == CellMarker::Fluid {
                    force *= damping;
                }

                let target = match markers.neighbor(cell, dir) {
                    Some(neighbor) if markers[neighbor].is_open() => neighbor,
                    _ => cell,
                };
                let open_count = state.open_neighbors[target];
                if open_count == 0 {
                    continue;
                }
                let share = force / P::from_int(open_count as i64);
                state.queue_pressure(self.row, target, share);
                drift += share;
            }
        }

        state.record_drift(self.row, drift);
    }

    fn label(&self) -> &'static str {
        "pressure-recalc"
    }
}

/// Step 7: write the marker grid to the output sink.
///
/// Runs on the output dispatcher so the next tick's compute phases overlap
/// with formatting and I/O. The frame is built under the marker read lock and
/// written after the lock is released.
pub struct RenderUnit<P: Numeric, V: Numeric, VF: Numeric> {
    pub state: Arc<FluidState<P, V, VF>>,
    pub sink: SharedSink,
    pub tick: u64,
}

impl<P: Numeric, V: Numeric, VF: Numeric> RenderUnit<P, V, VF> {
    fn frame(&self) -> String {
        let markers = self.state.markers.read();
        let mut frame = String::with_capacity((markers.cols() + 1) * markers.rows() + 24);
        let _ = writeln!(frame, "Tick {}:", self.tick);
        for row in 0..markers.rows() {
            frame.extend(markers.row(row).iter().map(|m| m.glyph()));
            frame.push('\n');
        }
        frame
    }
}

impl<P: Numeric, V: Numeric, VF: Numeric> WorkUnit for RenderUnit<P, V, VF> {
    fn execute(&self) {
        let frame = self.frame();
        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(frame.as_bytes()).and_then(|_| sink.flush()) {
            log::warn!("[Render] Failed to write tick {}: {}", self.tick, e);
        }
    }

    fn label(&self) -> &'static str {
        "render"
    }
}
