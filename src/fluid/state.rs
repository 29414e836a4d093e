//! Shared simulation state
//!
//! Everything the row work units touch lives here behind an `Arc`. Pressure
//! and velocity carry one lock per cell because diffusion and recalculation
//! write into cells owned by a neighbouring row's unit. Each cell lock is
//! taken on its own and released before the next one is taken.
//!
//! Pressure that a unit hands to another row, and each row's drift, go into
//! per-row buffers instead of the shared totals. The engine folds those in
//! row order after the barrier, so float sums do not depend on which worker
//! finished first.

use crate::error::SimulationError;
use crate::grid::{count_open_neighbors, CellIndex, CellMarker, DirVector, DirectionalField, Grid2D};
use crate::numeric::Numeric;
use crate::persistence::StateSnapshot;
use parking_lot::{Mutex, RwLock};

pub struct FluidState<P: Numeric, V: Numeric, VF: Numeric> {
    /// Cell contents; written only by advection
    pub(crate) markers: RwLock<Grid2D<CellMarker>>,
    pub(crate) pressure: Grid2D<Mutex<P>>,
    /// Pressure as it was before the current diffusion pass
    pub(crate) previous_pressure: RwLock<Grid2D<P>>,
    pub(crate) velocity: Grid2D<Mutex<DirVector<V>>>,
    /// Flow settled by the augmenting-path search, rebuilt every tick
    pub(crate) velocity_flow: RwLock<DirectionalField<VF>>,
    /// Non-wall 4-neighbour count, fixed at load
    pub(crate) open_neighbors: Grid2D<u8>,
    /// Density per marker, indexed by `CellMarker as usize`
    pub(crate) densities: [P; 3],
    pub(crate) gravity: V,
    /// Net pressure change of the current tick
    pub(crate) pressure_drift: Mutex<P>,
    /// Pressure increments queued by each row's unit, in visiting order
    pub(crate) row_deltas: Vec<Mutex<Vec<(CellIndex, P)>>>,
    /// Drift accumulated by each row's unit
    pub(crate) row_drift: Vec<Mutex<P>>,
    /// First fatal error raised inside a work unit
    pub(crate) fault: Mutex<Option<SimulationError>>,
}

impl<P: Numeric, V: Numeric, VF: Numeric> FluidState<P, V, VF> {
    pub fn from_snapshot(snapshot: &StateSnapshot, gravity: f64) -> Self {
        let rows = snapshot.markers.rows();
        let cols = snapshot.markers.cols();
        let open_neighbors = count_open_neighbors(&snapshot.markers);

        let densities = [
            P::from_f64(CellMarker::Wall.density()),
            P::from_f64(CellMarker::Air.density()),
            P::from_f64(CellMarker::Fluid.density()),
        ];

        Self {
            markers: RwLock::new(snapshot.markers.clone()),
            pressure: snapshot.pressure.map(|&p| Mutex::new(P::from_f64(p))),
            previous_pressure: RwLock::new(Grid2D::new(rows, cols, P::zero())),
            velocity: snapshot
                .velocity
                .map(|v| Mutex::new(DirVector(v.map(V::from_f64)))),
            velocity_flow: RwLock::new(Grid2D::new(rows, cols, DirVector::default())),
            open_neighbors,
            densities,
            gravity: V::from_f64(gravity),
            pressure_drift: Mutex::new(P::zero()),
            row_deltas: (0..rows).map(|_| Mutex::new(Vec::new())).collect(),
            row_drift: (0..rows).map(|_| Mutex::new(P::zero())).collect(),
            fault: Mutex::new(None),
        }
    }

    pub fn rows(&self) -> usize {
        self.open_neighbors.rows()
    }

    pub fn cols(&self) -> usize {
        self.open_neighbors.cols()
    }

    #[inline(always)]
    pub(crate) fn density(&self, marker: CellMarker) -> P {
        self.densities[marker as usize]
    }

    /// Record a fault raised inside a work unit; the first one wins
    pub(crate) fn raise_fault(&self, error: SimulationError) {
        let mut fault = self.fault.lock();
        if fault.is_none() {
            *fault = Some(error);
        }
    }

    pub(crate) fn take_fault(&self) -> Option<SimulationError> {
        self.fault.lock().take()
    }

    /// Copy the live pressure into the diffusion snapshot
    pub(crate) fn snapshot_pressure(&self) {
        let mut previous = self.previous_pressure.write();
        for cell in self.pressure.cells() {
            previous[cell] = *self.pressure[cell].lock();
        }
    }

    /// Add to the pressure of one cell under its lock
    #[inline]
    pub(crate) fn add_pressure(&self, cell: CellIndex, delta: P) {
        *self.pressure[cell].lock() += delta;
    }

    /// Queue a pressure increment from `row`'s unit
    pub(crate) fn queue_pressure(&self, row: usize, cell: CellIndex, delta: P) {
        self.row_deltas[row].lock().push((cell, delta));
    }

    pub(crate) fn record_drift(&self, row: usize, drift: P) {
        *self.row_drift[row].lock() += drift;
    }

    /// Apply queued increments and drift row by row, in the order each unit
    /// produced them
    pub(crate) fn fold_rows(&self) {
        let mut total = self.pressure_drift.lock();
        for row in 0..self.rows() {
            for (cell, delta) in self.row_deltas[row].lock().drain(..) {
                self.add_pressure(cell, delta);
            }
            *total += std::mem::take(&mut *self.row_drift[row].lock());
        }
    }

    /// Capture the persistent part of the state as plain numbers
    pub fn to_snapshot(&self, tick_counter: i64, stamps: &Grid2D<i64>) -> StateSnapshot {
        StateSnapshot {
            tick_counter,
            markers: self.markers.read().clone(),
            stamps: stamps.clone(),
            pressure: self.pressure.map(|p| p.lock().to_f64()),
            velocity: self.velocity.map(|v| v.lock().0.map(|c| c.to_f64())),
        }
    }
}
