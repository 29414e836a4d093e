//! Tick orchestration
//!
//! `FluidEngine` owns the shared state, the generation stamps, the random
//! stream and two dispatchers: the compute pool for the row-parallel phases
//! and a single-worker output pool that renders tick `i` while tick `i + 1`
//! computes. Only advection rearranges cells, and it waits for the pending
//! render first.

use super::advection::{Advection, AdvectionSummary};
use super::flow::FlowSearch;
use super::row_units::{
    GravityUnit, PressureDiffusionUnit, RecalcPressureUnit, RenderUnit, SharedSink,
};
use super::state::FluidState;
use crate::config::{OutputTarget, SimulationConfig};
use crate::constants::physics;
use crate::error::{config_error, SimResult};
use crate::grid::{CellIndex, CellMarker, DirVector, Direction, Grid2D};
use crate::numeric::Numeric;
use crate::persistence::{read_snapshot, write_snapshot, StateSnapshot};
use crate::thread_pool::{WorkDispatcher, WorkUnit};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Sweeps of the flow search before it stopped finding flow
    pub flow_sweeps: usize,
    /// Whether advection moved anything (and a frame was rendered)
    pub moved: bool,
    /// Cell swaps performed by advection
    pub cells_moved: usize,
    /// Net pressure added by diffusion and recalculation
    pub pressure_drift: f64,
    /// Generation counter after the tick
    pub tick_counter: i64,
}

pub struct FluidEngine<P: Numeric, V: Numeric, VF: Numeric> {
    state: Arc<FluidState<P, V, VF>>,
    stamps: Grid2D<i64>,
    tick_counter: i64,
    rng: StdRng,
    compute: WorkDispatcher,
    output: WorkDispatcher,
    sink: Option<SharedSink>,
    config: SimulationConfig,
}

impl<P: Numeric, V: Numeric, VF: Numeric> FluidEngine<P, V, VF> {
    /// Read a state from `source` and start both pools
    pub fn load(source: &mut dyn BufRead, config: SimulationConfig) -> SimResult<Self> {
        let snapshot = read_snapshot(source)?;
        Self::from_snapshot(snapshot, config)
    }

    pub fn from_snapshot(snapshot: StateSnapshot, config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;

        let compute = WorkDispatcher::start(config.compute_pool())?;
        let output = WorkDispatcher::start(config.output_pool())?;
        let sink: Option<SharedSink> = match config.output {
            OutputTarget::Stdout => {
                let stdout: Box<dyn Write + Send> = Box::new(std::io::stdout());
                Some(Arc::new(Mutex::new(stdout)))
            }
            OutputTarget::Discard => None,
        };

        log::info!(
            "[FluidEngine] Loaded {}x{} grid at UT {} (p={}, v={}, v_flow={}, {} workers)",
            snapshot.rows(),
            snapshot.cols(),
            snapshot.tick_counter,
            P::type_label(),
            V::type_label(),
            VF::type_label(),
            config.worker_count
        );

        Ok(Self {
            state: Arc::new(FluidState::from_snapshot(&snapshot, config.gravity)),
            stamps: snapshot.stamps,
            tick_counter: snapshot.tick_counter,
            rng: StdRng::seed_from_u64(config.seed),
            compute,
            output,
            sink,
            config,
        })
    }

    /// Send rendered frames to `sink` instead of the configured target
    pub fn set_output_sink(&mut self, sink: Box<dyn Write + Send>) -> SimResult<()> {
        self.output.await_completion()?;
        self.sink = Some(Arc::new(Mutex::new(sink)));
        Ok(())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run one full tick
    pub fn advance(&mut self, tick: u64) -> SimResult<TickReport> {
        let start = Instant::now();

        self.apply_gravity()?;
        self.diffuse_pressure()?;
        let flow_sweeps = self.settle_flow();
        self.recalculate_pressure()?;

        // Nothing may rearrange cells while the previous frame renders
        self.output.await_completion()?;

        let summary = self.advect();
        let moved = summary.chains_moved > 0;
        if moved {
            self.dispatch_render(tick)?;
        }

        let drift = std::mem::take(&mut *self.state.pressure_drift.lock());
        let report = TickReport {
            tick,
            flow_sweeps,
            moved,
            cells_moved: summary.cells_swapped,
            pressure_drift: drift.to_f64(),
            tick_counter: self.tick_counter,
        };

        log::debug!(
            "[FluidEngine] Tick {}: {} flow sweeps, {} swaps, drift {:.6} in {:?}",
            tick,
            flow_sweeps,
            summary.cells_swapped,
            report.pressure_drift,
            start.elapsed()
        );
        Ok(report)
    }

    fn row_batch<U, F>(&self, build: F) -> Vec<Box<dyn WorkUnit>>
    where
        U: WorkUnit + 'static,
        F: Fn(Arc<FluidState<P, V, VF>>, usize) -> U,
    {
        (0..self.state.rows())
            .map(|row| Box::new(build(Arc::clone(&self.state), row)) as Box<dyn WorkUnit>)
            .collect()
    }

    /// Step 1
    pub fn apply_gravity(&mut self) -> SimResult<()> {
        let batch = self.row_batch(|state, row| GravityUnit { state, row });
        self.compute.run(batch)
    }

    /// Step 2
    pub fn diffuse_pressure(&mut self) -> SimResult<()> {
        self.state.snapshot_pressure();
        let batch = self.row_batch(|state, row| PressureDiffusionUnit { state, row });
        self.compute.run(batch)?;
        self.state.fold_rows();
        Ok(())
    }

    /// Step 3: sweep the grid until no sweep finds more flow.
    ///
    /// Returns the number of sweeps, the last of which found nothing.
    pub fn settle_flow(&mut self) -> usize {
        let state = &*self.state;
        let markers = state.markers.read();
        let mut flow = state.velocity_flow.write();
        flow.fill(DirVector::default());

        let epsilon = VF::from_f64(physics::FLOW_EPSILON);
        let quantum = VF::from_int(physics::FLOW_QUANTUM);
        let mut sweeps = 0;

        loop {
            self.tick_counter += 2;
            sweeps += 1;
            let ut = self.tick_counter;
            let mut search = FlowSearch {
                markers: &markers,
                velocity: &state.velocity,
                flow: &mut flow,
                stamps: &mut self.stamps,
                tick_counter: ut,
                epsilon,
            };

            let mut progressed = false;
            for cell in markers.cells() {
                if markers[cell].is_open() && search.stamps[cell] != ut {
                    let outcome = search.propagate(cell, quantum);
                    if outcome.flow > VF::zero() {
                        progressed = true;
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        log::trace!("[FluidEngine] Flow settled after {} sweeps", sweeps);
        sweeps
    }

    /// Step 4
    pub fn recalculate_pressure(&mut self) -> SimResult<()> {
        let batch = self.row_batch(|state, row| RecalcPressureUnit { state, row });
        self.compute.run(batch)?;
        self.state.fold_rows();
        match self.state.take_fault() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Step 6. The caller must have waited for the output pool.
    pub fn advect(&mut self) -> AdvectionSummary {
        self.tick_counter += 2;
        let state = &*self.state;
        let mut markers = state.markers.write();
        let mut advection = Advection {
            markers: &mut markers,
            pressure: &state.pressure,
            velocity: &state.velocity,
            stamps: &mut self.stamps,
            tick_counter: self.tick_counter,
            rng: &mut self.rng,
        };
        advection.run()
    }

    /// Step 7
    fn dispatch_render(&mut self, tick: u64) -> SimResult<()> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };
        let unit = RenderUnit {
            state: Arc::clone(&self.state),
            sink: Arc::clone(sink),
            tick,
        };
        self.output.submit(vec![Box::new(unit)])
    }

    /// Wait for the pending render, if any
    pub fn flush_output(&mut self) -> SimResult<()> {
        self.output.await_completion()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.to_snapshot(self.tick_counter, &self.stamps)
    }

    /// Write the current state in the text format
    pub fn save(&mut self, sink: &mut dyn Write) -> SimResult<()> {
        self.flush_output()?;
        write_snapshot(sink, &self.snapshot())
    }

    /// Replace the state with one read from `source`; the grid size must match
    pub fn reload(&mut self, source: &mut dyn BufRead) -> SimResult<()> {
        let snapshot = read_snapshot(source)?;
        self.restore(snapshot)
    }

    pub fn restore(&mut self, snapshot: StateSnapshot) -> SimResult<()> {
        if (snapshot.rows(), snapshot.cols()) != self.dimensions() {
            return Err(config_error(format!(
                "cannot load a {}x{} state into a {}x{} simulation",
                snapshot.rows(),
                snapshot.cols(),
                self.state.rows(),
                self.state.cols()
            )));
        }
        self.flush_output()?;
        self.state = Arc::new(FluidState::from_snapshot(&snapshot, self.config.gravity));
        self.tick_counter = snapshot.tick_counter;
        self.stamps = snapshot.stamps;
        log::info!("[FluidEngine] Restored state at UT {}", self.tick_counter);
        Ok(())
    }

    /// (rows, cols)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.state.rows(), self.state.cols())
    }

    pub fn tick_counter(&self) -> i64 {
        self.tick_counter
    }

    pub fn marker(&self, row: usize, col: usize) -> CellMarker {
        self.state.markers.read()[CellIndex::new(row, col)]
    }

    pub fn pressure(&self, row: usize, col: usize) -> P {
        *self.state.pressure[CellIndex::new(row, col)].lock()
    }

    pub fn velocity(&self, row: usize, col: usize, dir: Direction) -> V {
        self.state.velocity[CellIndex::new(row, col)].lock().get(dir)
    }

    pub fn flow(&self, row: usize, col: usize, dir: Direction) -> VF {
        self.state.velocity_flow.read()[CellIndex::new(row, col)].get(dir)
    }

    pub fn neighbor_open_count(&self, row: usize, col: usize) -> u8 {
        self.state.open_neighbors[CellIndex::new(row, col)]
    }

    /// Number of cells per marker, indexed by `CellMarker as usize`
    pub fn marker_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for marker in self.state.markers.read().iter() {
            counts[*marker as usize] += 1;
        }
        counts
    }
}

impl<P: Numeric, V: Numeric, VF: Numeric> Drop for FluidEngine<P, V, VF> {
    fn drop(&mut self) {
        if let Err(e) = self.output.await_completion() {
            log::error!("[FluidEngine] Pending render failed during shutdown: {}", e);
        }
        self.output.shutdown();
        self.compute.shutdown();
        log::info!("[FluidEngine] Shut down at UT {}", self.tick_counter);
    }
}
