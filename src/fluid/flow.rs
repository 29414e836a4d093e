//! Flow settling (step 3)
//!
//! Repeated augmenting-path search that routes flow along open edges, bounded
//! by each edge's velocity. Cells are stamped with the tick counter: `ut - 1`
//! while on the current path, `ut` once finished for the sweep. The search
//! keeps its own stack so long paths cannot overflow the thread stack.

use crate::grid::{CellIndex, CellMarker, DirVector, Direction, DirectionalField, Grid2D};
use crate::numeric::Numeric;
use parking_lot::Mutex;

/// Result of one path search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowOutcome<VF> {
    /// Flow pushed out of the start cell (or accumulated without a path)
    pub flow: VF,
    /// Whether a path closed on a cell already on the current path
    pub found: bool,
    /// Cell the path closed on
    pub terminal: Option<CellIndex>,
}

impl<VF: Numeric> FlowOutcome<VF> {
    fn exhausted(flow: VF) -> Self {
        Self {
            flow,
            found: false,
            terminal: None,
        }
    }
}

struct Frame<VF> {
    cell: CellIndex,
    limit: VF,
    next_dir: usize,
    accumulated: VF,
}

impl<VF: Numeric> Frame<VF> {
    fn new(cell: CellIndex, limit: VF) -> Self {
        Self {
            cell,
            limit,
            next_dir: 0,
            accumulated: VF::zero(),
        }
    }
}

enum Step<VF> {
    Descend(CellIndex, VF),
    Return(FlowOutcome<VF>),
}

/// One sweep's view of the grid
pub struct FlowSearch<'a, V: Numeric, VF: Numeric> {
    pub markers: &'a Grid2D<CellMarker>,
    pub velocity: &'a Grid2D<Mutex<DirVector<V>>>,
    pub flow: &'a mut DirectionalField<VF>,
    pub stamps: &'a mut Grid2D<i64>,
    pub tick_counter: i64,
    pub epsilon: VF,
}

impl<'a, V: Numeric, VF: Numeric> FlowSearch<'a, V, VF> {
    /// Push up to `limit` units of flow out of `start`.
    ///
    /// When a path closes on a cell that is itself waiting on the stack, that
    /// cell commits the edge and retries the same direction before moving on.
    pub fn propagate(&mut self, start: CellIndex, limit: VF) -> FlowOutcome<VF> {
        let ut = self.tick_counter;
        self.stamps[start] = ut - 1;
        let mut stack = vec![Frame::new(start, limit)];
        let mut returned: Option<FlowOutcome<VF>> = None;

        while let Some(depth) = stack.len().checked_sub(1) {
            if let Some(child) = returned.take() {
                let frame = &mut stack[depth];
                let dir = Direction::ALL[frame.next_dir];
                frame.accumulated += child.flow;
                if child.found {
                    self.flow[frame.cell].add(dir, child.flow);
                    if child.terminal != Some(frame.cell) {
                        self.stamps[frame.cell] = ut;
                        stack.pop();
                        returned = Some(child);
                        continue;
                    }
                } else {
                    frame.next_dir += 1;
                }
            }

            match self.scan(&mut stack[depth]) {
                Step::Descend(cell, limit) => {
                    self.stamps[cell] = ut - 1;
                    stack.push(Frame::new(cell, limit));
                }
                Step::Return(outcome) => {
                    let cell = stack[depth].cell;
                    self.stamps[cell] = ut;
                    stack.pop();
                    returned = Some(outcome);
                }
            }
        }

        returned.unwrap_or_else(|| FlowOutcome::exhausted(VF::zero()))
    }

    /// Look for the next edge with spare capacity, starting at `next_dir`
    fn scan(&mut self, frame: &mut Frame<VF>) -> Step<VF> {
        let ut = self.tick_counter;
        while frame.next_dir < Direction::ALL.len() {
            let dir = Direction::ALL[frame.next_dir];
            if let Some(neighbor) = self.markers.neighbor(frame.cell, dir) {
                if self.markers[neighbor].is_open() && self.stamps[neighbor] < ut {
                    let capacity = VF::convert(self.velocity[frame.cell].lock().get(dir));
                    let spare = capacity - self.flow[frame.cell].get(dir);
                    if spare > self.epsilon {
                        let push = frame.limit.min_of(spare);
                        if self.stamps[neighbor] == ut - 1 {
                            self.flow[frame.cell].add(dir, push);
                            return Step::Return(FlowOutcome {
                                flow: push,
                                found: true,
                                terminal: Some(neighbor),
                            });
                        }
                        return Step::Descend(neighbor, push);
                    }
                }
            }
            frame.next_dir += 1;
        }
        Step::Return(FlowOutcome::exhausted(frame.accumulated))
    }
}
