//! Stochastic advection (step 6)
//!
//! Cells move along chains chosen at random with velocity-weighted odds. A
//! chain that loops back onto its own start is committed by swapping every
//! cell along it with its successor; cells that cannot move are marked
//! stopped so nothing else tries them this tick.

use crate::grid::{CellIndex, CellMarker, DirVector, Direction, Grid2D};
use crate::numeric::Numeric;
use parking_lot::Mutex;
use rand::rngs::StdRng;

pub struct Advection<'a, P: Numeric, V: Numeric> {
    pub markers: &'a mut Grid2D<CellMarker>,
    pub pressure: &'a Grid2D<Mutex<P>>,
    pub velocity: &'a Grid2D<Mutex<DirVector<V>>>,
    pub stamps: &'a mut Grid2D<i64>,
    pub tick_counter: i64,
    pub rng: &'a mut StdRng,
}

/// What one advection pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvectionSummary {
    /// Chains that closed and were committed
    pub chains_moved: usize,
    /// Cell pairs swapped along those chains
    pub cells_swapped: usize,
}

impl<'a, P: Numeric, V: Numeric> Advection<'a, P, V> {
    /// Visit every open cell not yet touched this tick in row-major order
    pub fn run(&mut self) -> AdvectionSummary {
        let mut summary = AdvectionSummary::default();
        let cells: Vec<CellIndex> = self.markers.cells().collect();
        for cell in cells {
            if self.markers[cell].is_wall() || self.stamps[cell] == self.tick_counter {
                continue;
            }
            let sample = V::random01(&mut *self.rng);
            if sample < self.move_probability(cell) {
                if self.propagate_move(cell, true, &mut summary) {
                    summary.chains_moved += 1;
                }
            } else {
                self.propagate_stop(cell, true);
            }
        }
        summary
    }

    /// Sum of non-negative velocity toward open neighbours not yet finalized
    pub fn move_probability(&self, cell: CellIndex) -> V {
        let velocity = *self.velocity[cell].lock();
        let mut sum = V::zero();
        for dir in Direction::ALL {
            let component = velocity.get(dir);
            if component >= V::zero() && self.open_unfinished(cell, dir).is_some() {
                sum += component;
            }
        }
        sum
    }

    fn open_unfinished(&self, cell: CellIndex, dir: Direction) -> Option<CellIndex> {
        self.markers
            .neighbor(cell, dir)
            .filter(|&n| self.markers[n].is_open() && self.stamps[n] != self.tick_counter)
    }

    /// Try to extend a move chain from `cell`; true once the chain closes.
    ///
    /// The start of a chain is stamped `ut - 1` so a later link can recognise
    /// it as the closing cell.
    fn propagate_move(&mut self, cell: CellIndex, is_first: bool, summary: &mut AdvectionSummary) -> bool {
        let ut = self.tick_counter;
        self.stamps[cell] = if is_first { ut - 1 } else { ut };

        let mut successor = None;
        loop {
            let velocity = *self.velocity[cell].lock();
            let mut cumulative = [V::zero(); 4];
            let mut candidates: [Option<CellIndex>; 4] = [None; 4];
            let mut sum = V::zero();

            for (i, dir) in Direction::ALL.into_iter().enumerate() {
                if let Some(neighbor) = self.open_unfinished(cell, dir) {
                    let component = velocity.get(dir);
                    if component > V::zero() {
                        sum += component;
                        candidates[i] = Some(neighbor);
                    }
                }
                cumulative[i] = sum;
            }

            if sum == V::zero() {
                break;
            }

            let pick = V::random01(&mut *self.rng) * sum;
            let chosen = (0..4)
                .find(|&i| candidates[i].is_some() && cumulative[i] > pick)
                .or_else(|| (0..4).rev().find(|&i| candidates[i].is_some()))
                .and_then(|i| candidates[i]);
            let Some(next) = chosen else {
                break;
            };

            let closes = self.stamps[next] == ut - 1 || self.propagate_move(next, false, summary);
            if closes {
                successor = Some(next);
                break;
            }
        }

        self.stamps[cell] = ut;

        // Neighbours pushing into this cell that nobody has visited yet stop here
        let velocity = *self.velocity[cell].lock();
        for dir in Direction::ALL {
            if let Some(neighbor) = self.markers.neighbor(cell, dir) {
                if self.markers[neighbor].is_open()
                    && self.stamps[neighbor] < ut - 1
                    && velocity.get(dir) < V::zero()
                {
                    self.propagate_stop(neighbor, false);
                }
            }
        }

        match successor {
            Some(next) => {
                if !is_first {
                    self.swap_cells(cell, next);
                    summary.cells_swapped += 1;
                }
                true
            }
            None => {
                self.propagate_stop(cell, true);
                false
            }
        }
    }

    /// Mark `start` and the cells flowing into it as stopped for this tick.
    ///
    /// An unforced cell is left alone while it still has positive velocity
    /// toward an open neighbour no chain has reached.
    pub fn propagate_stop(&mut self, start: CellIndex, force: bool) {
        let ut = self.tick_counter;
        let mut pending = vec![(start, force)];

        while let Some((cell, forced)) = pending.pop() {
            let velocity = *self.velocity[cell].lock();
            if !forced {
                if self.stamps[cell] == ut {
                    continue;
                }
                let still_moving = Direction::ALL.into_iter().any(|dir| {
                    self.markers.neighbor(cell, dir).is_some_and(|n| {
                        self.markers[n].is_open()
                            && self.stamps[n] < ut - 1
                            && velocity.get(dir) > V::zero()
                    })
                });
                if still_moving {
                    continue;
                }
            }

            self.stamps[cell] = ut;
            for dir in Direction::ALL {
                if let Some(neighbor) = self.open_unfinished(cell, dir) {
                    if velocity.get(dir) <= V::zero() {
                        pending.push((neighbor, false));
                    }
                }
            }
        }
    }

    /// Exchange markers, pressure and velocity of two cells
    fn swap_cells(&mut self, a: CellIndex, b: CellIndex) {
        self.markers.swap(a, b);

        let pa = *self.pressure[a].lock();
        let pb = std::mem::replace(&mut *self.pressure[b].lock(), pa);
        *self.pressure[a].lock() = pb;

        let va = *self.velocity[a].lock();
        let vb = std::mem::replace(&mut *self.velocity[b].lock(), va);
        *self.velocity[a].lock() = vb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn markers(rows: &[&str]) -> Grid2D<CellMarker> {
        Grid2D::from_fn(rows.len(), rows[0].len(), |c| {
            CellMarker::from_glyph(rows[c.row].as_bytes()[c.col] as char).unwrap()
        })
    }

    #[test]
    fn test_move_probability_ignores_walls_and_negative_velocity() {
        let mut markers = markers(&["###", "# #", "#.#", "###"]);
        let cell = CellIndex::new(2, 1);
        let pressure = Grid2D::from_fn(4, 3, |_| Mutex::new(0.0f64));
        let velocity = Grid2D::from_fn(4, 3, |_| Mutex::new(DirVector([0.0f64; 4])));
        *velocity[cell].lock() = DirVector([0.4, 0.9, 0.7, -0.2]);
        let mut stamps = Grid2D::new(4, 3, 0i64);
        let mut rng = StdRng::seed_from_u64(1337);

        let advection = Advection {
            markers: &mut markers,
            pressure: &pressure,
            velocity: &velocity,
            stamps: &mut stamps,
            tick_counter: 10,
            rng: &mut rng,
        };
        // Only Up leads to an open cell
        assert_eq!(advection.move_probability(cell), 0.4);
    }

    #[test]
    fn test_two_cell_loop_swaps() {
        let mut markers = markers(&["####", "#. #", "####"]);
        let a = CellIndex::new(1, 1);
        let b = CellIndex::new(1, 2);
        let pressure = Grid2D::from_fn(3, 4, |_| Mutex::new(0.0f64));
        *pressure[a].lock() = 5.0;
        let velocity = Grid2D::from_fn(3, 4, |_| Mutex::new(DirVector([0.0f64; 4])));
        velocity[a].lock().set(Direction::Right, 1.0);
        velocity[b].lock().set(Direction::Left, 1.0);
        let mut stamps = Grid2D::new(3, 4, 0i64);
        let mut rng = StdRng::seed_from_u64(1337);

        let mut advection = Advection {
            markers: &mut markers,
            pressure: &pressure,
            velocity: &velocity,
            stamps: &mut stamps,
            tick_counter: 10,
            rng: &mut rng,
        };
        // a -> b -> a closes immediately; only the non-first link swaps
        let mut summary = AdvectionSummary::default();
        assert!(advection.propagate_move(a, true, &mut summary));
        assert_eq!(summary.cells_swapped, 1);
        assert_eq!(markers[a], CellMarker::Air);
        assert_eq!(markers[b], CellMarker::Fluid);
        assert_eq!(*pressure[b].lock(), 5.0);
        assert_eq!(stamps[a], 10);
        assert_eq!(stamps[b], 10);
    }

    #[test]
    fn test_stop_floods_cells_without_outflow() {
        let mut markers = markers(&["#####", "#...#", "#####"]);
        let pressure = Grid2D::from_fn(3, 5, |_| Mutex::new(0.0f64));
        let velocity = Grid2D::from_fn(3, 5, |_| Mutex::new(DirVector([0.0f64; 4])));
        let mut stamps = Grid2D::new(3, 5, 0i64);
        let mut rng = StdRng::seed_from_u64(7);

        let mut advection = Advection {
            markers: &mut markers,
            pressure: &pressure,
            velocity: &velocity,
            stamps: &mut stamps,
            tick_counter: 6,
            rng: &mut rng,
        };
        advection.propagate_stop(CellIndex::new(1, 1), true);
        for col in 1..4 {
            assert_eq!(stamps[CellIndex::new(1, col)], 6);
        }
        assert_eq!(stamps[CellIndex::new(0, 0)], 0);
    }
}
