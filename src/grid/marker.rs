use super::{CellIndex, Direction, Grid2D};
use crate::constants::{glyphs, physics};

/// Terrain/fluid content of a cell
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellMarker {
    Wall = 0,
    Air = 1,
    Fluid = 2,
}

impl CellMarker {
    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            glyphs::WALL => Some(CellMarker::Wall),
            glyphs::AIR => Some(CellMarker::Air),
            glyphs::FLUID => Some(CellMarker::Fluid),
            _ => None,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            CellMarker::Wall => glyphs::WALL,
            CellMarker::Air => glyphs::AIR,
            CellMarker::Fluid => glyphs::FLUID,
        }
    }

    #[inline(always)]
    pub fn is_wall(self) -> bool {
        self == CellMarker::Wall
    }

    #[inline(always)]
    pub fn is_open(self) -> bool {
        self != CellMarker::Wall
    }

    /// Density used to turn pressure into velocity and back. Walls never
    /// take part in that exchange.
    pub fn density(self) -> f64 {
        match self {
            CellMarker::Wall => 0.0,
            CellMarker::Air => physics::AIR_DENSITY,
            CellMarker::Fluid => physics::FLUID_DENSITY,
        }
    }
}

/// Number of non-wall 4-neighbours per cell. Cells past the border count as
/// walls; wall cells get zero.
pub fn count_open_neighbors(markers: &Grid2D<CellMarker>) -> Grid2D<u8> {
    Grid2D::from_fn(markers.rows(), markers.cols(), |cell: CellIndex| {
        if markers[cell].is_wall() {
            return 0;
        }
        Direction::ALL
            .iter()
            .filter_map(|&dir| markers.neighbor(cell, dir))
            .filter(|&n| markers[n].is_open())
            .count() as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(rows: &[&str]) -> Grid2D<CellMarker> {
        let cols = rows[0].len();
        Grid2D::from_fn(rows.len(), cols, |c| {
            CellMarker::from_glyph(rows[c.row].as_bytes()[c.col] as char).unwrap()
        })
    }

    #[test]
    fn test_glyph_round_trip() {
        for marker in [CellMarker::Wall, CellMarker::Air, CellMarker::Fluid] {
            assert_eq!(CellMarker::from_glyph(marker.glyph()), Some(marker));
        }
        assert_eq!(CellMarker::from_glyph('x'), None);
    }

    #[test]
    fn test_open_neighbor_counts() {
        let markers = parse(&["#####", "#. .#", "# # #", "#####"]);
        let counts = count_open_neighbors(&markers);
        assert_eq!(counts[CellIndex::new(1, 1)], 2);
        assert_eq!(counts[CellIndex::new(1, 2)], 2);
        assert_eq!(counts[CellIndex::new(2, 1)], 1);
        assert_eq!(counts[CellIndex::new(0, 0)], 0);
    }

    #[test]
    fn test_densities() {
        assert!(CellMarker::Fluid.density() > CellMarker::Air.density());
        assert_eq!(CellMarker::Wall.density(), 0.0);
    }
}
