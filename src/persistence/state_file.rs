//! Line-oriented text state format
//!
//! ```text
//! N M UT
//! <N rows of M glyphs>
//! <N lines of M generation stamps>
//! <N lines of M pressures>
//! <N lines of M*4 velocity components, Up Down Left Right per cell>
//! ```
//!
//! Everything after the marker rows is read as whitespace-separated tokens.

use crate::error::{corrupted_data, load_error, save_error, SimErrorContext, SimResult};
use crate::grid::{CellIndex, CellMarker, Grid2D};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Persistent part of a simulation, in plain numbers
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub tick_counter: i64,
    pub markers: Grid2D<CellMarker>,
    pub stamps: Grid2D<i64>,
    pub pressure: Grid2D<f64>,
    /// Up, Down, Left, Right
    pub velocity: Grid2D<[f64; 4]>,
}

impl StateSnapshot {
    pub fn rows(&self) -> usize {
        self.markers.rows()
    }

    pub fn cols(&self) -> usize {
        self.markers.cols()
    }
}

/// Header of a state file: rows, columns, tick counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHeader {
    pub rows: usize,
    pub cols: usize,
    pub tick_counter: i64,
}

fn parse_header(line: &str) -> SimResult<StateHeader> {
    let mut fields = line.split_whitespace();
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| corrupted_data(format!("header is missing {}", name)))
    };
    let rows = next("row count")?;
    let cols = next("column count")?;
    let ut = next("tick counter")?;

    Ok(StateHeader {
        rows: rows
            .parse()
            .map_err(|_| corrupted_data(format!("bad row count {:?}", rows)))?,
        cols: cols
            .parse()
            .map_err(|_| corrupted_data(format!("bad column count {:?}", cols)))?,
        tick_counter: ut
            .parse()
            .map_err(|_| corrupted_data(format!("bad tick counter {:?}", ut)))?,
    })
}

/// Read only the header line
pub fn read_header(source: &mut dyn BufRead) -> SimResult<StateHeader> {
    let mut line = String::new();
    if source.read_line(&mut line).sim_context("Failed to read state header")? == 0 {
        return Err(corrupted_data("empty state file"));
    }
    parse_header(&line)
}

/// Read the marker rows following the header.
///
/// Blank lines are skipped. Rows shorter than the grid are padded with air.
fn read_markers(source: &mut dyn BufRead, header: &StateHeader) -> SimResult<Grid2D<CellMarker>> {
    let mut markers = Grid2D::new(header.rows, header.cols, CellMarker::Air);
    let mut line = String::new();
    let mut row = 0;

    while row < header.rows {
        line.clear();
        if source.read_line(&mut line).sim_context("Failed to read marker rows")? == 0 {
            return Err(corrupted_data(format!(
                "expected {} marker rows, found {}",
                header.rows, row
            )));
        }
        let text = line.trim_end_matches(['\n', '\r']);
        if text.is_empty() {
            continue;
        }

        let glyph_count = text.chars().count();
        if glyph_count > header.cols {
            return Err(corrupted_data(format!(
                "marker row {} has {} cells, expected {}",
                row, glyph_count, header.cols
            )));
        }
        if glyph_count < header.cols {
            log::warn!(
                "[Persistence] Marker row {} has {} of {} cells; padding with air",
                row,
                glyph_count,
                header.cols
            );
        }

        for (col, glyph) in text.chars().enumerate() {
            markers[CellIndex::new(row, col)] =
                CellMarker::from_glyph(glyph).ok_or_else(|| {
                    corrupted_data(format!("unknown glyph {:?} at ({}, {})", glyph, row, col))
                })?;
        }
        row += 1;
    }
    Ok(markers)
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn grid<T: std::str::FromStr>(&mut self, rows: usize, cols: usize, what: &str) -> SimResult<Grid2D<T>> {
        let mut values = Vec::with_capacity(rows * cols);
        for _ in 0..rows * cols {
            values.push(self.value(what)?);
        }
        Grid2D::from_vec(rows, cols, values).ok_or_else(|| corrupted_data(format!("bad {} grid", what)))
    }

    fn value<T: std::str::FromStr>(&mut self, what: &str) -> SimResult<T> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| corrupted_data(format!("unexpected end of data in {}", what)))?;
        token
            .parse()
            .map_err(|_| corrupted_data(format!("bad {} value {:?}", what, token)))
    }
}

/// Parse a full state
pub fn read_snapshot(source: &mut dyn BufRead) -> SimResult<StateSnapshot> {
    let header = read_header(source)?;
    let markers = read_markers(source, &header)?;

    let mut rest = String::new();
    source
        .read_to_string(&mut rest)
        .sim_context("Failed to read state body")?;
    let mut tokens = Tokens {
        inner: rest.split_whitespace(),
    };

    let (rows, cols) = (header.rows, header.cols);
    let stamps = tokens.grid::<i64>(rows, cols, "stamp")?;
    let pressure = tokens.grid::<f64>(rows, cols, "pressure")?;
    let mut velocity = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        let mut components = [0.0; 4];
        for component in components.iter_mut() {
            *component = tokens.value("velocity")?;
        }
        velocity.push(components);
    }
    let velocity = Grid2D::from_vec(rows, cols, velocity)
        .ok_or_else(|| corrupted_data("bad velocity grid"))?;

    if tokens.inner.next().is_some() {
        log::warn!("[Persistence] Ignoring trailing data after velocity grid");
    }

    Ok(StateSnapshot {
        tick_counter: header.tick_counter,
        markers,
        stamps,
        pressure,
        velocity,
    })
}

fn write_rows<T>(sink: &mut dyn Write, grid: &Grid2D<T>, mut cell: impl FnMut(&mut String, &T)) -> std::io::Result<()> {
    let mut line = String::new();
    for row in 0..grid.rows() {
        line.clear();
        for (col, value) in grid.row(row).iter().enumerate() {
            if col > 0 {
                line.push(' ');
            }
            cell(&mut line, value);
        }
        line.push('\n');
        sink.write_all(line.as_bytes())?;
    }
    Ok(())
}

/// Write a full state
pub fn write_snapshot(sink: &mut dyn Write, snapshot: &StateSnapshot) -> SimResult<()> {
    use std::fmt::Write as _;

    let result = (|| -> std::io::Result<()> {
        writeln!(sink, "{} {} {}", snapshot.rows(), snapshot.cols(), snapshot.tick_counter)?;
        for row in 0..snapshot.rows() {
            let line: String = snapshot.markers.row(row).iter().map(|m| m.glyph()).collect();
            writeln!(sink, "{}", line)?;
        }
        write_rows(sink, &snapshot.stamps, |line, v| {
            let _ = write!(line, "{}", v);
        })?;
        write_rows(sink, &snapshot.pressure, |line, v| {
            let _ = write!(line, "{}", v);
        })?;
        write_rows(sink, &snapshot.velocity, |line, v| {
            let _ = write!(line, "{} {} {} {}", v[0], v[1], v[2], v[3]);
        })?;
        sink.flush()
    })();
    result.sim_context("Failed to write state")
}

/// Truncate `path` and write the state to it
pub fn save_to_path(path: &Path, snapshot: &StateSnapshot) -> SimResult<()> {
    let file = File::create(path).map_err(|e| save_error(path, e))?;
    let mut writer = BufWriter::new(file);
    write_snapshot(&mut writer, snapshot).map_err(|e| save_error(path, e))?;
    log::info!(
        "[Persistence] Saved {}x{} state (UT {}) to {}",
        snapshot.rows(),
        snapshot.cols(),
        snapshot.tick_counter,
        path.display()
    );
    Ok(())
}

pub fn load_from_path(path: &Path) -> SimResult<StateSnapshot> {
    let file = File::open(path).map_err(|e| load_error(path, e))?;
    let snapshot = read_snapshot(&mut BufReader::new(file))?;
    log::info!(
        "[Persistence] Loaded {}x{} state (UT {}) from {}",
        snapshot.rows(),
        snapshot.cols(),
        snapshot.tick_counter,
        path.display()
    );
    Ok(snapshot)
}
