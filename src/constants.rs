// Dambreak Constants - SINGLE SOURCE OF TRUTH
//
// Physical and bookkeeping constants used by the simulator. Do not define
// numeric tuning values anywhere else in the codebase.

/// Physical constants
pub mod physics {
    /// Velocity added to the downward component of every open cell per tick
    pub const GRAVITY: f64 = 0.1;

    /// Density of air cells
    pub const AIR_DENSITY: f64 = 0.01;

    /// Density of fluid cells
    pub const FLUID_DENSITY: f64 = 1000.0;

    /// Share of momentum kept as pressure when a fluid cell decelerates
    pub const FLUID_DAMPING: f64 = 0.8;

    /// Residual capacity below which an edge counts as saturated
    pub const FLOW_EPSILON: f64 = 0.0001;

    /// Flow quantum pushed per augmenting-path search
    pub const FLOW_QUANTUM: i64 = 1;
}

/// Run loop defaults
pub mod run {
    /// Seed for the advection random stream
    pub const DEFAULT_SEED: u64 = 1337;

    /// Number of ticks the binary runs when not told otherwise
    pub const DEFAULT_TICKS: u64 = 1_000_000;
}

/// Persisted state glyphs
pub mod glyphs {
    pub const WALL: char = '#';
    pub const AIR: char = ' ';
    pub const FLUID: char = '.';
}
