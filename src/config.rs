//! Simulation configuration
//!
//! Run settings come from defaults, an optional TOML file and command-line
//! overrides, in that order. Numeric representations are chosen separately
//! through [`SimulationTypes`].

use crate::constants::{physics, run};
use crate::error::{config_error, SimErrorContext, SimResult};
use crate::numeric::NumericKind;
use crate::thread_pool::DispatcherConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Where rendered frames go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    Stdout,
    /// Skip rendering entirely
    Discard,
}

/// Run-time settings of a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Compute pool size
    pub worker_count: usize,
    /// Seed for the advection random stream
    pub seed: u64,
    pub output: OutputTarget,
    /// Name worker threads after their pool
    pub thread_names: bool,
    /// Worker stack size in bytes
    pub stack_size: Option<usize>,
    /// Downward velocity added per tick
    pub gravity: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            seed: run::DEFAULT_SEED,
            output: OutputTarget::Stdout,
            thread_names: true,
            stack_size: Some(2 * 1024 * 1024), // 2MB stack per thread
            gravity: physics::GRAVITY,
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(raw: &str) -> SimResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| config_error(format!("Invalid TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)
            .sim_context(&format!("Failed to read config {}", path.display()))?;
        log::info!("[Config] Loaded {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.worker_count == 0 {
            return Err(config_error("worker_count must be at least 1"));
        }
        if !self.gravity.is_finite() {
            return Err(config_error(format!("gravity must be finite, got {}", self.gravity)));
        }
        if self.stack_size == Some(0) {
            return Err(config_error("stack_size must be positive when set"));
        }
        Ok(())
    }

    /// Settings for the compute pool
    pub fn compute_pool(&self) -> DispatcherConfig {
        DispatcherConfig {
            name: "compute".to_string(),
            worker_count: self.worker_count,
            enable_thread_names: self.thread_names,
            stack_size: self.stack_size,
        }
    }

    /// Settings for the single-worker output pool
    pub fn output_pool(&self) -> DispatcherConfig {
        DispatcherConfig {
            name: "output".to_string(),
            worker_count: 1,
            enable_thread_names: self.thread_names,
            stack_size: self.stack_size,
        }
    }
}

/// Representations picked for the three numeric fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationTypes {
    pub pressure: NumericKind,
    pub velocity: NumericKind,
    pub velocity_flow: NumericKind,
}

impl SimulationTypes {
    /// Parse the three type specifiers; each must name a compiled representation
    pub fn parse(pressure: &str, velocity: &str, velocity_flow: &str) -> SimResult<Self> {
        let types = Self {
            pressure: NumericKind::parse(pressure)?,
            velocity: NumericKind::parse(velocity)?,
            velocity_flow: NumericKind::parse(velocity_flow)?,
        };
        types.pressure.storage()?;
        types.velocity.storage()?;
        types.velocity_flow.storage()?;
        Ok(types)
    }
}

impl Default for SimulationTypes {
    fn default() -> Self {
        Self {
            pressure: NumericKind::Float,
            velocity: NumericKind::Float,
            velocity_flow: NumericKind::Float,
        }
    }
}

impl fmt::Display for SimulationTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p={} v={} v_flow={}",
            self.pressure, self.velocity, self.velocity_flow
        )
    }
}
