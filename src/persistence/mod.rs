//! Persistence of simulation state
//!
//! The state file is plain text so it can be inspected and edited by hand.
//! Engines convert to and from [`StateSnapshot`]; this module only deals with
//! the text.

pub mod state_file;

pub use state_file::{
    load_from_path, read_header, read_snapshot, save_to_path, write_snapshot, StateHeader,
    StateSnapshot,
};
