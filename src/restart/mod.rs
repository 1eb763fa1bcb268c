//! Checkpoint (restart) files.
//!
//! A restart file is written jointly by every rank. Rank 0 writes a header
//! describing the run, then every rank writes the conserved variables of
//! the blocks it owns into non-overlapping regions of a common payload. The
//! layout is:
//!
//! ```text
//! parameter text, terminated by "<par_end>\n"
//! nmb_total: i32, root_level: i32
//! mesh_size: RegionSize, mesh_indcs: RegionIndcs, mb_indcs: RegionIndcs
//! time: f64, dt: f64, ncycle: i32
//! nmb_total x LogicalLocation
//! nmb_total x cost: f32
//! payload bytes per block: u64
//! random number generator state (only if turbulence driving is active)
//! nmb_total x block record
//! ```
//!
//! All numbers are little-endian. A block record holds, in order, the
//! cell-centered hydro variables, the cell-centered MHD variables, the
//! three face-centered magnetic field components, the radiation
//! intensities, and the driving force, each present only if the
//! corresponding module is active. The record of block `gid` starts at
//! `payload_start + gid * payload_size`.

pub mod file;
pub mod layout;
pub mod reader;
pub mod writer;

pub use layout::{PayloadLayout, RestartLayout, Section, WriteMode};
pub use reader::{BlockRecord, RestartHeader, RestartReader};
pub use writer::{OutputParameters, RestartOutput, WriteReport};

use std::path::PathBuf;
use thiserror::Error;
use crate::message::CommError;
use crate::parameters::ConfigError;




/// Errors that arise while writing or reading a restart file. Any of these
/// raised during a write means the file on disk is incomplete.
#[derive(Debug, Error)]
pub enum RestartError {
    #[error("unable to create output directory {path}: {source}")]
    CreateDirectory { path: PathBuf, source: std::io::Error },

    #[error("unable to open restart file {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },

    #[error("I/O error writing {section}: {source}")]
    Write { section: String, source: std::io::Error },

    #[error("short write of {section}: {written} of {requested} bytes")]
    ShortWrite { section: String, requested: usize, written: usize },

    #[error("restart write failed on rank {rank}")]
    PeerFailed { rank: usize },

    #[error("I/O error reading {section}: {source}")]
    Read { section: String, source: std::io::Error },

    #[error("corrupt restart file: {0}")]
    Corrupt(String),

    #[error("no output data loaded; call load_output_data before writing")]
    NoData,

    #[error("output data does not match the restart layout: {0}")]
    Mismatch(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Comm(#[from] CommError),
}
