use std::fmt;
use crate::mesh::{LogicalLocation, RegionIndcs, RegionSize};
use crate::physics::{PhysicsConfig, NFORCE};
use crate::rng::RngState;




/// One contiguous run of values within a block record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Hydro,
    Mhd,
    MhdX1Face,
    MhdX2Face,
    MhdX3Face,
    Radiation,
    Forcing,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Section::Hydro => "hydro variables",
            Section::Mhd => "mhd variables",
            Section::MhdX1Face => "x1-face magnetic field",
            Section::MhdX2Face => "x2-face magnetic field",
            Section::MhdX3Face => "x3-face magnetic field",
            Section::Radiation => "radiation intensities",
            Section::Forcing => "driving force",
        };
        write!(f, "{}", name)
    }
}




/// The sections of a block record and their lengths (in values).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadLayout {
    sections: Vec<(Section, usize)>,
}

impl PayloadLayout {
    /// The record layout implied by the active modules and the block index
    /// ranges. Every rank computes this from identical inputs, so every rank
    /// arrives at the same payload size.
    pub fn new(config: &PhysicsConfig, indcs: &RegionIndcs) -> Self {
        let (n1, n2, n3) = indcs.padded_shape();
        let cells = n1 * n2 * n3;
        let mut sections = Vec::new();

        if let Some(hydro) = config.hydro {
            sections.push((Section::Hydro, cells * hydro.num_components()));
        }
        if let Some(mhd) = config.mhd {
            sections.push((Section::Mhd, cells * mhd.num_components()));
            sections.push((Section::MhdX1Face, (n1 + 1) * n2 * n3));
            sections.push((Section::MhdX2Face, n1 * (n2 + 1) * n3));
            sections.push((Section::MhdX3Face, n1 * n2 * (n3 + 1)));
        }
        if let Some(radiation) = config.radiation {
            sections.push((Section::Radiation, cells * radiation.nangles));
        }
        if config.forcing.is_some() {
            sections.push((Section::Forcing, cells * NFORCE));
        }
        Self { sections }
    }

    pub fn sections(&self) -> &[(Section, usize)] {
        &self.sections
    }

    /// Bytes per block record.
    pub fn block_bytes(&self) -> u64 {
        self.sections.iter().map(|(_, n)| (n * 8) as u64).sum()
    }

    /// Byte offset of a section from the start of a block record.
    pub fn section_offset(&self, section: Section) -> Option<u64> {
        let mut offset = 0;

        for &(s, n) in &self.sections {
            if s == section {
                return Some(offset)
            }
            offset += (n * 8) as u64;
        }
        None
    }
}




/// Byte positions of everything in a restart file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestartLayout {
    pub parameters_len: u64,
    pub nmb_total: u64,
    pub has_rng_state: bool,
    pub payload: PayloadLayout,
}

impl RestartLayout {
    /// Size of the parameter text plus the fixed-size mesh header.
    pub fn header_bytes(&self) -> u64 {
        self.parameters_len
            + 3 * 4
            + 2 * 8
            + RegionSize::ENCODED_LEN as u64
            + 2 * RegionIndcs::ENCODED_LEN as u64
    }

    /// Size of the per-block location and cost tables.
    pub fn table_bytes(&self) -> u64 {
        self.nmb_total * (LogicalLocation::ENCODED_LEN as u64 + 4)
    }

    /// The generator state is stored packed; see [`RngState::ENCODED_LEN`].
    pub fn rng_bytes(&self) -> u64 {
        if self.has_rng_state { RngState::ENCODED_LEN as u64 } else { 0 }
    }

    /// Offset of the first block record.
    pub fn payload_start(&self) -> u64 {
        self.header_bytes() + self.table_bytes() + 8 + self.rng_bytes()
    }

    /// Offset of the record of the given block.
    pub fn block_offset(&self, gid: usize) -> u64 {
        self.payload_start() + gid as u64 * self.payload.block_bytes()
    }

    /// Total file size.
    pub fn file_bytes(&self) -> u64 {
        self.block_offset(self.nmb_total as usize)
    }
}




/// How a rank writes one of its block records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Every rank writes a record in this round, then all synchronize.
    Collective,
    /// Only ranks holding more blocks than the least loaded rank write in
    /// this round, without synchronizing.
    Independent,
}

/// The write mode of each of a rank's block records, in order. The first
/// `min(counts)` records are written collectively, the rest independently.
pub fn write_schedule(nmb_eachrank: &[usize], rank: usize) -> Vec<WriteMode> {
    let collective = nmb_eachrank.iter().copied().min().unwrap_or(0);

    (0..nmb_eachrank[rank])
        .map(|m| if m < collective { WriteMode::Collective } else { WriteMode::Independent })
        .collect()
}
