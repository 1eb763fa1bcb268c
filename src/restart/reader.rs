use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use log::debug;
use crate::mesh::{LogicalLocation, Mesh, RegionIndcs, RegionSize};
use crate::parameters::{ParameterInput, PAR_END};
use crate::physics::{Physics, PhysicsConfig};
use crate::rng::RngState;
use super::layout::{PayloadLayout, RestartLayout, Section};
use super::RestartError;




/// The fixed-size mesh header that follows the parameter text.
#[derive(Clone, Debug, PartialEq)]
pub struct RestartHeader {
    pub nmb_total: i32,
    pub root_level: i32,
    pub mesh_size: RegionSize,
    pub mesh_indcs: RegionIndcs,
    pub mb_indcs: RegionIndcs,
    pub time: f64,
    pub dt: f64,
    pub ncycle: i32,
}

impl RestartHeader {
    pub const ENCODED_LEN: usize = 3 * 4 + 2 * 8 + RegionSize::ENCODED_LEN + 2 * RegionIndcs::ENCODED_LEN;

    fn decode(bytes: &[u8]) -> Self {
        let i32_at = |n: usize| {
            let mut b = [0; 4];
            b.copy_from_slice(&bytes[n..n + 4]);
            i32::from_le_bytes(b)
        };
        let f64_at = |n: usize| {
            let mut b = [0; 8];
            b.copy_from_slice(&bytes[n..n + 8]);
            f64::from_le_bytes(b)
        };
        let s = 8;
        let i = s + RegionSize::ENCODED_LEN;
        let t = i + 2 * RegionIndcs::ENCODED_LEN;

        Self {
            nmb_total: i32_at(0),
            root_level: i32_at(4),
            mesh_size: RegionSize::decode(&bytes[s..]),
            mesh_indcs: RegionIndcs::decode(&bytes[i..]),
            mb_indcs: RegionIndcs::decode(&bytes[i + RegionIndcs::ENCODED_LEN..]),
            time: f64_at(t),
            dt: f64_at(t + 8),
            ncycle: i32_at(t + 16),
        }
    }
}




/// The values stored for one block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockRecord {
    pub gid: usize,
    pub sections: Vec<(Section, Vec<f64>)>,
}

impl BlockRecord {
    pub fn get(&self, section: Section) -> Option<&[f64]> {
        self.sections.iter().find(|(s, _)| *s == section).map(|(_, data)| data.as_slice())
    }
}




/// Random access to the contents of a restart file.
#[derive(Debug)]
pub struct RestartReader {
    file: BufReader<File>,
    pub parameters: ParameterInput,
    pub header: RestartHeader,
    pub locations: Vec<LogicalLocation>,
    pub costs: Vec<f32>,
    pub config: PhysicsConfig,
    pub rng_state: Option<RngState>,
    layout: RestartLayout,
}




// ============================================================================
impl RestartReader {

    /// Open a restart file and read everything up to the block records.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RestartError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RestartError::Open { path: path.to_path_buf(), source })?;
        let mut file = BufReader::new(file);

        let mut text = Vec::new();
        loop {
            let start = text.len();
            let n = file.read_until(b'\n', &mut text).map_err(read_error("parameter text"))?;

            if n == 0 {
                return Err(RestartError::Corrupt(format!("no {} line in the parameter text", PAR_END)))
            }
            if text[start..].strip_suffix(b"\n") == Some(PAR_END.as_bytes()) {
                break
            }
        }
        let text = String::from_utf8(text).map_err(|_| RestartError::Corrupt("parameter text is not UTF-8".into()))?;
        let parameters = ParameterInput::parse(&text)?;
        let config = PhysicsConfig::from_parameters(&mut parameters.clone())?;

        let header = RestartHeader::decode(&read_vec(&mut file, RestartHeader::ENCODED_LEN, "mesh header")?);

        if header.nmb_total < 0 {
            return Err(RestartError::Corrupt(format!("negative block count {}", header.nmb_total)))
        }
        let nmb = header.nmb_total as usize;
        let file_len = file.get_ref().metadata().map_err(read_error("file length"))?.len();
        let table_end = (text.len() + RestartHeader::ENCODED_LEN) as u64 + nmb as u64 * (LogicalLocation::ENCODED_LEN as u64 + 4);

        if table_end > file_len {
            return Err(RestartError::Corrupt(format!(
                "{} blocks do not fit in a file of {} bytes", nmb, file_len)))
        }

        let bytes = read_vec(&mut file, nmb * LogicalLocation::ENCODED_LEN, "logical locations")?;
        let locations = bytes.chunks_exact(LogicalLocation::ENCODED_LEN).map(LogicalLocation::decode).collect();

        let bytes = read_vec(&mut file, nmb * 4, "block costs")?;
        let costs = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let mut size = [0; 8];
        file.read_exact(&mut size).map_err(read_error("payload size"))?;
        let payload_size = u64::from_le_bytes(size);

        let rng_state = if config.forcing.is_some() {
            let bytes = read_vec(&mut file, RngState::ENCODED_LEN, "random number generator state")?;
            let state = RngState::decode(&bytes)
                .ok_or_else(|| RestartError::Corrupt("malformed random number generator state".into()))?;
            Some(state)
        } else {
            None
        };

        let layout = RestartLayout {
            parameters_len: text.len() as u64,
            nmb_total: nmb as u64,
            has_rng_state: config.forcing.is_some(),
            payload: PayloadLayout::new(&config, &header.mb_indcs),
        };
        if layout.payload.block_bytes() != payload_size {
            return Err(RestartError::Corrupt(format!(
                "block records are {} bytes, but the active modules imply {}",
                payload_size, layout.payload.block_bytes())))
        }
        debug!("opened {} ({} blocks, t = {})", path.display(), nmb, header.time);

        Ok(Self { file, parameters, header, locations, costs, config, rng_state, layout })
    }

    pub fn layout(&self) -> &RestartLayout {
        &self.layout
    }

    /// Read the record of one block.
    pub fn read_block(&mut self, gid: usize) -> Result<BlockRecord, RestartError> {
        if gid >= self.header.nmb_total as usize {
            return Err(RestartError::Corrupt(format!("no block with gid {}", gid)))
        }
        self.file
            .seek(SeekFrom::Start(self.layout.block_offset(gid)))
            .map_err(read_error("block record"))?;

        let mut sections = Vec::new();

        for &(section, len) in self.layout.payload.sections() {
            let bytes = read_vec(&mut self.file, len * 8, &section.to_string())?;
            let data = bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            sections.push((section, data))
        }
        Ok(BlockRecord { gid, sections })
    }

    /// Rebuild the mesh described by the header, with its clock and block
    /// costs restored. All blocks are assigned to rank 0.
    pub fn mesh(&self) -> Result<Mesh, RestartError> {
        let h = &self.header;
        let size = &h.mesh_size;
        let cells = |m: &RegionIndcs| [m.nx1 as usize, m.nx2 as usize, m.nx3 as usize];

        let mut mesh = Mesh::uniform(
            [size.x1min, size.x2min, size.x3min],
            [size.x1max, size.x2max, size.x3max],
            cells(&h.mesh_indcs),
            cells(&h.mb_indcs),
            h.mb_indcs.ng as usize)?;

        if mesh.blocks().iter().map(|b| b.lloc).ne(self.locations.iter().copied()) {
            return Err(RestartError::Corrupt("block locations do not match the mesh header".into()))
        }
        mesh.root_level = h.root_level;
        mesh.time = h.time;
        mesh.dt = h.dt;
        mesh.ncycle = h.ncycle;
        mesh.set_costs(&self.costs);
        Ok(mesh)
    }

    /// Load the conserved variables of the blocks a rank owns.
    pub fn restore(&mut self, mesh: &Mesh, rank: usize) -> Result<Physics, RestartError> {
        if rank >= mesh.num_ranks() {
            return Err(RestartError::Mismatch(format!(
                "rank {} is not among the {} ranks the mesh is distributed over", rank, mesh.num_ranks())))
        }
        let gids = mesh.rank_blocks(rank);
        let mut physics = Physics::new(&self.config, &self.header.mb_indcs, gids.len());

        for (m, gid) in gids.enumerate() {
            let record = self.read_block(gid)?;

            for (section, data) in &record.sections {
                let target = match section {
                    Section::Hydro     => physics.hydro.as_mut().map(|h| h.u0.block_mut(m)),
                    Section::Mhd       => physics.mhd.as_mut().map(|h| h.u0.block_mut(m)),
                    Section::MhdX1Face => physics.mhd.as_mut().map(|h| h.b0.x1f.block_mut(m)),
                    Section::MhdX2Face => physics.mhd.as_mut().map(|h| h.b0.x2f.block_mut(m)),
                    Section::MhdX3Face => physics.mhd.as_mut().map(|h| h.b0.x3f.block_mut(m)),
                    Section::Radiation => physics.radiation.as_mut().map(|r| r.i0.block_mut(m)),
                    Section::Forcing   => physics.forcing.as_mut().map(|f| f.force.block_mut(m)),
                };
                if let Some(target) = target {
                    target.copy_from_slice(data)
                }
            }
        }
        if let (Some(forcing), Some(state)) = (physics.forcing.as_mut(), &self.rng_state) {
            forcing.rstate = state.clone()
        }
        Ok(physics)
    }
}

fn read_error(section: &'static str) -> impl Fn(std::io::Error) -> RestartError {
    move |source| RestartError::Read { section: section.to_string(), source }
}

fn read_vec<R: Read>(reader: &mut R, len: usize, section: &str) -> Result<Vec<u8>, RestartError> {
    let mut bytes = vec![0; len];
    reader.read_exact(&mut bytes).map_err(|source| RestartError::Read { section: section.to_string(), source })?;
    Ok(bytes)
}
