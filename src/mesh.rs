//! Mesh geometry, block decomposition and the assignment of blocks to ranks.
//!
//! The mesh is a uniform Cartesian grid, split into equally sized blocks at a
//! single (root) refinement level. Blocks are numbered lexicographically
//! with the `x1` logical index increasing fastest, and are handed to ranks
//! in contiguous runs of global ids: rank `r` owns the gids
//! `gids_eachrank[r] .. gids_eachrank[r] + nmb_eachrank[r]`.

use std::ops::Range;
use serde::{Deserialize, Serialize};
use crate::index_space::{Axis, IndexSpace};
use crate::parameters::{ConfigError, ParameterInput};




/// Physical extent and cell spacing of a region (the whole mesh or a single
/// block).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionSize {
    pub x1min: f64,
    pub x2min: f64,
    pub x3min: f64,
    pub x1max: f64,
    pub x2max: f64,
    pub x3max: f64,
    pub dx1: f64,
    pub dx2: f64,
    pub dx3: f64,
}




/// Cell counts and the inclusive active index ranges of a region. For a
/// collapsed dimension (`nx == 1`) the active range is `0..=0` and there
/// are no ghost cells along it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionIndcs {
    pub ng: i32,
    pub nx1: i32,
    pub nx2: i32,
    pub nx3: i32,
    pub is: i32,
    pub ie: i32,
    pub js: i32,
    pub je: i32,
    pub ks: i32,
    pub ke: i32,
}




/// Position of a block in the tree of logical locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalLocation {
    pub lx1: i32,
    pub lx2: i32,
    pub lx3: i32,
    pub level: i32,
}




/// A single mesh block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshBlock {
    pub gid: usize,
    pub lloc: LogicalLocation,
    pub size: RegionSize,
    pub cost: f32,
    pub rank: usize,
}




fn take<const N: usize>(bytes: &[u8], offset: &mut usize) -> [u8; N] {
    let mut b = [0; N];
    b.copy_from_slice(&bytes[*offset..*offset + N]);
    *offset += N;
    b
}

fn take_f64(bytes: &[u8], offset: &mut usize) -> f64 {
    f64::from_le_bytes(take(bytes, offset))
}

fn take_i32(bytes: &[u8], offset: &mut usize) -> i32 {
    i32::from_le_bytes(take(bytes, offset))
}




// ============================================================================
impl RegionSize {

    pub const ENCODED_LEN: usize = 9 * 8;

    pub fn min(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.x1min,
            Axis::J => self.x2min,
            Axis::K => self.x3min,
        }
    }

    pub fn max(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.x1max,
            Axis::J => self.x2max,
            Axis::K => self.x3max,
        }
    }

    pub fn dx(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.dx1,
            Axis::J => self.dx2,
            Axis::K => self.dx3,
        }
    }

    pub fn encode_into(&self, bytes: &mut Vec<u8>) {
        for x in &[self.x1min, self.x2min, self.x3min,
                   self.x1max, self.x2max, self.x3max,
                   self.dx1, self.dx2, self.dx3] {
            bytes.extend_from_slice(&x.to_le_bytes())
        }
    }

    /// Decode from the first [`RegionSize::ENCODED_LEN`] bytes of a slice.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut n = 0;
        Self {
            x1min: take_f64(bytes, &mut n),
            x2min: take_f64(bytes, &mut n),
            x3min: take_f64(bytes, &mut n),
            x1max: take_f64(bytes, &mut n),
            x2max: take_f64(bytes, &mut n),
            x3max: take_f64(bytes, &mut n),
            dx1: take_f64(bytes, &mut n),
            dx2: take_f64(bytes, &mut n),
            dx3: take_f64(bytes, &mut n),
        }
    }
}




// ============================================================================
impl RegionIndcs {

    pub const ENCODED_LEN: usize = 10 * 4;

    /// Index ranges for a region of the given cell counts and ghost depth.
    pub fn new(ng: i32, nx1: i32, nx2: i32, nx3: i32) -> Self {
        let active = |nx: i32| if nx > 1 { (ng, ng + nx - 1) } else { (0, 0) };
        let (is, ie) = (ng, ng + nx1 - 1);
        let (js, je) = active(nx2);
        let (ks, ke) = active(nx3);
        Self { ng, nx1, nx2, nx3, is, ie, js, je, ks, ke }
    }

    pub fn nx(&self, axis: Axis) -> i32 {
        match axis {
            Axis::I => self.nx1,
            Axis::J => self.nx2,
            Axis::K => self.nx3,
        }
    }

    /// Number of stored cells along each axis, ghosts included.
    pub fn padded_shape(&self) -> (usize, usize, usize) {
        let padded = |nx: i32, always: bool| if always || nx > 1 {
            (nx + 2 * self.ng) as usize
        } else {
            1
        };
        (padded(self.nx1, true), padded(self.nx2, false), padded(self.nx3, false))
    }

    /// Index space of all stored cells.
    pub fn padded(&self) -> IndexSpace {
        let (n1, n2, n3) = self.padded_shape();
        IndexSpace::new(0..n1 as i64, 0..n2 as i64, 0..n3 as i64)
    }

    /// Index space of the active (non-ghost) cells.
    pub fn interior(&self) -> IndexSpace {
        IndexSpace::new(
            self.is as i64..self.ie as i64 + 1,
            self.js as i64..self.je as i64 + 1,
            self.ks as i64..self.ke as i64 + 1)
    }

    pub fn num_cells(&self) -> usize {
        self.padded().len()
    }

    pub fn encode_into(&self, bytes: &mut Vec<u8>) {
        for x in &[self.ng, self.nx1, self.nx2, self.nx3,
                   self.is, self.ie, self.js, self.je, self.ks, self.ke] {
            bytes.extend_from_slice(&x.to_le_bytes())
        }
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let mut n = 0;
        Self {
            ng: take_i32(bytes, &mut n),
            nx1: take_i32(bytes, &mut n),
            nx2: take_i32(bytes, &mut n),
            nx3: take_i32(bytes, &mut n),
            is: take_i32(bytes, &mut n),
            ie: take_i32(bytes, &mut n),
            js: take_i32(bytes, &mut n),
            je: take_i32(bytes, &mut n),
            ks: take_i32(bytes, &mut n),
            ke: take_i32(bytes, &mut n),
        }
    }
}




// ============================================================================
impl LogicalLocation {

    pub const ENCODED_LEN: usize = 4 * 4;

    pub fn encode_into(&self, bytes: &mut Vec<u8>) {
        for x in &[self.lx1, self.lx2, self.lx3, self.level] {
            bytes.extend_from_slice(&x.to_le_bytes())
        }
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let mut n = 0;
        Self {
            lx1: take_i32(bytes, &mut n),
            lx2: take_i32(bytes, &mut n),
            lx3: take_i32(bytes, &mut n),
            level: take_i32(bytes, &mut n),
        }
    }
}




/// A uniform block-decomposed mesh, together with the current simulation
/// clock and the distribution of its blocks over ranks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mesh {
    pub mesh_size: RegionSize,
    pub mesh_indcs: RegionIndcs,
    pub mb_indcs: RegionIndcs,
    pub root_level: i32,
    pub time: f64,
    pub dt: f64,
    pub ncycle: i32,
    nrbx: [usize; 3],
    blocks: Vec<MeshBlock>,
    nmb_eachrank: Vec<usize>,
    gids_eachrank: Vec<usize>,
}




// ============================================================================
impl Mesh {

    /// Build a uniform mesh covering `[lower, upper]` with `cells` cells per
    /// axis, split into blocks of `block_cells` cells per axis, with `ghost`
    /// ghost cells on each active axis. All blocks are initially owned by
    /// rank 0.
    pub fn uniform(
        lower: [f64; 3],
        upper: [f64; 3],
        cells: [usize; 3],
        block_cells: [usize; 3],
        ghost: usize) -> Result<Self, ConfigError>
    {
        let mut nrbx = [0; 3];
        let mut dx = [0.0; 3];

        for a in 0..3 {
            let key = ["nx1", "nx2", "nx3"][a];

            if cells[a] == 0 || block_cells[a] == 0 {
                return Err(ConfigError::invalid_value("mesh", key, "cell counts must be positive"))
            }
            if cells[a] % block_cells[a] != 0 {
                return Err(ConfigError::invalid_value("meshblock", key, format!(
                    "{} mesh cells are not divisible into blocks of {}", cells[a], block_cells[a])))
            }
            if !(upper[a] > lower[a]) {
                return Err(ConfigError::invalid_value("mesh", key, "domain has non-positive extent"))
            }
            nrbx[a] = cells[a] / block_cells[a];
            dx[a] = (upper[a] - lower[a]) / cells[a] as f64;
        }
        if cells[1] == 1 && cells[2] > 1 {
            return Err(ConfigError::Conflict("a 3D mesh requires nx2 > 1".into()))
        }
        if ghost < 1 {
            return Err(ConfigError::invalid_value("mesh", "nghost", "at least one ghost cell is required"))
        }

        let mesh_size = RegionSize {
            x1min: lower[0], x2min: lower[1], x3min: lower[2],
            x1max: upper[0], x2max: upper[1], x3max: upper[2],
            dx1: dx[0], dx2: dx[1], dx3: dx[2],
        };
        let g = ghost as i32;
        let mesh_indcs = RegionIndcs::new(g, cells[0] as i32, cells[1] as i32, cells[2] as i32);
        let mb_indcs = RegionIndcs::new(g, block_cells[0] as i32, block_cells[1] as i32, block_cells[2] as i32);

        let root_level = nrbx.iter().map(|n| n.next_power_of_two().trailing_zeros() as i32).max().unwrap_or(0);
        let mut blocks = Vec::with_capacity(nrbx[0] * nrbx[1] * nrbx[2]);

        for lx3 in 0..nrbx[2] {
            for lx2 in 0..nrbx[1] {
                for lx1 in 0..nrbx[0] {
                    let l = [lx1, lx2, lx3];
                    let edge = |a: usize, n: usize| lower[a] + (l[a] + n) as f64 * block_cells[a] as f64 * dx[a];
                    let size = RegionSize {
                        x1min: edge(0, 0), x2min: edge(1, 0), x3min: edge(2, 0),
                        x1max: edge(0, 1), x2max: edge(1, 1), x3max: edge(2, 1),
                        dx1: dx[0], dx2: dx[1], dx3: dx[2],
                    };
                    blocks.push(MeshBlock {
                        gid: blocks.len(),
                        lloc: LogicalLocation { lx1: lx1 as i32, lx2: lx2 as i32, lx3: lx3 as i32, level: root_level },
                        size,
                        cost: 1.0,
                        rank: 0,
                    })
                }
            }
        }
        let nmb = blocks.len();

        Ok(Self {
            mesh_size,
            mesh_indcs,
            mb_indcs,
            root_level,
            time: 0.0,
            dt: 0.0,
            ncycle: 0,
            nrbx,
            blocks,
            nmb_eachrank: vec![nmb],
            gids_eachrank: vec![0],
        })
    }

    /// Build a mesh from the `<mesh>` and `<meshblock>` blocks of the input
    /// deck. Block cell counts default to the whole mesh.
    pub fn from_parameters(pin: &mut ParameterInput) -> Result<Self, ConfigError> {
        let mut lower = [0.0; 3];
        let mut upper = [0.0; 3];
        let mut cells = [1; 3];
        let mut block_cells = [1; 3];

        for a in 0..3 {
            let nx = format!("nx{}", a + 1);
            let n = pin.get_or_add_integer("mesh", &nx, 1)?;

            if n < 1 {
                return Err(ConfigError::invalid_value("mesh", &nx, "must be at least 1"))
            }
            cells[a] = n as usize;
            lower[a] = pin.get_or_add_real("mesh", &format!("x{}min", a + 1), -0.5)?;
            upper[a] = pin.get_or_add_real("mesh", &format!("x{}max", a + 1), 0.5)?;

            let m = pin.get_or_add_integer("meshblock", &nx, n)?;

            if m < 1 {
                return Err(ConfigError::invalid_value("meshblock", &nx, "must be at least 1"))
            }
            block_cells[a] = m as usize;
        }
        let ghost = pin.get_or_add_integer("mesh", "nghost", 2)?;

        if ghost < 1 {
            return Err(ConfigError::invalid_value("mesh", "nghost", "must be at least 1"))
        }
        Self::uniform(lower, upper, cells, block_cells, ghost as usize)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_ranks(&self) -> usize {
        self.nmb_eachrank.len()
    }

    pub fn blocks(&self) -> &[MeshBlock] {
        &self.blocks
    }

    pub fn block(&self, gid: usize) -> &MeshBlock {
        &self.blocks[gid]
    }

    /// Number of blocks along each axis.
    pub fn blocks_per_axis(&self) -> [usize; 3] {
        self.nrbx
    }

    pub fn nmb_eachrank(&self) -> &[usize] {
        &self.nmb_eachrank
    }

    pub fn gids_eachrank(&self) -> &[usize] {
        &self.gids_eachrank
    }

    /// The global ids owned by a rank.
    pub fn rank_blocks(&self, rank: usize) -> Range<usize> {
        let start = self.gids_eachrank[rank];
        start..start + self.nmb_eachrank[rank]
    }

    pub fn nmb_maxperrank(&self) -> usize {
        self.nmb_eachrank.iter().copied().max().unwrap_or(0)
    }

    /// Replace the per-block cost estimates. Extra values are ignored.
    pub fn set_costs(&mut self, costs: &[f32]) {
        for (block, &cost) in self.blocks.iter_mut().zip(costs) {
            block.cost = cost
        }
    }

    /// Assign contiguous runs of blocks to ranks with the given counts. The
    /// counts must sum to the number of blocks; ranks with no blocks are
    /// permitted.
    pub fn distribute(&mut self, counts: &[usize]) -> Result<(), ConfigError> {
        let total: usize = counts.iter().sum();

        if counts.is_empty() || total != self.blocks.len() {
            return Err(ConfigError::Conflict(format!(
                "block counts {:?} do not cover the {} mesh blocks", counts, self.blocks.len())))
        }
        let mut gids = Vec::with_capacity(counts.len());
        let mut start = 0;

        for (rank, &count) in counts.iter().enumerate() {
            gids.push(start);
            for block in &mut self.blocks[start..start + count] {
                block.rank = rank
            }
            start += count;
        }
        self.nmb_eachrank = counts.to_vec();
        self.gids_eachrank = gids;
        Ok(())
    }

    /// Distribute the blocks as evenly as possible over the given number of
    /// ranks. Lower ranks receive the remainder.
    pub fn balance(&mut self, num_ranks: usize) -> Result<(), ConfigError> {
        if num_ranks == 0 {
            return Err(ConfigError::invalid_value("parallel", "ranks", "must be at least 1"))
        }
        let n = self.blocks.len();
        let counts: Vec<_> = (0..num_ranks)
            .map(|r| n / num_ranks + if r < n % num_ranks { 1 } else { 0 })
            .collect();
        self.distribute(&counts)
    }

    /// Return the global id of the block holding the given global cell index
    /// (0-based over the active cells of the mesh), and the padded local
    /// index of that cell within the block.
    pub fn locate_cell(&self, index: [usize; 3]) -> Option<(usize, (i64, i64, i64))> {
        let shape = [self.mb_indcs.nx1, self.mb_indcs.nx2, self.mb_indcs.nx3];
        let start = [self.mb_indcs.is, self.mb_indcs.js, self.mb_indcs.ks];
        let mut b = [0; 3];
        let mut local = [0; 3];

        for a in 0..3 {
            let n = shape[a] as usize;
            b[a] = index[a] / n;

            if b[a] >= self.nrbx[a] {
                return None
            }
            local[a] = (index[a] % n) as i64 + start[a] as i64;
        }
        let gid = (b[2] * self.nrbx[1] + b[1]) * self.nrbx[0] + b[0];
        Some((gid, (local[0], local[1], local[2])))
    }

    /// Return the coordinate of a cell center, for a padded local index
    /// (ghost cells included) in the given block.
    pub fn cell_center(&self, gid: usize, index: (i64, i64, i64)) -> [f64; 3] {
        let size = &self.blocks[gid].size;
        let m = &self.mb_indcs;
        let x = |a: Axis, i: i64, s: i32| size.min(a) + ((i - s as i64) as f64 + 0.5) * size.dx(a);
        [x(Axis::I, index.0, m.is), x(Axis::J, index.1, m.js), x(Axis::K, index.2, m.ks)]
    }
}
