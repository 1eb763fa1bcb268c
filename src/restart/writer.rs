use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use crate::mesh::Mesh;
use crate::message::comm::{all_gather_value, Communicator};
use crate::parameters::{ConfigError, ParameterInput};
use crate::physics::{Physics, PhysicsConfig};
use super::file::SharedFile;
use super::layout::{write_schedule, PayloadLayout, RestartLayout, Section, WriteMode};
use super::RestartError;




/// Settings of one restart output stream, read from an `<outputN>` block
/// with `file_type = rst`. The sequence counters are advanced on every dump
/// and written back to the input deck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputParameters {
    pub block_name: String,
    pub file_basename: String,
    pub directory: PathBuf,
    pub dt: f64,
    pub last_time: f64,
    pub file_number: i64,
}




// ============================================================================
impl OutputParameters {

    pub fn from_parameters(pin: &mut ParameterInput, block: &str) -> Result<Self, ConfigError> {
        let file_type = pin.get_string(block, "file_type")?;

        if file_type != "rst" {
            return Err(ConfigError::invalid_value(block, "file_type", format!("'{}' is not a restart output", file_type)))
        }
        let dt = pin.get_or_add_real(block, "dt", 0.0)?;

        if !(dt >= 0.0) {
            return Err(ConfigError::invalid_value(block, "dt", "must not be negative"))
        }
        let file_number = pin.get_or_add_integer(block, "file_number", 0)?;

        if file_number < 0 {
            return Err(ConfigError::invalid_value(block, "file_number", "must not be negative"))
        }

        Ok(Self {
            block_name: block.to_string(),
            file_basename: pin.get_or_add_string("job", "basename", "run"),
            directory: PathBuf::from(pin.get_or_add_string(block, "dir", "rst")),
            dt,
            last_time: pin.get_or_add_real(block, "last_time", -1.0)?,
            file_number,
        })
    }

    /// Return the name of the first `<outputN>` block describing a restart
    /// output, if there is one.
    pub fn find_block(pin: &ParameterInput) -> Option<String> {
        pin.block_names()
            .filter(|name| name.starts_with("output"))
            .find(|name| pin.get_string(name, "file_type").map(|t| t == "rst").unwrap_or(false))
            .map(str::to_string)
    }

    /// The path of the dump with the current file number.
    pub fn file_name(&self) -> PathBuf {
        self.directory.join(format!("{}.{:05}.rst", self.file_basename, self.file_number))
    }

    /// Advance the counters to describe the next dump, and record them in
    /// the input deck.
    pub fn advance(&mut self, time: f64, pin: &mut ParameterInput) {
        self.file_number += 1;

        if self.last_time < 0.0 {
            self.last_time = time
        } else {
            self.last_time += self.dt
        }
        pin.set_integer(&self.block_name, "file_number", self.file_number);
        pin.set_real(&self.block_name, "last_time", self.last_time);
    }
}




/// What one rank did while writing a restart file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub rank: usize,
    pub payload_size: u64,
    pub payload_start: u64,
    pub collective_rounds: usize,
    pub independent_rounds: usize,
    pub bytes_written: u64,
}




/// A restart output stream. Output data is captured by
/// [`RestartOutput::load_output_data`], so the simulation may keep
/// advancing while the captured copy is written.
#[derive(Clone, Debug)]
pub struct RestartOutput {
    params: OutputParameters,
    config: PhysicsConfig,
    snapshot: Option<Physics>,
}




// ============================================================================
impl RestartOutput {

    pub fn new(params: OutputParameters, config: PhysicsConfig) -> Self {
        Self { params, config, snapshot: None }
    }

    pub fn params(&self) -> &OutputParameters {
        &self.params
    }

    /// Capture a deep copy of this rank's conserved variables.
    pub fn load_output_data(&mut self, physics: &Physics) {
        self.snapshot = Some(physics.clone())
    }

    /// Write the captured data to the next file in the output sequence.
    /// Every rank of the communicator must call this; it returns once all
    /// ranks have written and flushed their part of the file.
    pub fn write_output_file<C>(
        &mut self,
        mesh: &Mesh,
        pin: &mut ParameterInput,
        comm: &C) -> Result<WriteReport, RestartError>
    where
        C: Communicator + ?Sized,
    {
        let path = self.params.file_name();
        let directory = &self.params.directory;

        let created = if comm.rank() == 0 {
            fs::create_dir_all(directory)
                .map_err(|source| RestartError::CreateDirectory { path: directory.clone(), source })
                .and_then(|_| fs::File::create(&path).map_err(|source| RestartError::Open { path: path.clone(), source }))
                .map(Some)
        } else {
            Ok(None)
        };
        let file = match agree(comm, created)? {
            Some(file) => Ok(file),
            None => OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|source| RestartError::Open { path: path.clone(), source }),
        };
        let file = agree(comm, file)?;
        self.write_to(&file, mesh, pin, comm)
    }

    /// Write the captured data into an already opened shared file. The
    /// output counters are advanced before the parameter text is rendered,
    /// so the file records the counters of the next dump.
    pub fn write_to<F, C>(
        &mut self,
        file: &F,
        mesh: &Mesh,
        pin: &mut ParameterInput,
        comm: &C) -> Result<WriteReport, RestartError>
    where
        F: SharedFile,
        C: Communicator + ?Sized,
    {
        let rank = comm.rank();
        let path = self.params.file_name();

        if mesh.num_ranks() != comm.size() {
            return Err(RestartError::Mismatch(format!(
                "mesh is distributed over {} ranks, communicator has {}", mesh.num_ranks(), comm.size())))
        }
        self.params.advance(mesh.time, pin);

        let text = pin.dump();
        let layout = RestartLayout {
            parameters_len: text.len() as u64,
            nmb_total: mesh.num_blocks() as u64,
            has_rng_state: self.config.forcing.is_some(),
            payload: PayloadLayout::new(&self.config, &mesh.mb_indcs),
        };
        let mut report = WriteReport {
            path,
            rank,
            payload_size: layout.payload.block_bytes(),
            payload_start: layout.payload_start(),
            collective_rounds: 0,
            independent_rounds: 0,
            bytes_written: 0,
        };

        let sizes = all_gather_value(comm, &report.payload_size)?;

        if sizes.iter().any(|&s| s != report.payload_size) {
            return Err(RestartError::Mismatch(format!("ranks disagree on the payload size: {:?}", sizes)))
        }
        let snapshot = self.snapshot.as_ref();
        agree(comm, check_snapshot(snapshot, &layout, mesh.nmb_eachrank()[rank]))?;

        let snapshot = snapshot.ok_or(RestartError::NoData)?;

        if rank == 0 {
            let result = encode_header(&text, mesh, snapshot, &layout).and_then(|header| {
                let mut offset = 0;

                for (section, bytes) in &header {
                    write_exact(file, section, bytes, offset)?;
                    offset += bytes.len() as u64;
                    report.bytes_written += bytes.len() as u64;
                }
                Ok(())
            });
            agree(comm, result)?;
        } else {
            agree(comm, Ok(()))?;
        }

        let gid0 = mesh.gids_eachrank()[rank];
        let mut deferred = Ok(());

        for (m, mode) in write_schedule(mesh.nmb_eachrank(), rank).into_iter().enumerate() {
            let mut offset = layout.block_offset(gid0 + m);
            let mut result = Ok(());

            for &(section, _) in layout.payload.sections() {
                let bytes = encode_reals(section_data(snapshot, section, m).unwrap_or(&[]));
                result = write_exact(file, &section.to_string(), &bytes, offset);
                if result.is_err() {
                    break
                }
                offset += bytes.len() as u64;
                report.bytes_written += bytes.len() as u64;
            }
            match mode {
                WriteMode::Collective => {
                    agree(comm, result)?;
                    report.collective_rounds += 1;
                }
                WriteMode::Independent => {
                    report.independent_rounds += 1;
                    if result.is_err() {
                        deferred = result;
                        break
                    }
                }
            }
        }

        let flushed = deferred.and_then(|_| file.sync().map_err(|source| RestartError::Write {
            section: "file flush".into(),
            source,
        }));
        agree(comm, flushed)?;

        debug!("rank {} wrote {} collective and {} independent block records",
            rank, report.collective_rounds, report.independent_rounds);

        if rank == 0 {
            info!("wrote restart file {} ({} blocks, {} bytes)",
                report.path.display(), mesh.num_blocks(), layout.file_bytes());
        }
        Ok(report)
    }
}




/// Combine the outcome of a step on every rank. Each rank returns its own
/// error if it failed, or otherwise reports the first failed peer.
fn agree<T, C>(comm: &C, local: Result<T, RestartError>) -> Result<T, RestartError>
where
    C: Communicator + ?Sized,
{
    let failed = all_gather_value(comm, &local.is_err())?;
    let value = local?;

    match failed.iter().position(|&f| f) {
        Some(rank) => Err(RestartError::PeerFailed { rank }),
        None => Ok(value),
    }
}

fn write_exact<F: SharedFile>(file: &F, section: &str, bytes: &[u8], offset: u64) -> Result<(), RestartError> {
    let written = file.write_at(bytes, offset).map_err(|source| RestartError::Write {
        section: section.to_string(),
        source,
    })?;

    if written != bytes.len() {
        return Err(RestartError::ShortWrite {
            section: section.to_string(),
            requested: bytes.len(),
            written,
        })
    }
    Ok(())
}

fn encode_reals(data: &[f64]) -> Vec<u8> {
    data.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn section_data(physics: &Physics, section: Section, m: usize) -> Option<&[f64]> {
    match section {
        Section::Hydro     => physics.hydro.as_ref().map(|h| h.u0.block(m)),
        Section::Mhd       => physics.mhd.as_ref().map(|h| h.u0.block(m)),
        Section::MhdX1Face => physics.mhd.as_ref().map(|h| h.b0.x1f.block(m)),
        Section::MhdX2Face => physics.mhd.as_ref().map(|h| h.b0.x2f.block(m)),
        Section::MhdX3Face => physics.mhd.as_ref().map(|h| h.b0.x3f.block(m)),
        Section::Radiation => physics.radiation.as_ref().map(|r| r.i0.block(m)),
        Section::Forcing   => physics.forcing.as_ref().map(|f| f.force.block(m)),
    }
}

fn check_snapshot(snapshot: Option<&Physics>, layout: &RestartLayout, nmb: usize) -> Result<(), RestartError> {
    let physics = snapshot.ok_or(RestartError::NoData)?;
    let payload = &layout.payload;

    if layout.has_rng_state && physics.forcing.is_none() {
        return Err(missing_rng_state())
    }

    if nmb > 0 && physics.num_blocks() < nmb {
        return Err(RestartError::Mismatch(format!(
            "output data holds {} blocks, rank owns {}", physics.num_blocks(), nmb)))
    }
    for &(section, len) in payload.sections() {
        for m in 0..nmb {
            match section_data(physics, section, m) {
                Some(data) if data.len() == len => {}
                Some(data) => return Err(RestartError::Mismatch(format!(
                    "{} of block {} has {} values, expected {}", section, m, data.len(), len))),
                None => return Err(RestartError::Mismatch(format!("{} are not loaded", section))),
            }
        }
    }
    Ok(())
}

fn missing_rng_state() -> RestartError {
    RestartError::Mismatch("turbulence driving is active but the output data has no random number generator state".into())
}

fn encode_header(text: &str, mesh: &Mesh, physics: &Physics, layout: &RestartLayout) -> Result<Vec<(String, Vec<u8>)>, RestartError> {
    let mut sections = Vec::new();
    sections.push(("parameter text".to_string(), text.as_bytes().to_vec()));

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(mesh.num_blocks() as i32).to_le_bytes());
    bytes.extend_from_slice(&mesh.root_level.to_le_bytes());
    mesh.mesh_size.encode_into(&mut bytes);
    mesh.mesh_indcs.encode_into(&mut bytes);
    mesh.mb_indcs.encode_into(&mut bytes);
    bytes.extend_from_slice(&mesh.time.to_le_bytes());
    bytes.extend_from_slice(&mesh.dt.to_le_bytes());
    bytes.extend_from_slice(&mesh.ncycle.to_le_bytes());
    sections.push(("mesh header".to_string(), bytes));

    let mut bytes = Vec::new();
    for block in mesh.blocks() {
        block.lloc.encode_into(&mut bytes)
    }
    sections.push(("logical locations".to_string(), bytes));

    let mut bytes = Vec::new();
    for block in mesh.blocks() {
        bytes.extend_from_slice(&block.cost.to_le_bytes())
    }
    sections.push(("block costs".to_string(), bytes));
    sections.push(("payload size".to_string(), layout.payload.block_bytes().to_le_bytes().to_vec()));

    if layout.has_rng_state {
        let forcing = physics.forcing.as_ref().ok_or_else(missing_rng_state)?;
        let mut bytes = Vec::new();
        forcing.rstate.encode_into(&mut bytes);
        sections.push(("random number generator state".to_string(), bytes));
    }
    Ok(sections)
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::path::PathBuf;
    use super::{OutputParameters, RestartOutput};
    use crate::mesh::Mesh;
    use crate::message::SingleRank;
    use crate::parameters::ParameterInput;
    use crate::physics::{Physics, PhysicsConfig};
    use crate::restart::file::MemoryFile;
    use crate::restart::RestartError;

    fn deck() -> ParameterInput {
        ParameterInput::parse("<job>\nbasename = blast\n<hydro>\n<output3>\nfile_type = rst\ndt = 0.25\ndir = chk\n").unwrap()
    }

    #[test]
    fn file_names_are_zero_padded() {
        let mut pin = deck();
        let params = OutputParameters::from_parameters(&mut pin, "output3").unwrap();
        assert_eq!(params.file_name(), PathBuf::from("chk/blast.00000.rst"));
        assert_eq!(OutputParameters::find_block(&pin).as_deref(), Some("output3"));
    }

    #[test]
    fn counters_advance_before_the_dump() {
        let mut pin = deck();
        let mut params = OutputParameters::from_parameters(&mut pin, "output3").unwrap();
        params.advance(1.5, &mut pin);
        assert_eq!(params.file_number, 1);
        assert_eq!(params.last_time, 1.5);
        params.advance(2.0, &mut pin);
        assert_eq!(params.last_time, 1.75);
        assert_eq!(pin.get_integer("output3", "file_number").unwrap(), 2);
        assert_eq!(pin.get_real("output3", "last_time").unwrap(), 1.75);
    }

    #[test]
    fn short_write_is_reported_with_its_section() {
        let mut pin = deck();
        let mesh = Mesh::uniform([0.0; 3], [1.0; 3], [8, 8, 8], [4, 4, 4], 2).unwrap();
        let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
        let params = OutputParameters::from_parameters(&mut pin, "output3").unwrap();
        let mut output = RestartOutput::new(params, config);
        output.load_output_data(&Physics::new(&config, &mesh.mb_indcs, mesh.num_blocks()));

        let file = MemoryFile::with_capacity_limit(4096);
        match output.write_to(&file, &mesh, &mut pin, &SingleRank::new()) {
            Err(RestartError::ShortWrite { section, written, requested }) => {
                assert_eq!(section, "hydro variables");
                assert!(written < requested);
            }
            other => panic!("expected a short write, got {:?}", other.map(|r| r.bytes_written)),
        }
    }

    #[test]
    fn forcing_without_random_state_is_rejected() {
        let mut pin = ParameterInput::parse(
            "<job>\nbasename = stir\n<hydro>\n<turb_driving>\n<output1>\nfile_type = rst\ndir = chk\n").unwrap();
        let mesh = Mesh::uniform([0.0; 3], [1.0; 3], [8, 8, 8], [4, 4, 4], 2).unwrap();
        let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
        let params = OutputParameters::from_parameters(&mut pin, "output1").unwrap();
        let unforced = PhysicsConfig { forcing: None, ..config };

        let mut output = RestartOutput::new(params, config);
        output.load_output_data(&Physics::new(&unforced, &mesh.mb_indcs, mesh.num_blocks()));

        let file = MemoryFile::new();
        match output.write_to(&file, &mesh, &mut pin, &SingleRank::new()) {
            Err(RestartError::Mismatch(message)) => assert!(message.contains("random number generator")),
            other => panic!("expected a mismatch, got {:?}", other.map(|r| r.bytes_written)),
        }
        assert!(file.contents().is_empty());
    }

    #[test]
    fn writing_without_data_fails() {
        let mut pin = deck();
        let mesh = Mesh::uniform([0.0; 3], [1.0; 3], [8, 8, 8], [4, 4, 4], 2).unwrap();
        let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
        let params = OutputParameters::from_parameters(&mut pin, "output3").unwrap();
        let mut output = RestartOutput::new(params, config);
        let file = MemoryFile::new();
        assert!(matches!(
            output.write_to(&file, &mesh, &mut pin, &SingleRank::new()),
            Err(RestartError::NoData)));
    }
}
