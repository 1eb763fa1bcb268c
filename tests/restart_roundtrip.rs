use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use meridian::mesh::Mesh;
use meridian::message::{ChannelCommunicator, Communicator, SingleRank};
use meridian::parameters::ParameterInput;
use meridian::physics::{Physics, PhysicsConfig};
use meridian::restart::{OutputParameters, RestartError, RestartOutput, RestartReader, Section, WriteReport};




fn deck(dir: &Path, modules: &str) -> ParameterInput {
    let text = format!(
        "<job>\nbasename = roundtrip\n{}<output2>\nfile_type = rst\ndt = 0.5\ndir = {}\n",
        modules,
        dir.display());
    ParameterInput::parse(&text).unwrap()
}

/// Values that identify the block, the array and the position within it.
fn synthetic(config: &PhysicsConfig, mesh: &Mesh, rank: usize) -> Physics {
    let gid0 = mesh.gids_eachrank()[rank];
    let mut physics = Physics::new(config, &mesh.mb_indcs, mesh.nmb_eachrank()[rank]);

    for (a, array) in physics.arrays_mut().into_iter().enumerate() {
        for m in 0..array.num_blocks() {
            for (n, x) in array.block_mut(m).iter_mut().enumerate() {
                *x = (gid0 + m) as f64 * 1000.0 + a as f64 * 100.0 + n as f64 * 1e-3
            }
        }
    }
    if let Some(forcing) = &mut physics.forcing {
        for _ in 0..5 {
            forcing.rstate.gaussian();
        }
    }
    physics
}

fn write_with_ranks(mesh: &Mesh, pin: &ParameterInput, config: PhysicsConfig) -> Vec<WriteReport> {
    let params = OutputParameters::from_parameters(&mut pin.clone(), "output2").unwrap();

    thread::scope(|scope| {
        let handles: Vec<_> = ChannelCommunicator::group(mesh.num_ranks())
            .into_iter()
            .map(|comm| {
                let mut pin = pin.clone();
                let params = params.clone();

                scope.spawn(move || {
                    let mut output = RestartOutput::new(params, config);
                    output.load_output_data(&synthetic(&config, mesh, comm.rank()));
                    output.write_output_file(mesh, &mut pin, &comm)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    })
}




#[test]
fn uneven_ranks_write_a_file_that_reads_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let mut pin = deck(dir.path(), "<hydro>\nnscalars = 1\n<mhd>\n<turb_driving>\nrseed = 7\n");
    let config = PhysicsConfig::from_parameters(&mut pin).unwrap();

    let mut mesh = Mesh::uniform([0.0; 3], [11.0, 1.0, 1.0], [44, 4, 4], [4, 4, 4], 2).unwrap();
    mesh.distribute(&[3, 3, 5]).unwrap();
    mesh.time = 1.25;
    mesh.dt = 0.01;
    mesh.ncycle = 125;
    mesh.set_costs(&(0..11).map(|g| 1.0 + g as f32).collect::<Vec<_>>());

    let reports = write_with_ranks(&mesh, &pin, config);

    assert!(reports.iter().all(|r| r.payload_size == reports[0].payload_size));
    assert_eq!(reports.iter().map(|r| r.collective_rounds).collect::<Vec<_>>(), vec![3, 3, 3]);
    assert_eq!(reports.iter().map(|r| r.independent_rounds).collect::<Vec<_>>(), vec![0, 0, 2]);

    let path = dir.path().join("roundtrip.00000.rst");
    assert_eq!(reports[0].path, path);

    let mut reader = RestartReader::open(&path).unwrap();
    let layout = reader.layout().clone();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), layout.file_bytes());
    assert_eq!(layout.payload.block_bytes(), reports[0].payload_size);
    assert_eq!(layout.payload_start(), reports[0].payload_start);

    for gid in 0..11 {
        assert_eq!(layout.block_offset(gid + 1) - layout.block_offset(gid), layout.payload.block_bytes());
    }

    assert_eq!(reader.header.nmb_total, 11);
    assert_eq!(reader.header.root_level, 4);
    assert_eq!(reader.header.time, 1.25);
    assert_eq!(reader.header.dt, 0.01);
    assert_eq!(reader.header.ncycle, 125);
    assert_eq!(reader.header.mb_indcs, mesh.mb_indcs);
    assert_eq!(reader.costs[10], 11.0);
    assert_eq!(reader.config, config);

    // The counters in the file describe the next dump.
    assert_eq!(reader.parameters.get_integer("output2", "file_number").unwrap(), 1);
    assert_eq!(reader.parameters.get_real("output2", "last_time").unwrap(), 1.25);

    let rank0 = synthetic(&config, &mesh, 0);
    assert_eq!(reader.rng_state.as_ref(), Some(&rank0.forcing.as_ref().unwrap().rstate));

    // gid 7 is the second block of rank 2.
    let rank2 = synthetic(&config, &mesh, 2);
    let record = reader.read_block(7).unwrap();
    assert_eq!(record.get(Section::Hydro).unwrap(), rank2.hydro.as_ref().unwrap().u0.block(1));
    assert_eq!(record.get(Section::MhdX3Face).unwrap(), rank2.mhd.as_ref().unwrap().b0.x3f.block(1));
    assert_eq!(record.get(Section::Forcing).unwrap(), rank2.forcing.as_ref().unwrap().force.block(1));
    assert_eq!(record.get(Section::MhdX3Face).unwrap()[0], 7400.0);
    assert!(record.get(Section::Radiation).is_none());

    let mut restored = reader.mesh().unwrap();
    assert_eq!(restored.blocks().len(), 11);
    assert_eq!(restored.time, 1.25);
    restored.distribute(&[3, 3, 5]).unwrap();

    for rank in 0..3 {
        assert_eq!(reader.restore(&restored, rank).unwrap(), synthetic(&config, &mesh, rank));
    }
}




#[test]
fn consecutive_dumps_advance_the_file_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let mut pin = deck(dir.path(), "<hydro>\n");
    let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
    let mesh = Mesh::uniform([0.0; 3], [1.0; 3], [8, 8, 8], [4, 4, 4], 2).unwrap();
    let params = OutputParameters::from_parameters(&mut pin, "output2").unwrap();
    let comm = SingleRank::new();

    let mut output = RestartOutput::new(params, config);
    output.load_output_data(&synthetic(&config, &mesh, 0));
    output.write_output_file(&mesh, &mut pin, &comm).unwrap();
    output.write_output_file(&mesh, &mut pin, &comm).unwrap();

    let first = RestartReader::open(dir.path().join("roundtrip.00000.rst")).unwrap();
    let second = RestartReader::open(dir.path().join("roundtrip.00001.rst")).unwrap();

    assert_eq!(first.parameters.get_integer("output2", "file_number").unwrap(), 1);
    assert_eq!(second.parameters.get_integer("output2", "file_number").unwrap(), 2);
    assert_eq!(second.parameters.get_real("output2", "last_time").unwrap(), 0.5);
    assert!(first.rng_state.is_none());
    assert_eq!(first.layout().payload.sections().len(), 1);
}




#[test]
fn block_counts_larger_than_the_file_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut pin = deck(dir.path(), "<hydro>\n");
    let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
    let mesh = Mesh::uniform([0.0; 3], [1.0; 3], [8, 8, 8], [4, 4, 4], 2).unwrap();
    let params = OutputParameters::from_parameters(&mut pin, "output2").unwrap();

    let mut output = RestartOutput::new(params, config);
    output.load_output_data(&synthetic(&config, &mesh, 0));
    output.write_output_file(&mesh, &mut pin, &SingleRank::new()).unwrap();

    let path = dir.path().join("roundtrip.00000.rst");
    let parameters_len = RestartReader::open(&path).unwrap().layout().parameters_len;

    let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(parameters_len)).unwrap();
    file.write_all(&i32::MAX.to_le_bytes()).unwrap();
    drop(file);

    match RestartReader::open(&path) {
        Err(RestartError::Corrupt(message)) => assert!(message.contains("do not fit")),
        other => panic!("expected a corrupt file, got {:?}", other.map(|r| r.header)),
    }
}

#[test]
fn restoring_a_rank_outside_the_mesh_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut pin = deck(dir.path(), "<hydro>\n");
    let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
    let mut mesh = Mesh::uniform([0.0; 3], [1.0; 3], [8, 8, 8], [4, 4, 4], 2).unwrap();
    mesh.distribute(&[4, 4]).unwrap();

    write_with_ranks(&mesh, &pin, config);

    let mut reader = RestartReader::open(dir.path().join("roundtrip.00000.rst")).unwrap();
    let mut restored = reader.mesh().unwrap();
    restored.distribute(&[4, 4]).unwrap();

    assert!(reader.restore(&restored, 1).is_ok());
    assert!(matches!(reader.restore(&restored, 2), Err(RestartError::Mismatch(_))));
}
