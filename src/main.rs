use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info, LevelFilter};
use simple_logger::SimpleLogger;
use meridian::horizon::{metric_derivative, AdmFields, HorizonFinder, HorizonParameters, OnePuncture};
use meridian::mesh::Mesh;
use meridian::message::{ChannelCommunicator, Communicator};
use meridian::parameters::ParameterInput;
use meridian::physics::{Physics, PhysicsConfig};
use meridian::restart::{OutputParameters, RestartOutput, RestartReader};
use meridian::sphere::MeshField;




#[derive(Debug, Parser)]
#[clap(version, about = "Restart dumps and horizon searches on a block-structured mesh")]
struct Opts {
    /// One of off, error, warn, info, debug, trace
    #[clap(long, default_value = "info")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}




#[derive(Debug, Subcommand)]
enum Command {
    /// Write one restart dump of synthetic data with simulated ranks
    Dump {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short = 'n', long, default_value = "1")]
        ranks: usize,

        /// Parameter overrides of the form block/key=value
        #[clap(short = 's', long = "set")]
        overrides: Vec<String>,
    },

    /// Print the header and layout of a restart file
    Inspect {
        file: PathBuf,
    },

    /// Find the apparent horizon of one-puncture initial data
    Horizon {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short = 's', long = "set")]
        overrides: Vec<String>,

        #[clap(short, long, default_value = "horizon.cbor")]
        output: PathBuf,
    },
}




fn load_deck(input: &Path, overrides: &[String]) -> Result<ParameterInput> {
    let mut pin = ParameterInput::load(input)
        .with_context(|| format!("loading input deck {}", input.display()))?;

    for spec in overrides {
        pin.apply_override(spec)?;
    }
    Ok(pin)
}

fn fill_synthetic(physics: &mut Physics, gid0: usize) {
    for (a, array) in physics.arrays_mut().into_iter().enumerate() {
        for m in 0..array.num_blocks() {
            for (n, x) in array.block_mut(m).iter_mut().enumerate() {
                *x = (gid0 + m) as f64 + 0.1 * a as f64 + 1e-9 * n as f64
            }
        }
    }
    if let Some(forcing) = &mut physics.forcing {
        forcing.rstate.gaussian();
    }
}




fn dump(input: &Path, ranks: usize, overrides: &[String]) -> Result<()> {
    let mut pin = load_deck(input, overrides)?;
    let mut mesh = Mesh::from_parameters(&mut pin)?;
    mesh.balance(ranks)?;

    let config = PhysicsConfig::from_parameters(&mut pin)?;
    let block = OutputParameters::find_block(&pin)
        .ok_or_else(|| anyhow!("{} has no <outputN> block with file_type = rst", input.display()))?;
    let params = OutputParameters::from_parameters(&mut pin, &block)?;
    let mesh = &mesh;

    info!("writing {} blocks over {} ranks: {:?}", mesh.num_blocks(), ranks, mesh.nmb_eachrank());

    let reports = thread::scope(|scope| {
        let handles: Vec<_> = ChannelCommunicator::group(ranks)
            .into_iter()
            .map(|comm| {
                let mut pin = pin.clone();
                let params = params.clone();

                scope.spawn(move || {
                    let rank = comm.rank();
                    let mut physics = Physics::new(&config, &mesh.mb_indcs, mesh.nmb_eachrank()[rank]);
                    fill_synthetic(&mut physics, mesh.gids_eachrank()[rank]);

                    let mut output = RestartOutput::new(params, config);
                    output.load_output_data(&physics);
                    output.write_output_file(mesh, &mut pin, &comm)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("a rank thread panicked")))
            .collect::<Result<Vec<_>>>()
    })?;

    for report in reports {
        let report = report?;
        debug!("rank {} wrote {} bytes", report.rank, report.bytes_written);
    }
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let reader = RestartReader::open(file).with_context(|| format!("reading {}", file.display()))?;
    let h = &reader.header;
    let layout = reader.layout();

    info!("{}", file.display());
    info!("  {} blocks, root level {}", h.nmb_total, h.root_level);
    info!("  time {}, dt {}, cycle {}", h.time, h.dt, h.ncycle);
    info!("  mesh {} x {} x {} cells in blocks of {} x {} x {}, {} ghost cells",
        h.mesh_indcs.nx1, h.mesh_indcs.nx2, h.mesh_indcs.nx3,
        h.mb_indcs.nx1, h.mb_indcs.nx2, h.mb_indcs.nx3, h.mb_indcs.ng);
    info!("  payload of {} bytes per block from byte {}", layout.payload.block_bytes(), layout.payload_start());

    for (section, len) in layout.payload.sections() {
        info!("    {}: {} values", section, len)
    }
    if reader.rng_state.is_some() {
        info!("  forcing random state is present")
    }
    Ok(())
}

fn horizon(input: &Path, overrides: &[String], output: &Path) -> Result<()> {
    let mut pin = load_deck(input, overrides)?;
    let mesh = Mesh::from_parameters(&mut pin)?;
    let puncture = OnePuncture::from_parameters(&mut pin)?;
    let params = HorizonParameters::from_parameters(&mut pin)?;

    let metric = puncture.fill_metric(&mesh).context("filling the spatial metric")?;
    let curvature = puncture.fill_curvature(&mesh).context("filling the extrinsic curvature")?;
    let dmetric = metric_derivative(&mesh, &metric)?;

    let g = MeshField::new(&mesh, &metric);
    let k = MeshField::new(&mesh, &curvature);
    let dg = MeshField::new(&mesh, &dmetric);
    let finder = HorizonFinder::new(params, AdmFields { metric: &g, curvature: &k, metric_derivative: &dg })?;
    let search = finder.search()?;

    info!("{:?} after {} iterations: radius between {:.6} and {:.6} (puncture horizon at {:.6})",
        search.status, search.iterations, search.min_radius(), search.max_radius(), puncture.horizon_radius());

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    ciborium::ser::into_writer(&search, BufWriter::new(file))
        .with_context(|| format!("writing {}", output.display()))?;
    info!("wrote {}", output.display());
    Ok(())
}




fn run(command: Command) -> Result<()> {
    match command {
        Command::Dump { input, ranks, overrides } => dump(&input, ranks, &overrides),
        Command::Inspect { file } => inspect(&file),
        Command::Horizon { input, overrides, output } => horizon(&input, &overrides, &output),
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let level: LevelFilter = opts.log_level
        .parse()
        .map_err(|_| anyhow!("unknown log level '{}'", opts.log_level))?;

    SimpleLogger::new().with_level(level).init()?;

    if let Err(e) = run(opts.command) {
        error!("{:#}", e);
        std::process::exit(1)
    }
    Ok(())
}
