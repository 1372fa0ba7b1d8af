use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod common;
mod config;
mod run;
mod source;

#[derive(Parser)]
struct Options {
	#[clap(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	Run(Run),
}

#[derive(Args)]
/// Classify a Sentinel-1 SAR scene into WATER/LAND/NODATA against a co-registered DEM.
struct Run {
	/// Speckle-filtered SAR backscatter scene, as digital numbers.
	#[clap(short = 'i', long = "input")]
	input: PathBuf,
	/// Co-registered digital elevation model.
	#[clap(long = "dem")]
	dem: PathBuf,
	#[clap(short = 'o', long = "output")]
	output: PathBuf,
	/// Optional TOML configuration overriding the pipeline's defaults.
	#[clap(short = 'c', long = "config")]
	config: Option<PathBuf>,
	#[clap(long = "tile-size")]
	tile_size: Option<u32>,
	/// Keep the scratch directory (tile statistics, initial detection, blob sizes) after
	/// a successful run; it's always kept on error.
	#[clap(long = "keep-scratch")]
	keep_scratch: bool,
	#[clap(long = "scratch-dir", default_value = "flood-scratch")]
	scratch_dir: PathBuf,
}

fn main() {
	env_logger::init();
	let opts: Options = Options::parse();

	let result = match opts.command {
		Command::Run(run) => run::run(run::RunArgs {
			input: run.input,
			dem: run.dem,
			output: run.output,
			config: run.config,
			tile_size: run.tile_size,
			keep_scratch: run.keep_scratch,
			scratch_dir: run.scratch_dir,
		}),
	};

	if let Err(err) = result {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}
