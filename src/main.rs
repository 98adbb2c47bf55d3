use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mp4flv::{demuxer_from_path, remux_paths, Error};

#[derive(Parser, Debug)]
#[command(name = "mp4flv")]
#[command(about = "Remux a stored MP4 file into FLV", long_about = None)]
struct Cli {
    /// Input MP4 file
    #[arg(short = 'i', long = "input", value_name = "INPUT.mp4", default_value = "./test.mp4")]
    input: PathBuf,

    /// Output FLV file
    #[arg(short = 'y', long = "output", value_name = "OUTPUT.flv", default_value = "./test.flv")]
    output: PathBuf,

    /// Print the parsed movie parameters as JSON and exit without writing FLV
    #[arg(long, action = clap::ArgAction::SetTrue)]
    info: bool,
}

fn run(cli: &Cli) -> Result<(), Error> {
    if cli.info {
        let demuxer = demuxer_from_path(&cli.input)?;
        // Serializing a plain struct cannot fail.
        let json = serde_json::to_string_pretty(demuxer.info()).unwrap();
        println!("{json}");
        return Ok(());
    }

    info!(input = %cli.input.display(), output = %cli.output.display(), "remuxing mp4 to flv");
    remux_paths(&cli.input, &cli.output)?;
    info!("remux ok");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
