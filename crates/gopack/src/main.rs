use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use gopack::bundle::bundle_dir;
use gopack::emit::write_output;

/// Bundle a Go program and its first-party packages into one source file.
#[derive(Parser)]
#[command(name = "gopack", version, about)]
struct Cli {
    /// Directory of the executable package to bundle.
    #[arg(long)]
    input: PathBuf,

    /// Where to write the bundled file.
    #[arg(long, default_value = "submit.go")]
    output: PathBuf,
}

fn run(cli: &Cli) -> Result<()> {
    let text = bundle_dir(&cli.input)?;
    write_output(&cli.output, &text)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gopack: {err}");
            ExitCode::FAILURE
        }
    }
}
