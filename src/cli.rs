use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "infer-bench")]
#[command(author, version, about = "Benchmark a remote model-serving endpoint", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Benchmark every non-skipped model loaded on the server (default)
    Bench,
    /// Inspect an input payload file without contacting the server
    Preview {
        /// Payload file to inspect; defaults to the configured input file
        path: Option<PathBuf>,
        /// Expected tensor shape, comma separated (e.g. "32,1,32,192")
        #[arg(long)]
        shape: Option<String>,
    },
    /// Run deployment steps on the remote service host over SSH
    Deploy {
        /// Which step to run; defaults to all of them in order
        #[arg(value_enum)]
        step: Option<DeployStep>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployStep {
    /// Pull the latest service code
    Pull,
    /// Rebuild the service image
    Build,
    /// Restart the compose stack
    Restart,
    /// Pull, build, then restart
    All,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
