use anyhow::Result;
use infer_bench::cli::{Cli, Command, DeployStep};
use infer_bench::deploy::Deployer;
use infer_bench::{BenchmarkRunner, Config};
use ringlog::{File, LogBuilder, MultiLogBuilder, Output, Stderr};

/// Maximum log file size before rotation (10MB)
const LOG_FILE_MAX_SIZE: u64 = 1024 * 1024 * 10;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Load configuration first so logging can honor its settings
    let config = Config::load(&cli.config)?;

    // Log to a rotating file when a trace log is configured, stderr otherwise
    let output: Box<dyn Output> = if let Some(ref log_file) = config.output.trace_log {
        let backup_file = log_file.with_extension("old");
        Box::new(File::new(log_file.clone(), backup_file, LOG_FILE_MAX_SIZE)?)
    } else {
        Box::new(Stderr::new())
    };

    let log = LogBuilder::new()
        .output(output)
        .build()
        .expect("failed to initialize logger");

    let _drain = MultiLogBuilder::new()
        .level_filter(config.log.level.to_level_filter())
        .default(log)
        .build()
        .start();

    // One request in flight at any time, so a single-threaded runtime
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command.unwrap_or(Command::Bench) {
        Command::Bench => {
            if !config.output.quiet {
                println!("Model Inference Benchmark");
                println!("   Config: {}", cli.config.display());
                println!("   Target: {}", config.endpoint.base_url);
                println!(
                    "   Trials: {} per model, 1 warmup (discarded), {} between calls",
                    config.benchmark.trials, config.benchmark.delay
                );
                println!();
            }

            runtime.block_on(async {
                let runner = BenchmarkRunner::new(config)?;
                runner.run().await?;
                Ok(())
            })
        }
        Command::Preview { path, shape } => {
            let path = path.unwrap_or_else(|| config.benchmark.input_file.clone());
            infer_bench::preview::preview(&path, shape.as_deref())
        }
        Command::Deploy { step } => {
            let deploy_config = config
                .deploy
                .ok_or_else(|| anyhow::anyhow!("config has no [deploy] section"))?;

            runtime.block_on(Deployer::new(deploy_config).run(step.unwrap_or(DeployStep::All)))
        }
    }
}
