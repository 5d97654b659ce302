pub mod benchmark;
pub mod cli;
pub mod client;
pub mod config;
pub mod deploy;
pub mod preview;
pub mod report;

pub use benchmark::{BenchmarkRunner, SkipList};
pub use cli::Cli;
pub use client::{ClientError, InferenceResponse, ModelInfo, ModelServerClient};
pub use config::Config;
pub use report::{ModelBenchmark, RunReport};
