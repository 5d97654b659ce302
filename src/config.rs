use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// JSON array of numbers sent as the inference payload, identical for
    /// every model and every trial
    #[serde(default = "default_input_file")]
    pub input_file: PathBuf,
    /// Timed inferences per model, not counting the discarded warmup
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Pause between calls (e.g. "1s", "500ms") so the single-worker service
    /// is never asked to overlap requests
    #[serde(default = "default_delay")]
    pub delay: String,
    /// Models whose name matches any of these regexes are never contacted
    #[serde(default)]
    pub skip_models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default)]
    pub quiet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Remote host running the inference service, managed over SSH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// SSH destination (a host alias or user@host)
    pub host: String,
    /// Checkout of the service source on the remote host
    pub code_dir: String,
    /// Directory holding the compose file on the remote host
    pub service_dir: String,
    /// Image tag to build
    pub image: String,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            trials: default_trials(),
            delay: default_delay(),
            skip_models: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            quiet: false,
            trace_log: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_input_file() -> PathBuf {
    PathBuf::from("imgdata.json")
}

fn default_trials() -> usize {
    5
}

fn default_delay() -> String {
    "1s".to_string()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.endpoint.base_url.is_empty() {
            anyhow::bail!("endpoint.base_url must not be empty");
        }

        if self.benchmark.trials == 0 {
            anyhow::bail!("benchmark.trials must be greater than 0");
        }

        if let Err(e) = humantime::parse_duration(&self.benchmark.delay) {
            anyhow::bail!("benchmark.delay {:?} is not a duration: {}", self.benchmark.delay, e);
        }

        for pattern in &self.benchmark.skip_models {
            if let Err(e) = regex::Regex::new(pattern) {
                anyhow::bail!("benchmark.skip_models pattern {:?} is invalid: {}", pattern, e);
            }
        }

        Ok(())
    }
}
