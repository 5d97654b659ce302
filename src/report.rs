use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Timings for one model after its trials complete. Immutable once built;
/// the warmup call is never part of `inference_times`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelBenchmark {
    pub inference_times: Vec<f64>,
    pub average_inference_time: f64,
    pub total_tests: usize,
}

impl ModelBenchmark {
    pub fn from_times(inference_times: Vec<f64>) -> Self {
        let average_inference_time = mean(&inference_times);
        let total_tests = inference_times.len();
        Self {
            inference_times,
            average_inference_time,
            total_tests,
        }
    }
}

/// The single artifact persisted per run. Models accumulate as the run
/// progresses; only models with at least one successful trial appear.
/// BTreeMap keeps the serialized key order stable across runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub test_time: String,
    pub input_data_length: usize,
    pub test_host: String,
    pub models: BTreeMap<String, ModelBenchmark>,
}

impl RunReport {
    pub fn new(test_host: String, input_data_length: usize) -> Self {
        Self {
            test_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_data_length,
            test_host,
            models: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, model: &str, inference_times: Vec<f64>) {
        self.models
            .insert(model.to_string(), ModelBenchmark::from_times(inference_times));
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Write the report under `results_dir`, creating the directory if needed.
/// The filename embeds the wall-clock write time so repeated runs never
/// clobber each other. Returns the path for logging.
pub fn save(report: &RunReport, results_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(results_dir)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = results_dir.join(format!("inference_results_{}.json", stamp));

    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;

    Ok(path)
}
