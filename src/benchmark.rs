use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

use crate::client::ModelServerClient;
use crate::config::Config;
use crate::report::{self, RunReport};

/// Load the inference payload: a JSON array of numbers, fixed for the whole
/// run. Missing, malformed, or empty data is fatal before any request is
/// made.
pub fn load_input_data(path: &Path) -> Result<Vec<f64>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input data from {}", path.display()))?;

    let data: Vec<f64> = serde_json::from_str(&contents).with_context(|| {
        format!("{} does not contain a JSON array of numbers", path.display())
    })?;

    if data.is_empty() {
        anyhow::bail!("input data in {} is empty", path.display());
    }

    Ok(data)
}

/// Ordered set of compiled skip patterns. A model is excluded when any
/// pattern matches its identifier.
pub struct SkipList {
    patterns: Vec<Regex>,
}

impl SkipList {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid skip pattern {:?}", p)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn is_match(&self, model: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(model))
    }
}

/// Sequential benchmark over every model the service has loaded.
///
/// One model at a time, one request at a time: switch, warmup (discarded),
/// then the configured number of timed inferences, with a pause after each
/// call. A model that fails to switch or warm up is dropped from the report;
/// the run itself only aborts on discovery or persistence failures.
pub struct BenchmarkRunner {
    client: ModelServerClient,
    config: Config,
    input_data: Vec<f64>,
    skip: SkipList,
    delay: Duration,
}

impl BenchmarkRunner {
    /// Compiles the skip list and loads the payload before a client even
    /// exists, so a bad setup never results in HTTP traffic.
    pub fn new(config: Config) -> Result<Self> {
        let skip = SkipList::compile(&config.benchmark.skip_models)?;
        let input_data = load_input_data(&config.benchmark.input_file)?;
        let delay = humantime::parse_duration(&config.benchmark.delay)
            .with_context(|| format!("invalid benchmark.delay {:?}", config.benchmark.delay))?;

        let client = ModelServerClient::new(
            config.endpoint.base_url.clone(),
            Duration::from_secs(config.endpoint.timeout),
        )?;

        debug!("loaded {} payload values", input_data.len());

        Ok(Self {
            client,
            config,
            input_data,
            skip,
            delay,
        })
    }

    /// Discover models, benchmark each non-skipped one in the service's
    /// listed order, and persist a single report at the end. Returns the
    /// report path.
    pub async fn run(&self) -> Result<PathBuf> {
        let model_info = self
            .client
            .fetch_model_info()
            .await
            .map_err(|e| anyhow::anyhow!("failed to query loaded models: {}", e))?;

        info!("current model: {}", model_info.current_model);
        if !self.config.output.quiet {
            println!("Current model: {}", model_info.current_model);
            println!("Available models:");
            for (i, model) in model_info.available_models.iter().enumerate() {
                println!("  {}. {}", i + 1, model);
            }
            println!("Input data: {} values", self.input_data.len());
            println!();
        }

        let mut run_report = RunReport::new(
            self.client.base_url().to_string(),
            self.input_data.len(),
        );

        for model in &model_info.available_models {
            if self.skip.is_match(model) {
                info!("skipping model {}", model);
                continue;
            }

            info!("benchmarking model {}", model);
            let times = self.run_trials(model).await;

            if times.is_empty() {
                // Switch or warmup failed, or every trial was dropped.
                // The model is omitted and the run moves on.
                warn!("model {} produced no timings, omitting from report", model);
                continue;
            }

            run_report.record(model, times);
            let bench = &run_report.models[model];
            info!(
                "model {}: average inference time {:.4}s over {} trials",
                model, bench.average_inference_time, bench.total_tests
            );
            if !self.config.output.quiet {
                println!(
                    "{}: {:.4}s average over {} trials",
                    model, bench.average_inference_time, bench.total_tests
                );
            }
        }

        let path = report::save(&run_report, &self.config.output.results_dir)?;
        info!("results written to {}", path.display());
        if !self.config.output.quiet {
            println!("\nResults written to {}", path.display());
        }

        Ok(path)
    }

    /// Benchmark one model: switch, one discarded warmup, then the
    /// configured number of timed inferences in call order.
    ///
    /// A failed switch or warmup returns an empty list. A failed timed trial
    /// is skipped without aborting the rest, so the result may hold fewer
    /// values than requested. Each call is followed by the configured pause.
    pub async fn run_trials(&self, model: &str) -> Vec<f64> {
        if let Err(e) = self.client.switch_model(model).await {
            warn!("failed to switch to model {}: {}", model, e);
            return Vec::new();
        }

        debug!("warmup inference for {}", model);
        if let Err(e) = self.client.perform_inference(&self.input_data).await {
            warn!("warmup inference for {} failed: {}", model, e);
            return Vec::new();
        }
        sleep(self.delay).await;

        let trials = self.config.benchmark.trials;
        let mut times = Vec::with_capacity(trials);

        for trial in 1..=trials {
            debug!("trial {}/{} for {}", trial, trials, model);
            match self.client.perform_inference(&self.input_data).await {
                Ok(result) => times.push(result.inference_time),
                Err(e) => warn!("trial {}/{} for {} failed: {}", trial, trials, model, e),
            }
            sleep(self.delay).await;
        }

        times
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BenchmarkConfig, EndpointConfig, LogConfig, OutputConfig};
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_payload(dir: &Path, values: &str) -> PathBuf {
        let path = dir.join("payload.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(values.as_bytes()).unwrap();
        path
    }

    fn test_config(
        base_url: String,
        input_file: PathBuf,
        results_dir: PathBuf,
        trials: usize,
        skip_models: Vec<String>,
    ) -> Config {
        Config {
            endpoint: EndpointConfig {
                base_url,
                timeout: 5,
            },
            benchmark: BenchmarkConfig {
                input_file,
                trials,
                delay: "0s".to_string(),
                skip_models,
            },
            output: OutputConfig {
                results_dir,
                quiet: true,
                trace_log: None,
            },
            log: LogConfig::default(),
            deploy: None,
        }
    }

    fn inference_body(time: f64) -> serde_json::Value {
        serde_json::json!({ "inference_time": time })
    }

    fn read_report(results_dir: &Path) -> serde_json::Value {
        let mut entries: Vec<_> = std::fs::read_dir(results_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1, "expected exactly one report file");
        let path = entries.pop().unwrap();
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn skip_list_matches_any_pattern() {
        let skip =
            SkipList::compile(&["^debug".to_string(), "-old$".to_string()]).unwrap();

        assert!(skip.is_match("debug-net"));
        assert!(skip.is_match("resnet-old"));
        assert!(!skip.is_match("resnet18"));

        let empty = SkipList::compile(&[]).unwrap();
        assert!(!empty.is_match("anything"));
    }

    #[test]
    fn load_input_data_rejects_missing_empty_and_malformed() {
        let dir = tempfile::tempdir().unwrap();

        assert!(load_input_data(&dir.path().join("absent.json")).is_err());

        let empty = write_payload(dir.path(), "[]");
        assert!(load_input_data(&empty).is_err());

        let malformed = write_payload(dir.path(), "{\"not\": \"an array\"}");
        assert!(load_input_data(&malformed).is_err());
    }

    #[test]
    fn load_input_data_reads_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_payload(dir.path(), "[1.0, 2.5, -3]");

        let data = load_input_data(&path).unwrap();
        assert_eq!(data, vec![1.0, 2.5, -3.0]);
    }

    #[test]
    fn missing_payload_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(
            "http://127.0.0.1:9".to_string(),
            dir.path().join("absent.json"),
            dir.path().join("results"),
            3,
            Vec::new(),
        );

        // No server is listening on the endpoint; construction must fail on
        // the payload alone.
        assert!(BenchmarkRunner::new(config).is_err());
    }

    #[tokio::test]
    async fn warmup_is_discarded_and_trials_kept_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/resnet18"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        // First inference call is the warmup; its timing must never appear
        for time in [9.9, 0.1, 0.2, 0.3] {
            Mock::given(method("POST"))
                .and(path("/inference"))
                .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(time)))
                .up_to_n_times(1)
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0, 2.0]");
        let config = test_config(
            server.uri(),
            payload,
            dir.path().join("results"),
            3,
            Vec::new(),
        );

        let runner = BenchmarkRunner::new(config).unwrap();
        let times = runner.run_trials("resnet18").await;
        assert_eq!(times, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn failed_switch_yields_no_timings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("load error"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(0.1)))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0]");
        let config = test_config(
            server.uri(),
            payload,
            dir.path().join("results"),
            3,
            Vec::new(),
        );

        let runner = BenchmarkRunner::new(config).unwrap();
        assert!(runner.run_trials("broken").await.is_empty());
    }

    #[tokio::test]
    async fn failed_warmup_yields_no_timings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/coldstart"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oom"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0]");
        let config = test_config(
            server.uri(),
            payload,
            dir.path().join("results"),
            3,
            Vec::new(),
        );

        let runner = BenchmarkRunner::new(config).unwrap();
        assert!(runner.run_trials("coldstart").await.is_empty());
    }

    #[tokio::test]
    async fn dropped_trial_does_not_abort_remaining_trials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/flaky"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        // warmup + first two trials succeed, third trial fails
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(0.2)))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(500).set_body_string("transient"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0]");
        let config = test_config(
            server.uri(),
            payload,
            dir.path().join("results"),
            3,
            Vec::new(),
        );

        let runner = BenchmarkRunner::new(config).unwrap();
        let times = runner.run_trials("flaky").await;
        assert_eq!(times, vec![0.2, 0.2]);
    }

    #[tokio::test]
    async fn skipped_models_are_never_contacted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current_model": "a",
                "available_models": ["a", "b-test"],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/model/a"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/model/b-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(0.1)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0, 2.0]");
        let results_dir = dir.path().join("results");
        let config = test_config(
            server.uri(),
            payload,
            results_dir.clone(),
            2,
            vec!["^b".to_string()],
        );

        let runner = BenchmarkRunner::new(config).unwrap();
        runner.run().await.unwrap();

        let report = read_report(&results_dir);
        assert!(report["models"].get("a").is_some());
        assert!(report["models"].get("b-test").is_none());
    }

    #[tokio::test]
    async fn failing_model_does_not_stop_later_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current_model": "x",
                "available_models": ["x", "y"],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/model/x"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/model/y"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(inference_body(0.5)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0]");
        let results_dir = dir.path().join("results");
        let config = test_config(server.uri(), payload, results_dir.clone(), 2, Vec::new());

        let runner = BenchmarkRunner::new(config).unwrap();
        runner.run().await.unwrap();

        let report = read_report(&results_dir);
        assert!(report["models"].get("x").is_none());
        let y = &report["models"]["y"];
        assert_eq!(y["total_tests"], 2);
        assert!((y["average_inference_time"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn discovery_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/model"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let payload = write_payload(dir.path(), "[1.0]");
        let config = test_config(
            server.uri(),
            payload,
            dir.path().join("results"),
            2,
            Vec::new(),
        );

        let runner = BenchmarkRunner::new(config).unwrap();
        assert!(runner.run().await.is_err());
    }
}
