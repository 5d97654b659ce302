use anyhow::{Context, Result};
use log::{debug, info};
use tokio::process::Command;

use crate::cli::DeployStep;
use crate::config::DeployConfig;

/// Remote service management over SSH: pull the service source, rebuild its
/// image, and bounce the compose stack. Steps run sequentially and stop at
/// the first failure; nothing is rolled back.
pub struct Deployer {
    config: DeployConfig,
}

impl Deployer {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, step: DeployStep) -> Result<()> {
        match step {
            DeployStep::Pull => self.pull_code().await,
            DeployStep::Build => self.build_image().await,
            DeployStep::Restart => self.restart_service().await,
            DeployStep::All => {
                self.pull_code().await?;
                self.build_image().await?;
                self.restart_service().await
            }
        }
    }

    async fn pull_code(&self) -> Result<()> {
        info!("pulling code on {}", self.config.host);
        self.remote_run(&self.pull_command()).await
    }

    async fn build_image(&self) -> Result<()> {
        info!("building image {} on {}", self.config.image, self.config.host);
        self.remote_run(&self.build_command()).await
    }

    async fn restart_service(&self) -> Result<()> {
        info!("restarting service on {}", self.config.host);
        self.remote_run(&self.restart_command()).await
    }

    fn pull_command(&self) -> String {
        format!("cd {} && git pull", self.config.code_dir)
    }

    fn build_command(&self) -> String {
        format!(
            "cd {} && docker build -t {} -f {} .",
            self.config.code_dir, self.config.image, self.config.dockerfile
        )
    }

    fn restart_command(&self) -> String {
        format!(
            "cd {} && docker compose down && docker compose up -d",
            self.config.service_dir
        )
    }

    async fn remote_run(&self, command: &str) -> Result<()> {
        debug!("ssh {} {:?}", self.config.host, command);

        let status = Command::new("ssh")
            .arg(&self.config.host)
            .arg(command)
            .status()
            .await
            .with_context(|| format!("failed to run ssh to {}", self.config.host))?;

        if !status.success() {
            anyhow::bail!(
                "remote command on {} exited with {}: {}",
                self.config.host,
                status,
                command
            );
        }

        Ok(())
    }
}
