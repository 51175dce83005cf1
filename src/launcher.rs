use crate::utils::error::{ApexError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const APP_PORT: u16 = 8501;
pub const HEALTH_PATH: &str = "/_stcore/health";
pub const DEFAULT_IMAGE: &str = "apexbrain";
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// The daemon that builds and runs the application image.
pub trait ContainerEngine: Send + Sync {
    fn is_running(&self) -> impl Future<Output = bool> + Send;
    fn build(&self, image: &str, context: &str) -> impl Future<Output = Result<()>> + Send;
    /// Runs the image in the foreground; resolves to the runtime's exit status.
    fn run(&self, image: &str, port: u16) -> impl Future<Output = Result<i32>> + Send;
}

/// Shells out to the `docker` command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerEngine for DockerCli {
    async fn is_running(&self) -> bool {
        let status = Command::new(&self.binary)
            .arg("info")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(s) => s.success(),
            Err(e) => {
                tracing::debug!("Could not execute '{} info': {}", self.binary, e);
                false
            }
        }
    }

    async fn build(&self, image: &str, context: &str) -> Result<()> {
        let status = Command::new(&self.binary)
            .args(["build", "-t", image, context])
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(ApexError::ContainerCommandFailed {
                command: format!("{} build -t {} {}", self.binary, image, context),
                status: status.code().unwrap_or(-1),
            })
        }
    }

    async fn run(&self, image: &str, port: u16) -> Result<i32> {
        let publish = format!("{}:{}", port, APP_PORT);
        let status = Command::new(&self.binary)
            .args(["run", "--rm", "-p", &publish, image])
            .status()
            .await?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    pub image: String,
    pub context: String,
    /// Host port published for the container's 8501.
    pub port: u16,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            context: ".".to_string(),
            port: APP_PORT,
        }
    }
}

/// Status check, build, run. Nothing is built when the engine is down.
pub struct Launcher<E: ContainerEngine> {
    engine: E,
    options: LaunchOptions,
}

impl<E: ContainerEngine> Launcher<E> {
    pub fn new(engine: E, options: LaunchOptions) -> Self {
        Self { engine, options }
    }

    pub async fn launch(&self) -> Result<i32> {
        tracing::info!("🏎️ Launching ApexBrain");

        if !self.engine.is_running().await {
            tracing::error!("❌ Docker is not running. Please start Docker Desktop and try again.");
            return Err(ApexError::EngineUnavailable {
                message: "the container engine daemon did not respond".to_string(),
            });
        }

        tracing::info!("🔨 Building image '{}' from {}", self.options.image, self.options.context);
        self.engine
            .build(&self.options.image, &self.options.context)
            .await?;

        tracing::info!(
            "🚀 Starting container at http://localhost:{}",
            self.options.port
        );
        let status = self.engine.run(&self.options.image, self.options.port).await?;
        tracing::info!("Container exited with status {}", status);
        Ok(status)
    }
}

/// Polls the health endpoint until it answers 2xx or attempts run out.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
    attempts: u32,
    interval: Duration,
}

impl HealthProbe {
    /// Each request may take as long as the retry interval, but never less than
    /// `MIN_REQUEST_TIMEOUT`.
    pub fn new(base_url: &str, attempts: u32, interval: Duration) -> Result<Self> {
        Self::with_timeout(base_url, attempts, interval, interval.max(MIN_REQUEST_TIMEOUT))
    }

    pub fn with_timeout(
        base_url: &str,
        attempts: u32,
        interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH),
            attempts: attempts.max(1),
            interval,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn check(&self) -> Result<()> {
        for attempt in 1..=self.attempts {
            match self.client.get(&self.url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("✅ {} healthy after {} attempt(s)", self.url, attempt);
                    return Ok(());
                }
                Ok(resp) => {
                    tracing::warn!("Health check {}/{}: HTTP {}", attempt, self.attempts, resp.status());
                }
                Err(e) => {
                    tracing::warn!("Health check {}/{}: {}", attempt, self.attempts, e);
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(ApexError::HealthCheckFailed {
            url: self.url.clone(),
            attempts: self.attempts,
        })
    }
}
