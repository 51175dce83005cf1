use crate::domain::model::SessionKey;
use crate::domain::ports::ConfigProvider;
use crate::launcher::{LaunchOptions, APP_PORT, HEALTH_PATH};
use crate::server::ServerConfig;
use crate::strategy::mcda::{CarParams, CircuitParams, EnvParams, KFactors, Scenario, TyreParams};
use crate::strategy::oracle::{reference_plans, NamedPlan};
use crate::utils::error::{ApexError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Full configuration file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub session: SessionConfig,
    /// Overrides the preset picked from `session.grand_prix`.
    pub circuit: Option<CircuitParams>,
    pub car: CarParams,
    pub environment: EnvParams,
    pub tyres: Option<Vec<TyreParams>>,
    pub k_factors: KFactors,
    pub simulation: SimulationConfig,
    pub launcher: LauncherConfig,
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cache_dir: String,
    pub output_path: String,
    pub year: u16,
    pub grand_prix: String,
    pub session: String,
    pub driver_1: Option<String>,
    pub driver_2: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_dir: "./cache".to_string(),
            output_path: "./output".to_string(),
            year: 2024,
            grand_prix: "Bahrain".to_string(),
            session: "R".to_string(),
            driver_1: None,
            driver_2: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub runs: usize,
    pub total_laps: u32,
    /// Random plans sampled by the decision engine.
    pub candidates: usize,
    pub seed: Option<u64>,
    pub plans: Vec<NamedPlan>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            runs: 1000,
            total_laps: 57,
            candidates: 2000,
            seed: None,
            plans: reference_plans(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    #[serde(flatten)]
    pub options: LaunchOptions,
    pub docker_binary: String,
    pub health_url: String,
    pub health_attempts: u32,
    pub health_interval_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            options: LaunchOptions::default(),
            docker_binary: "docker".to_string(),
            health_url: format!("http://localhost:{}", APP_PORT),
            health_attempts: 10,
            health_interval_ms: 1000,
        }
    }
}

impl LauncherConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        tracing::debug!("Loaded config from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| ApexError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            ApexError::ConfigValidationError {
                field: "environment_substitution".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
            })
            .into_owned())
    }

    pub fn scenario(&self) -> Scenario {
        Scenario {
            circuit: self
                .circuit
                .clone()
                .unwrap_or_else(|| CircuitParams::for_circuit(&self.session.grand_prix)),
            car: self.car.clone(),
            env: self.environment.clone(),
            tyres: self.tyres.clone().unwrap_or_else(TyreParams::defaults),
            k_factors: self.k_factors,
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    fn validate_scenario(&self) -> Result<()> {
        let scenario = self.scenario();
        let env = &scenario.env;
        validation::validate_range("environment.rain_prob", env.rain_prob, 0.0, 1.0)?;
        validation::validate_range("environment.sc_prob", env.sc_prob, 0.0, 1.0)?;
        validation::validate_range("environment.vsc_prob", env.vsc_prob, 0.0, 1.0)?;
        validation::validate_range("environment.grid_position", env.grid_position, 1, env.n_drivers.max(1))?;
        validation::validate_range("circuit.abrasivity", scenario.circuit.abrasivity, 1.0, 5.0)?;
        validation::validate_positive_number("circuit.n_laps", scenario.circuit.n_laps as usize, 1)?;

        for tyre in &scenario.tyres {
            validation::validate_positive_number(
                &format!("tyres.{}.max_life", tyre.compound),
                tyre.max_life as usize,
                1,
            )?;
        }
        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("session.cache_dir", &self.session.cache_dir)?;
        validation::validate_path("session.output_path", &self.session.output_path)?;
        validation::validate_non_empty_string("session.grand_prix", &self.session.grand_prix)?;
        validation::validate_non_empty_string("session.session", &self.session.session)?;
        self.validate_scenario()?;

        validation::validate_positive_number("simulation.runs", self.simulation.runs, 1)?;
        validation::validate_positive_number("simulation.candidates", self.simulation.candidates, 2)?;
        validation::validate_http_url("launcher.health_url", &self.launcher.health_url)?;
        if self.launcher.health_url.ends_with(HEALTH_PATH) {
            return Err(ApexError::InvalidConfigValueError {
                field: "launcher.health_url".to_string(),
                value: self.launcher.health_url.clone(),
                reason: format!("give the base URL; {} is appended", HEALTH_PATH),
            });
        }
        validation::validate_non_empty_string("launcher.image", &self.launcher.options.image)?;
        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn session_key(&self) -> SessionKey {
        SessionKey::new(
            self.session.year,
            self.session.grand_prix.as_str(),
            self.session.session.as_str(),
        )
    }

    fn output_path(&self) -> &str {
        &self.session.output_path
    }

    fn focus_drivers(&self) -> Option<(&str, &str)> {
        match (&self.session.driver_1, &self.session.driver_2) {
            (Some(d1), Some(d2)) => Some((d1.as_str(), d2.as_str())),
            _ => None,
        }
    }

    fn scenario(&self) -> Scenario {
        TomlConfig::scenario(self)
    }

    fn strategy_candidates(&self) -> usize {
        self.simulation.candidates
    }

    fn seed(&self) -> Option<u64> {
        self.simulation.seed
    }
}
