#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "apexbrain")]
#[command(about = "Race engineering analytics: session debriefs, strategy and the container launcher")]
#[command(version)]
pub struct CliConfig {
    /// TOML file; defaults apply to anything it leaves out.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory per pipeline phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build the debrief bundle for one session.
    Debrief {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        output: Option<String>,
        /// Reference driver for the head-to-head.
        #[arg(long = "d1")]
        driver_1: Option<String>,
        #[arg(long = "d2")]
        driver_2: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rank candidate pit strategies for the configured scenario.
    Strategy {
        #[arg(long)]
        circuit: Option<String>,
        #[arg(long)]
        track_temp: Option<f64>,
        #[arg(long)]
        grid_position: Option<u32>,
        #[arg(long)]
        rain_prob: Option<f64>,
        #[arg(long)]
        candidates: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Monte Carlo comparison of the configured plans.
    Simulate {
        #[arg(long)]
        runs: Option<usize>,
        #[arg(long)]
        laps: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fit the tyre degradation model on a session and print wear curves.
    Train {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, default_value = "30")]
        curve_laps: usize,
    },
    /// Label laps (one driver) or driving styles (whole field).
    Cluster {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long)]
        driver: Option<String>,
    },
    /// Check the container engine, build the image and run it.
    Launch,
    /// Poll the health endpoint of a running instance.
    Probe {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        attempts: Option<u32>,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Session selection shared by the data-driven subcommands.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    #[arg(long)]
    pub cache_dir: Option<String>,
    #[arg(long)]
    pub year: Option<u16>,
    #[arg(long = "gp")]
    pub grand_prix: Option<String>,
    #[arg(long)]
    pub session: Option<String>,
}

#[cfg(feature = "cli")]
impl SessionArgs {
    pub fn apply(&self, config: &mut TomlConfig) {
        if let Some(dir) = &self.cache_dir {
            config.session.cache_dir = dir.clone();
        }
        if let Some(year) = self.year {
            config.session.year = year;
        }
        if let Some(gp) = &self.grand_prix {
            config.session.grand_prix = gp.clone();
        }
        if let Some(session) = &self.session {
            config.session.session = session.clone();
        }
    }
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the TOML file, if any, and layers the subcommand's flags over it.
    pub fn resolve(&self) -> crate::utils::error::Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        if self.monitor {
            config.monitoring.enabled = true;
        }

        match &self.command {
            Command::Debrief {
                session,
                output,
                driver_1,
                driver_2,
                seed,
            } => {
                session.apply(&mut config);
                if let Some(out) = output {
                    config.session.output_path = out.clone();
                }
                if driver_1.is_some() {
                    config.session.driver_1 = driver_1.clone();
                }
                if driver_2.is_some() {
                    config.session.driver_2 = driver_2.clone();
                }
                if seed.is_some() {
                    config.simulation.seed = *seed;
                }
            }
            Command::Strategy {
                circuit,
                track_temp,
                grid_position,
                rain_prob,
                candidates,
                seed,
            } => {
                if let Some(name) = circuit {
                    config.session.grand_prix = name.clone();
                    config.circuit = None;
                }
                if let Some(t) = track_temp {
                    config.environment.track_temp = *t;
                }
                if let Some(p) = grid_position {
                    config.environment.grid_position = *p;
                }
                if let Some(r) = rain_prob {
                    config.environment.rain_prob = *r;
                }
                if let Some(n) = candidates {
                    config.simulation.candidates = *n;
                }
                if seed.is_some() {
                    config.simulation.seed = *seed;
                }
            }
            Command::Simulate { runs, laps, seed } => {
                if let Some(n) = runs {
                    config.simulation.runs = *n;
                }
                if let Some(l) = laps {
                    config.simulation.total_laps = *l;
                }
                if seed.is_some() {
                    config.simulation.seed = *seed;
                }
            }
            Command::Train { session, .. } | Command::Cluster { session, .. } => {
                session.apply(&mut config);
            }
            Command::Probe { url, attempts } => {
                if let Some(u) = url {
                    config.launcher.health_url = u.clone();
                }
                if let Some(a) = attempts {
                    config.launcher.health_attempts = *a;
                }
            }
            Command::Serve { host, port } => {
                if let Some(h) = host {
                    config.server.host = h.clone();
                }
                if let Some(p) = port {
                    config.server.port = *p;
                }
            }
            Command::Launch => {}
        }

        Ok(config)
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_launch_takes_no_arguments() {
        assert!(CliConfig::try_parse_from(["apexbrain", "launch"]).is_ok());
        assert!(CliConfig::try_parse_from(["apexbrain", "launch", "extra"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = CliConfig::try_parse_from([
            "apexbrain", "debrief", "--gp", "Monza", "--year", "2023", "--d1", "LEC", "--d2", "SAI",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);

        let config = cli.resolve().unwrap();
        assert_eq!(config.session.grand_prix, "Monza");
        assert_eq!(config.session.year, 2023);
        assert_eq!(config.session.driver_1.as_deref(), Some("LEC"));
        assert_eq!(config.scenario().circuit.n_laps, 53);
    }

    #[test]
    fn test_strategy_circuit_switches_preset() {
        let cli = CliConfig::try_parse_from([
            "apexbrain", "strategy", "--circuit", "Monaco", "--track-temp", "44",
        ])
        .unwrap();
        let config = cli.resolve().unwrap();
        assert_eq!(config.scenario().circuit.n_laps, 78);
        assert_eq!(config.environment.track_temp, 44.0);
    }
}
