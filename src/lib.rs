pub mod analytics;
pub mod config;
pub mod core;
pub mod domain;
pub mod insight;
pub mod launcher;
pub mod ml;
pub mod physics;
pub mod report;
pub mod results;
pub mod server;
pub mod session;
pub mod strategy;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use config::TomlConfig;
pub use core::{DebriefEngine, DebriefPipeline};
pub use launcher::{DockerCli, HealthProbe, Launcher};
pub use session::SessionStore;
pub use utils::error::{ApexError, Result};
