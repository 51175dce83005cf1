use anyhow::Context;
use apexbrain::config::{CliConfig, Command};
use apexbrain::core::{DebriefEngine, DebriefPipeline};
use apexbrain::domain::model::{Compound, Session};
use apexbrain::domain::ports::ConfigProvider;
use apexbrain::launcher::{DockerCli, HealthProbe, Launcher};
use apexbrain::ml::clustering::{cluster_laps, profile_driver_styles};
use apexbrain::ml::tyre_model::{wear_delta, TyreDegradationModel};
use apexbrain::strategy::mcda::DecisionEngine;
use apexbrain::strategy::oracle::StrategyOracle;
use apexbrain::utils::error::{ApexError, Result};
use apexbrain::utils::{logger, validation::Validate};
use apexbrain::{server, LocalStorage, SessionStore, TomlConfig};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if matches!(cli.command, Command::Serve { .. }) {
        logger::init_server_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let code = runtime.block_on(async {
        match run(&cli).await {
            Ok(code) => code,
            Err(e) => report_failure(&e),
        }
    });

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn report_failure(e: &ApexError) -> i32 {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    e.exit_code()
}

async fn run(cli: &CliConfig) -> Result<i32> {
    let config = cli.resolve()?;
    if cli.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    match &cli.command {
        Command::Debrief { .. } => debrief(config).await,
        Command::Strategy { .. } => strategy(&config),
        Command::Simulate { .. } => simulate(&config),
        Command::Train { curve_laps, .. } => train(&config, *curve_laps).await,
        Command::Cluster { driver, .. } => cluster(&config, driver.as_deref()).await,
        Command::Launch => {
            let launcher = Launcher::new(
                DockerCli::new(config.launcher.docker_binary.as_str()),
                config.launcher.options.clone(),
            );
            launcher.launch().await
        }
        Command::Probe { .. } => {
            let probe = HealthProbe::new(
                &config.launcher.health_url,
                config.launcher.health_attempts,
                config.launcher.health_interval(),
            )?;
            probe.check().await?;
            println!("✅ {} is healthy", probe.url());
            Ok(0)
        }
        Command::Serve { .. } => {
            server::serve(config.server.clone()).await?;
            Ok(0)
        }
    }
}

async fn debrief(config: TomlConfig) -> Result<i32> {
    let cache = LocalStorage::new(config.session.cache_dir.as_str());
    let output = LocalStorage::new(config.session.output_path.as_str());
    let monitor_enabled = config.monitoring_enabled();

    let pipeline = DebriefPipeline::new(cache, output, config);
    let engine = DebriefEngine::new_with_monitoring(pipeline, monitor_enabled);

    let output_path = engine.run().await?;
    tracing::info!("✅ Debrief completed successfully!");
    println!("✅ Debrief completed successfully!");
    println!("📁 Output saved to: {}", output_path);
    Ok(0)
}

fn strategy(config: &TomlConfig) -> Result<i32> {
    let scenario = config.scenario();
    let mut engine = match config.simulation.seed {
        Some(seed) => DecisionEngine::with_seed(scenario, seed),
        None => DecisionEngine::new(scenario),
    };

    let w = engine.dynamic_weights();
    println!(
        "Weights: time {:.2} | risk {:.2} | traffic {:.2} | flexibility {:.2}",
        w.alpha_1, w.alpha_2, w.alpha_3, w.alpha_4
    );

    let ranked = engine.generate_optimal_strategies(config.simulation.candidates)?;
    for (i, s) in ranked.iter().enumerate() {
        println!(
            "{}. {:<32} utility {:>6.3} | {:>8.1}s | risk {:>5.1}% | traffic {:>4.1} | flex {:>4.1}",
            i + 1,
            s.name,
            s.utility_score,
            s.c1_time,
            s.c2_risk,
            s.c3_traffic,
            s.c4_flex
        );
    }
    Ok(0)
}

fn simulate(config: &TomlConfig) -> Result<i32> {
    let sim = &config.simulation;
    let mut oracle = match sim.seed {
        Some(seed) => StrategyOracle::with_seed(seed),
        None => StrategyOracle::new(),
    };

    tracing::info!("Running {} simulations over {} laps", sim.runs, sim.total_laps);
    let results = oracle.monte_carlo(&sim.plans, sim.runs, sim.total_laps)?;
    for r in &results {
        println!(
            "{} {:<20} mean {:>8.2}s | p25 {:>8.2}s | p75 {:>8.2}s | sd {:>5.2}s",
            if r.is_recommended { "⭐" } else { "  " },
            r.name,
            r.mean_time,
            r.p25,
            r.p75,
            r.std_dev
        );
    }
    Ok(0)
}

async fn load_session(config: &TomlConfig) -> Result<Session> {
    let mut store = SessionStore::new(LocalStorage::new(config.session.cache_dir.as_str()));
    let message = store.load_session(&config.session_key()).await?;
    println!("{}", message);
    store.into_session().ok_or(ApexError::SessionNotLoaded)
}

async fn train(config: &TomlConfig, curve_laps: usize) -> Result<i32> {
    let session = load_session(config).await?;
    let mut model = TyreDegradationModel::new();
    let rmse = model.train(&session.laps)?;
    println!("Tyre model trained, hold-out RMSE {:.3}s", rmse);

    for compound in Compound::DRY {
        let curve = model.predict_wear_curve(compound, curve_laps);
        println!(
            "{} {:<6} {:+.2}s over {} laps",
            compound.icon(),
            compound.as_str(),
            wear_delta(&curve),
            curve_laps
        );
    }
    Ok(0)
}

async fn cluster(config: &TomlConfig, driver: Option<&str>) -> Result<i32> {
    let session = load_session(config).await?;
    match driver {
        Some(d) => {
            for lap in cluster_laps(&session.laps.pick_driver(d))? {
                println!("Lap {:>3} {:>9.3}s {}", lap.lap_number, lap.lap_time, lap.lap_type);
            }
        }
        None => {
            for style in profile_driver_styles(&session)? {
                println!(
                    "{:<4} throttle {:>5.1}% | braking {:>5.2}G | {}",
                    style.driver, style.throttle_aggression, style.braking_force, style.style
                );
            }
        }
    }
    Ok(0)
}
