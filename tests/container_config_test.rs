use apexbrain::utils::validation::Validate;
use apexbrain::TomlConfig;
use std::path::Path;

fn repo_file(name: &str) -> String {
    std::fs::read_to_string(Path::new(env!("CARGO_MANIFEST_DIR")).join(name)).unwrap()
}

#[test]
fn test_dockerfile_exposes_only_app_port() {
    let dockerfile = repo_file("Dockerfile");
    let exposed: Vec<&str> = dockerfile
        .lines()
        .filter(|l| l.trim_start().starts_with("EXPOSE"))
        .collect();
    assert_eq!(exposed, vec!["EXPOSE 8501"]);
}

#[test]
fn test_dockerfile_healthcheck_and_stages() {
    let dockerfile = repo_file("Dockerfile");
    assert_eq!(dockerfile.matches("HEALTHCHECK").count(), 1);
    assert!(dockerfile.contains("http://localhost:8501/_stcore/health"));
    assert_eq!(
        dockerfile.lines().filter(|l| l.starts_with("FROM ")).count(),
        2
    );
    assert!(dockerfile.lines().any(|l| l.starts_with("USER ") && !l.contains("root")));
    assert!(dockerfile.contains("mkdir -p /app/cache"));
    assert!(dockerfile.lines().any(|l| l.starts_with("ENTRYPOINT")));
}

#[test]
fn test_launch_script_delegates_to_launcher() {
    let script = repo_file("launch.sh");
    assert!(script.starts_with("#!"));
    assert!(script.contains("apexbrain launch"));
}

#[test]
fn test_sample_config_is_valid() {
    let config = TomlConfig::from_toml_str(&repo_file("apexbrain.toml")).unwrap();
    config.validate().unwrap();

    assert_eq!(config.launcher.options.port, 8501);
    assert_eq!(config.server.port, 8501);
    assert_eq!(config.simulation.plans.len(), 2);
    assert_eq!(
        config
            .simulation
            .plans
            .iter()
            .map(|p| p.stints.iter().map(|s| s.laps).sum::<u32>())
            .collect::<Vec<_>>(),
        vec![57, 57]
    );
}
