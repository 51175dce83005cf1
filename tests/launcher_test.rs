use apexbrain::launcher::{DockerCli, LaunchOptions, Launcher};
use apexbrain::ApexError;
use tempfile::TempDir;

#[tokio::test]
async fn test_missing_engine_binary_is_unavailable() {
    let launcher = Launcher::new(
        DockerCli::new("/nonexistent/apexbrain-docker"),
        LaunchOptions::default(),
    );

    let err = launcher.launch().await.unwrap_err();
    assert!(matches!(err, ApexError::EngineUnavailable { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[cfg(unix)]
mod fake_engine {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Shell stand-in for the docker CLI that records each invocation.
    fn fake_docker(dir: &Path, info_status: i32, run_status: i32) -> (PathBuf, PathBuf) {
        let log = dir.join("calls.log");
        let script = dir.join("docker");
        let body = format!(
            "#!/bin/sh\necho \"$@\" >> '{log}'\ncase \"$1\" in\n  info) exit {info} ;;\n  run) exit {run} ;;\nesac\nexit 0\n",
            log = log.display(),
            info = info_status,
            run = run_status
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[tokio::test]
    async fn test_engine_down_never_builds() {
        let dir = TempDir::new().unwrap();
        let (script, log) = fake_docker(dir.path(), 1, 0);

        let launcher = Launcher::new(DockerCli::new(script.to_str().unwrap()), LaunchOptions::default());
        let err = launcher.launch().await.unwrap_err();
        assert_eq!(err.exit_code(), 1);

        let calls = std::fs::read_to_string(log).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["info"]);
    }

    #[tokio::test]
    async fn test_build_then_run_with_runtime_status() {
        let dir = TempDir::new().unwrap();
        let (script, log) = fake_docker(dir.path(), 0, 7);

        let launcher = Launcher::new(DockerCli::new(script.to_str().unwrap()), LaunchOptions::default());
        let status = launcher.launch().await.unwrap();
        assert_eq!(status, 7);

        let calls = std::fs::read_to_string(log).unwrap();
        assert_eq!(
            calls.lines().collect::<Vec<_>>(),
            vec!["info", "build -t apexbrain .", "run --rm -p 8501:8501 apexbrain"]
        );
    }
}
