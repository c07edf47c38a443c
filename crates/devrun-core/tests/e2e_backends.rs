//! End-to-end lifecycle tests against a real container engine.
//!
//! Requires Docker or Podman and a locally present image. Tests are
//! `#[ignore]` and run explicitly:
//!
//! ```text
//! DEVRUN_TEST_BACKEND=podman DEVRUN_TEST_IMAGE=alpine:3 cargo test -p devrun-core -- --ignored
//! ```

use devrun_config::GlobalConfig;
use devrun_core::{plan_run, DevProject, DevRunner, RunOptions};
use devrun_provider::{create_manager, ProviderError};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn test_backend() -> String {
    std::env::var("DEVRUN_TEST_BACKEND").unwrap_or_else(|_| "docker".to_string())
}

fn test_image() -> String {
    std::env::var("DEVRUN_TEST_IMAGE").unwrap_or_else(|_| "alpine:latest".to_string())
}

/// Connect to the selected engine, or `None` when it is unavailable
async fn get_test_runner() -> Option<DevRunner> {
    let manager = create_manager(&test_backend(), &GlobalConfig::default()).ok()?;
    match DevRunner::connect(manager, &CancellationToken::new()).await {
        Ok(runner) => Some(runner),
        Err(e) => {
            eprintln!("Skipping test: runtime unavailable: {}", e);
            None
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_e2e_run_logs_stop() {
    let Some(runner) = get_test_runner().await else {
        return;
    };
    let cancel = CancellationToken::new();
    let image = test_image();

    match runner.image_labels(&image, &cancel).await {
        Err(devrun_core::CoreError::Provider(ProviderError::ImageNotFound(_))) => {
            eprintln!("Skipping test: image {} not present", image);
            return;
        }
        other => {
            other.expect("labels should be readable");
        }
    }

    let tmp = TempDir::new().expect("temp dir");
    let work_dir = tmp.path().join(format!("e2e{}", std::process::id()));
    let home_dir = tmp.path().join("home");
    std::fs::create_dir_all(&work_dir).unwrap();
    std::fs::create_dir_all(&home_dir).unwrap();

    let project = DevProject::new(&image, &work_dir).unwrap();
    let options = RunOptions {
        home_dir: home_dir.clone(),
        user: "user".to_string(),
        host: "127.0.0.1".to_string(),
        ssh_port: 2221,
        network: "host".to_string(),
        interactive: false,
        env: Vec::new(),
        engine_socket: Some(home_dir.join("engine.sock")),
    };
    let request = plan_run(&project, &options).unwrap();

    runner.run(&request, &cancel).await.expect("run should succeed");

    // a second run with the same name must not replace the first container
    let conflict = runner.run(&request, &cancel).await.unwrap_err();
    assert!(
        matches!(
            conflict,
            devrun_core::CoreError::Provider(ProviderError::NameConflict(_))
        ),
        "unexpected error: {}",
        conflict
    );

    let mut sink: Vec<u8> = Vec::new();
    runner
        .logs(&project, &mut sink, &cancel)
        .await
        .expect("logs should succeed");

    runner.stop(&project, &cancel).await.expect("stop should succeed");

    // gone from the inventory: a second stop cannot find it
    let err = runner.stop(&project, &cancel).await.unwrap_err();
    assert!(
        matches!(
            err,
            devrun_core::CoreError::Provider(ProviderError::ContainerNotFound(_))
        ),
        "unexpected error: {}",
        err
    );
}

#[tokio::test]
#[ignore]
async fn test_e2e_unknown_image_labels() {
    let Some(runner) = get_test_runner().await else {
        return;
    };
    let err = runner
        .image_labels("devrun-missing-image:none", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        devrun_core::CoreError::Provider(ProviderError::ImageNotFound(_))
    ));
}
