use std::fs;
use std::path::Path;

use rlfit_core::{FitConfig, PythonConfig};
use rlfit_data::{ModelRow, ModelTable};

use crate::python::{relay_and_wait, relay_stderr};
use crate::{FitRequest, ModelBackend, ModelError, PythonBackend, EMBEDDED_DRIVER};

fn two_trials() -> ModelTable {
    ModelTable::new(vec![
        ModelRow {
            choice: "1".to_string(),
            reward: 1,
            block_label: 1,
            trial_block: 1,
            f_cor: 1,
            f_inc: 0,
            cor_option: Some(1),
            inc_option: Some(0),
        },
        ModelRow {
            choice: "2".to_string(),
            reward: 0,
            block_label: 1,
            trial_block: 2,
            f_cor: 0,
            f_inc: 1,
            cor_option: None,
            inc_option: None,
        },
    ])
}

fn req() -> FitRequest {
    FitRequest::from(&FitConfig::default())
}

/// Shell stand-in for the driver: `sh driver --data D --request R --out O`.
fn write_driver(dir: &Path, body: &str) -> std::path::PathBuf {
    let p = dir.join("driver.sh");
    fs::write(&p, body).unwrap();
    p
}

#[test]
fn embedded_driver_calls_rlssm() {
    assert!(EMBEDDED_DRIVER.contains("rlssm.RLModel_2A"));
    assert!(EMBEDDED_DRIVER.contains("--request"));
    assert!(EMBEDDED_DRIVER.contains("option ids missing (NaN)"));
}

#[test]
fn configured_interpreter_wins() {
    let b = PythonBackend::from_config(&PythonConfig {
        exe: Some("/opt/py/bin/python".to_string()),
        driver: None,
    });
    assert_eq!(b.exe(), "/opt/py/bin/python");
}

#[test]
fn empty_table_is_rejected_before_spawning() {
    let b = PythonBackend::new("/nonexistent/python");
    let err = b.fit(&ModelTable::default(), &req()).unwrap_err();
    assert!(matches!(err, ModelError::EmptyData));
}

#[test]
fn missing_interpreter_is_spawn_error() {
    let b = PythonBackend::new("/nonexistent/rlfit-python");
    let err = b.fit(&two_trials(), &req()).unwrap_err();
    match err {
        ModelError::Spawn { program, .. } => assert_eq!(program, "/nonexistent/rlfit-python"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
#[cfg(unix)]
fn driver_receives_table_and_request_and_returns_summary() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen");
    fs::create_dir_all(&seen).unwrap();
    let driver = write_driver(
        dir.path(),
        &format!(
            "cp \"$2\" '{seen}/data.csv'\ncp \"$4\" '{seen}/request.json'\nprintf 'fit summary ok\\n' > \"$6\"\n",
            seen = seen.display()
        ),
    );

    let b = PythonBackend::new("sh").with_driver(&driver);
    let res = b.fit(&two_trials(), &req()).unwrap();
    assert_eq!(res.to_string(), "fit summary ok");
    assert_eq!(res.backend, "rlssm-python");

    let data = fs::read_to_string(seen.join("data.csv")).unwrap();
    let lines: Vec<&str> = data.lines().collect();
    assert_eq!(
        lines[0],
        "choice,reward,block_label,trial_block,f_cor,f_inc,cor_option,inc_option"
    );
    assert_eq!(lines[1], "1,1,1,1,1,0,1,0");
    assert_eq!(lines[2], "2,0,1,2,0,1,,");

    let sent: FitRequest =
        serde_json::from_slice(&fs::read(seen.join("request.json")).unwrap()).unwrap();
    assert_eq!(sent, req());
}

#[test]
#[cfg(unix)]
fn failing_driver_reports_status_and_stderr_tail() {
    let dir = tempfile::tempdir().unwrap();
    let driver = write_driver(dir.path(), "echo 'sampler exploded' 1>&2\nexit 3\n");

    let b = PythonBackend::new("sh").with_driver(&driver);
    let err = b.fit(&two_trials(), &req()).unwrap_err();
    match &err {
        ModelError::Failed {
            status,
            stderr_tail,
        } => {
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr_tail.as_deref(), Some("sampler exploded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("sampler exploded"));
}

#[test]
#[cfg(unix)]
fn silent_success_without_summary_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let driver = write_driver(dir.path(), "exit 0\n");

    let b = PythonBackend::new("sh").with_driver(&driver);
    let err = b.fit(&two_trials(), &req()).unwrap_err();
    assert!(matches!(err, ModelError::MissingSummary));
}

#[test]
fn relay_keeps_only_the_tail() {
    let input = b"line one\nline two\nline three\n";
    let mut sink = Vec::new();
    let tail = relay_stderr(&input[..], &mut sink, 11).unwrap();
    assert_eq!(sink, input.to_vec());
    assert_eq!(tail, "line three\n");
}

struct BrokenPipe;

impl std::io::Read for BrokenPipe {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stderr pipe broke"))
    }
}

#[test]
#[cfg(unix)]
fn child_is_reaped_when_stderr_relay_fails() {
    let mut child = std::process::Command::new("sh")
        .arg("-c")
        .arg("exit 0")
        .spawn()
        .unwrap();
    let err = relay_and_wait(&mut child, Some(BrokenPipe), 64).unwrap_err();
    assert!(matches!(err, ModelError::Io(_)), "{err:?}");
    // Already waited on: the exit status is cached.
    let status = child.try_wait().unwrap().expect("child reaped");
    assert!(status.success());
}
