// tests/config_loading.rs

//! Loading and validating the TOML front-end, and translating it into a
//! task graph.

mod common;
use crate::common::init_tracing;

use std::io::Write;

use tempfile::NamedTempFile;

use rundag::config::load_and_validate;
use rundag::errors::RundagError;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn full_config_parses_and_builds_a_graph() {
    init_tracing();

    let file = write_config(
        r#"
[config]
concurrency = 2

[trigger]
interval_secs = 86400

[default]
retries = 1
retry_delay_ms = 300000

[task.print_date]
cmd = "date"

[task.sleep]
cmd = "sleep 5"
after = ["print_date"]
retries = 3

[task.echo_hello]
cmd = "echo \"Hello World!\""
after = ["sleep"]
"#,
    );

    let cfg = load_and_validate(file.path()).expect("config must load");
    assert_eq!(cfg.config.concurrency, 2);
    assert_eq!(cfg.trigger.map(|t| t.interval_secs), Some(86_400));

    let graph = cfg.build_graph().expect("graph must build");
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.roots(), vec!["print_date"]);
    assert_eq!(
        graph.topological_order(),
        ["print_date", "sleep", "echo_hello"]
    );

    // Per-task override wins; others inherit [default].
    let sleep = graph.get("sleep").expect("sleep task");
    assert_eq!(sleep.retry_limit, 3);
    assert_eq!(sleep.retry_delay.as_millis(), 300_000);
    let echo = graph.get("echo_hello").expect("echo task");
    assert_eq!(echo.retry_limit, 1);
}

#[test]
fn minimal_config_defaults_to_a_single_run() {
    let file = write_config(
        r#"
[task.only]
cmd = "true"
"#,
    );

    let cfg = load_and_validate(file.path()).expect("config must load");
    assert!(cfg.trigger.is_none());
    assert_eq!(cfg.config.concurrency, 4);
    let graph = cfg.build_graph().expect("graph must build");
    assert_eq!(graph.get("only").map(|t| t.retry_limit), Some(0));
}

#[test]
fn missing_tasks_are_rejected() {
    let file = write_config("[config]\nconcurrency = 1\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, RundagError::ConfigError(_)));
}

#[test]
fn unknown_dependency_is_rejected() {
    let file = write_config(
        r#"
[task.a]
cmd = "true"
after = ["ghost"]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        RundagError::ConfigError(msg) => assert!(msg.contains("ghost"), "msg was: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_rejected() {
    let file = write_config(
        r#"
[task.a]
cmd = "true"
after = ["a"]
"#,
    );
    assert!(load_and_validate(file.path()).is_err());
}

#[test]
fn dependency_cycles_surface_from_the_graph_builder() {
    let file = write_config(
        r#"
[task.a]
cmd = "true"
after = ["b"]

[task.b]
cmd = "true"
after = ["a"]
"#,
    );
    let cfg = load_and_validate(file.path()).expect("file-level checks pass");
    let err = cfg.build_graph().unwrap_err();
    assert!(matches!(err, RundagError::Cycle { .. }));
}

#[test]
fn zero_concurrency_is_rejected() {
    let file = write_config(
        r#"
[config]
concurrency = 0

[task.a]
cmd = "true"
"#,
    );
    assert!(load_and_validate(file.path()).is_err());
}

#[test]
fn zero_interval_is_rejected() {
    let file = write_config(
        r#"
[trigger]
interval_secs = 0

[task.a]
cmd = "true"
"#,
    );
    assert!(load_and_validate(file.path()).is_err());
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let file = write_config("this is not toml [");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, RundagError::TomlError(_)));
}
