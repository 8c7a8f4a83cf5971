// tests/config_loading.rs

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use stackrun::config::{config_root_dir, load_and_validate, ConfigFile};
use stackrun::errors::StackrunError;
use stackrun::stack::select_stacks;
use stackrun::types::{FailurePolicy, ReportFailureMode};
use stackrun_test_utils::builders::ConfigFileBuilder;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn load_str(toml: &str) -> Result<ConfigFile, StackrunError> {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("Stackrun.toml");
    std::fs::write(&path, toml).expect("write manifest");
    load_and_validate(&path)
}

fn config_error(toml: &str) -> String {
    match load_str(toml) {
        Err(StackrunError::ConfigError(msg)) => msg,
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn minimal_manifest_gets_defaults() -> TestResult {
    let cfg = load_str(
        r#"
[stack.app]
path = "stacks/app"
"#,
    )?;

    assert_eq!(cfg.run.interrupt_limit, 3);
    assert_eq!(cfg.run.kill_after, None);
    assert_eq!(cfg.run.on_stack_failure, FailurePolicy::Abort);
    assert!(cfg.cloud.is_none());
    assert_eq!(cfg.stack["app"].id, None);
    Ok(())
}

#[test]
fn full_manifest_is_parsed() -> TestResult {
    let cfg = load_str(
        r#"
[run]
interrupt_limit = 5
kill_after = "30s"
on_stack_failure = "continue"

[cloud]
base_url = "https://api.example.com/"
org_id = " org-1 "
max_attempts = 4
retry_delay = "1s"
on_report_failure = "fail"
token_env = "MY_TOKEN"

[stack.app]
path = "stacks/app"
id = "app-id"
"#,
    )?;

    assert_eq!(cfg.run.interrupt_limit, 5);
    assert_eq!(cfg.run.kill_after, Some(Duration::from_secs(30)));
    assert_eq!(cfg.run.on_stack_failure, FailurePolicy::Continue);
    let escalation = cfg.run.escalation_policy();
    assert_eq!(escalation.interrupt_limit, 5);

    let cloud = cfg.cloud.expect("cloud section");
    assert_eq!(cloud.org_id, "org-1");
    assert_eq!(cloud.token_env, "MY_TOKEN");
    assert_eq!(cloud.report.max_attempts, 4);
    assert_eq!(cloud.report.retry_delay, Duration::from_secs(1));
    assert_eq!(cloud.report.on_failure, ReportFailureMode::Fail);
    assert_eq!(cfg.stack["app"].id.as_deref(), Some("app-id"));
    Ok(())
}

#[test]
fn manifest_without_stacks_is_rejected() {
    let msg = config_error("[run]\ninterrupt_limit = 2\n");
    assert!(msg.contains("at least one"), "{msg}");
}

#[test]
fn bad_values_are_reported_by_key() {
    let cases = [
        ("[run]\ninterrupt_limit = 0\n", "[run].interrupt_limit"),
        ("[run]\nkill_after = \"soon\"\n", "[run].kill_after"),
        ("[run]\nkill_after = \"400000000000000000m\"\n", "[run].kill_after"),
        ("[run]\nkill_after = \"25h\"\n", "[run].kill_after"),
        (
            "[cloud]\nbase_url = \"http://x\"\norg_id = \"o\"\nretry_delay = \"2h\"\n",
            "[cloud].retry_delay",
        ),
        (
            "[cloud]\nbase_url = \"ftp://x\"\norg_id = \"o\"\n",
            "[cloud].base_url",
        ),
        (
            "[cloud]\nbase_url = \"http://x\"\norg_id = \"  \"\n",
            "[cloud].org_id",
        ),
        (
            "[cloud]\nbase_url = \"http://x\"\norg_id = \"o\"\nretry_delay = \"5\"\n",
            "[cloud].retry_delay",
        ),
    ];

    for (section, key) in cases {
        let toml = format!("{section}\n[stack.app]\npath = \"app\"\n");
        let msg = config_error(&toml);
        assert!(msg.contains(key), "expected '{key}' in '{msg}'");
    }
}

#[test]
fn stack_paths_must_be_relative_and_unique() {
    let msg = config_error("[stack.a]\npath = \"/abs\"\n");
    assert!(msg.contains("must be relative"), "{msg}");

    let msg = config_error("[stack.a]\npath = \"x\"\n[stack.b]\npath = \"./x/\"\n");
    assert!(msg.contains("reuses path"), "{msg}");

    let msg = config_error("[stack.a]\npath = \" \"\n");
    assert!(msg.contains("empty `path`"), "{msg}");
}

#[test]
fn unknown_policy_value_is_a_toml_error() {
    let err = load_str("[run]\non_stack_failure = \"retry\"\n[stack.a]\npath = \"a\"\n")
        .expect_err("invalid enum");
    assert!(matches!(err, StackrunError::TomlError(_)), "{err:?}");
}

#[test]
fn selection_is_sorted_by_path_and_resolved_against_root() {
    let cfg = ConfigFileBuilder::new()
        .with_stack("zeta", "a/first", Some("z"))
        .with_stack("alpha", "b/second", None)
        .with_stack("mid", "./a/second", None)
        .build();

    let stacks = select_stacks(&cfg, Path::new("/repo"));
    let names: Vec<&str> = stacks.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "mid", "alpha"]);
    assert_eq!(stacks[1].path, Path::new("/repo/a/second"));
    assert_eq!(stacks[0].remote_id(), Some("z"));
}

#[test]
fn builder_settings_reach_the_validated_config() {
    let cfg = ConfigFileBuilder::new()
        .with_stack("app", "app", Some("app-id"))
        .with_interrupt_limit(5)
        .with_kill_after("1500ms")
        .with_cloud("http://127.0.0.1:9", "org-9")
        .build();

    let policy = cfg.run.escalation_policy();
    assert_eq!(policy.interrupt_limit, 5);
    assert_eq!(policy.kill_after, Some(Duration::from_millis(1500)));

    let cloud = cfg.cloud.expect("cloud section");
    assert_eq!(cloud.org_id, "org-9");
    assert_eq!(cloud.report.retry_delay, Duration::from_millis(10));
}

#[test]
fn conversion_from_raw_applies_the_same_checks() {
    let cases = [
        (ConfigFileBuilder::new().with_interrupt_limit(0), "[run].interrupt_limit"),
        (ConfigFileBuilder::new().with_kill_after("soon"), "[run].kill_after"),
        (ConfigFileBuilder::new().with_kill_after("25h"), "[run].kill_after"),
        (ConfigFileBuilder::new().with_cloud("", "org-9"), "[cloud].base_url"),
    ];

    for (builder, key) in cases {
        let raw = builder.with_stack("app", "app", None).raw();
        match ConfigFile::try_from(raw) {
            Err(StackrunError::ConfigError(msg)) => assert!(msg.contains(key), "{key}: {msg}"),
            other => panic!("{key}: expected ConfigError, got {other:?}"),
        }
    }
}

#[test]
fn root_dir_is_the_manifest_parent() {
    assert_eq!(
        config_root_dir(Path::new("infra/Stackrun.toml")),
        Path::new("infra")
    );
    assert_eq!(
        config_root_dir(Path::new("Stackrun.toml")),
        std::env::current_dir().unwrap()
    );
}
