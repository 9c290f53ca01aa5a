use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn runway() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("runway");
    // Keep the invoking shell's region and secrets out of the tests.
    cmd.env_remove("AWS_REGION").env_remove("SECRETS_ARN");
    cmd
}

// ── Help / Version ──

#[test]
fn shows_help() {
    runway()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deploy containerized web apps to AWS App Runner"));
}

#[test]
fn shows_version() {
    runway()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("runway"));
}

#[test]
fn deploy_help_lists_options() {
    runway()
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--strategy"))
        .stdout(predicate::str::contains("--secrets-arn"))
        .stdout(predicate::str::contains("SECRETS_ARN"));
}

// ── Environment validation ──

#[test]
fn deploy_rejects_invalid_environment_before_any_aws_call() {
    let tmp = TempDir::new().unwrap();

    runway()
        .current_dir(tmp.path())
        // An unusable PATH would make any aws/docker spawn fail differently.
        .env("PATH", "")
        .args(["deploy", "Prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid environment name"));
}

#[test]
fn deploy_rejects_overlong_names() {
    let tmp = TempDir::new().unwrap();
    let name = format!("env{}", "x".repeat(40));

    runway()
        .current_dir(tmp.path())
        .env("PATH", "")
        .args(["deploy", &name])
        .assert()
        .failure()
        .stderr(predicate::str::contains("App Runner allows at most 40"));
}

#[test]
fn deploy_rejects_unknown_strategy() {
    runway()
        .args(["deploy", "dev", "--strategy", "cloud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy"));
}

#[test]
fn status_rejects_trailing_hyphen() {
    let tmp = TempDir::new().unwrap();

    runway()
        .current_dir(tmp.path())
        .env("PATH", "")
        .args(["status", "dev-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not end with '-'"));
}

// ── Template ──

#[test]
fn template_prints_cloudformation_json() {
    let tmp = TempDir::new().unwrap();

    let output = runway()
        .current_dir(tmp.path())
        .arg("template")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let template: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(template["Parameters"]["createService"]["Default"], "true");
    assert!(template["Parameters"]["secretsArn"].is_null());
    assert_eq!(
        template["Resources"]["Service"]["Properties"]["ServiceName"]["Fn::Sub"],
        "app-${environment}"
    );
}

#[test]
fn template_uses_runway_toml() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("runway.toml"),
        "[project]\nname = \"shop\"\n\n[service]\nport = 3000\n",
    )
    .unwrap();

    runway()
        .current_dir(tmp.path())
        .args(["template", "--secrets-arn", "arn:aws:secretsmanager:us-east-1:1:secret:db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shop-${environment}"))
        .stdout(predicate::str::contains("\"3000\""))
        .stdout(predicate::str::contains("RuntimeEnvironmentSecrets"));
}

#[test]
fn template_reports_broken_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("runway.toml"), "[project\nname = ").unwrap();

    runway()
        .current_dir(tmp.path())
        .arg("template")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}
