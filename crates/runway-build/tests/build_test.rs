use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use runway_build::archive::{ARCHIVE_NAME, create_archive};
use runway_build::buildspec::{BuildSpecGenerator, IMAGE_DETAIL_FILE};
use runway_build::template::{SECRET_KEYS, StackParameters, StackTemplate};
use runway_core::{BuildConfig, ImageRef, ServiceConfig};
use tempfile::TempDir;

const REPO_URI: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/app-dev";

fn image() -> ImageRef {
    ImageRef::parse(REPO_URI).unwrap()
}

/// Initialize a git repo with a minimal web app and an initial commit.
fn init_git_project(dir: &Path) {
    std::fs::create_dir_all(dir.join("app")).unwrap();
    std::fs::write(dir.join("Dockerfile"), "FROM python:3.12-slim\n").unwrap();
    std::fs::write(dir.join("app/main.py"), "print('hi')\n").unwrap();
    std::fs::write(dir.join(".gitignore"), "*.log\n").unwrap();

    for args in [
        vec!["init"],
        vec!["config", "user.email", "test@test.com"],
        vec!["config", "user.name", "Test"],
        vec!["add", "."],
        vec!["commit", "-m", "init"],
    ] {
        Command::new("git")
            .args(&args)
            .current_dir(dir)
            .output()
            .unwrap();
    }
}

fn archive_entries(path: &Path) -> BTreeSet<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_owned())
        .collect()
}

// ── Template Tests ──

#[test]
fn template_without_secrets_has_no_secrets_block() {
    let service = ServiceConfig::default();
    let rendered = StackTemplate::new("app", &service, false).to_json().unwrap();

    assert!(!rendered.contains("RuntimeEnvironmentSecrets"));
    assert!(!rendered.contains("secretsArn"));
    assert!(!rendered.contains("InstanceRole"));

    let template = StackTemplate::new("app", &service, false).render();
    let vars = template["Resources"]["Service"]["Properties"]["SourceConfiguration"]
        ["ImageRepository"]["ImageConfiguration"]["RuntimeEnvironmentVariables"]
        .as_array()
        .unwrap();
    let names: Vec<&str> = vars.iter().map(|v| v["Name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["ENVIRONMENT", "PORT"]);
}

#[test]
fn template_with_secrets_binds_each_key_individually() {
    let service = ServiceConfig::default();
    let template = StackTemplate::new("app", &service, true).render();

    let secrets = template["Resources"]["Service"]["Properties"]["SourceConfiguration"]
        ["ImageRepository"]["ImageConfiguration"]["RuntimeEnvironmentSecrets"]
        .as_array()
        .unwrap();
    assert_eq!(secrets.len(), SECRET_KEYS.len());
    for (secret, key) in secrets.iter().zip(SECRET_KEYS) {
        assert_eq!(secret["Name"], key);
        assert_eq!(secret["Value"]["Fn::Sub"], format!("${{secretsArn}}:{key}::"));
    }

    assert!(template["Parameters"]["secretsArn"].is_object());
    assert_eq!(
        template["Resources"]["Service"]["Properties"]["InstanceConfiguration"]
            ["InstanceRoleArn"]["Fn::GetAtt"][0],
        "InstanceRole"
    );
}

#[test]
fn template_service_resources_are_conditional() {
    let service = ServiceConfig::default();
    let template = StackTemplate::new("app", &service, true).render();

    assert!(template["Resources"]["Repository"]["Condition"].is_null());
    for name in ["AccessRole", "InstanceRole", "Service"] {
        assert_eq!(template["Resources"][name]["Condition"], "CreateService");
    }
    assert_eq!(template["Outputs"]["ServiceUrl"]["Condition"], "CreateService");
    assert!(template["Outputs"]["RepositoryUri"]["Condition"].is_null());
    assert_eq!(template["Parameters"]["createService"]["Default"], "true");
}

#[test]
fn template_health_check_and_image_source() {
    let service = ServiceConfig {
        port: 8080,
        ..Default::default()
    };
    let template = StackTemplate::new("shop", &service, false).render();
    let props = &template["Resources"]["Service"]["Properties"];

    let health = &props["HealthCheckConfiguration"];
    assert_eq!(health["Protocol"], "HTTP");
    assert_eq!(health["Path"], "/health");
    assert_eq!(health["Interval"], 10);
    assert_eq!(health["Timeout"], 5);
    assert_eq!(health["HealthyThreshold"], 1);
    assert_eq!(health["UnhealthyThreshold"], 5);

    let image = &props["SourceConfiguration"]["ImageRepository"];
    assert_eq!(
        image["ImageIdentifier"]["Fn::Sub"],
        "${Repository.RepositoryUri}:latest"
    );
    assert_eq!(image["ImageRepositoryType"], "ECR");
    assert_eq!(image["ImageConfiguration"]["Port"], "8080");
    assert_eq!(props["ServiceName"]["Fn::Sub"], "shop-${environment}");
}

#[test]
fn template_repository_keeps_configured_image_count() {
    let service = ServiceConfig {
        image_retention: 3,
        ..Default::default()
    };
    let template = StackTemplate::new("app", &service, false).render();
    let text = template["Resources"]["Repository"]["Properties"]["LifecyclePolicy"]
        ["LifecyclePolicyText"]
        .as_str()
        .unwrap();
    let lifecycle: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(lifecycle["rules"][0]["selection"]["countNumber"], 3);
}

// ── Parameter Tests ──

#[test]
fn bootstrap_parameters_suppress_service() {
    let params = StackParameters::bootstrap("dev");
    assert_eq!(params.overrides(), vec!["environment=dev", "createService=false"]);
}

#[test]
fn full_parameters_forward_secret() {
    let params = StackParameters::full("prod", Some("arn:aws:secretsmanager:us-east-1:1:secret:db"));
    assert_eq!(
        params.overrides(),
        vec![
            "environment=prod",
            "createService=true",
            "secretsArn=arn:aws:secretsmanager:us-east-1:1:secret:db",
        ]
    );
}

#[test]
fn full_parameters_without_secret() {
    let params = StackParameters::full("dev", None);
    assert_eq!(params.overrides(), vec!["environment=dev", "createService=true"]);
}

// ── Buildspec Tests ──

#[test]
fn buildspec_has_three_phases_and_image_detail() {
    let config = BuildConfig::default();
    let image = image();
    let yaml = BuildSpecGenerator::new(&config, &image, "us-east-1")
        .render()
        .unwrap();
    let spec: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(spec["version"].as_f64(), Some(0.2));

    let commands = |phase: &str| -> Vec<String> {
        spec["phases"][phase]["commands"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap().to_owned())
            .collect()
    };

    let pre = commands("pre_build");
    assert!(pre.iter().any(|c| c.contains(
        "docker login --username AWS --password-stdin 123456789012.dkr.ecr.us-east-1.amazonaws.com"
    )));

    let build = commands("build");
    assert_eq!(
        build,
        vec![
            "docker build --platform linux/amd64 -f Dockerfile -t app-dev:latest .".to_owned(),
            format!("docker tag app-dev:latest {REPO_URI}:latest"),
        ]
    );

    let post = commands("post_build");
    assert_eq!(post[0], format!("docker push {REPO_URI}:latest"));
    assert!(post[1].contains(&format!(r#"{{"ImageURI":"{REPO_URI}:latest"}}"#)));
    assert!(post[1].ends_with(IMAGE_DETAIL_FILE));

    assert_eq!(spec["artifacts"]["files"][0].as_str(), Some(IMAGE_DETAIL_FILE));
}

#[test]
fn buildspec_uses_configured_build_inputs() {
    let config = BuildConfig {
        platform: "linux/arm64".to_owned(),
        dockerfile: "docker/Dockerfile.prod".to_owned(),
        context: "app".to_owned(),
        ..Default::default()
    };
    let image = image();
    let yaml = BuildSpecGenerator::new(&config, &image, "eu-west-1")
        .render()
        .unwrap();

    assert!(yaml.contains("docker build --platform linux/arm64 -f docker/Dockerfile.prod -t app-dev:latest app"));
    assert!(yaml.contains("--region eu-west-1"));
}

// ── Archive Tests ──

#[test]
fn archive_contains_git_files_and_respects_gitignore() {
    let project = TempDir::new().unwrap();
    init_git_project(project.path());

    // Untracked but not ignored → included
    std::fs::write(project.path().join("app/new.py"), "x = 1\n").unwrap();
    // Ignored → excluded
    std::fs::write(project.path().join("debug.log"), "noise").unwrap();
    // Cache dir, untracked and not ignored → excluded by built-in rules
    std::fs::create_dir_all(project.path().join("app/__pycache__")).unwrap();
    std::fs::write(project.path().join("app/__pycache__/main.pyc"), "bytes").unwrap();

    let out = TempDir::new().unwrap();
    let archive = create_archive(project.path(), out.path(), &[]).unwrap();

    assert_eq!(archive.path, out.path().join(ARCHIVE_NAME));
    let entries = archive_entries(&archive.path);
    assert!(entries.contains("Dockerfile"));
    assert!(entries.contains("app/main.py"));
    assert!(entries.contains("app/new.py"));
    assert!(entries.contains(".gitignore"));
    assert!(!entries.contains("debug.log"));
    assert!(!entries.iter().any(|e| e.contains("__pycache__")));
    assert!(!entries.iter().any(|e| e.starts_with(".git/")));
    assert_eq!(archive.file_count, entries.len());
}

#[test]
fn archive_keeps_non_ascii_file_names() {
    let project = TempDir::new().unwrap();
    init_git_project(project.path());
    std::fs::write(project.path().join("café.html"), "<p>menu</p>").unwrap();
    std::fs::create_dir_all(project.path().join("static/données")).unwrap();
    std::fs::write(project.path().join("static/données/prix.csv"), "1").unwrap();
    for args in [vec!["add", "."], vec!["commit", "-m", "accents"]] {
        Command::new("git")
            .args(&args)
            .current_dir(project.path())
            .output()
            .unwrap();
    }

    let out = TempDir::new().unwrap();
    let archive = create_archive(project.path(), out.path(), &[]).unwrap();
    let entries = archive_entries(&archive.path);

    assert!(entries.contains("café.html"), "entries: {entries:?}");
    assert!(entries.contains("static/données/prix.csv"), "entries: {entries:?}");
    assert_eq!(archive.file_count, entries.len());
}

#[test]
fn archive_skips_tracked_files_deleted_from_work_tree() {
    let project = TempDir::new().unwrap();
    init_git_project(project.path());
    std::fs::remove_file(project.path().join("app/main.py")).unwrap();

    let out = TempDir::new().unwrap();
    let archive = create_archive(project.path(), out.path(), &[]).unwrap();
    let entries = archive_entries(&archive.path);

    assert!(!entries.contains("app/main.py"));
    assert!(entries.contains("Dockerfile"));
}

#[test]
fn archive_walks_plain_directories() {
    let project = TempDir::new().unwrap();
    std::fs::create_dir_all(project.path().join("src")).unwrap();
    std::fs::create_dir_all(project.path().join("node_modules/left-pad")).unwrap();
    std::fs::create_dir_all(project.path().join("dist")).unwrap();
    std::fs::write(project.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    std::fs::write(project.path().join("src/index.js"), "1").unwrap();
    std::fs::write(project.path().join("node_modules/left-pad/index.js"), "1").unwrap();
    std::fs::write(project.path().join("dist/bundle.js"), "1").unwrap();

    let out = TempDir::new().unwrap();
    let archive = create_archive(project.path(), out.path(), &[]).unwrap();
    let entries = archive_entries(&archive.path);

    assert_eq!(
        entries,
        BTreeSet::from(["Dockerfile".to_owned(), "src/index.js".to_owned()])
    );
}

#[test]
fn archive_applies_extra_excludes() {
    let project = TempDir::new().unwrap();
    std::fs::create_dir_all(project.path().join("docs")).unwrap();
    std::fs::write(project.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    std::fs::write(project.path().join("docs/guide.md"), "# guide").unwrap();

    let out = TempDir::new().unwrap();
    let archive = create_archive(project.path(), out.path(), &["docs/".to_owned()]).unwrap();
    let entries = archive_entries(&archive.path);

    assert_eq!(entries, BTreeSet::from(["Dockerfile".to_owned()]));
}
