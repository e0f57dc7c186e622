//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and check the behavior of the
//! `validate` subcommand from a user's perspective.

mod common;

use common::prelude::*;

#[test]
fn test_validate_valid_project() {
    let fixture = TestFixture::new().with_project(projects::LAYERED);

    fixture
        .command()
        .args(["validate", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Project file parsed successfully"))
        .stdout(predicate::str::contains("Modules: 3"))
        .stdout(predicate::str::contains("SDKs: 1"))
        .stdout(predicate::str::contains("[OK] Project file is valid"));
}

#[test]
fn test_validate_explicit_project_path() {
    let fixture = TestFixture::new().with_file("config/project.yaml", projects::MINIMAL);

    fixture
        .command()
        .arg("validate")
        .arg("--project")
        .arg(fixture.child("config/project.yaml").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Modules: 1"));
}

#[test]
fn test_validate_missing_file() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Project file not found"))
        .stderr(predicate::str::contains("Project file parsing failed"));
}

#[test]
fn test_validate_invalid_yaml() {
    let fixture = TestFixture::new().with_project(projects::INVALID_YAML);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project file parsing failed"));
}

#[test]
fn test_validate_duplicate_module_names() {
    let fixture = TestFixture::new().with_project(
        r#"
name: duplicates
modules:
  - name: app
  - name: app
"#,
    );

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Module with name 'app' already exists"));
}

#[test]
fn test_validate_dangling_library_warns() {
    let fixture = TestFixture::new().with_project(projects::DANGLING);

    fixture
        .command()
        .args(["validate", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unresolved dependency 'missing'"))
        .stdout(predicate::str::contains("Project file is valid but has warnings"));
}

#[test]
fn test_validate_strict_fails_on_warnings() {
    let fixture = TestFixture::new().with_project(projects::DANGLING);

    fixture
        .command()
        .args(["validate", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn test_validate_reports_unknown_features() {
    let fixture = TestFixture::new().with_project(projects::WITH_UNKNOWN);

    fixture
        .command()
        .args(["validate", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'kotlin'"))
        .stdout(predicate::str::contains("'gradle-sync'"));
}

#[test]
fn test_validate_reports_cycles() {
    let fixture = TestFixture::new().with_project(
        r#"
name: cyclic
modules:
  - name: a
    roots:
      layers:
        - name: Default
          children:
            - order-entry: { type: module-source }
            - order-entry: { type: module, name: b }
  - name: b
    roots:
      layers:
        - name: Default
          children:
            - order-entry: { type: module-source }
            - order-entry: { type: module, name: a }
"#,
    );

    fixture
        .command()
        .args(["validate", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Circular module dependency: a <-> b"));
}

#[test]
fn test_validate_invalid_url() {
    let fixture = TestFixture::new().with_project(
        r#"
name: bad-url
modules:
  - name: app
    dir: "not a url"
"#,
    );

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid URL 'not a url'"));
}

#[test]
fn test_validate_project_from_environment() {
    let fixture = TestFixture::new().with_file("other.yaml", projects::MINIMAL);

    fixture
        .command()
        .env("MODULE_ROOTS_PROJECT", "other.yaml")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("other.yaml"));
}
