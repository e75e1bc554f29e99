use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn packmill() -> Command {
    Command::cargo_bin("packmill").expect("packmill binary")
}

#[test]
fn init_scaffolds_a_runnable_project() {
    let dir = TempDir::new().unwrap();

    packmill()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("config.json"));

    assert!(dir.path().join("config.json").exists());
    assert!(dir.path().join("packs/resources").is_dir());
    assert!(dir.path().join(".gitignore").exists());
}

#[test]
fn init_refuses_to_overwrite_an_existing_project() {
    let dir = TempDir::new().unwrap();

    packmill().current_dir(dir.path()).arg("init").assert().success();
    packmill()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("already exists"));
}

#[test]
fn run_builds_and_exports_the_default_profile() {
    let dir = TempDir::new().unwrap();
    packmill().current_dir(dir.path()).arg("init").assert().success();
    std::fs::write(dir.path().join("packs/resources/tex.png"), "png").unwrap();

    packmill()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(contains("Built profile 'default'"));

    let name = dir
        .path()
        .canonicalize()
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(dir
        .path()
        .join("build")
        .join(&name)
        .join("resources/tex.png")
        .exists());
}

#[test]
fn run_outside_a_project_fails_with_a_useful_message() {
    let dir = TempDir::new().unwrap();
    packmill()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("failed to load project"));
}

#[test]
fn run_with_unknown_profile_fails() {
    let dir = TempDir::new().unwrap();
    packmill().current_dir(dir.path()).arg("init").assert().success();

    packmill()
        .current_dir(dir.path())
        .args(["run", "--profile", "release"])
        .assert()
        .failure()
        .stderr(contains("release"));
}
