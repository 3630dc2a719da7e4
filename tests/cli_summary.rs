use std::fs;

use predicates::prelude::*;

const MANIFEST: &str = "\
Chapter Number\tChapter Title\tModule Title\tModule ID
1\tMotion\t1.1 Speed\ts1
1\tMotion\t1.2 Velocity\t
2\tForces\t2.1 Newton\ts3
3\tReview\t3.1 Problems\ts4
";

const SETTINGS: &str = "\
logfile: copy.log
chapter_number_column: Chapter Number
chapter_title_column: Chapter Title
module_title_column: Module Title
source_module_ID_column: Module ID
destination_module_ID_column: Destination Module ID
destination_workgroup_column: Destination Workgroup
unit_number_column: Unit Number
unit_title_column: Unit Title
strip_section_numbers: true
source_server: legacy.example.org
destination_server: https://dest.example.org/
destination_credentials: editor:secret
authors: [alice]
maintainers: [alice]
rightsholders: [rice]
";

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    fs::write(dir.path().join("settings.yaml"), SETTINGS).expect("write settings");
    fs::write(dir.path().join("Physics.tsv"), MANIFEST).expect("write manifest");
    dir
}

fn command(dir: &tempfile::TempDir, subcommand: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("content-copy");
    cmd.current_dir(dir.path()).args([
        subcommand,
        "--settings",
        "settings.yaml",
        "--input",
        "Physics.tsv",
    ]);
    cmd
}

#[test]
fn summary_lists_the_plan_without_the_password() {
    let dir = workspace();
    command(&dir, "summary")
        .args(["--copy", "--roles", "--exclude", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source: http://legacy.example.org\n"))
        .stdout(predicate::str::contains("Destination: https://dest.example.org\n"))
        .stdout(predicate::str::contains("User: editor\n"))
        .stdout(predicate::str::contains("Content: Physics\n"))
        .stdout(predicate::str::contains("Which Chapters: 1, 2\n"))
        .stdout(predicate::str::contains("Number of Modules: 3\n"))
        .stdout(predicate::str::contains("Authors: alice\n"))
        .stdout(predicate::str::contains(
            "missing source module ID for module [Velocity] - the module after [Speed]",
        ))
        .stdout(predicate::str::contains("secret").not());
}

#[test]
fn summary_honours_explicit_chapter_order() {
    let dir = workspace();
    command(&dir, "summary")
        .args(["--modules", "--chapters", "3,1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Which Chapters: 3, 1\n"))
        .stdout(predicate::str::contains("Number of Modules: 3\n"))
        .stdout(predicate::str::contains("warning").not());
}

#[test]
fn run_without_any_phase_is_rejected() {
    let dir = workspace();
    command(&dir, "run")
        .arg("--yes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to do"));
}

#[test]
fn roles_without_copy_is_a_usage_error() {
    let dir = workspace();
    command(&dir, "run")
        .args(["--yes", "--roles"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--copy"));
}

#[test]
fn missing_settings_file_is_reported() {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    command(&dir, "summary")
        .arg("--modules")
        .assert()
        .failure()
        .stderr(predicate::str::contains("load settings"));
}
