// Integration tests for the `cartons` binary: exit codes, stdout JSON, written files.
//
// Run with: cargo test -p cartons-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

fn cartons() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cartons"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    cartons().args(args).output().expect("spawn cartons")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

const CONFIG: &str = r#"
name = "cli test"

[defaults]
bands = ["g_mag", "r_mag"]
identity_fields = ["catalogid"]
priority_range = { min = 0, max = 10 }
placeholder_sentinel = 99.9
transform_coefficients = { g_to_r = 0.9 }

[defaults.band_ranges]
g_mag = { min = 10.0, max = 20.0 }
r_mag = { min = 10.0, max = 20.0 }

[targetdb]
file = "targets.csv"
key_column = "catalogid"

[cartons.bhm_rm_core]
file = "bhm_rm_core.csv"
"#;

const TARGETS: &str = "catalogid\n1\n2\n2\n";

const CLEAN_ROWS: &str = "catalogid,g_mag,r_mag,priority\n1,15,,3\n3,12,11,4\n";

/// Lay out a config directory; returns the config path.
fn setup(dir: &Path, config: &str, rows: &str) -> String {
    write(dir, "targets.csv", TARGETS);
    write(dir, "bhm_rm_core.csv", rows);
    write(dir, "inventory.toml", config)
}

// ===========================================================================
// cartons run
// ===========================================================================

#[test]
fn run_clean_carton_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), CONFIG, CLEAN_ROWS);

    let out = run(&["run", &config]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(out.stdout.is_empty(), "human mode writes nothing to stdout");
    assert!(stderr(&out).contains("bhm_rm_core: 2 entries (1 found, 1 new, 0 ambiguous)"));
}

#[test]
fn run_json_stdout_is_single_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), CONFIG, CLEAN_ROWS);

    let out = run(&["run", &config, "--json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let val: serde_json::Value = serde_json::from_slice(&out.stdout).expect("stdout must be JSON");
    assert_eq!(val["meta"]["config_name"], "cli test");
    let report = &val["reports"][0];
    assert_eq!(report["carton"], "bhm_rm_core");
    assert_eq!(report["summary"]["found"], 1);

    let r = &report["entries"][0]["magnitudes"]["r_mag"];
    assert_eq!(r["state"], "placeholder");
    assert_eq!(r["value"], 13.5);
    assert_eq!(r["origin"]["kind"], "transform");
    assert_eq!(val["failures"], serde_json::json!([]));
}

#[test]
fn run_writes_output_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), CONFIG, CLEAN_ROWS);
    let json_path = dir.path().join("run.json");
    let csv_path = dir.path().join("cartons.csv");

    let out = run(&[
        "run",
        &config,
        "--output",
        json_path.to_str().unwrap(),
        "--csv",
        csv_path.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["reports"].as_array().unwrap().len(), 1);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert!(lines[0].starts_with("carton|file|bands|entries"));
    assert!(lines[1].starts_with("bhm_rm_core|bhm_rm_core.csv|g_mag,r_mag|2|1|1|0|2|0|0|3|4|"));
}

#[test]
fn run_output_paths_from_config_are_relative_to_it() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!("{CONFIG}\n[output]\ncsv = \"summary.csv\"\ndelimiter = \";\"\n");
    let config = setup(dir.path(), &config, CLEAN_ROWS);

    let out = run(&["run", &config]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let csv = std::fs::read_to_string(dir.path().join("summary.csv")).unwrap();
    assert!(csv.starts_with("carton;file;bands;"));
}

#[test]
fn run_visualize_prints_boxed_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), CONFIG, CLEAN_ROWS);

    let out = run(&["run", &config, "--visualize"]);
    assert!(out.status.success());
    let err = stderr(&out);
    assert!(err.contains(&"#".repeat(140)));
    assert!(err.contains("CARTON DEPENDENT INFORMATION"));
    assert!(err.contains("### priority range: 3 to 4"));
    assert!(err.contains("### g_mag range: 10 to 20"));
}

#[test]
fn run_carton_failure_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    // priority column missing
    let config = setup(dir.path(), CONFIG, "catalogid,g_mag,r_mag\n1,15,14\n");

    let out = run(&["run", &config]);
    assert_eq!(out.status.code(), Some(5), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("bhm_rm_core: failed (missing_column)"));
}

#[test]
fn run_missing_carton_file_fails_only_that_carton() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!("{CONFIG}\n[cartons.mwm_wd_core]\nfile = \"absent.csv\"\n");
    let config = setup(dir.path(), &config, CLEAN_ROWS);

    let out = run(&["run", &config, "--json"]);
    assert_eq!(out.status.code(), Some(5));
    let val: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(val["meta"]["cartons_requested"], 2);
    assert_eq!(val["reports"][0]["carton"], "bhm_rm_core");
    assert_eq!(val["failures"][0]["carton"], "mwm_wd_core");
    assert_eq!(val["failures"][0]["kind"], "io");
}

#[test]
fn run_strict_exits_6_on_outliers_and_ambiguity() {
    let dir = tempfile::tempdir().unwrap();
    // catalogid 2 is ambiguous, g = 25 is an outlier
    let config = setup(dir.path(), CONFIG, "catalogid,g_mag,r_mag,priority\n2,15,14,3\n1,25,14,3\n");

    let out = run(&["run", &config]);
    assert!(out.status.success(), "not strict: {}", stderr(&out));

    let out = run(&["run", &config, "--strict"]);
    assert_eq!(out.status.code(), Some(6));
}

#[test]
fn run_bad_toml_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), "name = \"x\"\n[defaults]\nbogus = 1\n", CLEAN_ROWS);

    let out = run(&["run", &config]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("config parse error"), "{}", stderr(&out));
}

#[test]
fn run_unreadable_config_exits_4() {
    let out = run(&["run", "/nonexistent/inventory.toml"]);
    assert_eq!(out.status.code(), Some(4));
}

// ===========================================================================
// cartons validate
// ===========================================================================

#[test]
fn validate_reports_each_carton() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path(), CONFIG, CLEAN_ROWS);

    let out = run(&["validate", &config]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("carton 'bhm_rm_core': 2 band(s), 1 transform(s), identity [catalogid]"));
    assert!(err.contains("valid: inventory 'cli test' with 1 carton(s)"));
}

#[test]
fn validate_unresolvable_carton_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!("{CONFIG}\n[cartons.bad]\nbands = [\"g_mag\", \"z_mag\"]\n");
    let config = setup(dir.path(), &config, CLEAN_ROWS);

    let out = run(&["validate", &config]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("band 'z_mag' has no range"));
}

// ===========================================================================
// cartons check / select
// ===========================================================================

const CATALOG: &str = "\
carton,plan,category_label,version_pk,tag,program,mapper_label
bhm_rm_core,0.5.0,science,83,0.5.0,bhm_rm,BHM
bhm_rm_core,1.0.0,science,120,1.0.0,bhm_rm,BHM
mwm_wd_core,1.0.0,science,120,1.0.0,mwm_wd,MWM
";

#[test]
fn check_all_present() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write(dir.path(), "catalog.csv", CATALOG);
    let list = write(
        dir.path(),
        "list.txt",
        "| carton | plan | category | stage | active |\n| bhm_rm_core | 1.0.0 | science | srd | y |\n",
    );

    let out = run(&["check", &list, "--catalog", &catalog]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("checked 1 carton(s): 1 found, 0 missing"));
}

#[test]
fn check_missing_suggests_alternatives_and_exits_7() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write(dir.path(), "catalog.csv", CATALOG);
    let list = write(
        dir.path(),
        "list.txt",
        "carton|plan|category|stage|active\nmwm_wd_core|0.5.0|science|open|n\n",
    );

    let out = run(&["check", &list, "--catalog", &catalog]);
    assert_eq!(out.status.code(), Some(7));
    let err = stderr(&out);
    assert!(err.contains("replace its line with one of"));
    assert!(err.contains("| mwm_wd_core | 1.0.0 |  science |   N/A |    N/A |"), "{err}");

    let out = run(&["check", &list, "--catalog", &catalog, "--json"]);
    assert_eq!(out.status.code(), Some(7));
    let val: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(val[0]["in_catalog"], false);
    assert_eq!(val[0]["alternatives"][0]["version_pk"], 120);
}

#[test]
fn select_prints_latest_versions() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write(dir.path(), "catalog.csv", CATALOG);

    let out = run(&["select", "--catalog", &catalog, "--pattern", "bhm_*"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("bhm_rm_core | 1.0.0 |"));
}

#[test]
fn select_write_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write(dir.path(), "catalog.csv", CATALOG);
    let target = write(dir.path(), "cartons.txt", "keep me\n");

    let out = run(&["select", "--catalog", &catalog, "--write", &target]);
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "keep me\n");

    let out = run(&["select", "--catalog", &catalog, "--write", &target, "--overwrite", "--force", "bhm_rm_core=83"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.contains("bhm_rm_core | 0.5.0 |"));
    assert!(written.contains("mwm_wd_core | 1.0.0 |"));
}

#[test]
fn select_single_requires_version() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write(dir.path(), "catalog.csv", CATALOG);

    let out = run(&["select", "--catalog", &catalog, "--versions", "single"]);
    assert_eq!(out.status.code(), Some(2));

    let out = run(&["select", "--catalog", &catalog, "--versions", "single", "--version", "7"]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("no carton/version_pk pairs"));
}
