//! `cartons run` / `cartons validate`: config-driven carton inventory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cartons_inventory::load::load_csv_rows;
use cartons_inventory::model::{CartonFailure, InventoryInput, InventoryRun};
use cartons_inventory::{InventoryConfig, InventoryError, TargetSnapshot};

use crate::exit_codes::{EXIT_CARTON_FAILURES, EXIT_STRICT_FLAGS};
use crate::export::summary_csv;
use crate::report::{BoxReport, DEFAULT_WIDTH};
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub visualize: bool,
    pub strict: bool,
}

fn load_config(config_path: &Path) -> Result<InventoryConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| CliError::io(format!("cannot read config: {e}")))?;
    InventoryConfig::from_toml(&config_str).map_err(|e| CliError::config(e.to_string()))
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

/// Input file for a carton: its `file` setting, else `<carton>.csv`.
fn carton_file(config: &InventoryConfig, carton: &str) -> String {
    config
        .cartons
        .get(carton)
        .and_then(|s| s.file.clone())
        .unwrap_or_else(|| format!("{carton}.csv"))
}

fn load_snapshot(config: &InventoryConfig, base_dir: &Path) -> Result<TargetSnapshot, CliError> {
    let Some(ref db) = config.targetdb else {
        log::warn!("no [targetdb] configured; every entry will be reported as new");
        return Ok(TargetSnapshot::default());
    };
    let path = base_dir.join(&db.file);
    let csv_data = std::fs::read_to_string(&path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    let snapshot = TargetSnapshot::from_csv(&csv_data, &db.key_column)
        .map_err(|e| CliError::io(e.to_string()))?;
    log::info!("loaded {} target records from {}", snapshot.len(), path.display());
    Ok(snapshot)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let base_dir = base_dir(&args.config);

    if config.cartons.is_empty() {
        return Err(CliError::config("config names no cartons")
            .with_hint("add a [cartons.<name>] table per carton to process"));
    }

    let snapshot = load_snapshot(&config, base_dir)?;

    // Unreadable carton files fail only that carton
    let mut rows = BTreeMap::new();
    let mut load_failures = Vec::new();
    for carton in config.carton_names() {
        let path = base_dir.join(carton_file(&config, carton));
        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| InventoryError::Io(format!("cannot read {}: {e}", path.display())))
            .and_then(|data| load_csv_rows(carton, &data));
        match loaded {
            Ok(r) => {
                rows.insert(carton.clone(), r);
            }
            Err(e) => {
                log::warn!("carton '{carton}' failed to load: {e}");
                load_failures.push(CartonFailure::new(carton, e));
            }
        }
    }

    let input = InventoryInput { rows };
    let mut result = cartons_inventory::run(&config, &input, &snapshot);
    result.meta.cartons_requested += load_failures.len();
    result.failures.extend(load_failures);
    result.failures.sort_by(|a, b| a.carton.cmp(&b.carton));

    write_outputs(&config, base_dir, &args, &result)?;

    if args.visualize {
        let mut report = BoxReport::new(DEFAULT_WIDTH);
        for r in &result.reports {
            report.carton(r);
        }
        for f in &result.failures {
            report.failure(f);
        }
        eprint!("{}", report.render());
    }

    print_summary(&result);
    exit_status(&result, args.strict)
}

fn write_outputs(
    config: &InventoryConfig,
    base_dir: &Path,
    args: &RunArgs,
    result: &InventoryRun,
) -> Result<(), CliError> {
    let json_path = args
        .output
        .clone()
        .or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    let csv_path = args
        .csv
        .clone()
        .or_else(|| config.output.csv.as_ref().map(|p| base_dir.join(p)));

    if json_path.is_some() || args.json {
        let json_str = serde_json::to_string_pretty(result)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        if let Some(ref path) = json_path {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if args.json {
            println!("{json_str}");
        }
    }

    if let Some(ref path) = csv_path {
        let csv_str = summary_csv(&result.reports, config.output.delimiter).map_err(CliError::io)?;
        std::fs::write(path, csv_str).map_err(|e| CliError::io(format!("cannot write csv: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

fn print_summary(result: &InventoryRun) {
    for r in &result.reports {
        let s = &r.summary;
        eprintln!(
            "{}: {} entries ({} found, {} new, {} ambiguous), {} with outliers, {} priority violations",
            r.carton,
            s.total_entries,
            s.found,
            s.new,
            s.ambiguous,
            s.entries_with_outliers,
            s.priority_violations,
        );
    }
    for f in &result.failures {
        eprintln!("{}: failed ({}): {}", f.carton, f.kind, f.message);
    }
    eprintln!(
        "'{}': {} carton(s), {} processed, {} failed",
        result.meta.config_name,
        result.meta.cartons_requested,
        result.reports.len(),
        result.failures.len(),
    );
}

fn exit_status(result: &InventoryRun, strict: bool) -> Result<(), CliError> {
    if !result.failures.is_empty() {
        return Err(CliError::new(
            EXIT_CARTON_FAILURES,
            format!("{} carton(s) failed", result.failures.len()),
        ));
    }
    if strict {
        let flagged = result
            .reports
            .iter()
            .any(|r| r.summary.entries_with_outliers > 0 || r.summary.ambiguous > 0);
        if flagged {
            return Err(CliError::new(EXIT_STRICT_FLAGS, "outliers or ambiguous matches found (--strict)"));
        }
    }
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let mut errors = Vec::new();
    for carton in config.carton_names() {
        match config.resolve(carton) {
            Ok(resolved) => eprintln!(
                "  carton '{}': {} band(s), {} transform(s), identity [{}]",
                carton,
                resolved.bands.len(),
                resolved.transforms.len(),
                resolved.identity_fields.join(", "),
            ),
            Err(e) => {
                eprintln!("  {e}");
                errors.push(e);
            }
        }
    }

    if !errors.is_empty() {
        return Err(CliError::config(format!("{} carton(s) failed to resolve", errors.len())));
    }
    eprintln!("valid: inventory '{}' with {} carton(s)", config.name, config.cartons.len());
    Ok(())
}
