//! `cartons check` / `cartons select`: carton list files against the catalog.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cartons_inventory::catalog::{
    format_carton_list, parse_carton_list, CartonCatalog, CartonListEntry, SelectionCriteria,
    VersionPolicy,
};

use crate::exit_codes::EXIT_MISSING_CARTONS;
use crate::{CliError, Versions};

pub struct SelectArgs {
    pub catalog: PathBuf,
    pub pattern: Option<String>,
    pub versions: Versions,
    pub version: Option<i64>,
    pub force: Vec<String>,
    pub write: Option<PathBuf>,
    pub overwrite: bool,
}

fn load_catalog(path: &Path) -> Result<CartonCatalog, CliError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    CartonCatalog::from_csv(&data).map_err(|e| CliError::io(e.to_string()))
}

pub fn cmd_check(list_path: PathBuf, catalog_path: PathBuf, json: bool) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&list_path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", list_path.display())))?;
    let entries = parse_carton_list(&text).map_err(|e| CliError::io(e.to_string()))?;
    let catalog = load_catalog(&catalog_path)?;

    let checks = catalog.check_existence(&entries);
    let missing: Vec<_> = checks.iter().filter(|c| !c.in_catalog).collect();

    if json {
        let json_str = serde_json::to_string_pretty(&checks)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        for check in &missing {
            let e = &check.entry;
            if check.alternatives.is_empty() {
                eprintln!("carton '{}' is not in the catalog and no carton has that name", e.carton);
                continue;
            }
            eprintln!(
                "carton '{}' plan '{}' category '{}' is not in the catalog; replace its line with one of:",
                e.carton, e.plan, e.category
            );
            let alternatives: Vec<_> =
                check.alternatives.iter().map(CartonListEntry::from_catalog).collect();
            for line in format_carton_list(&alternatives).lines().skip(1) {
                eprintln!("  {line}");
            }
        }
    }

    eprintln!(
        "checked {} carton(s): {} found, {} missing",
        checks.len(),
        checks.len() - missing.len(),
        missing.len()
    );

    if !missing.is_empty() {
        return Err(CliError::new(
            EXIT_MISSING_CARTONS,
            format!("{} carton(s) missing from the catalog", missing.len()),
        ));
    }
    Ok(())
}

/// Parse `NAME=PK` pairs.
fn parse_forced(pairs: &[String]) -> Result<BTreeMap<String, i64>, CliError> {
    let mut forced = BTreeMap::new();
    for pair in pairs {
        let (name, pk) = pair
            .split_once('=')
            .ok_or_else(|| CliError::args(format!("invalid --force '{pair}'")).with_hint("use NAME=PK"))?;
        let pk: i64 = pk
            .trim()
            .parse()
            .map_err(|_| CliError::args(format!("invalid version_pk in --force '{pair}'")))?;
        forced.insert(name.trim().to_string(), pk);
    }
    Ok(forced)
}

pub fn cmd_select(args: SelectArgs) -> Result<(), CliError> {
    let versions = match (args.versions, args.version) {
        (Versions::Latest, _) => VersionPolicy::Latest,
        (Versions::All, _) => VersionPolicy::All,
        (Versions::Single, Some(pk)) => VersionPolicy::Single(pk),
        (Versions::Single, None) => {
            return Err(CliError::args("--versions single requires --version")
                .with_hint("cartons select --catalog catalog.csv --versions single --version 83"));
        }
    };
    let criteria = SelectionCriteria {
        pattern: args.pattern,
        versions,
        forced: parse_forced(&args.force)?,
    };

    // Refuse before reading the catalog
    if let Some(ref path) = args.write {
        if path.exists() && !args.overwrite {
            return Err(CliError::args(format!("{} already exists", path.display()))
                .with_hint("pass --overwrite to replace it"));
        }
    }

    let catalog = load_catalog(&args.catalog)?;
    let selected = catalog.select(&criteria).map_err(|e| CliError::io(e.to_string()))?;
    let text = format_carton_list(&selected);

    match args.write {
        Some(path) => {
            std::fs::write(&path, &text)
                .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
            eprintln!("wrote {} ({} carton(s))", path.display(), selected.len());
        }
        None => print!("{text}"),
    }
    Ok(())
}
