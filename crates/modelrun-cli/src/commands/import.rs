//! `modelrun import` command implementation

use crate::context::{CliContext, parse_assignments};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, to_json};
use colored::Colorize;
use modelrun_kernel::Options;
use modelrun_runner::{BatchAdapter, save};
use modelrun_runner::xgboost::XgboostAdapter;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Execute the `import` command
pub fn run(
    ctx: &CliContext,
    name: &str,
    path: &Path,
    options: &[String],
    metadata: &[String],
    format: OutputFormat,
) -> CliResult<()> {
    if !path.is_file() {
        return Err(CliError::InvalidArgument(format!(
            "model file not found: {}",
            path.display()
        )));
    }

    let adapter = XgboostAdapter::new();
    let model = adapter
        .load(path, &Options::new())
        .map_err(|e| CliError::InvalidInput(format!("{}: {e}", path.display())))?;

    let tag = save(
        &ctx.store,
        &adapter,
        name,
        &model,
        parse_assignments(options)?,
        parse_metadata(metadata)?,
    )?;

    match format {
        OutputFormat::Json => {
            println!("{}", to_json(&serde_json::json!({ "tag": tag }))?);
        }
        _ => {
            println!("{} Imported {}", "✓".green(), tag.to_string().cyan());
            println!("  trees: {}", model.booster().num_trees());
        }
    }
    Ok(())
}

/// `key=value` pairs; values are read as JSON when they parse, else as strings
fn parse_metadata(raw: &[String]) -> CliResult<BTreeMap<String, Value>> {
    raw.iter()
        .map(|item| -> CliResult<(String, Value)> {
            let (key, value) = item
                .split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .ok_or_else(|| {
                    CliError::InvalidArgument(format!("expected KEY=VALUE, got {item:?}"))
                })?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}
