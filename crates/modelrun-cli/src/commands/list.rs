//! `modelrun list` and `modelrun show` command implementations

use crate::context::CliContext;
use crate::error::CliResult;
use crate::output::{self, OutputFormat, to_json};
use colored::Colorize;
use modelrun_kernel::Tag;
use modelrun_store::{ModelRecord, ModelStore};

/// Execute the `list` command
pub fn run(ctx: &CliContext, name: Option<&str>, format: OutputFormat) -> CliResult<()> {
    let records = ctx.store.list(name)?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&records)?),
        OutputFormat::Table => {
            let rows = records.iter().map(row).collect();
            println!(
                "{}",
                output::table(&["Tag", "Module", "Framework", "Created"], rows)
            );
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No models stored in {}", ctx.store.root().display());
                return Ok(());
            }
            for record in &records {
                println!(
                    "{}  {}  {}",
                    record.tag.to_string().cyan(),
                    record.module,
                    record
                        .creation_time
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                        .dimmed()
                );
            }
        }
    }
    Ok(())
}

/// Execute the `show` command
pub fn run_show(ctx: &CliContext, tag: &str, format: OutputFormat) -> CliResult<()> {
    let model = ctx.store.get(&Tag::parse(tag)?)?;
    let record = model.record();

    match format {
        OutputFormat::Json => println!("{}", to_json(record)?),
        OutputFormat::Table => {
            let mut pairs = vec![
                ("tag".to_string(), record.tag.to_string()),
                ("module".to_string(), record.module.clone()),
                ("path".to_string(), model.dir().display().to_string()),
                (
                    "framework".to_string(),
                    format!(
                        "{} {}",
                        record.context.framework_name, record.context.framework_version
                    ),
                ),
            ];
            pairs.extend(
                record
                    .options
                    .iter()
                    .map(|(k, v)| (format!("options.{k}"), v.to_string())),
            );
            pairs.extend(
                record
                    .metadata
                    .iter()
                    .map(|(k, v)| (format!("metadata.{k}"), v.to_string())),
            );
            println!("{}", output::key_values(pairs));
        }
        OutputFormat::Text => {
            println!("{}", record.tag.to_string().cyan().bold());
            println!("  path: {}", model.dir().display());
            print!("{}", indent(&serde_yaml::to_string(record)?));
        }
    }
    Ok(())
}

fn row(record: &ModelRecord) -> Vec<String> {
    vec![
        record.tag.to_string(),
        record.module.clone(),
        format!(
            "{} {}",
            record.context.framework_name, record.context.framework_version
        ),
        record.creation_time.to_rfc3339(),
    ]
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {line}\n")).collect()
}
