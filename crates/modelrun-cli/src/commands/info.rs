//! `modelrun info` command implementation

use crate::context::CliContext;
use crate::error::CliResult;
use crate::output::{self, OutputFormat, to_json};
use colored::Colorize;
use modelrun_kernel::ResourceQuota;

/// Execute the `info` command
pub fn run(ctx: &CliContext, format: OutputFormat) -> CliResult<()> {
    let detected = ResourceQuota::detect();
    let config_path = ctx
        .config_path
        .as_ref()
        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string());

    match format {
        OutputFormat::Json => {
            let modules: Vec<_> = ctx
                .registry
                .modules()
                .map(|a| {
                    serde_json::json!({
                        "module": a.module,
                        "artifact_file": a.artifact_file,
                        "framework": a.context.framework_name,
                        "framework_version": a.context.framework_version,
                    })
                })
                .collect();
            let info = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config": config_path,
                "store_root": ctx.store.root(),
                "resources": ctx.config.resources,
                "detected": detected,
                "adapters": modules,
            });
            println!("{}", to_json(&info)?);
        }
        OutputFormat::Table | OutputFormat::Text => {
            println!("{} {}", "modelrun".bold(), env!("CARGO_PKG_VERSION"));
            println!("  config:     {config_path}");
            println!("  store root: {}", ctx.store.root().display());
            match &ctx.config.resources {
                Some(q) => println!("  quota:      cpu={} gpus=[{}]", q.cpu, q.gpus.join(",")),
                None => println!("  quota:      whole machine"),
            }
            println!(
                "  detected:   cpu={} gpus=[{}]",
                detected.cpu,
                detected.gpus.join(",")
            );
            println!();
            let rows = ctx
                .registry
                .modules()
                .map(|a| {
                    vec![
                        a.module.clone(),
                        a.artifact_file.clone(),
                        format!(
                            "{} {}",
                            a.context.framework_name, a.context.framework_version
                        ),
                    ]
                })
                .collect();
            println!(
                "{}",
                output::table(&["Adapter", "Artifact", "Framework"], rows)
            );
        }
    }
    Ok(())
}
