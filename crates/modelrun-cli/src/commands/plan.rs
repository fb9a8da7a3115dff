//! `modelrun plan` command implementation
//!
//! Builds a runner without loading the model and reports how it would be
//! sized and configured.

use crate::cli::RunnerArgs;
use crate::context::CliContext;
use crate::error::CliResult;
use crate::output::{self, OutputFormat, to_json};
use colored::Colorize;
use modelrun_runner::xgboost::XgboostAdapter;

/// Execute the `plan` command
pub fn run(ctx: &CliContext, tag: &str, args: &RunnerArgs, format: OutputFormat) -> CliResult<()> {
    let runner = ctx
        .runner_builder(tag, args)?
        .build(&ctx.store, XgboostAdapter::new())?;
    let sizing = runner.sizing();

    match format {
        OutputFormat::Json => {
            let plan = serde_json::json!({
                "name": runner.name(),
                "tag": runner.tag(),
                "resources": runner.resource_quota(),
                "sizing": sizing,
                "predict_mode": runner.predict_mode(),
                "batch": runner.batch_options(),
                "config": runner.effective_config(),
            });
            println!("{}", to_json(&plan)?);
        }
        OutputFormat::Table => {
            let mut pairs = vec![
                ("tag".to_string(), runner.tag().to_string()),
                ("replicas".to_string(), sizing.replicas.to_string()),
                (
                    "concurrency_per_replica".to_string(),
                    sizing.concurrency_per_replica.to_string(),
                ),
                ("on_gpu".to_string(), sizing.on_gpu.to_string()),
            ];
            if let Some(device) = sizing.device {
                pairs.push(("device".to_string(), device.to_string()));
            }
            pairs.extend(
                runner
                    .effective_config()
                    .iter()
                    .map(|(k, v)| (format!("config.{k}"), v.to_string())),
            );
            println!("{}", output::key_values(pairs));
        }
        OutputFormat::Text => {
            println!("{} {}", "Runner".bold(), runner.name().cyan());
            println!("  model:        {}", runner.tag());
            println!(
                "  resources:    cpu={} gpus=[{}]",
                runner.resource_quota().cpu,
                runner.resource_quota().gpus.join(",")
            );
            println!("  replicas:     {}", sizing.replicas);
            println!("  concurrency:  {} per replica", sizing.concurrency_per_replica);
            match sizing.device {
                Some(device) => println!("  device:       gpu {device}"),
                None => println!("  device:       cpu"),
            }
            println!("  predict mode: {}", runner.predict_mode());
            println!("  config:");
            for (key, value) in runner.effective_config().iter() {
                println!("    {key} = {value}");
            }
        }
    }
    Ok(())
}
