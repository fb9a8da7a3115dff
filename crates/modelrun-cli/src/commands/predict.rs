//! `modelrun predict` command implementation

use crate::cli::RunnerArgs;
use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::input::Batch;
use crate::output::{self, OutputFormat, to_json};
use modelrun_runner::xgboost::XgboostAdapter;
use modelrun_runner::{Dispatcher, Predictions};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Execute the `predict` command
pub async fn run(
    ctx: &CliContext,
    tag: &str,
    input: &Path,
    chunk_size: Option<usize>,
    args: &RunnerArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let batch = Batch::read(input)?;
    if batch.is_empty() {
        return Err(CliError::InvalidInput("input batch has no rows".to_string()));
    }

    let runner = ctx
        .runner_builder(tag, args)?
        .build(&ctx.store, XgboostAdapter::new())?;
    let chunk_size = chunk_size.unwrap_or(runner.batch_options().max_batch_size);
    let tag = runner.tag().clone();
    let dispatcher = Dispatcher::new(Arc::new(runner));

    let rows = batch.len();
    let chunks = batch.into_chunks(chunk_size);
    tracing::debug!(%tag, rows, chunks = chunks.len(), capacity = dispatcher.capacity(), "submitting batch");

    let started = Instant::now();
    let parts = dispatcher.submit_all(chunks).await?;
    let predictions = Predictions::concat(parts).map_err(|e| CliError::Other(e.to_string()))?;
    tracing::info!(
        %tag,
        rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "prediction finished"
    );

    print_predictions(&predictions, format)
}

fn print_predictions(predictions: &Predictions, format: OutputFormat) -> CliResult<()> {
    let rows: Vec<&[f32]> = (0..predictions.rows())
        .filter_map(|i| predictions.row(i))
        .collect();

    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)?),
        OutputFormat::Table => {
            let headers: Vec<String> = (0..predictions.cols()).map(|c| format!("out{c}")).collect();
            let mut header_refs = vec!["row"];
            header_refs.extend(headers.iter().map(String::as_str));
            let body = rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    std::iter::once(i.to_string())
                        .chain(row.iter().map(|v| v.to_string()))
                        .collect()
                })
                .collect();
            println!("{}", output::table(&header_refs, body));
        }
        OutputFormat::Text => {
            for row in rows {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", line.join(" "));
            }
        }
    }
    Ok(())
}
