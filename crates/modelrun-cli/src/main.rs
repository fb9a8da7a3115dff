//! modelrun - command-line front end for saved-model runners

mod cli;
mod commands;
mod context;
mod error;
mod input;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use context::CliContext;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CliContext::new(cli.config.as_deref(), cli.store.as_deref())?;
    let format = cli.output.unwrap_or_default();

    match cli.command {
        Commands::Import {
            name,
            path,
            options,
            metadata,
        } => {
            commands::import::run(&ctx, &name, &path, &options, &metadata, format)?;
        }

        Commands::List { name } => {
            commands::list::run(&ctx, name.as_deref(), format)?;
        }

        Commands::Show { tag } => {
            commands::list::run_show(&ctx, &tag, format)?;
        }

        Commands::Delete { tag } => {
            commands::delete::run(&ctx, &tag)?;
        }

        Commands::Plan { tag, runner } => {
            commands::plan::run(&ctx, &tag, &runner, format)?;
        }

        Commands::Predict {
            tag,
            input,
            chunk_size,
            runner,
        } => {
            // Batches run on the blocking pool behind the dispatcher
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::predict::run(
                &ctx, &tag, &input, chunk_size, &runner, format,
            ))?;
        }

        Commands::Info => {
            commands::info::run(&ctx, format)?;
        }
    }

    Ok(())
}
