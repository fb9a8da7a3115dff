//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// modelrun - serve saved models as resource-sized batch runners
#[derive(Parser)]
#[command(name = "modelrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, table)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<OutputFormat>,

    /// Configuration file path (default: ~/.modelrun/config.toml if present)
    #[arg(short = 'c', long, global = true, env = "MODELRUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model store root, overriding the configuration
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Resource and runner settings shared by `plan` and `predict`
#[derive(Args, Debug, Clone, Default)]
pub struct RunnerArgs {
    /// CPU share for the runner (default: configured quota or whole machine)
    #[arg(long)]
    pub cpu: Option<f64>,

    /// Comma-separated GPU device ids, e.g. `0,1`
    #[arg(long, value_delimiter = ',')]
    pub gpus: Vec<String>,

    /// Option override `key=value`; repeatable
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Prediction mode: standard or inplace
    #[arg(long)]
    pub mode: Option<String>,

    /// GPU device mapping: pinned or per_replica
    #[arg(long, default_value = "pinned")]
    pub device_assignment: String,

    /// Replica served by this process (per_replica mapping only)
    #[arg(long, default_value_t = 0)]
    pub replica_index: usize,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Import an XGBoost JSON model into the store
    Import {
        /// Model name
        name: String,

        /// Path to the model file
        path: PathBuf,

        /// Stored option `key=value`; repeatable
        #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Metadata entry `key=value`; repeatable
        #[arg(short, long, value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },

    /// List stored models
    List {
        /// Only versions of this model
        name: Option<String>,
    },

    /// Show the stored record of a model version
    Show {
        /// Model tag (`name` or `name:version`)
        tag: String,
    },

    /// Delete a model version
    Delete {
        /// Model tag (`name:version`)
        tag: String,
    },

    /// Show replica/concurrency sizing and the effective configuration
    Plan {
        /// Model tag (`name` or `name:version`)
        tag: String,

        #[command(flatten)]
        runner: RunnerArgs,
    },

    /// Run predictions over a JSON batch
    Predict {
        /// Model tag (`name` or `name:version`)
        tag: String,

        /// Input file: `[[f, ...], ...]` or `{"columns": [...], "data": [[...]]}`;
        /// `-` reads stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Rows per submitted chunk (default: max batch size)
        #[arg(long)]
        chunk_size: Option<usize>,

        #[command(flatten)]
        runner: RunnerArgs,
    },

    /// Show adapters, detected resources and store location
    Info,
}
