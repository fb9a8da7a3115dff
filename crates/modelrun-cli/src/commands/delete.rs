//! `modelrun delete` command implementation

use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use colored::Colorize;
use modelrun_kernel::Tag;
use modelrun_store::ModelStore;

/// Execute the `delete` command
pub fn run(ctx: &CliContext, tag: &str) -> CliResult<()> {
    let tag = Tag::parse(tag)?;
    if tag.is_latest() {
        return Err(CliError::InvalidArgument(format!(
            "refusing to delete {tag}; name an explicit version"
        )));
    }

    if ctx.store.delete(&tag)? {
        println!("{} Deleted {}", "✓".green(), tag.to_string().cyan());
        Ok(())
    } else {
        Err(CliError::Other(format!("model {tag} not found")))
    }
}
