//! Full discovery run

use std::path::PathBuf;

use super::{GlobalArgs, build_engine, runtime, to_json};
use crate::cli::error::CliError;

/// Discover command arguments
#[derive(Debug, Clone)]
pub struct DiscoverArgs {
    pub global: GlobalArgs,
    /// Also write the report JSON here
    pub output: Option<PathBuf>,
}

/// Run discovery and reconciliation, then print the report
pub fn handle_discover(args: &DiscoverArgs) -> Result<(), CliError> {
    let rt = runtime()?;

    let report = rt.block_on(async {
        let engine = build_engine(&args.global).await?;
        Ok::<_, CliError>(engine.run().await?)
    })?;

    let json = to_json(&report)?;
    if let Some(output) = &args.output {
        std::fs::write(output, &json)
            .map_err(|e| CliError::FileWriteError(output.clone(), e.to_string()))?;
        eprintln!("Report written to {}", output.display());
    }
    println!("{}", json);
    eprintln!("{}", report.summary());

    Ok(())
}
