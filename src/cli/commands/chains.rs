//! Chain inspection commands

use super::{GlobalArgs, build_engine, runtime, to_json};
use crate::cli::error::CliError;

/// Print the chains a run would reconcile, and where they came from
pub fn handle_list_chains(global: &GlobalArgs) -> Result<(), CliError> {
    let rt = runtime()?;

    rt.block_on(async {
        let engine = build_engine(global).await?;
        let source = engine.select_source().await;
        let chains = engine.chains_from(&source).await?;

        eprintln!("Source: {} ({} chains)", source.kind(), chains.len());
        for chain in &chains {
            match &chain.description {
                Some(description) => println!("{}\t{}\t{}", chain.identity(), chain.root_path, description),
                None => println!("{}\t{}", chain.identity(), chain.root_path),
            }
        }
        Ok::<_, CliError>(())
    })
}

/// Print the resolved table roots of one chain
pub fn handle_list_tables(global: &GlobalArgs, chain: &str) -> Result<(), CliError> {
    let rt = runtime()?;

    rt.block_on(async {
        let engine = build_engine(global).await?;
        let chain = engine.find_chain(chain).await?;
        let resolution = engine.resolve_chain(&chain).await?;

        println!("{}", to_json(&resolution.table_roots)?);
        for path in &resolution.excluded {
            eprintln!("Excluded raw subtree: {}", path);
        }
        for path in &resolution.unassigned {
            eprintln!("Warning: {} sits beside network subdivisions", path);
        }
        for path in &resolution.ambiguous {
            eprintln!("Warning: search under {} hit the depth limit", path);
        }
        Ok::<_, CliError>(())
    })
}

/// Print the crawl job specs for a chain without touching the catalog
pub fn handle_plan(global: &GlobalArgs, chain: &str) -> Result<(), CliError> {
    let rt = runtime()?;

    rt.block_on(async {
        let engine = build_engine(global).await?;
        let chain = engine.find_chain(chain).await?;
        let plan = engine.plan_chain(&chain).await?;

        println!("{}", to_json(&plan.jobs)?);
        eprintln!(
            "{}: {} table root(s), {} crawl job(s)",
            plan.chain.identity(),
            plan.resolution.table_roots.len(),
            plan.jobs.len()
        );
        Ok::<_, CliError>(())
    })
}
