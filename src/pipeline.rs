use std::path::Path;

use anyhow::{bail, Context};
use tracing::info;

use crate::{
    clean::{self, Cleaner, CleaningReport},
    config::Config,
    consolidate::{self, MergeOutcome},
    session,
    store
};


#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PipelineOptions {
    /// Remove the session file once it is part of the master dataset.
    pub(crate) delete_session: bool,
    /// Also write the dataset with only incomplete records removed.
    pub(crate) write_intermediate: bool
}


/// Scrapes one search term, folds the session into the master dataset and derives the final dataset.
pub(crate) fn run(config: &Config, search_term: &str, max_jobs: u32, options: PipelineOptions) -> anyhow::Result<CleaningReport> {
    // patterns are compiled before the browser starts
    let cleaner = Cleaner::new(&config.cleaning).context("Invalid cleaning rules")?;

    let ctx = session::scrape(config, search_term, max_jobs)
        .with_context(|| format!("Scraping '{search_term}' failed"))?;
    info!("Scraped {} new listings for '{search_term}'", ctx.records().len());

    consolidate_and_clean(config, &cleaner, ctx.session_path(), options)
}


/// The offline half of the pipeline. An empty or missing session still lets an existing
/// master dataset be cleaned.
pub(crate) fn consolidate_and_clean(
    config: &Config,
    cleaner: &Cleaner,
    session: &Path,
    options: PipelineOptions
) -> anyhow::Result<CleaningReport> {
    let paths = &config.paths;
    let master = paths.master_file();

    let outcome = consolidate::merge_session(session, &master, paths.delimiter(), options.delete_session)
        .with_context(|| format!("Failed to consolidate {} into {}", session.display(), master.display()))?;
    match outcome {
        MergeOutcome::Merged(merged) => info!(
            "Added {} records to the master dataset as indices {} to {}",
            merged.appended,
            merged.first_index,
            merged.last_index
        ),
        MergeOutcome::SessionMissing | MergeOutcome::SessionEmpty => {
            info!("Nothing new to consolidate, cleaning the existing master dataset")
        }
    }

    if !store::has_content(&master) {
        bail!("Master dataset {} does not exist, nothing to clean", master.display());
    }
    let intermediate = options.write_intermediate.then(|| paths.intermediate_file());
    clean::run(&master, &paths.final_file(), intermediate.as_deref(), cleaner, paths.delimiter())
        .with_context(|| format!("Failed to clean {}", master.display()))
}
