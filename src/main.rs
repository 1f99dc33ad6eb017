use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf}
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    clean::{Cleaner, MissingSummary},
    config::{Config, DEFAULT_CONFIG_PATH},
    consolidate::MergeOutcome,
    pipeline::PipelineOptions
};

mod clean;
mod config;
mod consolidate;
mod dedup;
mod driver;
mod error;
mod page_scrapers;
mod pipeline;
mod prompt;
mod record;
mod session;
mod store;


#[derive(Debug, Parser)]
#[command(name = "jobs_harvest", version, about)]
struct Cli {
    /// Configuration file, laid over the built-in defaults if it exists
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log debug output unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command
}


#[derive(Debug, Args)]
struct ScrapeArgs {
    /// Search term, asked for on stdin if missing
    term: Option<String>,

    /// Number of listings to collect for this term
    #[arg(short = 'n', long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_jobs: Option<u32>
}


#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape listings for one search term into its session file
    Scrape(ScrapeArgs),
    /// Append a session file to the master dataset
    Merge {
        /// Search term whose session file to merge, asked for on stdin if neither it nor --session is given
        term: Option<String>,
        /// Session file to merge instead of the one named after a search term
        #[arg(long, value_name = "FILE", conflicts_with = "term")]
        session: Option<PathBuf>,
        /// Delete the session file after merging
        #[arg(long)]
        delete_session: bool
    },
    /// Derive the final dataset from the master dataset
    Clean {
        /// Dataset to clean [default: the master dataset]
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Where to write the cleaned dataset [default: the final dataset]
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Also write the dataset with only incomplete records removed
        #[arg(long)]
        intermediate: bool
    },
    /// Scrape, merge and clean in one go
    Pipeline {
        #[command(flatten)]
        scrape: ScrapeArgs,
        /// Delete the session file after merging
        #[arg(long)]
        delete_session: bool,
        /// Also write the dataset with only incomplete records removed
        #[arg(long)]
        intermediate: bool
    },
    /// Report how many records of a dataset lack tasks or skills
    Inspect {
        /// Dataset to inspect [default: the master dataset]
        file: Option<PathBuf>
    },
    /// Rewrite a comma separated file with the configured delimiter
    Convert {
        input: PathBuf,
        /// [default: <input stem>_semicolon_fixed.csv next to the input]
        output: Option<PathBuf>,
        /// Delimiter of the input file
        #[arg(long, default_value_t = ',')]
        from: char
    }
}


fn init_logging(verbose: bool) {
    let default = if verbose { "jobs_harvest=debug" } else { "jobs_harvest=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}


fn search_term(term: Option<String>) -> anyhow::Result<String> {
    match term {
        Some(term) if !term.trim().is_empty() => Ok(term),
        _ => prompt::search_term(&mut io::stdin().lock(), &mut io::stdout()).context("No search term given")
    }
}


/// Only an interactive session is asked for a count; otherwise the configured default applies.
fn job_count(count: Option<u32>, default: u32) -> anyhow::Result<u32> {
    match count {
        Some(count) => Ok(count),
        None if io::stdin().is_terminal() => {
            prompt::job_count(&mut io::stdin().lock(), &mut io::stdout(), default).context("No job count given")
        }
        None => Ok(default)
    }
}


fn converted_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}_semicolon_fixed.csv"))
}


fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let paths = &config.paths;

    match cli.command {
        Command::Scrape(args) => {
            let term = search_term(args.term)?;
            let max_jobs = job_count(args.max_jobs, config.scrape.max_jobs)?;
            let ctx = session::scrape(&config, &term, max_jobs)
                .with_context(|| format!("Scraping '{term}' failed"))?;
            info!(
                "{} new listings saved, {} in total in {}",
                ctx.records().len(),
                ctx.accepted(),
                ctx.session_path().display()
            );
        }
        Command::Merge { term, session, delete_session } => {
            let session = match session {
                Some(session) => session,
                None => paths.session_file(&search_term(term)?)
            };
            let master = paths.master_file();
            let outcome = consolidate::merge_session(&session, &master, paths.delimiter(), delete_session)
                .with_context(|| format!("Failed to merge {} into {}", session.display(), master.display()))?;
            if let MergeOutcome::Merged(merged) = outcome {
                info!("Master dataset holds indices 1 to {}", merged.last_index);
                if delete_session && !merged.session_removed {
                    warn!("Session file {} was merged but could not be deleted", session.display());
                }
            }
        }
        Command::Clean { input, output, intermediate } => {
            let cleaner = Cleaner::new(&config.cleaning).context("Invalid cleaning rules")?;
            let input = input.unwrap_or_else(|| paths.master_file());
            let output = output.unwrap_or_else(|| paths.final_file());
            let intermediate = intermediate.then(|| paths.intermediate_file());
            let report = clean::run(&input, &output, intermediate.as_deref(), &cleaner, paths.delimiter())
                .with_context(|| format!("Failed to clean {}", input.display()))?;
            info!("Cleaning done, {report}");
        }
        Command::Pipeline { scrape, delete_session, intermediate } => {
            let term = search_term(scrape.term)?;
            let max_jobs = job_count(scrape.max_jobs, config.scrape.max_jobs)?;
            let options = PipelineOptions { delete_session, write_intermediate: intermediate };
            let report = pipeline::run(&config, &term, max_jobs, options)?;
            info!("Pipeline finished, {report}");
        }
        Command::Inspect { file } => {
            let file = file.unwrap_or_else(|| paths.master_file());
            let summary = MissingSummary::load(&file, paths.delimiter())
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}: {} records", file.display(), summary.total);
            println!("  missing tasks:  {}", summary.missing_tasks);
            println!("  missing skills: {}", summary.missing_skills);
            println!("  missing both:   {}", summary.missing_both);
            for sample in &summary.samples {
                println!("  e.g. {sample}");
            }
        }
        Command::Convert { input, output, from } => {
            anyhow::ensure!(from.is_ascii(), "input delimiter must be an ASCII character");
            let output = output.unwrap_or_else(|| converted_path(&input));
            let rows = store::convert_delimiter(&input, &output, from as u8, paths.delimiter())
                .with_context(|| format!("Failed to convert {}", input.display()))?;
            info!("Wrote {rows} rows to {}", output.display());
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pipeline_takes_term_and_count() {
        let cli = Cli::try_parse_from(["jobs_harvest", "pipeline", "Data Scientist", "-n", "20", "--delete-session"]).unwrap();
        match cli.command {
            Command::Pipeline { scrape, delete_session, intermediate } => {
                assert_eq!(scrape.term.as_deref(), Some("Data Scientist"));
                assert_eq!(scrape.max_jobs, Some(20));
                assert!(delete_session);
                assert!(!intermediate);
            }
            other => panic!("parsed {other:?}")
        }
        assert!(Cli::try_parse_from(["jobs_harvest", "scrape", "x", "-n", "0"]).is_err());
    }

    #[test]
    fn converted_file_sits_next_to_input() {
        assert_eq!(
            converted_path(Path::new("data/raw/jobs_ch_skills_all.csv")),
            Path::new("data/raw/jobs_ch_skills_all_semicolon_fixed.csv")
        );
    }
}
