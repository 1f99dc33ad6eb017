use std::thread;

use tracing::info;

use crate::{
    config::{SiteConfig, TimingConfig},
    driver::{dismiss_overlays, PageDriver},
    error::ScrapeError
};


/// Opens the job board, clears consent banners and submits `term` in the search field.
///
/// Returns once the results view has had time to render. Every failure here ends the run.
pub(crate) fn open_search<D: PageDriver>(
    driver: &D,
    site: &SiteConfig,
    timing: &TimingConfig,
    term: &str
) -> Result<(), ScrapeError> {
    let url = site.base_url.as_str();
    info!("Opening {url}");
    driver
        .open(url)
        .map_err(|source| ScrapeError::Navigation { url: url.to_string(), source })?;

    dismiss_overlays(driver, &site.consent_buttons, timing.consent_wait());

    let field = driver
        .wait_for(&site.search_field, timing.wait())
        .map_err(ScrapeError::SearchUnavailable)?;
    driver
        .type_and_submit(&field, term)
        .map_err(|source| ScrapeError::Search { term: term.to_string(), source })?;
    info!("Searching for '{term}'");

    thread::sleep(timing.settle_search());
    Ok(())
}
