//! One scraping session: a single search term, scraped until the target count is reached
//! or the results run out.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    config::{Config, SiteConfig, TimingConfig},
    dedup::{Deduplicator, Verdict},
    driver::{chrome::ChromeDriver, PageDriver},
    error::{ListingError, ScrapeError, StoreError},
    page_scrapers::{FieldLocator, PositionalLists},
    record::JobRecord,
    store
};

mod detail;
mod paginator;
mod search;

use paginator::{PageTurn, Paginator};


/// Everything a session accumulates, threaded through the scrape loop.
///
/// Resuming from an existing session file restores the identities and the count, so a
/// restarted run neither re-emits listings nor reuses indices.
#[derive(Debug)]
pub(crate) struct ScrapeContext {
    search_term: String,
    max_jobs: u32,
    session_path: PathBuf,
    delimiter: u8,
    dedup: Deduplicator,
    accepted: u32,
    pages: usize,
    duplicates: usize,
    skipped: usize,
    records: Vec<JobRecord>
}

impl ScrapeContext {
    pub(crate) fn resume(
        search_term: &str,
        max_jobs: u32,
        session_path: PathBuf,
        master_path: &Path,
        delimiter: u8
    ) -> Result<Self, StoreError> {
        let session = store::read_identities(&session_path, delimiter)?;
        let master = store::read_identities(master_path, delimiter)?;
        let accepted = session.len() as u32;
        if accepted > 0 {
            info!("Resuming session with {accepted} listings already in {}", session_path.display());
        }
        let dedup = Deduplicator::new(session, master);
        info!(
            "Loaded {} session and {} master identities for deduplication",
            dedup.session_len(),
            dedup.master_len()
        );

        Ok(Self {
            search_term: search_term.trim().to_string(),
            max_jobs,
            session_path,
            delimiter,
            dedup,
            accepted,
            pages: 0,
            duplicates: 0,
            skipped: 0,
            records: Vec::new()
        })
    }

    pub(crate) fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Listings in the session file, including those from before a restart.
    pub(crate) fn accepted(&self) -> u32 {
        self.accepted
    }

    pub(crate) fn target_reached(&self) -> bool {
        self.accepted >= self.max_jobs
    }

    /// Records accepted by this run only.
    pub(crate) fn records(&self) -> &[JobRecord] {
        &self.records
    }

    /// Persists a newly accepted record and counts it.
    ///
    /// A failed write is logged and the record is kept in memory, so the run goes on.
    fn accept(&mut self, record: JobRecord) {
        self.dedup.accept(record.identity());
        self.accepted += 1;
        if let Err(e) = store::append_record(&self.session_path, &record, self.delimiter) {
            warn!("Failed to save {}: {e}", record.identity());
        }
        info!("[{}/{}] Saved {}", self.accepted, self.max_jobs, record.identity());
        self.records.push(record);
    }

    fn log_summary(&self) {
        info!(
            "Session for '{}' finished: {} new listings over {} pages, {} duplicates and {} unreadable listings skipped, {} in {}",
            self.search_term,
            self.records.len(),
            self.pages,
            self.duplicates,
            self.skipped,
            self.accepted,
            self.session_path.display()
        );
    }
}


/// The browser-facing half of a session: a driver, the field locator for detail views and the site layout.
pub(crate) struct Scraper<'a, D, L> {
    driver: &'a D,
    fields: &'a L,
    site: &'a SiteConfig,
    timing: &'a TimingConfig
}

impl<'a, D: PageDriver, L: FieldLocator> Scraper<'a, D, L> {
    pub(crate) fn new(driver: &'a D, fields: &'a L, site: &'a SiteConfig, timing: &'a TimingConfig) -> Self {
        Self { driver, fields, site, timing }
    }

    /// Searches for the context's term and scrapes listings until the target or the last page is reached.
    ///
    /// Only failing to reach the results view is an error. Unreadable listings are skipped and
    /// pagination ending early simply ends the session.
    pub(crate) fn run(&self, mut ctx: ScrapeContext) -> Result<ScrapeContext, ScrapeError> {
        if ctx.target_reached() {
            info!("Session already holds {} of {} listings, nothing to scrape", ctx.accepted, ctx.max_jobs);
            return Ok(ctx);
        }
        search::open_search(self.driver, self.site, self.timing, &ctx.search_term)?;

        let mut paginator = Paginator::new(self.driver, self.site, self.timing);
        'pages: loop {
            let Some(count) = paginator.load_page() else {
                break;
            };
            ctx.pages += 1;

            for position in 0..count {
                if ctx.target_reached() {
                    break 'pages;
                }
                match self.scrape_listing(&paginator, position, &ctx) {
                    Ok(Some(record)) => ctx.accept(record),
                    Ok(None) => ctx.duplicates += 1,
                    Err(e) => {
                        warn!("Skipping listing {} on results page {}: {e}", position + 1, paginator.page());
                        ctx.skipped += 1;
                    }
                }
            }

            if ctx.target_reached() {
                break;
            }
            match paginator.next_page() {
                PageTurn::Advanced(page) => debug!("Scraping results page {page}"),
                PageTurn::Exhausted | PageTurn::Failed => break
            }
        }

        if ctx.target_reached() {
            info!("Reached the target of {} listings", ctx.max_jobs);
        }
        ctx.log_summary();
        Ok(ctx)
    }

    /// Reads one listing. `None` means it was seen before, in this session or in the master dataset.
    fn scrape_listing(
        &self,
        paginator: &Paginator<'a, D>,
        position: usize,
        ctx: &ScrapeContext
    ) -> Result<Option<JobRecord>, ListingError> {
        let card = paginator.listing(position)?;
        let summary = detail::read_summary(self.driver, &card, self.site)?;
        let identity = summary.identity();

        match ctx.dedup.check(&identity) {
            Verdict::New => {}
            Verdict::InSession => {
                debug!("Already scraped in this session: {identity}");
                return Ok(None);
            }
            Verdict::InMaster => {
                debug!("Already in the master dataset: {identity}");
                return Ok(None);
            }
        }

        let (tasks, skills) = detail::read_lists(self.driver, &card, self.fields, self.timing, &identity)?;
        Ok(Some(JobRecord {
            index: ctx.accepted + 1,
            title: summary.title,
            company: summary.company,
            location: summary.location,
            tasks,
            skills,
            search_term: ctx.search_term.clone()
        }))
    }
}


/// Scrapes up to `max_jobs` listings for `search_term` in a freshly launched browser,
/// appending them to the term's session file.
pub(crate) fn scrape(config: &Config, search_term: &str, max_jobs: u32) -> Result<ScrapeContext, ScrapeError> {
    let paths = &config.paths;
    let ctx = ScrapeContext::resume(
        search_term,
        max_jobs,
        paths.session_file(search_term),
        &paths.master_file(),
        paths.delimiter()
    )?;
    if ctx.target_reached() {
        info!("Session file {} already holds {} listings", ctx.session_path.display(), ctx.accepted);
        return Ok(ctx);
    }

    let fields = PositionalLists::new(&config.site.lists)?;
    info!("Launching browser");
    let driver = ChromeDriver::launch(&config.site).map_err(ScrapeError::Launch)?;
    Scraper::new(&driver, &fields, &config.site, &config.timing).run(ctx)
}
