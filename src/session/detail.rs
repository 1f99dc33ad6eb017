use std::{thread, time::{Duration, Instant}};

use scraper::Html;
use tracing::{debug, warn};

use crate::{
    config::{SiteConfig, TimingConfig},
    driver::{ClickMode, Locator, PageDriver},
    error::{DriverError, ListingError},
    page_scrapers::{FieldLocator, ListRole},
    record::{ItemList, ListKind, ListingIdentity, Skills, Tasks, MISSING_LOCATION}
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);


/// What the listing card in the results view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListingSummary {
    pub(crate) title: String,
    pub(crate) company: String,
    pub(crate) location: String
}

impl ListingSummary {
    pub(crate) fn identity(&self) -> ListingIdentity {
        ListingIdentity::new(&self.title, &self.company)
    }
}


/// Trimmed text of the first element matching `locator` inside `card`, if there is any.
fn card_text<'a, D: PageDriver>(driver: &'a D, card: &D::Element<'a>, locator: &Locator) -> Result<Option<String>, DriverError> {
    let Some(element) = driver.find_in(card, locator)? else {
        return Ok(None);
    };
    let text = driver.text(&element)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}


fn required_text<'a, D: PageDriver>(
    driver: &'a D,
    card: &D::Element<'a>,
    locator: &Locator,
    field: &'static str
) -> Result<String, ListingError> {
    match card_text(driver, card, locator) {
        Ok(Some(text)) => Ok(text),
        Ok(None) => Err(ListingError::MissingField { field, source: None }),
        Err(e) => Err(ListingError::MissingField { field, source: Some(e) })
    }
}


/// Reads title, company and location from a listing card.
///
/// Without a title or company the listing cannot be identified, so either one missing is an error.
/// A missing location is replaced by [`MISSING_LOCATION`].
pub(crate) fn read_summary<'a, D: PageDriver>(
    driver: &'a D,
    card: &D::Element<'a>,
    site: &SiteConfig
) -> Result<ListingSummary, ListingError> {
    let title = required_text(driver, card, &site.listing_title, "title")?;
    let company = required_text(driver, card, &site.listing_company, "company")?;
    let location = match card_text(driver, card, &site.listing_location) {
        Ok(Some(location)) => location,
        Ok(None) => {
            debug!("No location on the card of {title}");
            MISSING_LOCATION.to_string()
        }
        Err(e) => {
            debug!("Failed to read the location of {title}: {e}");
            MISSING_LOCATION.to_string()
        }
    };
    Ok(ListingSummary { title, company, location })
}


fn list<K: ListKind, L: FieldLocator>(fields: &L, detail: &Html, role: ListRole, identity: &ListingIdentity) -> ItemList<K> {
    match fields.locate(detail, role) {
        Some(items) if !items.is_empty() => ItemList::new(items),
        _ => {
            warn!("No {} found for {identity}", K::NAME);
            ItemList::missing()
        }
    }
}


/// Polls the page until the fields' markup differs from `before`, the markup left over from
/// the previously opened listing. `None` once `timeout` has passed without a change.
fn rendered_detail<D: PageDriver, L: FieldLocator>(
    driver: &D,
    fields: &L,
    before: &str,
    timeout: Duration
) -> Result<Option<Html>, DriverError> {
    let deadline = Instant::now() + timeout;
    loop {
        let detail = Html::parse_document(&driver.page_html()?);
        let current = fields.fingerprint(&detail);
        if !current.is_empty() && current != before {
            return Ok(Some(detail));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}


/// Opens the detail view of `card` and extracts the task and skill lists from it.
///
/// Only failing to open the detail view is an error. Lists that cannot be found, or that never
/// replace the previous listing's, come back missing.
pub(crate) fn read_lists<'a, D: PageDriver, L: FieldLocator>(
    driver: &'a D,
    card: &D::Element<'a>,
    fields: &L,
    timing: &TimingConfig,
    identity: &ListingIdentity
) -> Result<(ItemList<Tasks>, ItemList<Skills>), ListingError> {
    let before = match driver.page_html() {
        Ok(html) => fields.fingerprint(&Html::parse_document(&html)),
        Err(e) => {
            debug!("Failed to snapshot the page before opening {identity}: {e}");
            String::new()
        }
    };
    driver.click(card, ClickMode::Forced).map_err(ListingError::Open)?;
    thread::sleep(timing.settle_detail());

    let detail = match rendered_detail(driver, fields, &before, timing.wait()) {
        Ok(Some(detail)) => detail,
        Ok(None) => {
            warn!("No new task or skill lists rendered for {identity} within {:?}, saving both as missing", timing.wait());
            return Ok((ItemList::missing(), ItemList::missing()));
        }
        Err(e) => {
            warn!("Failed to read the detail view of {identity}: {e}");
            return Ok((ItemList::missing(), ItemList::missing()));
        }
    };

    if fields.is_ambiguous(&detail) {
        warn!(
            "Unexpected list layout for {identity}, tasks and skills may be mislabeled (located by {})",
            L::NAME
        );
    }
    let tasks: ItemList<Tasks> = list(fields, &detail, ListRole::Tasks, identity);
    let skills: ItemList<Skills> = list(fields, &detail, ListRole::Skills, identity);
    debug!("{identity}: {} tasks, {} skills", tasks.items().len(), skills.items().len());
    Ok((tasks, skills))
}
