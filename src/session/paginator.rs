use std::thread;

use tracing::{debug, info, warn};

use crate::{
    config::{SiteConfig, TimingConfig},
    driver::{ClickMode, PageDriver},
    error::ListingError
};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageTurn {
    /// Now on this results page, counted from 1.
    Advanced(usize),
    /// No next-page control, so there are no more results.
    Exhausted,
    /// The control was there but could not be activated.
    Failed
}


/// Walks the result pages of a submitted search.
///
/// Listing handles are never kept: the detail view renders into the same page, so a listing
/// is looked up again by its position every time it is needed.
pub(crate) struct Paginator<'a, D> {
    driver: &'a D,
    site: &'a SiteConfig,
    timing: &'a TimingConfig,
    page: usize
}

impl<'a, D: PageDriver> Paginator<'a, D> {
    pub(crate) fn new(driver: &'a D, site: &'a SiteConfig, timing: &'a TimingConfig) -> Self {
        Self { driver, site, timing, page: 1 }
    }

    pub(crate) fn page(&self) -> usize {
        self.page
    }

    /// Makes lazily loaded listings appear and counts the listings on the current page.
    ///
    /// `None` means the page has no listings and pagination should stop.
    pub(crate) fn load_page(&self) -> Option<usize> {
        if let Err(e) = self.driver.scroll_to_bottom() {
            warn!("Failed to scroll results page {}: {e}", self.page);
        }
        thread::sleep(self.timing.settle_scroll());

        if let Err(e) = self.driver.wait_for(&self.site.listing_link, self.timing.wait()) {
            warn!("No listings on results page {}: {e}", self.page);
            return None;
        }
        match self.driver.find_all(&self.site.listing_link) {
            Ok(listings) if !listings.is_empty() => {
                info!("Found {} listings on results page {}", listings.len(), self.page);
                Some(listings.len())
            }
            Ok(_) => {
                warn!("No listings on results page {}", self.page);
                None
            }
            Err(e) => {
                warn!("Failed to read listings on results page {}: {e}", self.page);
                None
            }
        }
    }

    /// The listing at `position` (zero based) on the current page, looked up afresh.
    pub(crate) fn listing(&self, position: usize) -> Result<D::Element<'a>, ListingError> {
        let mut listings = self
            .driver
            .find_all(&self.site.listing_link)
            .map_err(|e| debug!("Failed to look up listing {position}: {e}"))
            .unwrap_or_default();
        if position < listings.len() {
            Ok(listings.swap_remove(position))
        } else {
            Err(ListingError::Vanished(position))
        }
    }

    pub(crate) fn next_page(&mut self) -> PageTurn {
        let control = match self.driver.wait_for(&self.site.next_page, self.timing.wait()) {
            Ok(control) => control,
            Err(e) => {
                info!("No page after results page {}, all results seen", self.page);
                debug!("{e}");
                return PageTurn::Exhausted;
            }
        };
        if let Err(e) = self.driver.click(&control, ClickMode::Forced) {
            warn!("Failed to open results page {}: {e}", self.page + 1);
            return PageTurn::Failed;
        }

        self.page += 1;
        info!("Moved to results page {}", self.page);
        thread::sleep(self.timing.settle_page());
        PageTurn::Advanced(self.page)
    }
}
