//! An in-memory stand-in for the browser, serving fixture HTML.
//!
//! Navigation is emulated from `href` attributes: submitting a text field shows the first
//! results page, a link to `#page-N` shows results page `N` (zero based), and a link whose
//! `href` has a registered detail pane renders that pane below the results. Markup after a
//! `<!-- lazy -->` marker on a results page only appears once the page has been scrolled.

use std::{cell::RefCell, time::Duration};

use anyhow::anyhow;
use fxhash::FxHashMap;
use scraper::{ElementRef, Html, Selector};

use crate::error::DriverError;

use super::{ClickMode, Locator, PageDriver};

const LAZY_MARKER: &str = "<!-- lazy -->";


/// A path from the document root, re-resolved against the current page on every use.
#[derive(Debug, Clone)]
pub(crate) struct FixtureElement {
    path: Vec<(Locator, usize)>
}

impl FixtureElement {
    fn child(&self, locator: &Locator, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push((locator.clone(), index));
        Self { path }
    }
}


#[derive(Default)]
struct FixtureState {
    opened: Vec<String>,
    searched: Vec<String>,
    page: Option<usize>,
    detail: Option<String>,
    scrolled: bool,
    scrolls: usize,
    clicks: Vec<(String, ClickMode)>
}


pub(crate) struct FixtureDriver {
    home: String,
    results: Vec<String>,
    details: FxHashMap<String, String>,
    state: RefCell<FixtureState>
}

impl FixtureDriver {
    pub(crate) fn new(home: &str) -> Self {
        Self {
            home: home.to_string(),
            results: Vec::new(),
            details: FxHashMap::default(),
            state: Default::default()
        }
    }

    pub(crate) fn results_page(mut self, body: &str) -> Self {
        self.results.push(body.to_string());
        self
    }

    pub(crate) fn detail(mut self, href: &str, body: &str) -> Self {
        self.details.insert(href.to_string(), body.to_string());
        self
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.state.borrow().opened.clone()
    }

    pub(crate) fn searched(&self) -> Vec<String> {
        self.state.borrow().searched.clone()
    }

    /// Results page currently shown, zero based.
    pub(crate) fn current_page(&self) -> Option<usize> {
        self.state.borrow().page
    }

    pub(crate) fn scrolls(&self) -> usize {
        self.state.borrow().scrolls
    }

    /// Identifies each clicked element by its `id`, else its `href`, else its tag name.
    pub(crate) fn clicks(&self) -> Vec<(String, ClickMode)> {
        self.state.borrow().clicks.clone()
    }

    fn document(&self) -> String {
        let state = self.state.borrow();
        let body = match state.page {
            None => self.home.clone(),
            Some(page) => {
                let results = self.results.get(page).map(String::as_str).unwrap_or_default();
                let results = match results.find(LAZY_MARKER) {
                    Some(cut) if !state.scrolled => &results[..cut],
                    _ => results
                };
                let detail = state.detail.as_deref().unwrap_or_default();
                format!("<main>{results}</main><aside>{detail}</aside>")
            }
        };
        format!("<html><body>{body}</body></html>")
    }

    fn show_page(&self, page: usize) {
        let mut state = self.state.borrow_mut();
        state.page = Some(page);
        state.detail = None;
        state.scrolled = false;
    }

    fn resolve<T>(&self, element: &FixtureElement, f: impl FnOnce(ElementRef<'_>) -> T) -> Result<T, DriverError> {
        let html = Html::parse_document(&self.document());
        let mut current = html.root_element();
        for (locator, index) in &element.path {
            current = select(current, locator)
                .into_iter()
                .nth(*index)
                .ok_or_else(|| anyhow!("stale element: nothing at {locator}[{index}]"))?;
        }
        Ok(f(current))
    }
}


fn select<'a>(scope: ElementRef<'a>, locator: &Locator) -> Vec<ElementRef<'a>> {
    match Selector::parse(locator.css()) {
        Ok(selector) => scope
            .select(&selector)
            .filter(|e| locator.accepts(&e.text().collect::<String>()))
            .collect(),
        Err(_) => Vec::new()
    }
}


impl PageDriver for FixtureDriver {
    type Element<'a> = FixtureElement where Self: 'a;

    fn open(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        state.opened.push(url.to_string());
        state.page = None;
        state.detail = None;
        Ok(())
    }

    fn find_all<'a>(&'a self, locator: &Locator) -> Result<Vec<FixtureElement>, DriverError> {
        let root = FixtureElement { path: Vec::new() };
        let count = self.resolve(&root, |scope| select(scope, locator).len())?;
        Ok((0..count).map(|i| root.child(locator, i)).collect())
    }

    fn find_in<'a>(&'a self, parent: &FixtureElement, locator: &Locator) -> Result<Option<FixtureElement>, DriverError> {
        let count = self.resolve(parent, |scope| select(scope, locator).len())?;
        Ok((count > 0).then(|| parent.child(locator, 0)))
    }

    fn wait_for<'a>(&'a self, locator: &Locator, timeout: Duration) -> Result<FixtureElement, DriverError> {
        self.find_all(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::Timeout { locator: locator.clone(), waited: timeout })
    }

    fn type_and_submit<'a>(&'a self, field: &FixtureElement, text: &str) -> Result<(), DriverError> {
        let is_input = self.resolve(field, |e| e.value().name() == "input")?;
        if !is_input {
            return Err(anyhow!("cannot type into a non-input element").into());
        }
        self.state.borrow_mut().searched.push(text.to_string());
        self.show_page(0);
        Ok(())
    }

    fn click<'a>(&'a self, element: &FixtureElement, mode: ClickMode) -> Result<(), DriverError> {
        let (label, href) = self.resolve(element, |e| {
            let value = e.value();
            let label = value
                .attr("id")
                .or_else(|| value.attr("href"))
                .unwrap_or(value.name())
                .to_string();
            (label, value.attr("href").map(String::from))
        })?;
        self.state.borrow_mut().clicks.push((label, mode));

        let Some(href) = href else { return Ok(()) };
        if let Some(page) = href.strip_prefix("#page-") {
            let page = page.parse().map_err(|_| anyhow!("bad page link {href}"))?;
            self.show_page(page);
        } else if let Some(detail) = self.details.get(&href) {
            self.state.borrow_mut().detail = Some(detail.clone());
        }
        Ok(())
    }

    fn text<'a>(&'a self, element: &FixtureElement) -> Result<String, DriverError> {
        self.resolve(element, |e| e.text().collect::<String>().trim().to_string())
    }

    fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        state.scrolled = true;
        state.scrolls += 1;
        Ok(())
    }

    fn page_html(&self) -> Result<String, DriverError> {
        Ok(self.document())
    }
}
