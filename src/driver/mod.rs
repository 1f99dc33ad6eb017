use std::{fmt, time::Duration};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::DriverError;

pub(crate) mod chrome;
#[cfg(test)]
pub(crate) mod fixture;


/// A structural query for elements on the current page.
///
/// In configuration a bare string is a CSS selector, and a table `{ tag, contains }`
/// matches elements of `tag` whose text contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Locator {
    Css(String),
    Text { tag: String, contains: String }
}

impl Locator {
    /// Selector of the candidate elements, before any text filter.
    pub(crate) fn css(&self) -> &str {
        match self {
            Self::Css(selector) => selector,
            Self::Text { tag, .. } => tag
        }
    }

    /// Whether a candidate whose visible text is `text` matches.
    pub(crate) fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Css(_) => true,
            Self::Text { contains, .. } => text.contains(contains.as_str())
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "`{selector}`"),
            Self::Text { tag, contains } => write!(f, "<{tag}> containing '{contains}'")
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClickMode {
    /// A real mouse click, which lands on whatever element is on top.
    Native,
    /// A click dispatched from script on the element itself, ignoring overlays.
    Forced
}


/// The browser capabilities the scraper depends on.
///
/// Elements borrow the driver, and become stale once the page they were found on changes.
/// Callers must find them again after any navigation instead of holding on to them.
pub(crate) trait PageDriver {
    type Element<'a> where Self: 'a;

    fn open(&self, url: &str) -> Result<(), DriverError>;

    /// All elements matching `locator`, in document order. No match is an empty list, not an error.
    fn find_all<'a>(&'a self, locator: &Locator) -> Result<Vec<Self::Element<'a>>, DriverError>;

    /// The first descendant of `parent` matching `locator`.
    fn find_in<'a>(&'a self, parent: &Self::Element<'a>, locator: &Locator) -> Result<Option<Self::Element<'a>>, DriverError>;

    /// Polls until an element matching `locator` is present, failing with [`DriverError::Timeout`].
    fn wait_for<'a>(&'a self, locator: &Locator, timeout: Duration) -> Result<Self::Element<'a>, DriverError>;

    /// Replaces the contents of a text field with `text` and submits it.
    fn type_and_submit<'a>(&'a self, field: &Self::Element<'a>, text: &str) -> Result<(), DriverError>;

    fn click<'a>(&'a self, element: &Self::Element<'a>, mode: ClickMode) -> Result<(), DriverError>;

    /// Visible text of the element.
    fn text<'a>(&'a self, element: &Self::Element<'a>) -> Result<String, DriverError>;

    fn scroll_to_bottom(&self) -> Result<(), DriverError>;

    /// Raw markup of the whole current document.
    fn page_html(&self) -> Result<String, DriverError>;
}


/// Clicks away every consent or banner button that shows up within `timeout`.
///
/// Returns how many were dismissed. Buttons that never appear are not an error.
pub(crate) fn dismiss_overlays<D: PageDriver>(driver: &D, buttons: &[Locator], timeout: Duration) -> usize {
    let mut dismissed = 0;
    for button in buttons {
        let result = driver
            .wait_for(button, timeout)
            .and_then(|element| driver.click(&element, ClickMode::Native));
        match result {
            Ok(()) => {
                info!("Dismissed overlay {button}");
                dismissed += 1;
            }
            Err(e) => debug!("No overlay {button}: {e}")
        }
    }
    dismissed
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::fixture::FixtureDriver;

    #[test]
    fn locator_deserializes_from_string_or_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            plain: Locator,
            labelled: Locator
        }
        let parsed: Wrapper = toml::from_str(r#"
            plain = "a[data-cy='job-link']"
            labelled = { tag = "button", contains = "Schliessen" }
        "#).unwrap();
        assert_eq!(parsed.plain, Locator::Css("a[data-cy='job-link']".into()));
        assert_eq!(parsed.labelled, Locator::Text { tag: "button".into(), contains: "Schliessen".into() });
    }

    #[test]
    fn text_locator_filters_by_label() {
        let locator = Locator::Text { tag: "button".into(), contains: "Don't show again".into() };
        assert_eq!(locator.css(), "button");
        assert!(locator.accepts("  Don't show again  "));
        assert!(!locator.accepts("Dont show again"));

        let css = Locator::Css("a[data-cy='job-link']".into());
        assert_eq!(css.css(), "a[data-cy='job-link']");
        assert!(css.accepts(""));
    }

    #[test]
    fn label_with_apostrophe_is_found() {
        let driver = FixtureDriver::new(r#"<button id="promo">Don't show again</button>"#);
        let button = Locator::Text { tag: "button".into(), contains: "Don't show again".into() };
        assert_eq!(dismiss_overlays(&driver, &[button], Duration::ZERO), 1);
    }

    #[test]
    fn overlays_that_are_present_get_clicked() {
        let driver = FixtureDriver::new(r#"
            <button id="consent">Alle Cookies akzeptieren</button>
            <input id="search">
        "#);
        let buttons = [
            Locator::Text { tag: "button".into(), contains: "Alle Cookies akzeptieren".into() },
            Locator::Text { tag: "button".into(), contains: "Schliessen".into() }
        ];
        assert_eq!(dismiss_overlays(&driver, &buttons, Duration::ZERO), 1);
        assert_eq!(driver.clicks(), vec![("consent".to_string(), ClickMode::Native)]);
    }
}
