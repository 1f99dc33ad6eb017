use std::{ffi::OsString, sync::Arc, thread, time::{Duration, Instant}};

use headless_chrome::{browser::tab::NoElementFound, Browser, Element as ChromeElement, LaunchOptions, Tab};
use tracing::debug;

use crate::{config::SiteConfig, error::DriverError};

use super::{ClickMode, Locator, PageDriver};

const WINDOW_SIZE: (u32, u32) = (1920, 1080);

/// The browser stays alive between pages, so keep it from shutting down while a slow page settles.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(250);


/// User agent matching the platform the scraper runs on, so the site serves its regular markup.
fn platform_user_agent() -> &'static str {
    if cfg!(target_os = "macos") {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
    } else if cfg!(target_os = "linux") {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
    } else {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
    }
}


/// headless_chrome reports an empty match as [`NoElementFound`]. Only that becomes an empty list.
fn none_found<T>(result: anyhow::Result<Vec<T>>) -> Result<Vec<T>, DriverError> {
    match result {
        Ok(found) => Ok(found),
        Err(e) if e.is::<NoElementFound>() => Ok(Vec::new()),
        Err(e) => Err(DriverError::Browser(e))
    }
}


/// Narrows elements found by [`Locator::css`] down to those the locator accepts.
fn matching<'a>(elements: Vec<ChromeElement<'a>>, locator: &Locator) -> Result<Vec<ChromeElement<'a>>, DriverError> {
    if let Locator::Css(_) = locator {
        return Ok(elements);
    }
    let mut matched = Vec::new();
    for element in elements {
        if locator.accepts(&element.get_inner_text()?) {
            matched.push(element);
        }
    }
    Ok(matched)
}


/// A single Chrome tab driven over the DevTools protocol.
pub(crate) struct ChromeDriver {
    tab: Arc<Tab>,
    // Dropping the browser closes the tab.
    _browser: Browser
}

impl ChromeDriver {
    pub(crate) fn launch(site: &SiteConfig) -> Result<Self, DriverError> {
        let user_agent = site
            .user_agent
            .clone()
            .unwrap_or_else(|| platform_user_agent().to_string());

        let user_agent_arg = OsString::from(format!("--user-agent={user_agent}"));
        let shm_arg = OsString::from("--disable-dev-shm-usage");
        let mut args = vec![user_agent_arg.as_os_str()];
        if cfg!(target_os = "linux") {
            args.push(shm_arg.as_os_str());
        }

        let browser = Browser::new(LaunchOptions {
            headless: site.headless,
            sandbox: site.sandbox,
            window_size: Some(WINDOW_SIZE),
            idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
            args,
            ..Default::default()
        })?;
        let tab = browser.new_tab()?;
        tab.set_user_agent(&user_agent, None, None)?;
        debug!("Launched browser with user agent {user_agent}");

        Ok(Self { tab, _browser: browser })
    }
}

impl PageDriver for ChromeDriver {
    type Element<'a> = ChromeElement<'a> where Self: 'a;

    fn open(&self, url: &str) -> Result<(), DriverError> {
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    fn find_all<'a>(&'a self, locator: &Locator) -> Result<Vec<ChromeElement<'a>>, DriverError> {
        let found = none_found(self.tab.find_elements(locator.css()))?;
        matching(found, locator)
    }

    fn find_in<'a>(&'a self, parent: &ChromeElement<'a>, locator: &Locator) -> Result<Option<ChromeElement<'a>>, DriverError> {
        let found = none_found(parent.find_elements(locator.css()))?;
        Ok(matching(found, locator)?.into_iter().next())
    }

    fn wait_for<'a>(&'a self, locator: &Locator, timeout: Duration) -> Result<ChromeElement<'a>, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.find_all(locator)?.into_iter().next() {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                debug!("Gave up waiting for {locator}");
                return Err(DriverError::Timeout { locator: locator.clone(), waited: timeout });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn type_and_submit<'a>(&'a self, field: &ChromeElement<'a>, text: &str) -> Result<(), DriverError> {
        field.click()?;
        field.call_js_fn("function() { this.value = ''; }", vec![], false)?;
        field.type_into(text)?;
        self.tab.press_key("Enter")?;
        Ok(())
    }

    fn click<'a>(&'a self, element: &ChromeElement<'a>, mode: ClickMode) -> Result<(), DriverError> {
        match mode {
            ClickMode::Native => {
                element.click()?;
            }
            ClickMode::Forced => {
                element.call_js_fn("function() { this.click(); }", vec![], false)?;
            }
        }
        Ok(())
    }

    fn text<'a>(&'a self, element: &ChromeElement<'a>) -> Result<String, DriverError> {
        Ok(element.get_inner_text()?)
    }

    fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.tab.evaluate("window.scrollTo(0, document.body.scrollHeight);", false)?;
        Ok(())
    }

    fn page_html(&self) -> Result<String, DriverError> {
        Ok(self.tab.get_content()?)
    }
}


#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn only_no_element_found_means_empty() {
        assert!(none_found::<u8>(Err(NoElementFound {}.into())).unwrap().is_empty());
        assert_eq!(none_found(Ok(vec![1u8])).unwrap(), [1]);
        assert!(matches!(
            none_found::<u8>(Err(anyhow!("Unable to make method calls because underlying connection is closed"))),
            Err(DriverError::Browser(_))
        ));
    }
}
