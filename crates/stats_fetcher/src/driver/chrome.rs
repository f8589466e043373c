//! Headless Chrome page driver.
//!
//! Stats page layout (one share wrapper per table):
//! <div id="receiving_standard_sh">
//!   <button class="togglebutton">  (collapsed tables only)
//!   <li class="hasmore"> ... <button class="tooltip" tip="...comma-separated values...">
//! </div>
//! <pre id="csv_receiving_standard">  (appears after the CSV button is clicked)

use super::{PageDriver, SessionFactory};
use crate::config::Selectors;
use crate::error::{FetchError, Result};
use anyhow::Context;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ChromeSessionFactory {
    headless:  bool,
    selectors: Selectors,
    settle:    Duration,
}

impl ChromeSessionFactory {
    pub fn new(headless: bool, selectors: Selectors, settle: Duration) -> Self {
        Self { headless, selectors, settle }
    }

    fn launch(&self) -> anyhow::Result<(Browser, Arc<Tab>)> {
        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false)
            .build()
            .context("Failed to build Chrome launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome")?;
        let tab = browser.new_tab().context("Failed to create browser tab")?;
        Ok((browser, tab))
    }
}

impl SessionFactory for ChromeSessionFactory {
    type Driver = ChromeDriver;

    fn open(&self) -> Result<ChromeDriver> {
        let (browser, tab) = self.launch().map_err(|e| FetchError::Driver(format!("{e:#}")))?;
        debug!("Chrome session opened (headless={})", self.headless);
        Ok(ChromeDriver {
            tab,
            _browser:  browser,
            selectors: self.selectors.clone(),
            settle:    self.settle,
        })
    }
}

/// One browser process with one tab. Dropping it quits Chrome.
pub struct ChromeDriver {
    // tab before browser: fields drop in declaration order
    tab:       Arc<Tab>,
    _browser:  Browser,
    selectors: Selectors,
    settle:    Duration,
}

fn presence_check(selector: &str) -> String {
    format!("document.querySelector({}) !== null", json!(selector))
}

fn driver_err(what: &str, e: impl std::fmt::Display) -> FetchError {
    FetchError::Driver(format!("{what}: {e}"))
}

impl ChromeDriver {
    fn wrapper(&self, schema_id: &str) -> Result<Element<'_>> {
        let selector = self.selectors.wrapper_for(schema_id);
        self.tab
            .find_element(&selector)
            .map_err(|_| FetchError::SectionNotFound(schema_id.to_string()))
    }

    /// Plain click first; if something overlays the button, click it from JS.
    fn click(element: &Element<'_>, what: &str) -> Result<()> {
        if let Err(e) = element.click() {
            warn!("{} click intercepted ({}), forcing it", what, e);
            element
                .call_js_fn("function() { this.click(); }", vec![], false)
                .map_err(|e| driver_err(what, e))?;
        }
        Ok(())
    }
}

impl PageDriver for ChromeDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        self.tab.set_default_timeout(timeout);

        let loaded = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());

        match loaded {
            Ok(_) => Ok(()),
            Err(_) if started.elapsed() >= timeout => Err(FetchError::PageLoadTimeout {
                url:  url.to_string(),
                secs: timeout.as_secs(),
            }),
            Err(e) => Err(driver_err(&format!("navigate {url}"), e)),
        }
    }

    fn has_section(&mut self, schema_id: &str) -> Result<bool> {
        // find_elements fails both for "no match" and for a dead tab; ask the page instead
        let found = self
            .tab
            .evaluate(&presence_check(&self.selectors.wrapper_for(schema_id)), false)
            .map_err(|e| driver_err("section lookup", e))?;
        Ok(found.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn expand_section(&mut self, schema_id: &str) -> Result<()> {
        let wrapper = self.wrapper(schema_id)?;
        let toggle = match wrapper.find_elements(&self.selectors.toggle) {
            Ok(mut found) if !found.is_empty() => found.remove(0),
            _ => return Ok(()),
        };

        let table = self.selectors.table_for(schema_id);
        let collapsed = wrapper
            .call_js_fn(
                "function(sel) { const t = document.querySelector(sel); return !t || t.offsetParent === null; }",
                vec![json!(table)],
                false,
            )
            .map_err(|e| driver_err("collapse check", e))?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        if collapsed {
            debug!("expanding collapsed section {}", schema_id);
            Self::click(&toggle, "toggle")?;
        }
        Ok(())
    }

    fn trigger_export(&mut self, schema_id: &str) -> Result<()> {
        let wrapper = self.wrapper(schema_id)?;
        let menu = wrapper
            .find_element(&self.selectors.export_menu)
            .map_err(|e| driver_err("export menu", e))?;

        menu.call_js_fn(
            "function(cls) { this.classList.add(cls); }",
            vec![json!(self.selectors.hover_class)],
            false,
        )
        .map_err(|e| driver_err("export menu hover", e))?;
        std::thread::sleep(self.settle);

        let button = menu
            .find_element(&self.selectors.csv_button)
            .map_err(|e| driver_err("CSV button", e))?;
        Self::click(&button, "CSV button")
    }

    fn export_text(&mut self, schema_id: &str, wait: Duration) -> Result<Option<String>> {
        let selector = self.selectors.export_text_for(schema_id);
        let deadline = Instant::now() + wait;

        loop {
            // innerText is empty while the element is hidden
            let text = self
                .tab
                .find_element(&selector)
                .and_then(|el| el.get_inner_text())
                .ok()
                .filter(|t| !t.trim().is_empty());

            if text.is_some() {
                return Ok(text);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_check_quotes_the_selector() {
        assert_eq!(
            presence_check("#receiving_standard_sh"),
            r##"document.querySelector("#receiving_standard_sh") !== null"##
        );
        assert_eq!(
            presence_check(r#"button[tip*="a"]"#),
            r#"document.querySelector("button[tip*=\"a\"]") !== null"#
        );
    }
}
