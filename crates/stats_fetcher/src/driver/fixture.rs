//! Offline page driver backed by saved HTML pages.
//!
//! The page for `https://host/cfb/players/jane-doe-1.html?x=y` is read from
//! `<dir>/jane-doe-1.html`. The export `<pre>` has to be present in the saved
//! page already, so expand/trigger have nothing to do.

use super::{PageDriver, SessionFactory};
use crate::config::Selectors;
use crate::error::{FetchError, Result};
use scraper::{Html, Selector};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub struct FixtureSessionFactory {
    dir:       PathBuf,
    selectors: Selectors,
}

impl FixtureSessionFactory {
    pub fn new(dir: impl Into<PathBuf>, selectors: Selectors) -> Self {
        Self { dir: dir.into(), selectors }
    }
}

impl SessionFactory for FixtureSessionFactory {
    type Driver = FixtureDriver;

    fn open(&self) -> Result<FixtureDriver> {
        Ok(FixtureDriver {
            dir:       self.dir.clone(),
            selectors: self.selectors.clone(),
            page:      None,
        })
    }
}

pub struct FixtureDriver {
    dir:       PathBuf,
    selectors: Selectors,
    page:      Option<String>,
}

/// Last path segment of a URL without query or fragment.
pub fn fixture_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| FetchError::Driver(format!("bad selector '{css}': {e:?}")))
}

impl FixtureDriver {
    fn document(&self) -> Result<Html> {
        self.page
            .as_deref()
            .map(Html::parse_document)
            .ok_or_else(|| FetchError::Driver("no page loaded".to_string()))
    }
}

impl PageDriver for FixtureDriver {
    fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        let name = fixture_name(url)
            .ok_or_else(|| FetchError::Driver(format!("no fixture name in url '{url}'")))?;
        let path = self.dir.join(name);
        debug!("fixture page {:?} for {}", path, url);
        let html = fs::read_to_string(&path)
            .map_err(|e| FetchError::Driver(format!("fixture {}: {}", path.display(), e)))?;
        self.page = Some(html);
        Ok(())
    }

    fn has_section(&mut self, schema_id: &str) -> Result<bool> {
        let sel = selector(&self.selectors.wrapper_for(schema_id))?;
        Ok(self.document()?.select(&sel).next().is_some())
    }

    fn expand_section(&mut self, _schema_id: &str) -> Result<()> {
        Ok(())
    }

    fn trigger_export(&mut self, _schema_id: &str) -> Result<()> {
        Ok(())
    }

    fn export_text(&mut self, schema_id: &str, _wait: Duration) -> Result<Option<String>> {
        let sel = selector(&self.selectors.export_text_for(schema_id))?;
        Ok(self
            .document()?
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .filter(|t| !t.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<div id="receiving_standard_sh"><ul><li class="hasmore"></li></ul></div>
<pre id="csv_receiving_standard">Rk,Season
Season,Team
2021,A
</pre>
</body></html>"#;

    #[test]
    fn fixture_name_strips_query() {
        assert_eq!(
            fixture_name("https://www.sports-reference.com/cfb/players/jane-doe-1.html?__hstc=1&x=2"),
            Some("jane-doe-1.html")
        );
        assert_eq!(fixture_name("http://example/jane/"), Some("jane"));
        assert_eq!(fixture_name(""), None);
    }

    #[test]
    fn reads_export_from_saved_page() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jane-doe-1.html"), PAGE).unwrap();

        let factory = FixtureSessionFactory::new(dir.path(), Selectors::default());
        let mut driver = factory.open().unwrap();
        driver.navigate("http://example/cfb/jane-doe-1.html", Duration::from_secs(1)).unwrap();

        assert!(driver.has_section("receiving_standard").unwrap());
        assert!(!driver.has_section("passing_standard").unwrap());

        let text = driver.export_text("receiving_standard", Duration::ZERO).unwrap().unwrap();
        assert!(text.contains("Season,Team\n2021,A"));
        assert_eq!(driver.export_text("passing_standard", Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn missing_fixture_is_a_driver_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = FixtureSessionFactory::new(dir.path(), Selectors::default()).open().unwrap();
        let err = driver.navigate("http://example/nobody.html", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::Driver(_)));
    }
}
