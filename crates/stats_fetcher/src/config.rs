//! Environment-driven configuration for a single fetch.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Which page driver backs a fetch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverKind {
    Chrome,
    /// Saved HTML pages, one file per source URL.
    Fixture(PathBuf),
}

/// CSS selectors for the stats page. `{id}` is replaced by the schema identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub share_wrapper: String,
    pub toggle:        String,
    pub export_menu:   String,
    pub hover_class:   String,
    pub csv_button:    String,
    pub section_table: String,
    pub export_text:   String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            share_wrapper: "#{id}_sh".to_string(),
            toggle:        "button.togglebutton".to_string(),
            export_menu:   "li.hasmore".to_string(),
            hover_class:   "drophover".to_string(),
            csv_button:    "button.tooltip[tip*='comma-separated values']".to_string(),
            section_table: "#{id}".to_string(),
            export_text:   "#csv_{id}".to_string(),
        }
    }
}

impl Selectors {
    pub fn wrapper_for(&self, schema_id: &str) -> String {
        self.share_wrapper.replace("{id}", schema_id)
    }

    pub fn table_for(&self, schema_id: &str) -> String {
        self.section_table.replace("{id}", schema_id)
    }

    pub fn export_text_for(&self, schema_id: &str) -> String {
        self.export_text.replace("{id}", schema_id)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub input_csv:         PathBuf,
    pub output_dir:        PathBuf,
    pub log_dir:           PathBuf,
    pub schema_map_path:   Option<PathBuf>,
    pub page_load_timeout: Duration,
    pub export_wait:       Duration,
    /// Pause after forcing the hover state on the export menu.
    pub settle:            Duration,
    pub headless:          bool,
    pub driver:            DriverKind,
    pub selectors:         Selectors,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            input_csv:         PathBuf::from("./data/receiving_standard.csv"),
            output_dir:        PathBuf::from("./receiving"),
            log_dir:           PathBuf::from("logs"),
            schema_map_path:   None,
            page_load_timeout: Duration::from_secs(30),
            export_wait:       Duration::from_secs(5),
            settle:            Duration::from_millis(200),
            headless:          true,
            driver:            DriverKind::Chrome,
            selectors:         Selectors::default(),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `STATS_*` variables. Call `dotenv()` first.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let driver = match env::var("STATS_DRIVER").ok().as_deref() {
            Some("fixture") => DriverKind::Fixture(
                env_path("STATS_FIXTURE_DIR").unwrap_or_else(|| PathBuf::from("fixtures")),
            ),
            _ => DriverKind::Chrome,
        };

        Self {
            input_csv:         env_path("STATS_INPUT_CSV").unwrap_or(defaults.input_csv),
            output_dir:        env_path("STATS_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            log_dir:           env_path("STATS_LOG_DIR").unwrap_or(defaults.log_dir),
            schema_map_path:   env_path("STATS_SCHEMA_MAP"),
            page_load_timeout: env_parse("STATS_PAGE_LOAD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.page_load_timeout),
            export_wait:       env_parse("STATS_EXPORT_WAIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.export_wait),
            settle:            env_parse("STATS_SETTLE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle),
            headless:          env_parse("STATS_HEADLESS").unwrap_or(defaults.headless),
            driver,
            selectors:         env_path("STATS_SELECTORS")
                .and_then(|path| load_selectors(&path))
                .unwrap_or(defaults.selectors),
        }
    }
}

fn load_selectors(path: &Path) -> Option<Selectors> {
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(selectors) => Some(selectors),
        Err(e) => {
            warn!("ignoring selector file {:?}: {}", path, e);
            None
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
