//! Page driver capability.
//!
//! A session is opened per fetch and released when the driver value is
//! dropped, on every exit path.

pub mod chrome;
pub mod fixture;

use crate::error::Result;
use std::time::Duration;

pub use chrome::{ChromeDriver, ChromeSessionFactory};
pub use fixture::{FixtureDriver, FixtureSessionFactory};

/// The UI steps a fetch drives against one page.
pub trait PageDriver {
    /// Loads `url`, failing with `PageLoadTimeout` past `timeout`.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Whether the share wrapper for `schema_id` exists on the loaded page.
    fn has_section(&mut self, schema_id: &str) -> Result<bool>;

    /// Un-collapses the section if it is collapsed. Must be a no-op otherwise.
    fn expand_section(&mut self, schema_id: &str) -> Result<()>;

    /// Opens the export menu and clicks the CSV control.
    fn trigger_export(&mut self, schema_id: &str) -> Result<()>;

    /// Text of the export element once visible, `None` if it never shows up.
    fn export_text(&mut self, schema_id: &str, wait: Duration) -> Result<Option<String>>;
}

/// Opens page driver sessions.
pub trait SessionFactory: Send + Sync {
    type Driver: PageDriver;

    fn open(&self) -> Result<Self::Driver>;
}
