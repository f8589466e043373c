//! College Stats — single player fetch
//!
//! Drives a stats page through its "Share & Export → CSV" controls, cleans the
//! exported text and writes one CSV per player:
//!   input row → position → table section → page → export text → rows → file

pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod input;
pub mod output;
pub mod schema;

pub use config::{DriverKind, FetchConfig, Selectors};
pub use driver::{PageDriver, SessionFactory};
pub use error::{failure_line, parse_failure_line, FetchError, FetchErrorKind, FAILURE_MARKER};
pub use export::{clean_header, CleanedRecord, MARKER};
pub use fetcher::{FetchOutcome, Fetcher};
pub use input::{InputRow, InputTable};
pub use output::OutputSink;
pub use schema::SchemaMap;
