use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix of the machine-readable failure line `get-data` writes to stderr.
pub const FAILURE_MARKER: &str = "FETCH_FAILED";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("index {index} out of range (0–{max})", max = .len.saturating_sub(1))]
    IndexOutOfRange { index: i64, len: usize },

    #[error("no table mapping for position '{0}'")]
    UnknownCategory(String),

    #[error("no section #{0}_sh found on page")]
    SectionNotFound(String),

    #[error("page load for {url} exceeded {secs}s")]
    PageLoadTimeout { url: String, secs: u64 },

    #[error("CSV export for '{schema_id}' did not appear within {secs}s")]
    ExportTimeout { schema_id: String, secs: u64 },

    #[error("could not find CSV header in: {snippet}")]
    HeaderNotFound { snippet: String },

    #[error("malformed export: {0}")]
    Parse(String),

    #[error("input table: {0}")]
    InputTable(String),

    #[error("page driver: {0}")]
    Driver(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Coarse classification of a `FetchError`, stable across the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    IndexOutOfRange,
    UnknownCategory,
    SectionNotFound,
    PageLoadTimeout,
    ExportTimeout,
    HeaderNotFound,
    Parse,
    InputTable,
    Driver,
    Io,
}

impl FetchErrorKind {
    pub const ALL: [FetchErrorKind; 10] = [
        FetchErrorKind::IndexOutOfRange,
        FetchErrorKind::UnknownCategory,
        FetchErrorKind::SectionNotFound,
        FetchErrorKind::PageLoadTimeout,
        FetchErrorKind::ExportTimeout,
        FetchErrorKind::HeaderNotFound,
        FetchErrorKind::Parse,
        FetchErrorKind::InputTable,
        FetchErrorKind::Driver,
        FetchErrorKind::Io,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::IndexOutOfRange => "index_out_of_range",
            FetchErrorKind::UnknownCategory => "unknown_category",
            FetchErrorKind::SectionNotFound => "section_not_found",
            FetchErrorKind::PageLoadTimeout => "page_load_timeout",
            FetchErrorKind::ExportTimeout => "export_timeout",
            FetchErrorKind::HeaderNotFound => "header_not_found",
            FetchErrorKind::Parse => "parse",
            FetchErrorKind::InputTable => "input_table",
            FetchErrorKind::Driver => "driver",
            FetchErrorKind::Io => "io",
        }
    }

    /// Deterministic failures: the same identifier fails the same way every time.
    pub fn is_retriable(self) -> bool {
        !matches!(
            self,
            FetchErrorKind::IndexOutOfRange
                | FetchErrorKind::UnknownCategory
                | FetchErrorKind::InputTable
        )
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FetchErrorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown fetch error kind '{s}'"))
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::IndexOutOfRange { .. } => FetchErrorKind::IndexOutOfRange,
            FetchError::UnknownCategory(_) => FetchErrorKind::UnknownCategory,
            FetchError::SectionNotFound(_) => FetchErrorKind::SectionNotFound,
            FetchError::PageLoadTimeout { .. } => FetchErrorKind::PageLoadTimeout,
            FetchError::ExportTimeout { .. } => FetchErrorKind::ExportTimeout,
            FetchError::HeaderNotFound { .. } => FetchErrorKind::HeaderNotFound,
            FetchError::Parse(_) | FetchError::Csv(_) => FetchErrorKind::Parse,
            FetchError::InputTable(_) => FetchErrorKind::InputTable,
            FetchError::Driver(_) => FetchErrorKind::Driver,
            FetchError::Io(_) => FetchErrorKind::Io,
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

/// `FETCH_FAILED kind=<kind> index=<idx>`
pub fn failure_line(kind: FetchErrorKind, index: i64) -> String {
    format!("{FAILURE_MARKER} kind={kind} index={index}")
}

/// Reads the kind back out of a line produced by [`failure_line`].
pub fn parse_failure_line(line: &str) -> Option<FetchErrorKind> {
    let rest = line.trim().strip_prefix(FAILURE_MARKER)?;
    rest.split_whitespace()
        .find_map(|field| field.strip_prefix("kind="))
        .and_then(|kind| kind.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_kinds_are_not_retriable() {
        assert!(!FetchError::UnknownCategory("K".into()).is_retriable());
        assert!(!FetchError::IndexOutOfRange { index: -1, len: 10 }.is_retriable());
        assert!(FetchError::SectionNotFound("receiving_standard".into()).is_retriable());
        assert!(FetchError::ExportTimeout { schema_id: "x".into(), secs: 5 }.is_retriable());
        assert!(FetchError::HeaderNotFound { snippet: String::new() }.is_retriable());
    }

    #[test]
    fn failure_line_carries_kind() {
        for kind in FetchErrorKind::ALL {
            assert_eq!(parse_failure_line(&failure_line(kind, 7)), Some(kind));
        }
        assert_eq!(parse_failure_line("Scraping index=3: Jane Doe"), None);
        assert_eq!(parse_failure_line("FETCH_FAILED kind=bogus index=1"), None);
    }

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = FetchError::IndexOutOfRange { index: -1, len: 10 };
        assert_eq!(err.to_string(), "index -1 out of range (0–9)");
    }
}
