//! Turning the page's CSV export text into tagged rows.
//!
//! The exported text starts with an attribution preamble (and sometimes a
//! grouped header line) before the real `Season,...` header.

use crate::error::{FetchError, Result};
use crate::input::InputRow;

/// First line of real data starts with this.
pub const MARKER: &str = "Season,";

pub const PLAYER_COLUMN: &str = "Player";
pub const POS_COLUMN: &str = "Pos";

/// Drops every line before the first one that starts with [`MARKER`].
pub fn clean_header(raw: &str) -> Result<String> {
    let lines: Vec<&str> = raw.lines().collect();
    match lines.iter().position(|line| line.starts_with(MARKER)) {
        Some(start) => Ok(lines[start..].join("\n")),
        None => Err(FetchError::HeaderNotFound { snippet: snippet(raw, 200) }),
    }
}

fn snippet(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

/// Parsed export rows, all belonging to a single player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedRecord {
    pub headers: Vec<String>,
    pub rows:    Vec<Vec<String>>,
}

impl CleanedRecord {
    /// Parses cleaned text; the first line is the header row.
    pub fn parse(clean: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(clean.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(FetchError::Parse("empty header row".to_string()));
        }

        let mut rows = Vec::new();
        for (n, record) in reader.records().enumerate() {
            let record = record.map_err(|e| FetchError::Parse(format!("data row {}: {}", n + 1, e)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if rows.is_empty() {
            return Err(FetchError::Parse("export has a header but no data rows".to_string()));
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sets `Player` and `Pos` on every row, appending the columns if absent.
    pub fn tag(&mut self, row: &InputRow) {
        self.set_column(PLAYER_COLUMN, &row.player);
        self.set_column(POS_COLUMN, &row.pos);
    }

    fn set_column(&mut self, name: &str, value: &str) {
        let col = match self.headers.iter().position(|h| h == name) {
            Some(col) => col,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };
        for row in &mut self.rows {
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = value.to_string();
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let col = self.headers.iter().position(|h| h == name)?;
        Some(self.rows.iter().map(|r| r.get(col).map(String::as_str).unwrap_or("")).collect())
    }
}
