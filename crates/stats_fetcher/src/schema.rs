//! Position code → stats table section.

use crate::error::{FetchError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFENSE: &str = "defense_standard";

/// Exact, case-sensitive lookup from position code to schema identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMap {
    entries: HashMap<String, String>,
}

impl Default for SchemaMap {
    fn default() -> Self {
        let mut entries: HashMap<String, String> = [
            ("QB", "passing_standard"),
            ("WR", "receiving_standard"),
            ("TE", "receiving_standard"),
            ("RB", "rushing_standard"),
        ]
        .into_iter()
        .map(|(pos, id)| (pos.to_string(), id.to_string()))
        .collect();

        for pos in ["DE", "T", "LB", "DB", "DT", "G", "CB", "NT", "C", "S", "OLB", "ILB", "DL"] {
            entries.insert(pos.to_string(), DEFENSE.to_string());
        }
        Self { entries }
    }
}

impl SchemaMap {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// JSON object `{ "QB": "passing_standard", ... }`; replaces the built-in map.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&text)
            .map_err(|e| FetchError::InputTable(format!("schema map {}: {}", path.display(), e)))?;
        Ok(Self { entries })
    }

    pub fn resolve(&self, pos: &str) -> Result<&str> {
        self.entries
            .get(pos)
            .map(String::as_str)
            .ok_or_else(|| FetchError::UnknownCategory(pos.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
