//! The player table every fetch is indexed against.

use crate::error::{FetchError, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// One row of the input table. `index` is its ordinal position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    pub index:  usize,
    pub player: String,
    pub pos:    String,
    pub url:    String,
}

#[derive(Deserialize)]
struct RawRow {
    #[serde(rename = "Player")]
    player: String,
    #[serde(rename = "Pos", default)]
    pos: String,
    #[serde(rename = "College Stats URL", default)]
    url: String,
}

#[derive(Debug, Clone, Default)]
pub struct InputTable {
    rows: Vec<InputRow>,
}

impl InputTable {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = csv::Reader::from_path(path)
            .map_err(|e| FetchError::InputTable(format!("{}: {}", path.display(), e)))?;
        Self::from_csv(reader)
            .map_err(|e| FetchError::InputTable(format!("{}: {}", path.display(), e)))
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(rdr))
            .map_err(|e| FetchError::InputTable(e.to_string()))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> std::result::Result<Self, String> {
        let headers = reader.headers().map_err(|e| e.to_string())?.clone();
        for required in ["Player", "Pos", "College Stats URL"] {
            if !headers.iter().any(|h| h == required) {
                return Err(format!("missing column '{required}'"));
            }
        }

        let mut rows = Vec::new();
        for (index, record) in reader.deserialize::<RawRow>().enumerate() {
            let raw = record.map_err(|e| format!("row {index}: {e}"))?;
            rows.push(InputRow {
                index,
                player: raw.player.trim().to_string(),
                pos:    raw.pos.trim().to_string(),
                url:    raw.url.trim().to_string(),
            });
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bounds-checked lookup by ordinal; negative identifiers are out of range.
    pub fn get(&self, index: i64) -> Result<&InputRow> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.rows.get(i))
            .ok_or(FetchError::IndexOutOfRange { index, len: self.rows.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;

    const TABLE: &str = "\
Rk,Player,Pos,Tm,College Stats URL
1,Jane Doe,WR,KC,http://example/jane
2,John Roe,QB,BUF,http://example/john
";

    #[test]
    fn rows_are_indexed_by_ordinal() {
        let table = InputTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let row = table.get(1).unwrap();
        assert_eq!(row.index, 1);
        assert_eq!(row.player, "John Roe");
        assert_eq!(row.pos, "QB");
        assert_eq!(row.url, "http://example/john");
    }

    #[test]
    fn out_of_bounds_identifiers_fail() {
        let table = InputTable::from_reader(TABLE.as_bytes()).unwrap();
        for index in [-1, 2, i64::MAX] {
            let err = table.get(index).unwrap_err();
            assert_eq!(err.kind(), FetchErrorKind::IndexOutOfRange);
        }
    }

    #[test]
    fn missing_url_column_is_rejected() {
        let err = InputTable::from_reader("Player,Pos\nJane Doe,WR\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::InputTable);
        assert!(err.to_string().contains("College Stats URL"));
    }
}
