use crate::driver::{PageDriver, SessionFactory};
use crate::error::{FetchError, Result};
use crate::export::{clean_header, CleanedRecord};
use crate::input::{InputRow, InputTable};
use crate::output::OutputSink;
use crate::schema::SchemaMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub row:       InputRow,
    pub schema_id: String,
    pub record:    CleanedRecord,
    pub path:      PathBuf,
}

/// Fetches one player's stats table and writes it to the output sink.
pub struct Fetcher<F> {
    table:             InputTable,
    schema:            SchemaMap,
    sink:              OutputSink,
    factory:           F,
    page_load_timeout: Duration,
    export_wait:       Duration,
}

impl<F: SessionFactory> Fetcher<F> {
    pub fn new(table: InputTable, schema: SchemaMap, sink: OutputSink, factory: F) -> Self {
        Self {
            table,
            schema,
            sink,
            factory,
            page_load_timeout: Duration::from_secs(30),
            export_wait:       Duration::from_secs(5),
        }
    }

    pub fn with_timeouts(mut self, page_load_timeout: Duration, export_wait: Duration) -> Self {
        self.page_load_timeout = page_load_timeout;
        self.export_wait = export_wait;
        self
    }

    pub fn table(&self) -> &InputTable {
        &self.table
    }

    pub fn fetch(&self, index: i64) -> Result<FetchOutcome> {
        // Validation first: neither failure may touch the browser.
        let row = self.table.get(index)?.clone();
        let schema_id = self.schema.resolve(&row.pos)?.to_string();

        info!("Scraping index={}: {} ({}) → {}", row.index, row.player, row.pos, row.url);

        let raw = {
            let mut driver = self.factory.open()?;
            self.scrape(&mut driver, &row.url, &schema_id)?
        };
        let raw = raw.ok_or_else(|| {
            warn!("Timeout while scraping {}", row.url);
            FetchError::ExportTimeout {
                schema_id: schema_id.clone(),
                secs:      self.export_wait.as_secs(),
            }
        })?;

        let clean = clean_header(&raw)?;
        let mut record = CleanedRecord::parse(&clean)?;
        record.tag(&row);
        log_preview(&record);

        let path = self.sink.write(&row, &record)?;
        info!("Saved {} rows to {}", record.len(), path.display());

        Ok(FetchOutcome { row, schema_id, record, path })
    }

    fn scrape(&self, driver: &mut F::Driver, url: &str, schema_id: &str) -> Result<Option<String>> {
        driver.navigate(url, self.page_load_timeout)?;

        if !driver.has_section(schema_id)? {
            warn!("No section #{}_sh found on page.", schema_id);
            return Err(FetchError::SectionNotFound(schema_id.to_string()));
        }

        driver.expand_section(schema_id)?;
        driver.trigger_export(schema_id)?;
        driver.export_text(schema_id, self.export_wait)
    }
}

fn log_preview(record: &CleanedRecord) {
    info!("{} rows × {} columns: {}", record.len(), record.headers.len(), record.headers.join(","));
    for row in record.rows.iter().take(PREVIEW_ROWS) {
        debug!("  {}", row.join(","));
    }
    if record.len() > PREVIEW_ROWS {
        debug!("  … {} more", record.len() - PREVIEW_ROWS);
    }
}
