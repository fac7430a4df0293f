//! CSV files as record tables.

use crate::domain::valuation::record_table::RecordTable;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::info;

pub struct CsvTableSource;

impl CsvTableSource {
    /// Reads a headered CSV. Cells stay raw strings; empty cells are missing
    /// values and short rows are padded with missing values.
    pub fn read(path: &Path) -> Result<RecordTable> {
        let file =
            File::open(path).with_context(|| format!("Failed to open input file {:?}", path))?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header from {:?}", path))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("CSV parse error at record {}", i + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        let table = RecordTable::new(headers, rows);
        info!(
            "CsvTableSource: loaded {} rows x {} columns from {:?}",
            table.len(),
            table.headers().len(),
            path
        );
        Ok(table)
    }

    pub fn write(path: &Path, table: &RecordTable) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create output file {:?}", path))?;
        writer
            .write_record(table.headers())
            .context("Failed to write CSV header")?;
        for row in table.rows() {
            writer.write_record(row).context("Failed to write CSV row")?;
        }
        writer.flush().context("Failed to flush CSV output")?;

        info!("CsvTableSource: wrote {} rows to {:?}", table.len(), path);
        Ok(())
    }
}
