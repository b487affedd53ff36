//! CSV storage for board tables.
//!
//! [`CsvTable`] is both the record source the runner reads and the checkpoint it flushes to.
//! Every write goes through [`atomic_write`], so a reader never sees a half-written file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::record::{Label, LabelableRecord, RecordTable};
use crate::{Error, Result, LABEL_COLUMN};

/// Supplies the rows to label, in processing order.
pub trait RecordSource {
    fn load(&self) -> Result<RecordTable>;

    fn source_path(&self) -> &Path;
}

/// Durable home of the labeled-so-far table.
pub trait CheckpointStore {
    fn exists(&self) -> bool;

    /// Previously flushed table, if there is one.
    fn load_existing(&self) -> Result<Option<RecordTable>>;

    /// Replaces the stored table with `table`. Either fully succeeds or leaves the old one intact.
    fn save(&mut self, table: &RecordTable) -> Result<()>;

    fn location(&self) -> &Path;
}

/// A UTF-8 CSV file with a header row.
#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
}

impl CsvTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for CsvTable {
    fn load(&self) -> Result<RecordTable> {
        read_table(&self.path)
    }

    fn source_path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for CsvTable {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load_existing(&self) -> Result<Option<RecordTable>> {
        if !self.exists() {
            return Ok(None);
        }
        read_table(&self.path).map(Some)
    }

    fn save(&mut self, table: &RecordTable) -> Result<()> {
        write_table(&self.path, table)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Reads a CSV file. A `label` column, when present, is lifted out of the fields.
pub fn read_table(path: &Path) -> Result<RecordTable> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if let Some(first) = headers.first_mut() {
        // Spreadsheet exports like to prepend a BOM.
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    let label_col = headers.iter().position(|h| h == LABEL_COLUMN);
    if let Some(col) = label_col {
        headers.remove(col);
    }

    let mut table = RecordTable::new(headers);
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        let mut label = Label::default();

        if let Some(col) = label_col {
            let raw = if col < fields.len() {
                fields.remove(col)
            } else {
                String::new()
            };
            if !raw.trim().is_empty() {
                label = raw.parse().map_err(|_| Error::InvalidLabel {
                    path: path.to_path_buf(),
                    row: row + 1,
                    value: raw.clone(),
                })?;
            }
        }

        table.push(LabelableRecord { fields, label });
    }

    Ok(table)
}

/// Writes `table` with `label` as the last column.
pub fn write_table(path: &Path, table: &RecordTable) -> Result<()> {
    atomic_write(path, |file| {
        let mut writer = csv::Writer::from_writer(file);

        let mut header: Vec<&str> = table.headers().iter().map(String::as_str).collect();
        header.push(LABEL_COLUMN);
        writer.write_record(&header)?;

        for record in table.rows() {
            let label = record.label.to_string();
            writer.write_record(
                record
                    .fields
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(label.as_str())),
            )?;
        }

        writer.flush()?;
        Ok(())
    })
}

/// Writes to a temp file next to `target` → fsync → rename over `target`.
/// When `write` fails the temp file is dropped and `target` is untouched.
pub(crate) fn atomic_write<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    // Same directory as the target so the rename stays on one filesystem.
    let mut temp = NamedTempFile::new_in(&parent)?;
    write(temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;

    temp.persist(target).map_err(|e| Error::Persist {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
