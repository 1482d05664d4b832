use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{Result, TimekeeperError};
use crate::models::timekeeper::TimesheetEntry;

const FIELDS_PER_ROW: usize = 4;

/// A headerless four-column timesheet file. Every call to [`RowSource::rows`]
/// reopens the file, so iterating twice yields the same rows.
///
/// Blank lines are skipped and are not rows. Any other line with a field count
/// other than four is a [`TimekeeperError::Format`] error.
#[derive(Debug, Clone)]
pub struct RowSource {
    path: PathBuf,
}

impl RowSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> Result<Rows<File>> {
        info!("Opening timesheet file: {}", self.path.display());
        let file = File::open(&self.path).map_err(|e| {
            error!("Failed to open {}: {}", self.path.display(), e);
            TimekeeperError::from(csv::Error::from(e))
        })?;
        Ok(Rows::from_reader(file))
    }
}

/// Lazy iterator over the entries of a byte stream.
pub struct Rows<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: Read> Rows<R> {
    pub fn from_reader(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(false)
            // field counts are checked per row below
            .flexible(true)
            .from_reader(reader)
            .into_records();
        Self { records }
    }
}

impl<R: Read> Iterator for Rows<R> {
    type Item = Result<TimesheetEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        if record.len() != FIELDS_PER_ROW {
            let line = record.position().map_or(0, |p| p.line());
            error!(
                "Row on line {} has {} fields, expected {}",
                line,
                record.len(),
                FIELDS_PER_ROW
            );
            return Some(Err(TimekeeperError::Format {
                line,
                expected: FIELDS_PER_ROW,
                found: record.len(),
            }));
        }

        Some(Ok(TimesheetEntry {
            description: record[0].to_string(),
            hours_worked: record[1].to_string(),
            work_order: record[2].to_string(),
            labor_task_name: record[3].to_string(),
        }))
    }
}
