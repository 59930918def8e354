pub mod sqlite;

use log::{debug, info};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Result, SabimError};
use crate::record::{merge_collections, validate_collection, validate_record, MergePolicy, Record};

pub use sqlite::{SqliteTable, TableRow, BIBTEX_COLUMNS};

/// Persistent collection of records keyed by `id`.
///
/// Only one writer is expected per backing resource for the duration of a run.
pub trait RecordStore {
    /// Whether the backing resource exists yet.
    fn exists(&self) -> bool;

    /// Read every record, in stored order.
    fn read_all(&self) -> Result<Vec<Record>>;

    /// Replace the backing content with `records`.
    fn write_all(&self, records: &[Record]) -> Result<()>;

    /// Concatenate `records` after the existing ones without deduplicating ids.
    ///
    /// Once ids repeat, [`RecordStore::write_all`], [`RecordStore::upsert`],
    /// [`RecordStore::update`] and analysis runs against this store fail with
    /// `SabimError::InvalidInput("duplicate id '<id>'")` until the duplicates
    /// are removed with a fresh `write_all`.
    fn append(&self, records: Vec<Record>) -> Result<()>;

    /// Merge `records` into the store by id using `policy`, creating the
    /// backing resource when it does not exist.
    fn upsert_with(&self, records: Vec<Record>, policy: MergePolicy) -> Result<()> {
        validate_collection(&records)?;
        let mut current = if self.exists() { self.read_all()? } else { Vec::new() };
        merge_collections(&mut current, records, policy);
        self.write_all(&current)
    }

    /// Insert new ids and fill gaps in existing ones; existing values win.
    fn upsert(&self, records: Vec<Record>) -> Result<()> {
        self.upsert_with(records, MergePolicy::FillGaps)
    }

    /// Same merge as [`RecordStore::upsert`], but only against an existing store.
    fn update(&self, records: Vec<Record>) -> Result<()>;
}

/// Record store backed by a single JSON file holding an array of flat records.
#[derive(Debug, Clone)]
pub struct JsonStore {
    file_path: PathBuf,
}

impl JsonStore {
    /// Store at `dir/file`.
    pub fn new(dir: impl AsRef<Path>, file: &str) -> Self {
        Self {
            file_path: dir.as_ref().join(file),
        }
    }

    /// Store at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Write through a temporary file in the same directory, then rename over the target.
    fn persist<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let dir = match self.file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let temp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
            value.serialize(&mut serializer)?;
            writer.flush()?;
        }
        temp.persist(&self.file_path).map_err(|e| SabimError::Io(e.error))?;
        Ok(())
    }
}

impl RecordStore for JsonStore {
    fn exists(&self) -> bool {
        self.file_path.exists()
    }

    fn read_all(&self) -> Result<Vec<Record>> {
        if !self.exists() {
            return Err(SabimError::NotFound(self.file_path.clone()));
        }
        let content = fs::read_to_string(&self.file_path)?;
        let records: Vec<Record> = serde_json::from_str(&content)?;
        debug!("Read {} records from {:?}", records.len(), self.file_path);
        Ok(records)
    }

    fn write_all(&self, records: &[Record]) -> Result<()> {
        validate_collection(records)?;
        self.persist(records)?;
        debug!("Wrote {} records to {:?}", records.len(), self.file_path);
        Ok(())
    }

    fn append(&self, records: Vec<Record>) -> Result<()> {
        for record in &records {
            validate_record(record)?;
        }
        let mut combined = if self.exists() { self.read_all()? } else { Vec::new() };
        combined.extend(records);
        self.persist(&combined)
    }

    fn update(&self, records: Vec<Record>) -> Result<()> {
        if !self.exists() {
            return Err(SabimError::NotFound(self.file_path.clone()));
        }
        info!("Updating {} records in {:?}", records.len(), self.file_path);
        self.upsert(records)
    }
}
