//! The persistence boundary: record sinks with insert-or-ignore semantics.

use crate::error::PipelineError;
use core_types::Record;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// A destination for engine output rows.
///
/// Rows whose primary key is already present are skipped, never updated. The
/// returned count is the number of rows actually inserted.
pub trait RecordSink {
    fn insert_or_ignore<R>(&mut self, rows: &[R]) -> Result<usize, PipelineError>
    where
        R: Record + Clone + Send + 'static,
        R::Key: Send + 'static;
}

/// Keeps every table in memory, ordered by primary key.
#[derive(Default)]
pub struct MemorySink {
    tables: HashMap<&'static str, Box<dyn Any + Send>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored rows of `R`'s table in primary-key order.
    pub fn rows<R>(&self) -> Vec<&R>
    where
        R: Record + 'static,
        R::Key: 'static,
    {
        self.tables
            .get(R::SCHEMA.name)
            .and_then(|table| table.downcast_ref::<BTreeMap<R::Key, R>>())
            .map(|table| table.values().collect())
            .unwrap_or_default()
    }

    pub fn len<R>(&self) -> usize
    where
        R: Record + 'static,
        R::Key: 'static,
    {
        self.rows::<R>().len()
    }

    fn table_mut<R>(&mut self) -> Result<&mut BTreeMap<R::Key, R>, PipelineError>
    where
        R: Record + Send + 'static,
        R::Key: Send + 'static,
    {
        self.tables
            .entry(R::SCHEMA.name)
            .or_insert_with(|| Box::new(BTreeMap::<R::Key, R>::new()))
            .downcast_mut::<BTreeMap<R::Key, R>>()
            .ok_or_else(|| {
                PipelineError::Sink(format!(
                    "table '{}' already holds a different record type",
                    R::SCHEMA.name
                ))
            })
    }
}

impl RecordSink for MemorySink {
    fn insert_or_ignore<R>(&mut self, rows: &[R]) -> Result<usize, PipelineError>
    where
        R: Record + Clone + Send + 'static,
        R::Key: Send + 'static,
    {
        let table = self.table_mut::<R>()?;
        let mut inserted = 0;
        for row in rows {
            if let std::collections::btree_map::Entry::Vacant(slot) = table.entry(row.key()) {
                slot.insert(row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// Writes each table to `<directory>/<table>.json` as a JSON array.
///
/// Deduplication happens in memory; the file is rewritten after every insert
/// so it always mirrors the table's current contents.
pub struct JsonSink {
    directory: PathBuf,
    tables: MemorySink,
}

impl JsonSink {
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory, tables: MemorySink::new() })
    }

    pub fn table_path<R: Record>(&self) -> PathBuf {
        self.directory.join(format!("{}.json", R::SCHEMA.name))
    }
}

impl RecordSink for JsonSink {
    fn insert_or_ignore<R>(&mut self, rows: &[R]) -> Result<usize, PipelineError>
    where
        R: Record + Clone + Send + 'static,
        R::Key: Send + 'static,
    {
        let inserted = self.tables.insert_or_ignore(rows)?;
        let path = self.table_path::<R>();
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &self.tables.rows::<R>())?;
        tracing::debug!(table = R::SCHEMA.name, inserted, path = %path.display(), "Wrote table");
        Ok(inserted)
    }
}
