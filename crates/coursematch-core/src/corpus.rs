//! In-memory, immutable course catalog.
//!
//! A `CorpusStore` is a snapshot: it is built once from whatever the catalog
//! collector produced and never mutated afterwards. Any change to the set of
//! courses means building a new store (and a new index over it).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::info;

use crate::error::{CourseMatchError, Result};
use crate::types::{CourseId, CourseRecord};

#[derive(Debug, Clone)]
pub struct CorpusStore {
    records: Vec<CourseRecord>,
    positions: HashMap<CourseId, usize>,
}

impl CorpusStore {
    /// Validate and freeze a collected catalog, preserving its order.
    pub fn new(records: Vec<CourseRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(CourseMatchError::EmptyCorpus);
        }

        let mut positions = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if record.id.as_str().trim().is_empty() {
                return Err(CourseMatchError::InvalidCourse(format!(
                    "record at position {} has an empty id",
                    pos
                )));
            }
            if record.text.trim().is_empty() {
                return Err(CourseMatchError::InvalidCourse(format!(
                    "course '{}' has no text to embed",
                    record.id
                )));
            }
            if positions.insert(record.id.clone(), pos).is_some() {
                return Err(CourseMatchError::DuplicateCourse(record.id.to_string()));
            }
        }

        Ok(Self { records, positions })
    }

    /// Parse a JSON array of course records.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<CourseRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    /// Load a JSON array of course records from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json_str(&content)?;
        info!(path = %path.display(), courses = store.len(), "Corpus loaded");
        Ok(store)
    }

    pub fn get(&self, id: &CourseId) -> Option<&CourseRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &CourseId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct embedding texts in first-seen order.
    ///
    /// Catalogs often repeat a description across several listings; each
    /// distinct text only needs to be embedded once.
    pub fn unique_texts(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.records.len());
        self.records
            .iter()
            .map(|r| r.text.as_str())
            .filter(|text| seen.insert(*text))
            .collect()
    }
}
