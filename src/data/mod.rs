//! Dataset store for the sales CSV.
//!
//! The dataset is loaded once at startup and is read-only afterwards,
//! so it can be shared between request handlers without locking.

use crate::models::SalesRecord;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Columns every dataset must provide.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "employee_id",
    "created",
    "lead_taken",
    "tours_booked",
    "applications",
    "revenue_confirmed",
    "revenue_pending",
];

/// Errors raised while loading the dataset.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to open dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read CSV header of {}: {source}", path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset {} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Malformed row {row} in dataset {}: {source}", path.display())]
    Row {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },
}

/// In-memory, immutable collection of sales records.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    records: Vec<SalesRecord>,
}

impl DatasetStore {
    /// Load the dataset from a CSV file.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let file = File::open(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::from_reader(file, path)?;
        info!(
            "Loaded {} sales records for {} employees from {}",
            store.len(),
            store.employee_count(),
            path.display()
        );

        Ok(store)
    }

    /// Parse CSV content from any reader. `origin` is only used in errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().map_err(|source| DataError::Header {
            path: origin.to_path_buf(),
            source,
        })?;

        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(DataError::MissingColumn {
                    path: origin.to_path_buf(),
                    column,
                });
            }
        }

        let mut records = Vec::new();
        for (index, result) in rdr.deserialize::<SalesRecord>().enumerate() {
            let record = result.map_err(|source| DataError::Row {
                path: origin.to_path_buf(),
                row: index + 1,
                source,
            })?;
            records.push(record);
        }

        debug!("Parsed {} rows from {}", records.len(), origin.display());
        Ok(Self { records })
    }

    /// Build a store from records that are already in memory.
    #[allow(dead_code)] // Used by tests across modules
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }

    /// All records, in file order.
    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    /// Records belonging to one employee. Empty when the employee is unknown.
    pub fn filter_by_employee(&self, employee_id: i64) -> Vec<&SalesRecord> {
        self.records
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .collect()
    }

    /// Number of distinct employees in the dataset.
    pub fn employee_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.employee_id)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
