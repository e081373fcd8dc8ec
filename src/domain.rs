use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

pub const DEFAULT_QUERY: &str = r#""H5N1"[Organism] AND "avian"[Host]"#;
pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const UNKNOWN_HOST: &str = "unknown";

/// An Entrez search expression, e.g. `"H5N1"[Organism] AND "avian"[Host]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Query {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FetchError::InvalidQuery(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl Default for Query {
    fn default() -> Self {
        Self(DEFAULT_QUERY.to_string())
    }
}

/// Opaque Entrez UID returned by esearch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub accession: String,
    pub organism: String,
    pub date: String,
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataTable {
    pub rows: Vec<MetadataRow>,
}

impl MetadataTable {
    pub const COLUMNS: [&'static str; 4] = ["accession", "organism", "date", "host"];

    pub fn new(rows: Vec<MetadataRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.host.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusteredRow {
    #[serde(flatten)]
    pub row: MetadataRow,
    pub host_encoded: usize,
    pub cluster: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusteredTable {
    pub clusters: usize,
    pub rows: Vec<ClusteredRow>,
}

impl ClusteredTable {
    pub const COLUMNS: [&'static str; 6] = [
        "accession",
        "organism",
        "date",
        "host",
        "host_encoded",
        "cluster",
    ];

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labels(&self) -> Vec<usize> {
        self.rows.iter().map(|row| row.cluster).collect()
    }

    /// Row count per cluster label, indexed by label.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.clusters];
        for row in &self.rows {
            if let Some(size) = sizes.get_mut(row.cluster) {
                *size += 1;
            }
        }
        sizes
    }

    /// Distinct host values ordered by their encoding.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for row in &self.rows {
            if row.host_encoded == hosts.len() {
                hosts.push(row.row.host.as_str());
            }
        }
        hosts
    }
}
