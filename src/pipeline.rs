use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cluster::{KMeansConfig, cluster_metadata};
use crate::domain::{ClusteredTable, MetadataTable, Query};
use crate::error::FluError;
use crate::genbank::parse_metadata;
use crate::ncbi::{EntrezClient, fetch_metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Parse,
    Cluster,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Fetch => "Fetch",
            Stage::Parse => "Parse",
            Stage::Cluster => "Cluster",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Discards progress; tracing already records the stage boundaries.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub query: String,
    pub records_fetched: usize,
    pub table: ClusteredTable,
}

pub struct Pipeline<C: EntrezClient> {
    client: C,
    clustering: KMeansConfig,
}

impl<C: EntrezClient> Pipeline<C> {
    pub fn new(client: C, clustering: KMeansConfig) -> Self {
        Self { client, clustering }
    }

    pub fn fetch(
        &self,
        query: &Query,
        max_results: usize,
        sink: &dyn ProgressSink,
    ) -> Result<String, FluError> {
        sink.event(ProgressEvent {
            stage: Stage::Fetch,
            message: format!("searching nucleotide for {query} (max {max_results})"),
            elapsed: None,
        });
        let start = Instant::now();
        let text = fetch_metadata(&self.client, query, max_results)?;
        sink.event(ProgressEvent {
            stage: Stage::Fetch,
            message: format!("fetched {} bytes of GenBank text", text.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(text)
    }

    pub fn parse(&self, text: &str, sink: &dyn ProgressSink) -> Result<MetadataTable, FluError> {
        let start = Instant::now();
        let table = parse_metadata(text)?;
        sink.event(ProgressEvent {
            stage: Stage::Parse,
            message: format!("parsed {} records", table.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(table)
    }

    /// An empty table yields an empty clustered table instead of a clustering error.
    pub fn cluster(
        &self,
        table: MetadataTable,
        sink: &dyn ProgressSink,
    ) -> Result<ClusteredTable, FluError> {
        if table.is_empty() {
            tracing::warn!("no records to cluster");
            sink.event(ProgressEvent {
                stage: Stage::Cluster,
                message: "no records to cluster".to_string(),
                elapsed: None,
            });
            return Ok(ClusteredTable {
                clusters: self.clustering.clusters,
                rows: Vec::new(),
            });
        }
        let start = Instant::now();
        let clustered = cluster_metadata(table, &self.clustering)?;
        sink.event(ProgressEvent {
            stage: Stage::Cluster,
            message: format!(
                "assigned {} rows to {} clusters",
                clustered.len(),
                clustered.clusters
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(clustered)
    }

    pub fn run(
        &self,
        query: &Query,
        max_results: usize,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, FluError> {
        let text = self.fetch(query, max_results, sink)?;
        let table = self.parse(&text, sink)?;
        let records_fetched = table.len();
        let table = self.cluster(table, sink)?;
        Ok(RunResult {
            query: query.to_string(),
            records_fetched,
            table,
        })
    }
}
