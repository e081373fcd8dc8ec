use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("missing credentials file (searched: {searched})")]
    #[diagnostic(help("create credentials.json with an `email` field, or pass --credentials"))]
    Missing { searched: String },

    #[error("failed to read credentials file at {0}")]
    Read(Utf8PathBuf),

    #[error("failed to parse credentials JSON: {0}")]
    Parse(String),

    #[error("credentials file has no usable `email` field")]
    MissingEmail,

    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("NCBI request failed: {0}")]
    Http(String),

    #[error("NCBI returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected esearch response: {0}")]
    SearchResponse(String),

    #[error("esearch rejected the query: {0}")]
    SearchRejected(String),
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("line {line}: LOCUS line has no locus name")]
    MalformedLocus { line: usize },

    #[error("line {line}: new LOCUS before the end of record `{locus}`")]
    UnterminatedRecord { line: usize, locus: String },

    #[error("premature end of input inside record `{locus}`")]
    UnexpectedEof { locus: String },
}

#[derive(Debug, Error, Diagnostic)]
pub enum ClusterError {
    #[error("cluster count must be at least 1")]
    InvalidClusterCount,

    #[error("n_samples={samples} should be >= n_clusters={clusters}")]
    TooFewSamples { samples: usize, clusters: usize },
}

#[derive(Debug, Error, Diagnostic)]
pub enum PlotError {
    #[error("terminal error: {0}")]
    Terminal(String),
}

#[derive(Debug, Error, Diagnostic)]
pub enum FluError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plot(#[from] PlotError),
}
