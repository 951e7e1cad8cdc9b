use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading an input dataset from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported geometry format {extension:?} for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("malformed {kind} data in {path}: {message}")]
    Malformed {
        path: PathBuf,
        kind: &'static str,
        message: String,
    },

    #[error("attribute column {column:?} not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("cannot determine coordinate reference system for {path}")]
    UnknownCrs { path: PathBuf },

    #[error("unsupported coordinate reference system {crs:?} for {path}")]
    UnsupportedCrs { path: PathBuf, crs: String },
}

/// A geometry that cannot be reprojected or overlapped.
///
/// Always fatal: a single bad ring would silently skew every downstream
/// overlap area, so the run stops and names the offending record.
#[derive(Debug, Error)]
#[error("invalid geometry in {dataset} record {record_id:?}: {reason}")]
pub struct GeometryError {
    pub dataset: String,
    pub record_id: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to write report: {0}")]
    ReportIo(#[from] std::io::Error),

    #[error("failed to write CSV report: {0}")]
    ReportCsv(#[from] csv::Error),

    #[error("failed to serialize report: {0}")]
    ReportJson(#[from] serde_json::Error),
}
