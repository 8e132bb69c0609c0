use arrow_schema::ArrowError;
use std::path::PathBuf;

/// Low level causes raised while reading, querying or writing tables.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Data Error: {0}")]
    Data(String),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced to callers of the dataset, one variant per failing stage.
#[derive(Debug, thiserror::Error)]
pub enum MoviesError {
    #[error("Load Error: cannot load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: DataError,
    },
    #[error("Config Error: {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: DataError,
    },
    #[error("Query Error in {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: DataError,
    },
    #[error("Export Error writing {target} to {}: {source}", .path.display())]
    Export {
        target: &'static str,
        path: PathBuf,
        #[source]
        source: DataError,
    },
}

pub type DataResult<T> = std::result::Result<T, DataError>;
pub type Result<T> = std::result::Result<T, MoviesError>;
