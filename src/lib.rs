pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod load;
pub mod structs;
pub mod table;
pub mod transform;

// Re-export public API
pub use config::{EnvConfig, Environment, InputPaths, OutputPaths};
pub use dataset::MoviesDataset;
pub use error::{DataError, MoviesError, Result};
pub use extract::{derive_genre_memberships, read_csv};
pub use load::{write_csv, write_json, write_parquet, write_table};
pub use structs::{
    AverageRating, DatasetLogger, GenreCount, OutputFormat, TableRow, UniqueMovies, YearReleases,
};
pub use table::{ColumnType, Table};
