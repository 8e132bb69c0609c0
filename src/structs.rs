use crate::error::DataResult;
use crate::table::Table;
use arrow_array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow_schema::{DataType, Field, Schema};
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record as LogRecord, SetLoggerError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Logger writing `<timestamp>:<LEVEL>:<message>` lines to a file or stdout.
///
/// Nothing is installed implicitly; the driver builds one and calls
/// [`DatasetLogger::install`].
pub struct DatasetLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl DatasetLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level, file: None }
    }

    /// Appends to `path` instead of printing to stdout.
    pub fn with_file(mut self, path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(Mutex::new(file));
        Ok(self)
    }

    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    fn format(record: &LogRecord) -> String {
        format!(
            "{}:{}:{}",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            record.level(),
            record.args()
        )
    }
}

impl Log for DatasetLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &LogRecord) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        match &self.file {
            Some(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(file, "{}", line);
                }
            }
            None => println!("{}", line),
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Output encoding for exported artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

/// A typed result row that can be turned into a [`Table`] for export.
pub trait TableRow: Sized {
    const TABLE_NAME: &'static str;

    fn schema() -> Schema;

    fn columns(rows: &[Self]) -> Vec<ArrayRef>;

    fn to_table(rows: &[Self]) -> DataResult<Table> {
        Table::try_from_columns(Self::TABLE_NAME, Self::schema(), Self::columns(rows))
    }
}

/// Number of distinct movie ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueMovies {
    pub movies_count: i64,
}

impl TableRow for UniqueMovies {
    const TABLE_NAME: &'static str = "unique_movies";

    fn schema() -> Schema {
        Schema::new(vec![Field::new("movies_count", DataType::Int64, false)])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let counts: Int64Array = rows.iter().map(|r| r.movies_count).collect();
        vec![Arc::new(counts)]
    }
}

/// Mean rating of one movie.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageRating {
    pub id: i64,
    pub title: Option<String>,
    pub average_rating: f64,
}

impl TableRow for AverageRating {
    const TABLE_NAME: &'static str = "average_movies_rating";

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("average_rating", DataType::Float64, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let ids: Int64Array = rows.iter().map(|r| r.id).collect();
        let titles: StringArray = rows.iter().map(|r| r.title.as_deref()).collect();
        let averages: Float64Array = rows.iter().map(|r| r.average_rating).collect();
        vec![Arc::new(ids), Arc::new(titles), Arc::new(averages)]
    }
}

/// Distinct movies released in one calendar year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearReleases {
    pub year: String,
    pub movies_released: i64,
}

impl TableRow for YearReleases {
    const TABLE_NAME: &'static str = "movies_released_by_year";

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("year", DataType::Utf8, false),
            Field::new("movies_released", DataType::Int64, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let years = StringArray::from_iter_values(rows.iter().map(|r| r.year.as_str()));
        let counts: Int64Array = rows.iter().map(|r| r.movies_released).collect();
        vec![Arc::new(years), Arc::new(counts)]
    }
}

/// Distinct movies in one genre; `genre` is `None` for uncategorised movies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreCount {
    pub genre: Option<String>,
    pub movies_count: i64,
}

impl TableRow for GenreCount {
    const TABLE_NAME: &'static str = "movies_by_genre";

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("genre", DataType::Utf8, true),
            Field::new("movies_count", DataType::Int64, false),
        ])
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let genres: StringArray = rows.iter().map(|r| r.genre.as_deref()).collect();
        let counts: Int64Array = rows.iter().map(|r| r.movies_count).collect();
        vec![Arc::new(genres), Arc::new(counts)]
    }
}
