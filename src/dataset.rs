use crate::config::{EnvConfig, Environment};
use crate::error::{DataError, DataResult, MoviesError, Result};
use crate::extract::read_csv;
use crate::load::write_table;
use crate::structs::{
    AverageRating, GenreCount, OutputFormat, TableRow, UniqueMovies, YearReleases,
};
use crate::table::Table;
use crate::transform;
use log::{error, info};
use std::path::{Path, PathBuf};

/// Number of rows in the exported top-rated artifact.
pub const TOP_RATED_EXPORT: usize = 5;

/// The movies dataset: three immutable base tables and the queries over them.
///
/// Every query is evaluated from the base tables on each call; nothing is
/// cached between calls.
#[derive(Debug, Clone)]
pub struct MoviesDataset {
    config: EnvConfig,
    movies: Table,
    ratings: Table,
    genres: Table,
}

impl MoviesDataset {
    /// Loads the configuration for `env` and then the three input tables.
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Config` if the configuration file cannot be read,
    /// or `MoviesError::Load` for the first input table that fails to load.
    pub fn for_environment(env: Environment) -> Result<Self> {
        Self::open(EnvConfig::load(env)?)
    }

    /// Loads the three input tables named by `config.input`.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved configuration; its input paths are read in the
    ///   order movies, ratings, genres
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Load` naming the first path that cannot be
    /// opened or parsed.
    pub fn open(config: EnvConfig) -> Result<Self> {
        let movies = read_csv(&config.input.movies_metadata_csv)?;
        let ratings = read_csv(&config.input.ratings_csv)?;
        let genres = read_csv(&config.input.genres_csv)?;
        Ok(Self {
            config,
            movies,
            ratings,
            genres,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn movies(&self) -> &Table {
        &self.movies
    }

    pub fn ratings(&self) -> &Table {
        &self.ratings
    }

    pub fn genres(&self) -> &Table {
        &self.genres
    }

    fn run_query<T>(
        &self,
        operation: &'static str,
        query: impl FnOnce() -> DataResult<T>,
    ) -> Result<T> {
        info!("Calling MoviesDataset method {}", operation);
        match query() {
            Ok(result) => {
                info!("The {} method finished successfully.", operation);
                Ok(result)
            }
            Err(source) => {
                error!("Error occurred in {} method: {}", operation, source);
                Err(MoviesError::Query { operation, source })
            }
        }
    }

    /// Number of distinct movie ids.
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Query` with operation `unique_movie_count` if the
    /// movies table has no usable `id` column.
    pub fn unique_movie_count(&self) -> Result<UniqueMovies> {
        self.run_query("unique_movie_count", || {
            transform::unique_movie_count(&self.movies)
        })
    }

    /// Mean rating per rated movie, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Query` with operation `average_movie_rating` if a
    /// required column is missing or has the wrong type.
    pub fn average_movie_rating(&self) -> Result<Vec<AverageRating>> {
        self.run_query("average_movie_rating", || {
            transform::average_movie_rating(&self.movies, &self.ratings)
        })
    }

    /// The `n` best average ratings, highest first; ties keep ascending id.
    ///
    /// # Arguments
    ///
    /// * `n` - Maximum number of rows; `0` yields an empty result
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Query` with operation `top_n_highest_rated` if
    /// the averages it ranks cannot be computed.
    pub fn top_n_highest_rated(&self, n: usize) -> Result<Vec<AverageRating>> {
        self.run_query("top_n_highest_rated", || {
            transform::average_movie_rating(&self.movies, &self.ratings)
                .map(|averages| transform::top_n_highest_rated(averages, n))
        })
    }

    pub fn top_5_highest_rated(&self) -> Result<Vec<AverageRating>> {
        self.top_n_highest_rated(TOP_RATED_EXPORT)
    }

    /// Distinct movies per release year, most releases first.
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Query` with operation `movies_released_each_year`
    /// if the `id` or `release_date` column is missing.
    pub fn movies_released_each_year(&self) -> Result<Vec<YearReleases>> {
        self.run_query("movies_released_each_year", || {
            transform::movies_released_each_year(&self.movies)
        })
    }

    /// Distinct movies per genre, with uncategorised movies under `None`.
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Query` with operation `movies_count_by_genre` if
    /// either table lacks its join columns.
    pub fn movies_count_by_genre(&self) -> Result<Vec<GenreCount>> {
        self.run_query("movies_count_by_genre", || {
            transform::movies_count_by_genre(&self.movies, &self.genres)
        })
    }

    /// Writes the base tables and every derived result as JSON to the
    /// configured output paths.
    pub fn export_all(&self) -> Result<()> {
        self.export_all_as(OutputFormat::Json)
    }

    /// Writes all eight artifacts in `format`.
    ///
    /// Artifacts are written one at a time in a fixed order. Files written
    /// before a failure are left in place.
    ///
    /// # Arguments
    ///
    /// * `format` - Encoding of every artifact; the configured paths keep
    ///   their stem and take the format's extension
    ///
    /// # Errors
    ///
    /// Returns `MoviesError::Export` naming the first artifact that cannot be
    /// written, or `MoviesError::Query` if a result cannot be computed.
    pub fn export_all_as(&self, format: OutputFormat) -> Result<()> {
        info!("Calling MoviesDataset method export_all as {:?}", format);
        let output = &self.config.output;

        self.export(
            &self.movies,
            "movies_metadata",
            &output.movies_metadata_json,
            format,
        )?;
        self.export(&self.ratings, "ratings", &output.ratings_json, format)?;
        self.export(&self.genres, "genres", &output.genres_json, format)?;

        let unique = self.unique_movie_count()?;
        self.export_rows(&[unique], "unique_movies", &output.unique_movies_json, format)?;
        let averages = self.average_movie_rating()?;
        self.export_rows(
            &averages,
            "average_movies_rating",
            &output.average_movies_rating_json,
            format,
        )?;
        let top = self.top_5_highest_rated()?;
        self.export_rows(&top, "top_5_rated_movies", &output.top_5_rated_movies_json, format)?;
        let years = self.movies_released_each_year()?;
        self.export_rows(
            &years,
            "movies_released_by_year",
            &output.movies_released_by_year_json,
            format,
        )?;
        let genres = self.movies_count_by_genre()?;
        self.export_rows(&genres, "movies_by_genre", &output.movies_by_genre_json, format)?;

        info!("The export_all method finished successfully.");
        Ok(())
    }

    fn export_rows<R: TableRow>(
        &self,
        rows: &[R],
        target: &'static str,
        path: &Path,
        format: OutputFormat,
    ) -> Result<()> {
        let table = R::to_table(rows).map_err(|source| export_error(target, path, source))?;
        self.export(&table, target, path, format)
    }

    fn export(
        &self,
        table: &Table,
        target: &'static str,
        path: &Path,
        format: OutputFormat,
    ) -> Result<()> {
        let path = output_path(path, format);
        info!("Saving {} to {}", target, path.display());
        write_table(table, &path, format).map_err(|source| export_error(target, &path, source))
    }
}

fn export_error(target: &'static str, path: &Path, source: DataError) -> MoviesError {
    error!(
        "Error occurred exporting {} to {}: {}",
        target,
        path.display(),
        source
    );
    MoviesError::Export {
        target,
        path: path.to_path_buf(),
        source,
    }
}

/// Swaps the configured extension for the one matching `format`.
pub fn output_path(path: &Path, format: OutputFormat) -> PathBuf {
    match format {
        OutputFormat::Json => path.to_path_buf(),
        other => path.with_extension(other.extension()),
    }
}
