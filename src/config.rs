//! Environment configuration: input and output paths for one named
//! environment, read from `<config dir>/<env>.json`.

use crate::error::{DataError, MoviesError, Result};
use log::{error, info};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Overrides the directory searched by [`EnvConfig::load`].
pub const CONFIG_DIR_VAR: &str = "MOVIES_CONFIG_DIR";
const DEFAULT_CONFIG_DIR: &str = "config";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    #[default]
    Main,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Main => "main",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "main" => Ok(Environment::Main),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputPaths {
    pub movies_metadata_csv: PathBuf,
    pub ratings_csv: PathBuf,
    pub genres_csv: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputPaths {
    pub movies_metadata_json: PathBuf,
    pub ratings_json: PathBuf,
    pub genres_json: PathBuf,
    pub unique_movies_json: PathBuf,
    pub average_movies_rating_json: PathBuf,
    pub top_5_rated_movies_json: PathBuf,
    pub movies_released_by_year_json: PathBuf,
    pub movies_by_genre_json: PathBuf,
}

impl OutputPaths {
    /// Every artifact as `(name, path)`, in export order.
    pub fn artifacts(&self) -> [(&'static str, &Path); 8] {
        [
            ("movies_metadata", self.movies_metadata_json.as_path()),
            ("ratings", self.ratings_json.as_path()),
            ("genres", self.genres_json.as_path()),
            ("unique_movies", self.unique_movies_json.as_path()),
            ("average_movies_rating", self.average_movies_rating_json.as_path()),
            ("top_5_rated_movies", self.top_5_rated_movies_json.as_path()),
            ("movies_released_by_year", self.movies_released_by_year_json.as_path()),
            ("movies_by_genre", self.movies_by_genre_json.as_path()),
        ]
    }

    fn paths_mut(&mut self) -> [&mut PathBuf; 8] {
        [
            &mut self.movies_metadata_json,
            &mut self.ratings_json,
            &mut self.genres_json,
            &mut self.unique_movies_json,
            &mut self.average_movies_rating_json,
            &mut self.top_5_rated_movies_json,
            &mut self.movies_released_by_year_json,
            &mut self.movies_by_genre_json,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvConfig {
    pub input: InputPaths,
    pub output: OutputPaths,
}

impl EnvConfig {
    /// Loads the configuration for `env` from `$MOVIES_CONFIG_DIR`, or
    /// `./config` when unset.
    pub fn load(env: Environment) -> Result<Self> {
        let dir = std::env::var_os(CONFIG_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
        Self::load_from(&dir, env)
    }

    /// Loads `<dir>/<env>.json`. Relative paths inside the file are resolved
    /// against `dir` and made absolute.
    pub fn load_from(dir: &Path, env: Environment) -> Result<Self> {
        let path = dir.join(format!("{}.json", env));
        info!("Loading {} configuration from {}", env, path.display());
        Self::read(&path).map_err(|source| {
            error!(
                "Error occurred loading configuration {}: {}",
                path.display(),
                source
            );
            MoviesError::Config { path, source }
        })
    }

    fn read(path: &Path) -> std::result::Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: EnvConfig = serde_json::from_str(&text)?;
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let base = std::path::absolute(base)?;
        config.resolve_against(&base);
        Ok(config)
    }

    fn resolve_against(&mut self, base: &Path) {
        let inputs = [
            &mut self.input.movies_metadata_csv,
            &mut self.input.ratings_csv,
            &mut self.input.genres_csv,
        ];
        for path in inputs.into_iter().chain(self.output.paths_mut()) {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Replaces the input paths that are `Some`.
    pub fn with_inputs(
        mut self,
        movies: Option<PathBuf>,
        ratings: Option<PathBuf>,
        genres: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = movies {
            self.input.movies_metadata_csv = path;
        }
        if let Some(path) = ratings {
            self.input.ratings_csv = path;
        }
        if let Some(path) = genres {
            self.input.genres_csv = path;
        }
        self
    }
}
