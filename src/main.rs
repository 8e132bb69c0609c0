use clap::Parser;
use log::{LevelFilter, debug, error};
use movies::dataset::output_path;
use movies::{
    AverageRating, DatasetLogger, EnvConfig, Environment, MoviesDataset, MoviesError,
    OutputFormat, Table, derive_genre_memberships, read_csv, write_csv,
};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration environment selecting input and output paths
    #[arg(short, long, default_value = "main")]
    env: Environment,

    /// Movies metadata CSV (overrides the configured path)
    #[arg(long)]
    movies: Option<PathBuf>,

    /// Ratings CSV (overrides the configured path)
    #[arg(long)]
    ratings: Option<PathBuf>,

    /// Genre memberships CSV (overrides the configured path)
    #[arg(long)]
    genres: Option<PathBuf>,

    /// Number of highest rated movies to print
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Encoding of the exported files
    #[arg(long, default_value = "json")]
    format: OutputFormat,

    /// Derive the genre memberships CSV from the movies file, write it here and exit
    #[arg(long)]
    generate_genres: Option<PathBuf>,

    /// Append log lines to this file, keeping them out of the printed report
    #[arg(long, default_value = "movies_dataset_logs.log")]
    log_file: PathBuf,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn main() -> Result<(), MoviesError> {
    let total_start = Instant::now();
    let args = Args::parse();
    init_logger(&args);

    let config = EnvConfig::load(args.env)?.with_inputs(
        args.movies.clone(),
        args.ratings.clone(),
        args.genres.clone(),
    );

    if let Some(output) = &args.generate_genres {
        let movies = read_csv(&config.input.movies_metadata_csv)?;
        let genres = derive_genre_memberships(&movies)?;
        write_csv(&genres, output).map_err(|source| {
            error!("Error occurred writing genres to {}: {}", output.display(), source);
            MoviesError::Export {
                target: "genres",
                path: output.clone(),
                source,
            }
        })?;
        println!(
            "Wrote {} genre memberships to {}",
            genres.num_rows(),
            output.display()
        );
        return Ok(());
    }

    // 1. Load
    let dataset = MoviesDataset::open(config)?;
    println!("--- 1. Load the dataset from CSV files.");
    print_types(dataset.movies());
    print_types(dataset.ratings());
    print_types(dataset.genres());

    // 2. Unique movies
    let unique = dataset.unique_movie_count()?;
    println!("\n--- 2. Number of unique movies in the dataset.");
    println!("------ Unique movies count: {}", unique.movies_count);

    // 3. Average ratings
    let averages = dataset.average_movie_rating()?;
    println!("\n--- 3. Average rating of all the movies.");
    print_ratings(&averages);

    // 4. Top rated
    let top = dataset.top_n_highest_rated(args.top)?;
    println!("\n--- 4. Top {} highest rated movies.", args.top);
    print_ratings(&top);

    // 5. Releases per year
    let years = dataset.movies_released_each_year()?;
    println!("\n--- 5. Number of movies released each year.");
    println!("{:>6} {:>16}", "year", "movies_released");
    for row in &years {
        println!("{:>6} {:>16}", row.year, row.movies_released);
    }

    // 6. Movies per genre
    let genres = dataset.movies_count_by_genre()?;
    println!("\n--- 6. Number of movies in each genre.");
    println!("{:>20} {:>13}", "genre", "movies_count");
    for row in &genres {
        println!(
            "{:>20} {:>13}",
            row.genre.as_deref().unwrap_or("<NA>"),
            row.movies_count
        );
    }

    // 7. Export
    let io_start = Instant::now();
    dataset.export_all_as(args.format)?;
    println!("\n--- 7. Save the dataset to {:?} files:", args.format);
    for (name, path) in dataset.config().output.artifacts() {
        let path = output_path(path, args.format);
        println!("------------ {} saved to: {}", name, path.display());
    }
    debug!("Export took {:.2?}", io_start.elapsed());

    println!("\nTotal runtime: {:.2?}", total_start.elapsed());
    Ok(())
}

fn init_logger(args: &Args) {
    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let logger = match DatasetLogger::new(level).with_file(&args.log_file) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!(
                "Cannot open log file {}: {}",
                args.log_file.display(),
                err
            );
            DatasetLogger::new(level)
        }
    };
    if let Err(err) = logger.install() {
        eprintln!("Logger already installed: {}", err);
    }
}

fn print_types(table: &Table) {
    println!("------ {} ------", table.name());
    for (name, data_type, nullable) in table.column_types() {
        let null = if nullable { " (nullable)" } else { "" };
        println!("{:<20} {}{}", name, data_type, null);
    }
}

fn print_ratings(rows: &[AverageRating]) {
    println!("{:>8} {:<40} {:>14}", "id", "title", "average_rating");
    for row in rows {
        println!(
            "{:>8} {:<40} {:>14.3}",
            row.id,
            row.title.as_deref().unwrap_or("<NA>"),
            row.average_rating
        );
    }
}
