use crate::error::DataResult;
use crate::structs::{AverageRating, GenreCount, UniqueMovies, YearReleases};
use crate::table::Table;
use chrono::NaiveDate;
use log::debug;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Counts the distinct movie ids of the movies table.
///
/// Ids are compared as their raw cell text, so duplicate movie rows are
/// counted once and ids that are not integers (dirty rows such as
/// `1997-08-20`) are still counted.
///
/// # Arguments
///
/// * `movies` - Movies table with an `id` column
///
/// # Returns
///
/// Returns a single `UniqueMovies` row. Null ids are not counted.
///
/// # Errors
///
/// Returns `DataError::Data` if the `id` column is missing or cannot be read
/// as text.
pub fn unique_movie_count(movies: &Table) -> DataResult<UniqueMovies> {
    let ids = movies.text_values("id")?;
    let distinct: HashSet<Cow<'_, str>> = ids.into_iter().flatten().collect();
    Ok(UniqueMovies {
        movies_count: distinct.len() as i64,
    })
}

/// Averages ratings per movie, inner-joined against the movies table.
///
/// Ratings whose `movieId` has no movie row are dropped, as are movies
/// without ratings. The title comes from the first movie row carrying the
/// id.
///
/// # Arguments
///
/// * `movies` - Movies table with `id` and `original_title` columns
/// * `ratings` - Ratings table with `movieId` and numeric `rating` columns
///
/// # Returns
///
/// Returns one `AverageRating` per rated movie, ordered by ascending id, with
/// the arithmetic mean of its ratings.
///
/// # Errors
///
/// Returns `DataError::Data` if a required column is missing, `rating` is
/// not numeric, or a key column cannot be read as integers.
pub fn average_movie_rating(movies: &Table, ratings: &Table) -> DataResult<Vec<AverageRating>> {
    let titles = first_titles(movies)?;
    let movie_ids = ratings.key_values("movieId")?;
    let values = ratings.numeric_values("rating")?;

    // (sum, count) per id
    let mut totals: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    let mut unmatched = 0usize;
    for (id, rating) in movie_ids.into_iter().zip(values) {
        let (Some(id), Some(rating)) = (id, rating) else {
            continue;
        };
        if !titles.contains_key(&id) {
            unmatched += 1;
            continue;
        }
        let entry = totals.entry(id).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }
    if unmatched > 0 {
        debug!("Skipped {} ratings without a matching movie", unmatched);
    }

    Ok(totals
        .into_iter()
        .map(|(id, (sum, count))| AverageRating {
            id,
            title: titles.get(&id).cloned().flatten(),
            average_rating: sum / count as f64,
        })
        .collect())
}

fn first_titles(movies: &Table) -> DataResult<HashMap<i64, Option<String>>> {
    let ids = movies.key_values("id")?;
    let titles = movies.text_values("original_title")?;
    let mut first = HashMap::with_capacity(ids.len());
    for (id, title) in ids.into_iter().zip(titles) {
        if let Some(id) = id {
            first
                .entry(id)
                .or_insert_with(|| title.map(Cow::into_owned));
        }
    }
    Ok(first)
}

/// Keeps the `n` highest averages, highest first.
///
/// The sort is stable, so equal averages keep the ascending-id order of
/// [`average_movie_rating`].
pub fn top_n_highest_rated(mut averages: Vec<AverageRating>, n: usize) -> Vec<AverageRating> {
    averages.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));
    averages.truncate(n);
    averages
}

/// Counts distinct movies per release year.
///
/// Only `release_date` values shaped exactly `YYYY-MM-DD` that name a real
/// calendar day are bucketed; everything else, including year-only values,
/// is skipped.
///
/// # Returns
///
/// Returns one `YearReleases` per year, ordered by count descending, then
/// year ascending.
///
/// # Errors
///
/// Returns `DataError::Data` if the `id` or `release_date` column is
/// missing.
pub fn movies_released_each_year(movies: &Table) -> DataResult<Vec<YearReleases>> {
    let ids = movies.text_values("id")?;
    let dates = movies.text_values("release_date")?;

    let mut by_year: HashMap<String, HashSet<Cow<'_, str>>> = HashMap::new();
    let mut skipped = 0usize;
    for (id, date) in ids.into_iter().zip(dates) {
        let Some(id) = id else {
            continue;
        };
        match date.as_deref().and_then(release_year) {
            Some(year) => {
                by_year.entry(year).or_default().insert(id);
            }
            None => skipped += 1,
        }
    }
    debug!("Skipped {} movie rows without a usable release date", skipped);

    let mut results: Vec<YearReleases> = by_year
        .into_iter()
        .map(|(year, ids)| YearReleases {
            year,
            movies_released: ids.len() as i64,
        })
        .collect();
    results.sort_by(|a, b| {
        b.movies_released
            .cmp(&a.movies_released)
            .then_with(|| a.year.cmp(&b.year))
    });
    Ok(results)
}

/// Returns the four-digit year of a strict `YYYY-MM-DD` date.
fn release_year(date: &str) -> Option<String> {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some(date[..4].to_string())
}

/// Counts distinct movies per genre using a left join from movies to genres.
///
/// Movies without any membership, movies whose id cannot match a membership
/// (non-integer ids), and memberships with a null genre name all fall into
/// the `None` bucket. Movies are told apart by their raw id text.
///
/// # Arguments
///
/// * `movies` - Movies table with an `id` column
/// * `genres` - Genre-membership table with `id` and `genre_name` columns
///
/// # Returns
///
/// Returns one `GenreCount` per genre, ordered by count descending, then
/// genre ascending with `None` first.
///
/// # Errors
///
/// Returns `DataError::Data` if a required column is missing or the
/// membership `id` column cannot be read as integers.
pub fn movies_count_by_genre(movies: &Table, genres: &Table) -> DataResult<Vec<GenreCount>> {
    let movie_keys = movies.key_values("id")?;
    let movie_ids = movies.text_values("id")?;
    let member_ids = genres.key_values("id")?;
    let names = genres.text_values("genre_name")?;

    let mut memberships: HashMap<i64, Vec<Option<Cow<'_, str>>>> = HashMap::new();
    for (id, name) in member_ids.into_iter().zip(names) {
        if let Some(id) = id {
            memberships.entry(id).or_default().push(name);
        }
    }

    let mut by_genre: HashMap<Option<&str>, HashSet<&str>> = HashMap::new();
    for (key, id) in movie_keys.into_iter().zip(movie_ids.iter()) {
        let Some(id) = id.as_deref() else {
            continue;
        };
        match key.and_then(|k| memberships.get(&k)) {
            Some(names) => {
                for name in names {
                    by_genre.entry(name.as_deref()).or_default().insert(id);
                }
            }
            None => {
                by_genre.entry(None).or_default().insert(id);
            }
        }
    }

    let mut results: Vec<GenreCount> = by_genre
        .into_iter()
        .map(|(genre, ids)| GenreCount {
            genre: genre.map(str::to_string),
            movies_count: ids.len() as i64,
        })
        .collect();
    results.sort_by(|a, b| {
        b.movies_count
            .cmp(&a.movies_count)
            .then_with(|| a.genre.cmp(&b.genre))
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Float64Array, Int64Array, StringArray};
    use arrow_schema::{DataType, Field, Schema};
    use std::sync::Arc;

    fn movies(rows: &[(i64, &str, Option<&str>)]) -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("original_title", DataType::Utf8, false),
            Field::new("release_date", DataType::Utf8, true),
        ]);
        Table::try_from_columns(
            "movies",
            schema,
            vec![
                Arc::new(rows.iter().map(|r| r.0).collect::<Int64Array>()),
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
                Arc::new(rows.iter().map(|r| r.2).collect::<StringArray>()),
            ],
        )
        .unwrap()
    }

    fn ratings(rows: &[(i64, f64)]) -> Table {
        let schema = Schema::new(vec![
            Field::new("movieId", DataType::Int64, false),
            Field::new("rating", DataType::Float64, false),
        ]);
        Table::try_from_columns(
            "ratings",
            schema,
            vec![
                Arc::new(rows.iter().map(|r| r.0).collect::<Int64Array>()),
                Arc::new(rows.iter().map(|r| r.1).collect::<Float64Array>()),
            ],
        )
        .unwrap()
    }

    fn genres(rows: &[(i64, Option<&str>)]) -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("genre_name", DataType::Utf8, true),
        ]);
        Table::try_from_columns(
            "genres",
            schema,
            vec![
                Arc::new(rows.iter().map(|r| r.0).collect::<Int64Array>()),
                Arc::new(rows.iter().map(|r| r.1).collect::<StringArray>()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn unique_count_ignores_duplicates() {
        let table = movies(&[(1, "a", None), (1, "a", None), (2, "b", None)]);
        assert_eq!(unique_movie_count(&table).unwrap().movies_count, 2);
    }

    #[test]
    fn average_is_exact_mean_and_inner_joined() {
        let table = movies(&[(1, "one", None), (2, "two", None)]);
        let rated = ratings(&[(1, 2.0), (1, 5.0), (1, 5.0), (9, 1.0)]);
        let averages = average_movie_rating(&table, &rated).unwrap();

        assert_eq!(
            averages,
            vec![AverageRating {
                id: 1,
                title: Some("one".to_string()),
                average_rating: 4.0,
            }]
        );
    }

    #[test]
    fn title_comes_from_first_matching_row() {
        let table = movies(&[(1, "first", None), (1, "second", None)]);
        let rated = ratings(&[(1, 3.0)]);
        let averages = average_movie_rating(&table, &rated).unwrap();
        assert_eq!(averages[0].title.as_deref(), Some("first"));
    }

    #[test]
    fn top_n_is_stable_on_ties() {
        let rows = [(1, 4.0), (2, 5.0), (3, 4.0), (4, 5.0)]
            .into_iter()
            .map(|(id, avg)| AverageRating {
                id,
                title: None,
                average_rating: avg,
            })
            .collect();
        let top: Vec<i64> = top_n_highest_rated(rows, 3).iter().map(|r| r.id).collect();
        assert_eq!(top, vec![2, 4, 1]);
    }

    #[test]
    fn top_n_larger_than_input_returns_everything() {
        let rows = vec![AverageRating {
            id: 1,
            title: None,
            average_rating: 1.0,
        }];
        assert_eq!(top_n_highest_rated(rows, 5).len(), 1);
    }

    #[test]
    fn release_year_requires_exact_shape() {
        assert_eq!(release_year("1995-01-01").as_deref(), Some("1995"));
        assert_eq!(release_year("1995-06"), None);
        assert_eq!(release_year(""), None);
        assert_eq!(release_year("1995-1-01"), None);
        assert_eq!(release_year(" 1995-01-01"), None);
        assert_eq!(release_year("1995-13-01"), None);
    }

    #[test]
    fn years_count_distinct_ids_and_order_by_count_then_year() {
        let table = movies(&[
            (1, "a", Some("2001-01-01")),
            (1, "a", Some("2001-01-01")),
            (2, "b", Some("1990-05-05")),
            (3, "c", Some("2001-02-02")),
            (4, "d", Some("1980-01-01")),
            (5, "e", Some("1995-06")),
            (6, "f", None),
        ]);
        let years = movies_released_each_year(&table).unwrap();
        let pairs: Vec<(&str, i64)> = years
            .iter()
            .map(|r| (r.year.as_str(), r.movies_released))
            .collect();
        assert_eq!(pairs, vec![("2001", 2), ("1980", 1), ("1990", 1)]);
    }

    #[test]
    fn genres_left_join_keeps_uncategorised_movies() {
        let table = movies(&[(1, "a", None), (2, "b", None), (3, "c", None), (3, "c", None)]);
        let members = genres(&[(1, Some("Drama")), (1, Some("Comedy")), (2, Some("Drama")), (9, Some("Horror"))]);
        let counts = movies_count_by_genre(&table, &members).unwrap();

        assert_eq!(
            counts,
            vec![
                GenreCount {
                    genre: Some("Drama".to_string()),
                    movies_count: 2,
                },
                GenreCount {
                    genre: None,
                    movies_count: 1,
                },
                GenreCount {
                    genre: Some("Comedy".to_string()),
                    movies_count: 1,
                },
            ]
        );
    }

    #[test]
    fn null_genre_name_joins_null_bucket() {
        let table = movies(&[(1, "a", None), (2, "b", None)]);
        let members = genres(&[(1, None)]);
        let counts = movies_count_by_genre(&table, &members).unwrap();
        assert_eq!(
            counts,
            vec![GenreCount {
                genre: None,
                movies_count: 2,
            }]
        );
    }

    /// Movies table whose columns were inferred from the cells, not declared.
    fn inferred_movies(
        ids: arrow_array::ArrayRef,
        titles: arrow_array::ArrayRef,
        dates: arrow_array::ArrayRef,
    ) -> Table {
        let schema = Schema::new(vec![
            Field::new("id", ids.data_type().clone(), true),
            Field::new("original_title", titles.data_type().clone(), true),
            Field::new("release_date", dates.data_type().clone(), true),
        ]);
        Table::try_from_columns("movies", schema, vec![ids, titles, dates]).unwrap()
    }

    #[test]
    fn year_only_release_dates_are_skipped_not_rejected() {
        let table = inferred_movies(
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(StringArray::from(vec!["a", "b"])),
            Arc::new(Int64Array::from(vec![1995, 2001])),
        );
        assert!(movies_released_each_year(&table).unwrap().is_empty());
    }

    #[test]
    fn numeric_titles_are_kept_as_text() {
        let table = inferred_movies(
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Int64Array::from(vec![1917, 2012])),
            Arc::new(StringArray::from(vec![Some("2019-12-25"), None])),
        );
        let rated = ratings(&[(1, 4.0), (2, 2.0)]);
        let titles: Vec<Option<String>> = average_movie_rating(&table, &rated)
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec![Some("1917".to_string()), Some("2012".to_string())]);
    }

    #[test]
    fn numeric_genre_names_are_counted() {
        let table = movies(&[(1, "a", None)]);
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("genre_name", DataType::Int64, false),
        ]);
        let members = Table::try_from_columns(
            "genres",
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(Int64Array::from(vec![1984])),
            ],
        )
        .unwrap();
        let counts = movies_count_by_genre(&table, &members).unwrap();
        assert_eq!(counts[0].genre.as_deref(), Some("1984"));
    }

    #[test]
    fn text_ids_that_are_not_integers_still_count() {
        let table = inferred_movies(
            Arc::new(StringArray::from(vec!["1", "2", "1997-08-20", "2"])),
            Arc::new(StringArray::from(vec!["a", "b", "c", "b"])),
            Arc::new(StringArray::from(vec![
                Some("2001-01-01"),
                None,
                Some("2001-05-05"),
                None,
            ])),
        );
        assert_eq!(unique_movie_count(&table).unwrap().movies_count, 3);

        let years = movies_released_each_year(&table).unwrap();
        assert_eq!(
            years,
            vec![YearReleases {
                year: "2001".to_string(),
                movies_released: 2,
            }]
        );

        let members = genres(&[(1, Some("Drama")), (2, Some("Drama"))]);
        let counts = movies_count_by_genre(&table, &members).unwrap();
        assert_eq!(
            counts,
            vec![
                GenreCount {
                    genre: Some("Drama".to_string()),
                    movies_count: 2,
                },
                GenreCount {
                    genre: None,
                    movies_count: 1,
                },
            ]
        );
    }

    #[test]
    fn missing_column_fails() {
        let rated = ratings(&[(1, 1.0)]);
        assert!(unique_movie_count(&rated).is_err());
    }
}
