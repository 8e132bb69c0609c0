use crate::error::{DataError, DataResult, MoviesError, Result};
use crate::table::{ColumnType, Table};
use arrow_array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow_schema::{DataType, Field, Schema};
use csv::ReaderBuilder;
use log::{debug, error, info};
use std::{path::Path, sync::Arc};

/// Reads a comma-delimited file with a header row into a [`Table`].
///
/// Every column is typed by inference over its non-empty cells (see
/// [`ColumnType::infer`]); empty cells become nulls. The table is named after
/// the file stem.
///
/// # Errors
///
/// Returns `MoviesError::Load` if the file cannot be opened, is not valid
/// CSV, or has rows whose field count differs from the header.
pub fn read_csv(file_path: &Path) -> Result<Table> {
    info!("Calling function read_csv on file {}.", file_path.display());
    match read_table(file_path) {
        Ok(table) => {
            info!(
                "The read_csv function finished successfully. Table created from CSV file: {} ({} rows)",
                file_path.display(),
                table.num_rows()
            );
            Ok(table)
        }
        Err(source) => {
            error!(
                "Error occurred in read_csv function on {}: {}",
                file_path.display(),
                source
            );
            Err(MoviesError::Load {
                path: file_path.to_path_buf(),
                source,
            })
        }
    }
}

fn read_table(file_path: &Path) -> DataResult<Table> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(file_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(DataError::Data(format!(
            "{} has no header row",
            file_path.display()
        )));
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (column, value) in cells.iter_mut().zip(record.iter()) {
            column.push(value.to_string());
        }
    }

    let mut fields = Vec::with_capacity(headers.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(headers.len());
    for (name, values) in headers.iter().zip(cells.iter()) {
        let (column_type, nullable) = ColumnType::infer(values.iter().map(String::as_str));
        debug!("Column {} inferred as {:?}", name, column_type);
        fields.push(Field::new(name, column_type.data_type(), nullable));
        columns.push(build_column(column_type, values)?);
    }

    let name = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table");
    Table::try_from_columns(name, Schema::new(fields), columns)
}

fn build_column(column_type: ColumnType, values: &[String]) -> DataResult<ArrayRef> {
    let array: ArrayRef = match column_type {
        ColumnType::Integer | ColumnType::NullableInteger => {
            let parsed = values
                .iter()
                .map(|v| parse_cell::<i64>(v))
                .collect::<DataResult<Vec<_>>>()?;
            Arc::new(Int64Array::from(parsed))
        }
        ColumnType::Decimal => {
            let parsed = values
                .iter()
                .map(|v| parse_cell::<f64>(v))
                .collect::<DataResult<Vec<_>>>()?;
            Arc::new(Float64Array::from(parsed))
        }
        ColumnType::Text => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| (!v.is_empty()).then_some(v.as_str()))
                .collect::<Vec<_>>(),
        )),
    };
    Ok(array)
}

fn parse_cell<T: std::str::FromStr>(value: &str) -> DataResult<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<T>()
        .map(Some)
        .map_err(|_| DataError::Data(format!("Cannot parse cell value: {}", value)))
}

/// Builds the genre-membership table from the embedded `genres` column of the
/// movies table.
///
/// The `genres` cells hold a literal list of dicts such as
/// `[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': 'Comedy'}]`; one
/// `(id, genre_name)` row is produced per name, in file order. Rows with an
/// empty `genres` cell or an unusable id contribute nothing.
pub fn derive_genre_memberships(movies: &Table) -> Result<Table> {
    info!("Calling function derive_genre_memberships on table {}.", movies.name());
    derive_memberships(movies).map_err(|source| {
        error!("Error occurred in derive_genre_memberships function: {}", source);
        MoviesError::Query {
            operation: "derive_genre_memberships",
            source,
        }
    })
}

fn derive_memberships(movies: &Table) -> DataResult<Table> {
    let ids = movies.key_values("id")?;
    let genres = movies.text_values("genres")?;

    let mut member_ids = Vec::new();
    let mut names = Vec::new();
    for (id, raw) in ids.into_iter().zip(genres) {
        let (Some(id), Some(raw)) = (id, raw) else {
            continue;
        };
        for name in genre_names(&raw) {
            member_ids.push(id);
            names.push(name);
        }
    }
    debug!("Derived {} genre memberships", member_ids.len());

    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("genre_name", DataType::Utf8, false),
    ]);
    Table::try_from_columns(
        "genres",
        schema,
        vec![
            Arc::new(Int64Array::from(member_ids)),
            Arc::new(StringArray::from(names)),
        ],
    )
}

/// Pulls every `'name': '<value>'` entry out of a literal list of dicts.
///
/// Strings may be single- or double-quoted; a backslash escapes the next
/// character.
fn genre_names(raw: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = raw;
    while let Some(pos) = find_name_key(rest) {
        rest = &rest[pos..];
        let Some(colon) = rest.find(':') else {
            break;
        };
        rest = rest[colon + 1..].trim_start();
        match read_quoted(rest) {
            Some((value, consumed)) => {
                names.push(value);
                rest = &rest[consumed..];
            }
            None => break,
        }
    }
    names
}

fn find_name_key(source: &str) -> Option<usize> {
    let single = source.find("'name'").map(|i| i + "'name'".len());
    let double = source.find("\"name\"").map(|i| i + "\"name\"".len());
    match (single, double) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn read_quoted(source: &str) -> Option<(String, usize)> {
    let quote = source.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let mut out = String::new();
    let mut escaped = false;
    for (idx, ch) in source.char_indices().skip(1) {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Some((out, idx + ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    None
}
