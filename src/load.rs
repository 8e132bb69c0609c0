use crate::error::{DataError, DataResult};
use crate::structs::OutputFormat;
use crate::table::Table;
use arrow_array::{Array, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::DataType;
use csv::Writer;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Value, json};
use std::io::Write;
use std::{fs::File, path::Path};

/// Writes a table in the requested format, creating parent directories.
pub fn write_table(table: &Table, output_path: &Path, format: OutputFormat) -> DataResult<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match format {
        OutputFormat::Json => write_json(table, output_path),
        OutputFormat::Csv => write_csv(table, output_path),
        OutputFormat::Parquet => write_parquet(table, output_path),
    }
}

/// Writes a table to a row-oriented JSON document with a declared schema.
///
/// The document has two keys: `schema.fields` lists every column with its
/// name, type (`integer`, `number` or `string`) and nullability, and `data`
/// holds one object per row in column order. Output is indented with four
/// spaces.
///
/// # Errors
/// Returns error if the file cannot be created, a column type is not
/// supported, or serialization fails.
pub fn write_json(table: &Table, output_path: &Path) -> DataResult<()> {
    let document = to_json(table)?;
    let mut file = File::create(output_path)?;
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut file, formatter);
    serde::Serialize::serialize(&document, &mut serializer)?;
    file.flush()?;
    Ok(())
}

/// Builds the JSON document written by [`write_json`].
pub fn to_json(table: &Table) -> DataResult<Value> {
    let schema = table.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        fields.push(json!({
            "name": field.name(),
            "type": json_type_name(field.data_type())?,
            "nullable": field.is_nullable(),
        }));
    }

    let batch = table.batch();
    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut object = Map::with_capacity(batch.num_columns());
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            object.insert(field.name().clone(), cell_json(column.as_ref(), row)?);
        }
        rows.push(Value::Object(object));
    }

    Ok(json!({
        "schema": { "fields": fields },
        "data": rows,
    }))
}

fn json_type_name(data_type: &DataType) -> DataResult<&'static str> {
    match data_type {
        DataType::Int64 => Ok("integer"),
        DataType::Float64 => Ok("number"),
        DataType::Utf8 => Ok("string"),
        other => Err(unsupported(other)),
    }
}

fn cell_json(column: &dyn Array, row: usize) -> DataResult<Value> {
    if column.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match column.data_type() {
        DataType::Int64 => Value::from(downcast::<Int64Array>(column)?.value(row)),
        DataType::Float64 => Number::from_f64(downcast::<Float64Array>(column)?.value(row))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DataType::Utf8 => Value::from(downcast::<StringArray>(column)?.value(row)),
        other => return Err(unsupported(other)),
    };
    Ok(value)
}

fn cell_text(column: &dyn Array, row: usize) -> DataResult<String> {
    if column.is_null(row) {
        return Ok(String::new());
    }
    let text = match column.data_type() {
        DataType::Int64 => downcast::<Int64Array>(column)?.value(row).to_string(),
        DataType::Float64 => downcast::<Float64Array>(column)?.value(row).to_string(),
        DataType::Utf8 => downcast::<StringArray>(column)?.value(row).to_string(),
        other => return Err(unsupported(other)),
    };
    Ok(text)
}

fn downcast<T: 'static>(column: &dyn Array) -> DataResult<&T> {
    column
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| unsupported(column.data_type()))
}

fn unsupported(data_type: &DataType) -> DataError {
    DataError::Data(format!("Unsupported column type: {}", data_type))
}

/// Writes a table to a CSV file with a header row; nulls become empty cells.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_csv(table: &Table, output_path: &Path) -> DataResult<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    let batch = table.batch();
    let schema = table.schema();
    writer.write_record(schema.fields().iter().map(|f| f.name().as_str()))?;

    for row in 0..batch.num_rows() {
        let record = batch
            .columns()
            .iter()
            .map(|column| cell_text(column.as_ref(), row))
            .collect::<DataResult<Vec<_>>>()?;
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes a table to a columnar Parquet file using its Arrow schema.
///
/// # Errors
/// Returns error if file cannot be created or Arrow/Parquet operations fail.
pub fn write_parquet(table: &Table, output_path: &Path) -> DataResult<()> {
    let batch: &RecordBatch = table.batch();
    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    Ok(())
}
