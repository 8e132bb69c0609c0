use crate::error::{DataError, DataResult};
use arrow_array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Schema, SchemaRef};
use std::borrow::Cow;
use std::sync::Arc;

/// Column type detected from the raw cell values of a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    NullableInteger,
    Decimal,
    Text,
}

impl ColumnType {
    /// Infers the narrowest type that can hold every non-empty cell.
    ///
    /// Integers win over decimals, decimals over text. A column without any
    /// non-empty cell is text.
    pub fn infer<'a, I>(cells: I) -> (ColumnType, bool)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut has_empty = false;
        let mut has_value = false;
        let mut all_int = true;
        let mut all_float = true;

        for cell in cells {
            if cell.is_empty() {
                has_empty = true;
                continue;
            }
            has_value = true;
            if all_int && cell.parse::<i64>().is_err() {
                all_int = false;
            }
            if all_float && cell.parse::<f64>().is_err() {
                all_float = false;
            }
        }

        let column_type = if !has_value {
            ColumnType::Text
        } else if all_int && has_empty {
            ColumnType::NullableInteger
        } else if all_int {
            ColumnType::Integer
        } else if all_float {
            ColumnType::Decimal
        } else {
            ColumnType::Text
        };
        (column_type, has_empty)
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColumnType::Integer | ColumnType::NullableInteger => DataType::Int64,
            ColumnType::Decimal => DataType::Float64,
            ColumnType::Text => DataType::Utf8,
        }
    }
}

/// A named, immutable in-memory table backed by a single Arrow record batch.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    batch: RecordBatch,
}

impl Table {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// Builds a table from a schema and matching column arrays.
    pub fn try_from_columns(
        name: impl Into<String>,
        schema: Schema,
        columns: Vec<ArrayRef>,
    ) -> DataResult<Self> {
        let batch = RecordBatch::try_new(Arc::new(schema), columns)?;
        Ok(Self::new(name, batch))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    fn column(&self, name: &str) -> DataResult<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| self.missing(name))
    }

    fn missing(&self, name: &str) -> DataError {
        DataError::Data(format!(
            "Column not found: {} in table {}",
            name, self.name
        ))
    }

    /// Reads a numeric column as `f64`, widening integer columns.
    pub fn numeric_values(&self, name: &str) -> DataResult<Vec<Option<f64>>> {
        let column = self.column(name)?;
        if let Some(floats) = column.as_any().downcast_ref::<Float64Array>() {
            return Ok(floats.iter().collect());
        }
        if let Some(ints) = column.as_any().downcast_ref::<Int64Array>() {
            return Ok(ints.iter().map(|v| v.map(|i| i as f64)).collect());
        }
        Err(DataError::Data(format!(
            "Column {} is not numeric ({})",
            name,
            column.data_type()
        )))
    }

    /// Reads a key column as integers.
    ///
    /// Text key columns come from dirty source files where a few cells are
    /// not integers; those cells yield `None` and never match a join.
    pub fn key_values(&self, name: &str) -> DataResult<Vec<Option<i64>>> {
        let column = self.column(name)?;
        if let Some(ints) = column.as_any().downcast_ref::<Int64Array>() {
            return Ok(ints.iter().collect());
        }
        if let Some(text) = column.as_any().downcast_ref::<StringArray>() {
            return Ok(text
                .iter()
                .map(|v| v.and_then(|s| s.trim().parse::<i64>().ok()))
                .collect());
        }
        Err(DataError::Data(format!(
            "Column {} cannot be used as a key ({})",
            name,
            column.data_type()
        )))
    }

    /// Reads a column as text, with nulls as `None`.
    ///
    /// Numeric columns are rendered cell by cell, so a text column whose
    /// values all happened to parse as numbers (`1995`, `1917`) still reads.
    pub fn text_values(&self, name: &str) -> DataResult<Vec<Option<Cow<'_, str>>>> {
        let column = self.column(name)?;
        if let Some(text) = column.as_any().downcast_ref::<StringArray>() {
            return Ok(text.iter().map(|v| v.map(Cow::Borrowed)).collect());
        }
        if let Some(ints) = column.as_any().downcast_ref::<Int64Array>() {
            return Ok(ints
                .iter()
                .map(|v| v.map(|i| Cow::Owned(i.to_string())))
                .collect());
        }
        if let Some(floats) = column.as_any().downcast_ref::<Float64Array>() {
            return Ok(floats
                .iter()
                .map(|v| v.map(|f| Cow::Owned(f.to_string())))
                .collect());
        }
        Err(DataError::Data(format!(
            "Column {} cannot be read as text ({})",
            name,
            column.data_type()
        )))
    }

    pub fn column_types(&self) -> Vec<(String, DataType, bool)> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone(), f.is_nullable()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::Field;

    fn sample() -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("code", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ]);
        Table::try_from_columns(
            "sample",
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![Some("10"), None, Some("x1")])),
                Arc::new(Float64Array::from(vec![Some(1.5), None, Some(2.0)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn infers_integer_columns() {
        assert_eq!(
            ColumnType::infer(["1", "2", "-3"]),
            (ColumnType::Integer, false)
        );
        assert_eq!(
            ColumnType::infer(["1", "", "3"]),
            (ColumnType::NullableInteger, true)
        );
    }

    #[test]
    fn infers_decimal_and_text_columns() {
        assert_eq!(
            ColumnType::infer(["2.0", "5", "4.5"]),
            (ColumnType::Decimal, false)
        );
        assert_eq!(
            ColumnType::infer(["1995-01-01", "", "2000-04-01"]),
            (ColumnType::Text, true)
        );
        assert_eq!(ColumnType::infer(["", ""]), (ColumnType::Text, true));
    }

    #[test]
    fn numeric_values_widen_integers() {
        let table = sample();
        assert_eq!(
            table.numeric_values("id").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
        assert_eq!(
            table.numeric_values("score").unwrap(),
            vec![Some(1.5), None, Some(2.0)]
        );
        assert!(table.numeric_values("code").is_err());
    }

    #[test]
    fn key_values_parse_text_keys() {
        let table = sample();
        assert_eq!(
            table.key_values("code").unwrap(),
            vec![Some(10), None, None]
        );
        assert!(table.key_values("score").is_err());
    }

    #[test]
    fn text_values_render_numeric_columns() {
        let table = sample();
        let ids: Vec<Option<String>> = table
            .text_values("id")
            .unwrap()
            .into_iter()
            .map(|v| v.map(Cow::into_owned))
            .collect();
        assert_eq!(
            ids,
            vec![Some("1".to_string()), Some("2".to_string()), Some("3".to_string())]
        );
        let scores = table.text_values("score").unwrap();
        assert_eq!(scores[0].as_deref(), Some("1.5"));
        assert_eq!(scores[1], None);
    }

    #[test]
    fn missing_column_names_the_table() {
        let err = sample().text_values("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("sample"));
    }
}
