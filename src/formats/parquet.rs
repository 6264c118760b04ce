use anyhow::{bail, Result};
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, BooleanBuilder, Float64Array, Float64Builder,
    ListBuilder, RecordBatch, StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::log::LogStore;
use crate::models::{LogValue, LoggableType};

/// Arrow type of the column holding a field of this kind.
pub fn column_type(kind: LoggableType) -> DataType {
    let list = |item: DataType| DataType::List(Arc::new(Field::new("item", item, true)));
    match kind {
        LoggableType::Raw => DataType::Binary,
        LoggableType::Boolean => DataType::Boolean,
        LoggableType::Number => DataType::Float64,
        LoggableType::String => DataType::Utf8,
        LoggableType::BooleanArray => list(DataType::Boolean),
        LoggableType::NumberArray => list(DataType::Float64),
        LoggableType::StringArray => list(DataType::Utf8),
    }
}

/// Writes a dense table of selected fields (one row per sample timestamp,
/// each cell holding the field's value as of that row) to chunked Parquet
/// files.
pub struct ParquetFormatter {
    output_directory: PathBuf,
    chunk_size: usize,
}

impl ParquetFormatter {
    pub fn new(output_directory: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            output_directory: output_directory.into(),
            chunk_size,
        }
    }

    /// Returns the number of rows written.
    pub fn convert(&self, log: &LogStore, fields: &[String]) -> Result<usize> {
        if self.chunk_size == 0 {
            bail!("Chunk size must be at least 1");
        }
        let fields: Vec<&String> = fields
            .iter()
            .filter(|key| log.get_field(key).is_some())
            .collect();
        let timestamps = log.get_timestamps(&fields);
        if timestamps.is_empty() {
            bail!("No samples to write to Parquet");
        }

        create_dir_all(&self.output_directory)?;

        let total_chunks = timestamps.len().div_ceil(self.chunk_size);
        info!(
            "Writing {} rows of {} fields as {} chunk(s)",
            timestamps.len(),
            fields.len(),
            total_chunks
        );

        for (i, chunk) in timestamps.chunks(self.chunk_size).enumerate() {
            info!("Writing chunk {}/{}, {} rows", i + 1, total_chunks, chunk.len());

            let output_path = self
                .output_directory
                .join(format!("file_part{:03}.parquet", i));
            self.write_chunk(log, &fields, chunk, &output_path)?;
        }

        info!("All chunks have been written");
        Ok(timestamps.len())
    }

    fn write_chunk(
        &self,
        log: &LogStore,
        fields: &[&String],
        timestamps: &[f64],
        output_path: &Path,
    ) -> Result<()> {
        let mut schema_fields = vec![Field::new("timestamp", DataType::Float64, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Float64Array::from(timestamps.to_vec()))];

        for key in fields {
            let Some(field) = log.get_field(key) else {
                continue;
            };
            let values: Vec<Option<&LogValue>> = timestamps
                .iter()
                .map(|&timestamp| field.value_at(timestamp))
                .collect();
            schema_fields.push(Field::new(key.as_str(), column_type(field.kind()), true));
            arrays.push(build_column(field.kind(), &values));
        }

        let schema = Arc::new(Schema::new(schema_fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let file = File::create(output_path)?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }
}

fn build_column(kind: LoggableType, values: &[Option<&LogValue>]) -> ArrayRef {
    match kind {
        LoggableType::Raw => {
            let values: Vec<Option<&[u8]>> = values
                .iter()
                .map(|value| match value {
                    Some(LogValue::Raw(bytes)) => Some(bytes.as_slice()),
                    _ => None,
                })
                .collect();
            Arc::new(BinaryArray::from(values))
        }
        LoggableType::Boolean => {
            let values: Vec<Option<bool>> = values
                .iter()
                .map(|value| value.and_then(LogValue::as_boolean))
                .collect();
            Arc::new(BooleanArray::from(values))
        }
        LoggableType::Number => {
            let values: Vec<Option<f64>> = values
                .iter()
                .map(|value| value.and_then(LogValue::as_number))
                .collect();
            Arc::new(Float64Array::from(values))
        }
        LoggableType::String => {
            let values: Vec<Option<&str>> = values
                .iter()
                .map(|value| value.and_then(LogValue::as_str))
                .collect();
            Arc::new(StringArray::from(values))
        }
        LoggableType::BooleanArray => {
            let mut builder = ListBuilder::new(BooleanBuilder::new());
            for value in values {
                if let Some(LogValue::BooleanArray(items)) = value {
                    builder.values().append_slice(items);
                    builder.append(true);
                } else {
                    builder.append(false);
                }
            }
            Arc::new(builder.finish())
        }
        LoggableType::NumberArray => {
            let mut builder = ListBuilder::new(Float64Builder::new());
            for value in values {
                if let Some(LogValue::NumberArray(items)) = value {
                    builder.values().append_slice(items);
                    builder.append(true);
                } else {
                    builder.append(false);
                }
            }
            Arc::new(builder.finish())
        }
        LoggableType::StringArray => {
            let mut builder = ListBuilder::new(StringBuilder::new());
            for value in values {
                if let Some(LogValue::StringArray(items)) = value {
                    for item in items {
                        builder.values().append_value(item);
                    }
                    builder.append(true);
                } else {
                    builder.append(false);
                }
            }
            Arc::new(builder.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn test_column_types() {
        assert_eq!(column_type(LoggableType::Raw), DataType::Binary);
        assert_eq!(column_type(LoggableType::Number), DataType::Float64);
        assert!(matches!(column_type(LoggableType::StringArray), DataType::List(_)));
    }

    #[test]
    fn test_build_column_nulls_before_first_sample() {
        let first = LogValue::Number(1.5);
        let column = build_column(LoggableType::Number, &[None, Some(&first)]);
        assert_eq!(column.len(), 2);
        assert!(column.is_null(0));
        assert!(!column.is_null(1));
    }

    #[test]
    fn test_build_list_column() {
        let value = LogValue::BooleanArray(vec![true, false]);
        let column = build_column(LoggableType::BooleanArray, &[Some(&value), None]);
        assert_eq!(column.data_type(), &column_type(LoggableType::BooleanArray));
        assert!(column.is_null(1));
    }
}
