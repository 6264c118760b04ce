//! High-level API for writing a decoded log to Apache Parquet.

use crate::error::{Error, Result};
use crate::formats::parquet::ParquetFormatter;
use crate::log::LogStore;
use std::path::{Path, PathBuf};

const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Writer for outputting selected log fields to Apache Parquet format.
///
/// The table has a `timestamp` column followed by one typed column per field.
/// Rows are the union of the fields' sample timestamps and every cell holds
/// the field's value as of that row, or null before its first sample.
///
/// # Examples
///
/// ```no_run
/// use robolog::{ParquetWriter, WpilogReader};
/// use robolog::export::select_fields;
///
/// let log = WpilogReader::from_file("data.wpilog")?.read_log()?;
/// let fields = select_fields(&log, "", false);
///
/// ParquetWriter::new("output_dir")
///     .write(&log, &fields)?;
/// # Ok::<(), robolog::Error>(())
/// ```
pub struct ParquetWriter {
    output_directory: PathBuf,
    chunk_size: usize,
}

impl ParquetWriter {
    /// Create a new Parquet writer that will write to the specified directory.
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the number of rows per Parquet file. Default is 50,000.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Write the fields to `file_part000.parquet`, `file_part001.parquet`, ...
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutputError`] if the directory or files cannot be
    /// written, or if the selection holds no samples.
    pub fn write(self, log: &LogStore, fields: &[String]) -> Result<()> {
        self.write_with_stats(log, fields).map(|_| ())
    }

    /// Write the fields and return statistics about the write operation.
    pub fn write_with_stats(self, log: &LogStore, fields: &[String]) -> Result<WriteStats> {
        let formatter = ParquetFormatter::new(self.output_directory, self.chunk_size);

        let num_rows = formatter
            .convert(log, fields)
            .map_err(|e| Error::OutputError(e.to_string()))?;

        Ok(WriteStats {
            num_rows,
            num_fields: fields.len(),
            num_chunks: num_rows.div_ceil(self.chunk_size),
            chunk_size: self.chunk_size,
        })
    }
}

/// Statistics about a Parquet write operation.
#[derive(Debug, Clone)]
pub struct WriteStats {
    /// Total number of rows written
    pub num_rows: usize,
    pub num_fields: usize,
    /// Number of Parquet files created
    pub num_chunks: usize,
    /// Rows per file (chunk size)
    pub chunk_size: usize,
}

impl WriteStats {
    /// Get a human-readable summary of the write operation.
    pub fn summary(&self) -> String {
        format!(
            "Wrote {} rows of {} fields across {} file(s) ({} rows per file)",
            self.num_rows, self.num_fields, self.num_chunks, self.chunk_size
        )
    }
}

/// Builder for configuring Parquet write options.
///
/// # Examples
///
/// ```no_run
/// use robolog::{ParquetWriterBuilder, WpilogReader};
/// use robolog::export::select_fields;
///
/// let log = WpilogReader::from_file("data.wpilog")?.read_log()?;
///
/// ParquetWriterBuilder::new()
///     .output_directory("./output")
///     .chunk_size(75_000)
///     .build()?
///     .write(&log, &select_fields(&log, "/DSLog", false))?;
/// # Ok::<(), robolog::Error>(())
/// ```
pub struct ParquetWriterBuilder {
    output_directory: Option<PathBuf>,
    chunk_size: usize,
}

impl ParquetWriterBuilder {
    /// Create a new Parquet writer builder with default options.
    pub fn new() -> Self {
        Self {
            output_directory: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn output_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_directory = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Build the Parquet writer.
    ///
    /// # Errors
    ///
    /// Returns an error if output_directory was not set.
    pub fn build(self) -> Result<ParquetWriter> {
        let output_directory = self
            .output_directory
            .ok_or_else(|| Error::Other("Output directory not set".to_string()))?;

        Ok(ParquetWriter {
            output_directory,
            chunk_size: self.chunk_size,
        })
    }
}

impl Default for ParquetWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
