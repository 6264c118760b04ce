//! File-based export formats.

pub mod parquet;
