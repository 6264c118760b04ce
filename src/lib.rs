//! # robolog
//!
//! A library for decoding robot telemetry logs into a single time-indexed
//! data model and exporting selections of it.
//!
//! ## Features
//!
//! - **One data model**: every decoder fills a [`LogStore`], a set of
//!   step-function time series keyed by hierarchical field names
//! - **WPILOG**: read and write the self-describing container format
//! - **RLOG**: streaming decoder with corruption recovery
//! - **Driver station logs**: `.dslog` status and `.dsevents` event logs
//! - **Exports**: CSV table, CSV event list, WPILOG and Apache Parquet
//!
//! ## Quick Start
//!
//! ```no_run
//! use robolog::WpilogReader;
//! use robolog::export::{generate_csv_table, select_fields};
//!
//! let log = WpilogReader::from_file("data.wpilog")?.read_log()?;
//! println!("Read {} fields", log.get_field_count());
//!
//! let fields = select_fields(&log, "/DriverStation", false);
//! let csv = generate_csv_table(&log, &fields, Some(0.02));
//! # Ok::<(), robolog::Error>(())
//! ```
//!
//! ## Streaming Decode
//!
//! An [`RlogDecoder`] keeps its key table between buffers, so a live stream
//! can be fed one frame at a time:
//!
//! ```no_run
//! use robolog::{LogStore, RlogDecoder, RlogFrameBuffer};
//!
//! let mut log = LogStore::new();
//! let mut decoder = RlogDecoder::new();
//! let mut frames = RlogFrameBuffer::new();
//!
//! # let socket_bytes: Vec<u8> = Vec::new();
//! frames.push(&socket_bytes);
//! while let Some(frame) = frames.next_frame()? {
//!     decoder.decode(&mut log, &frame)?;
//! }
//! # Ok::<(), robolog::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Decoders either return a complete log or an error for the whole buffer:
//!
//! ```no_run
//! use robolog::{Error, WpilogReader};
//!
//! match WpilogReader::from_file("data.wpilog").and_then(|r| r.read_log()) {
//!     Ok(log) => println!("{} fields", log.get_field_count()),
//!     Err(Error::FileNotFound(path)) => eprintln!("No such log: {}", path.display()),
//!     Err(Error::UnsupportedVersion(version)) => eprintln!("Unsupported: {}", version),
//!     Err(err) => eprintln!("Error: {}", err),
//! }
//! ```

// Public API modules
pub mod error;
pub mod log;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use error::{Error, Result};
pub use field::LogField;
pub use crate::log::LogStore;
pub use models::{LogRange, LogValue, LoggableType, SerializedLog};
pub use reader::{WpilogReader, WpilogReaderBuilder};
pub use rlog::{RlogDecoder, RlogFrameBuffer};
pub use writer::{ParquetWriter, ParquetWriterBuilder, WriteStats};

// Codec and model modules (public but not part of the high-level API)
pub mod datalog;
pub mod dslog;
pub mod encoder;
pub mod export;
pub mod field;
pub mod formats;
pub mod models;
pub mod rlog;
pub mod schemas;
pub mod worker;
