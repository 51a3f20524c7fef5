//! A Parquet-compatible columnar storage engine
//!
//! `parquet-engine` turns rows of nested [`ParquetValue`]s into Parquet files
//! and back. It implements the storage path itself: record shredding, page
//! encoding, compression and the footer. The `parquet` crate is used only for
//! its thrift definitions and compression codecs.
//!
//! # Key Components
//!
//! - **Dremel**: [`dremel`] flattens nested values into per-leaf
//!   `(value, repetition level, definition level)` streams and rebuilds
//!   values from them
//!
//! - **Pages**: [`page_builder::PagesBuilder`] seals the records of one leaf
//!   into size-bounded data pages as they arrive, starting with a dictionary
//!   and falling back to PLAIN once for the rest of the chunk
//!   - Page bounds are computed by [`page_builder::PageSizeCalculator`]
//!   - Min/max, null and distinct counts come from
//!     [`statistics::ColumnChunkStatistics`]
//!
//! - **Row groups**: [`row_group::RowGroupWriter`] pages rows and encodes
//!   them into an [`row_group::EncodedRowGroup`] independent of any output,
//!   so row groups can be built in parallel.
//!   [`row_group::RowGroupReader`] decodes them again.
//!
//! - **Writer / Reader**: [`Writer`] appends row groups to any
//!   `std::io::Write` and finishes the file with its footer. [`Reader`] works
//!   over any [`io::ByteSource`] and iterates rows lazily, optionally with
//!   column projection.
//!
//! - **Schema**: Type-safe schema representation
//!   - Builder API for constructing schemas
//!   - Support for nested types (structs, lists, maps)
//!   - Schema introspection through the [`traits::SchemaInspector`] trait
//!
//! # Example Usage
//!
//! ```
//! use parquet_engine::*;
//!
//! let schema = SchemaBuilder::new()
//!     .with_root(SchemaNode::Struct {
//!         name: "root".to_string(),
//!         repetition: Repetition::Required,
//!         fields: vec![SchemaNode::Primitive {
//!             name: "id".to_string(),
//!             primitive_type: PrimitiveType::Int64,
//!             repetition: Repetition::Required,
//!         }],
//!     })
//!     .build()?;
//!
//! let mut buffer = Vec::new();
//! let mut writer = Writer::new(&mut buffer, schema)?;
//! writer.write_row(vec![ParquetValue::Int64(1)])?;
//! writer.close()?;
//!
//! let reader = Reader::new(buffer)?;
//! let rows: Vec<_> = reader.read_rows().collect::<Result<_>>()?;
//! assert_eq!(rows, vec![vec![ParquetValue::Int64(1)]]);
//! # Ok::<(), ParquetError>(())
//! ```

pub mod compression;
pub mod dremel;
pub mod encoding;
pub mod error;
pub mod io;
pub mod metadata;
pub mod page;
pub mod page_builder;
pub mod physical;
pub mod reader;
pub mod row_group;
pub mod schema;
pub mod statistics;
pub mod traits;
pub mod value;
pub mod writer;

pub use compression::PageCodec;
pub use dremel::{reconstruct, shred, shred_row, RecordAssembler, ShreddedColumn};
pub use error::{ErrorContext, ParquetError, Result};
pub use io::{ByteSink, ByteSource, FileSource, TrackedWrite};
pub use metadata::{ColumnChunkDescriptor, FileMetadata, RowGroupDescriptor};
pub use page::{Page, PageKind, PageSet};
pub use page_builder::{PageSizeCalculator, PagesBuilder};
pub use parquet::basic::Compression;
pub use physical::{PhysicalType, PhysicalValue};
pub use reader::{Reader, RowIter};
pub use row_group::{EncodedColumnChunk, EncodedRowGroup, RowGroupReader, RowGroupWriter};
pub use schema::{ColumnDescriptor, PrimitiveType, Repetition, Schema, SchemaBuilder, SchemaNode};
pub use statistics::{ColumnChunkStatistics, StatisticsSummary};
pub use traits::SchemaInspector;
pub use value::ParquetValue;
pub use writer::{Writer, WriterBuilder, WriterOptions};
