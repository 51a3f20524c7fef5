//! File footer: row group and column chunk descriptors, schema persistence
//! and the thrift compact serialization of both.

use parquet::basic::Compression;
use parquet::format::{
    ColumnChunk, ColumnMetaData, ColumnOrder, ConvertedType, DateType, DecimalType, EnumType,
    FieldRepetitionType, FileMetaData, JsonType, KeyValue, ListType, LogicalType, MapType,
    MicroSeconds, MilliSeconds, PageEncodingStats, RowGroup, SchemaElement, StringType, TimeType,
    TimeUnit, TimestampType, TypeDefinedOrder, UUIDType,
};
use parquet::thrift::{TCompactOutputProtocol, TSerializable};
use thrift::protocol::TCompactInputProtocol;
use tracing::{debug, trace};

use crate::compression::codec_from_thrift;
use crate::encoding::Encoding;
use crate::error::{ParquetError, Result};
use crate::io::ByteSource;
use crate::physical::PhysicalType;
use crate::schema::{
    ColumnDescriptor, PrimitiveType, Repetition, Schema, SchemaBuilder, SchemaNode,
    LIST_GROUP_NAME, MAP_GROUP_NAME,
};
use crate::statistics::StatisticsSummary;

/// Leading and trailing file marker
pub const MAGIC: &[u8; 4] = b"PAR1";

/// Footer length plus trailing magic
pub const FOOTER_TAIL_LEN: usize = 8;

/// Format version recorded in the footer
pub const FORMAT_VERSION: i32 = 1;

/// Location, encodings and statistics of one column chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunkDescriptor {
    pub path: Vec<String>,
    pub physical_type: PhysicalType,
    pub encodings: Vec<Encoding>,
    pub encoding_stats: Vec<PageEncodingStats>,
    pub codec: Compression,
    /// Level triples in the chunk
    pub num_values: u64,
    pub data_page_offset: u64,
    pub dictionary_page_offset: Option<u64>,
    /// Bytes the chunk occupies in the file, page headers included
    pub total_compressed_size: u64,
    pub total_uncompressed_size: u64,
    pub statistics: Option<StatisticsSummary>,
}

/// One sealed row group
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupDescriptor {
    pub num_rows: u64,
    pub file_offset: u64,
    /// Uncompressed size of all column chunks
    pub total_byte_size: u64,
    pub total_compressed_size: u64,
    pub columns: Vec<ColumnChunkDescriptor>,
}

/// Decoded file footer
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub version: i32,
    pub schema: Schema,
    pub num_rows: u64,
    pub row_groups: Vec<RowGroupDescriptor>,
    pub key_value_metadata: Vec<(String, Option<String>)>,
    pub created_by: Option<String>,
}

impl ColumnChunkDescriptor {
    /// Offset where the chunk's first page starts
    pub fn start_offset(&self) -> u64 {
        match self.dictionary_page_offset {
            // Some writers record 0 when there is no dictionary page
            Some(offset) if offset > 0 => offset.min(self.data_page_offset),
            _ => self.data_page_offset,
        }
    }

    /// `(offset, length)` of the chunk within the file
    pub fn byte_range(&self) -> (u64, u64) {
        (self.start_offset(), self.total_compressed_size)
    }

    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    pub fn to_thrift(&self) -> ColumnChunk {
        let meta_data = ColumnMetaData {
            type_: self.physical_type.to_thrift(),
            encodings: self.encodings.iter().map(|e| e.to_thrift()).collect(),
            path_in_schema: self.path.clone(),
            codec: self.codec.into(),
            num_values: self.num_values as i64,
            total_uncompressed_size: self.total_uncompressed_size as i64,
            total_compressed_size: self.total_compressed_size as i64,
            key_value_metadata: None,
            data_page_offset: self.data_page_offset as i64,
            index_page_offset: None,
            dictionary_page_offset: self.dictionary_page_offset.map(|o| o as i64),
            statistics: self.statistics.as_ref().map(StatisticsSummary::to_thrift),
            encoding_stats: (!self.encoding_stats.is_empty()).then(|| self.encoding_stats.clone()),
            bloom_filter_offset: None,
            bloom_filter_length: None,
            size_statistics: None,
        };
        ColumnChunk {
            file_path: None,
            file_offset: self.start_offset() as i64,
            meta_data: Some(meta_data),
            offset_index_offset: None,
            offset_index_length: None,
            column_index_offset: None,
            column_index_length: None,
            crypto_metadata: None,
            encrypted_column_metadata: None,
        }
    }

    pub fn from_thrift(chunk: &ColumnChunk, column: &ColumnDescriptor) -> Result<Self> {
        if chunk.file_path.is_some() {
            return Err(ParquetError::invalid_file(format!(
                "column '{}' lives in an external file",
                column.path_string()
            )));
        }
        let meta = chunk.meta_data.as_ref().ok_or_else(|| {
            ParquetError::invalid_file(format!(
                "column chunk '{}' carries no metadata",
                column.path_string()
            ))
        })?;

        let physical_type = column.physical_type();
        if meta.type_ != physical_type.to_thrift() {
            return Err(ParquetError::invalid_file(format!(
                "column chunk '{}' stores {:?}, schema declares {:?}",
                column.path_string(),
                meta.type_,
                physical_type
            )));
        }

        let encodings = meta
            .encodings
            .iter()
            .filter_map(|e| match Encoding::from_thrift(*e) {
                Ok(encoding) => Some(encoding),
                Err(_) => {
                    trace!(encoding = ?e, "Ignoring encoding listed in column metadata");
                    None
                }
            })
            .collect();

        Ok(Self {
            path: meta.path_in_schema.clone(),
            physical_type,
            encodings,
            encoding_stats: meta.encoding_stats.clone().unwrap_or_default(),
            codec: codec_from_thrift(meta.codec)?,
            num_values: non_negative(meta.num_values, "num_values")?,
            data_page_offset: non_negative(meta.data_page_offset, "data_page_offset")?,
            dictionary_page_offset: meta
                .dictionary_page_offset
                .map(|o| non_negative(o, "dictionary_page_offset"))
                .transpose()?,
            total_compressed_size: non_negative(meta.total_compressed_size, "total_compressed_size")?,
            total_uncompressed_size: non_negative(
                meta.total_uncompressed_size,
                "total_uncompressed_size",
            )?,
            statistics: meta
                .statistics
                .as_ref()
                .map(|s| StatisticsSummary::from_thrift(physical_type, s))
                .transpose()?,
        })
    }
}

fn non_negative(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| ParquetError::invalid_file(format!("negative {} ({})", field, value)))
}

impl RowGroupDescriptor {
    pub fn to_thrift(&self, ordinal: usize) -> RowGroup {
        RowGroup {
            columns: self.columns.iter().map(ColumnChunkDescriptor::to_thrift).collect(),
            total_byte_size: self.total_byte_size as i64,
            num_rows: self.num_rows as i64,
            sorting_columns: None,
            file_offset: Some(self.file_offset as i64),
            total_compressed_size: Some(self.total_compressed_size as i64),
            ordinal: i16::try_from(ordinal).ok(),
        }
    }

    pub fn from_thrift(row_group: &RowGroup, columns: &[ColumnDescriptor]) -> Result<Self> {
        if row_group.columns.len() != columns.len() {
            return Err(ParquetError::invalid_file(format!(
                "row group has {} column chunks, schema has {} leaves",
                row_group.columns.len(),
                columns.len()
            )));
        }
        let columns = row_group
            .columns
            .iter()
            .zip(columns)
            .map(|(chunk, column)| ColumnChunkDescriptor::from_thrift(chunk, column))
            .collect::<Result<Vec<_>>>()?;

        let file_offset = match row_group.file_offset {
            Some(offset) => non_negative(offset, "file_offset")?,
            None => columns.first().map_or(0, ColumnChunkDescriptor::start_offset),
        };
        let total_compressed_size = match row_group.total_compressed_size {
            Some(size) => non_negative(size, "total_compressed_size")?,
            None => columns.iter().map(|c| c.total_compressed_size).sum(),
        };

        Ok(Self {
            num_rows: non_negative(row_group.num_rows, "num_rows")?,
            file_offset,
            total_byte_size: non_negative(row_group.total_byte_size, "total_byte_size")?,
            total_compressed_size,
            columns,
        })
    }
}

impl FileMetadata {
    pub fn to_thrift(&self) -> FileMetaData {
        let leaves = self.schema.columns().len();
        let key_value_metadata = (!self.key_value_metadata.is_empty()).then(|| {
            self.key_value_metadata
                .iter()
                .map(|(k, v)| KeyValue {
                    key: k.clone(),
                    value: v.clone(),
                })
                .collect()
        });
        FileMetaData {
            version: self.version,
            schema: schema_to_elements(&self.schema),
            num_rows: self.num_rows as i64,
            row_groups: self
                .row_groups
                .iter()
                .enumerate()
                .map(|(ordinal, rg)| rg.to_thrift(ordinal))
                .collect(),
            key_value_metadata,
            created_by: self.created_by.clone(),
            column_orders: Some(vec![ColumnOrder::TYPEORDER(TypeDefinedOrder::new()); leaves]),
            encryption_algorithm: None,
            footer_signing_key_metadata: None,
        }
    }

    pub fn from_thrift(metadata: &FileMetaData) -> Result<Self> {
        if metadata.encryption_algorithm.is_some() {
            return Err(ParquetError::invalid_file("encrypted files are not supported"));
        }
        let schema = schema_from_elements(&metadata.schema)?;
        let columns = schema.columns();
        let row_groups = metadata
            .row_groups
            .iter()
            .map(|rg| RowGroupDescriptor::from_thrift(rg, &columns))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: metadata.version,
            schema,
            num_rows: non_negative(metadata.num_rows, "num_rows")?,
            row_groups,
            key_value_metadata: metadata
                .key_value_metadata
                .iter()
                .flatten()
                .map(|kv| (kv.key.clone(), kv.value.clone()))
                .collect(),
            created_by: metadata.created_by.clone(),
        })
    }

    /// Value of a key in the footer's key/value metadata
    pub fn key_value(&self, key: &str) -> Option<&str> {
        self.key_value_metadata
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// Serialize the footer block that precedes the length and trailing magic.
pub fn encode_footer(metadata: &FileMetadata) -> Result<Vec<u8>> {
    write_thrift(&metadata.to_thrift())
}

pub fn decode_footer(bytes: &[u8]) -> Result<FileMetadata> {
    let (metadata, _) = read_thrift::<FileMetaData>(bytes, 0)?;
    FileMetadata::from_thrift(&metadata)
}

/// Locate, check and decode the footer of a complete file.
pub fn read_footer<S: ByteSource + ?Sized>(source: &S) -> Result<FileMetadata> {
    let file_len = source.len();
    let minimum = (MAGIC.len() + FOOTER_TAIL_LEN) as u64;
    if file_len < minimum {
        return Err(ParquetError::invalid_file(format!(
            "{} bytes is too small for a parquet file",
            file_len
        )));
    }

    let head = source.read(0, MAGIC.len())?;
    if head.as_ref() != MAGIC {
        return Err(ParquetError::invalid_file("missing leading magic"));
    }
    let tail = source.read(file_len - FOOTER_TAIL_LEN as u64, FOOTER_TAIL_LEN)?;
    if &tail[4..] != MAGIC {
        return Err(ParquetError::invalid_file("missing trailing magic"));
    }

    let footer_len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as u64;
    if footer_len + minimum > file_len {
        return Err(ParquetError::truncated(
            file_len - FOOTER_TAIL_LEN as u64,
            footer_len,
            file_len - minimum,
        ));
    }
    let footer_offset = file_len - FOOTER_TAIL_LEN as u64 - footer_len;
    let footer = source.read(footer_offset, footer_len as usize)?;
    let (thrift, _) = read_thrift::<FileMetaData>(&footer, footer_offset)?;
    let metadata = FileMetadata::from_thrift(&thrift)?;

    debug!(
        footer_len,
        row_groups = metadata.row_groups.len(),
        num_rows = metadata.num_rows,
        "Parsed footer"
    );
    Ok(metadata)
}

pub(crate) fn write_thrift<T: TSerializable>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut protocol = TCompactOutputProtocol::new(&mut out);
        value.write_to_out_protocol(&mut protocol)?;
    }
    Ok(out)
}

/// Decode one thrift struct from the front of `buf`, returning it and the bytes consumed.
///
/// `offset` is the position of `buf` in the file, used to report short reads.
pub(crate) fn read_thrift<T: TSerializable>(buf: &[u8], offset: u64) -> Result<(T, usize)> {
    let mut remaining = buf;
    let value = {
        let mut protocol = TCompactInputProtocol::new(&mut remaining);
        T::read_from_in_protocol(&mut protocol)
    };
    match value {
        Ok(value) => Ok((value, buf.len() - remaining.len())),
        Err(thrift::Error::Transport(e)) if e.kind == thrift::TransportErrorKind::EndOfFile => {
            Err(ParquetError::truncated(
                offset,
                buf.len() as u64 + 1,
                buf.len() as u64,
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn repetition_to_thrift(repetition: Repetition) -> FieldRepetitionType {
    match repetition {
        Repetition::Required => FieldRepetitionType::REQUIRED,
        Repetition::Optional => FieldRepetitionType::OPTIONAL,
        Repetition::Repeated => FieldRepetitionType::REPEATED,
    }
}

fn repetition_from_thrift(repetition: Option<FieldRepetitionType>) -> Result<Repetition> {
    match repetition {
        None | Some(FieldRepetitionType::REQUIRED) => Ok(Repetition::Required),
        Some(FieldRepetitionType::OPTIONAL) => Ok(Repetition::Optional),
        Some(FieldRepetitionType::REPEATED) => Ok(Repetition::Repeated),
        Some(other) => Err(ParquetError::invalid_file(format!(
            "unknown repetition {}",
            other.0
        ))),
    }
}

/// Logical annotation and legacy converted type of a column type
fn annotations(primitive_type: PrimitiveType) -> (Option<LogicalType>, Option<ConvertedType>) {
    let millis = || TimeUnit::MILLIS(MilliSeconds::new());
    let micros = || TimeUnit::MICROS(MicroSeconds::new());
    match primitive_type {
        PrimitiveType::String => (
            Some(LogicalType::STRING(StringType::new())),
            Some(ConvertedType::UTF8),
        ),
        PrimitiveType::Enum => (
            Some(LogicalType::ENUM(EnumType::new())),
            Some(ConvertedType::ENUM),
        ),
        PrimitiveType::Json => (
            Some(LogicalType::JSON(JsonType::new())),
            Some(ConvertedType::JSON),
        ),
        PrimitiveType::Uuid => (Some(LogicalType::UUID(UUIDType::new())), None),
        PrimitiveType::Date => (
            Some(LogicalType::DATE(DateType::new())),
            Some(ConvertedType::DATE),
        ),
        PrimitiveType::TimeMillis => (
            Some(LogicalType::TIME(TimeType::new(false, millis()))),
            Some(ConvertedType::TIME_MILLIS),
        ),
        PrimitiveType::TimeMicros => (
            Some(LogicalType::TIME(TimeType::new(false, micros()))),
            Some(ConvertedType::TIME_MICROS),
        ),
        PrimitiveType::TimestampMillis => (
            Some(LogicalType::TIMESTAMP(TimestampType::new(true, millis()))),
            Some(ConvertedType::TIMESTAMP_MILLIS),
        ),
        PrimitiveType::TimestampMicros => (
            Some(LogicalType::TIMESTAMP(TimestampType::new(true, micros()))),
            Some(ConvertedType::TIMESTAMP_MICROS),
        ),
        PrimitiveType::Decimal(precision, scale) => (
            Some(LogicalType::DECIMAL(DecimalType::new(
                scale as i32,
                precision as i32,
            ))),
            Some(ConvertedType::DECIMAL),
        ),
        PrimitiveType::Boolean
        | PrimitiveType::Int32
        | PrimitiveType::Int64
        | PrimitiveType::Float32
        | PrimitiveType::Float64
        | PrimitiveType::Binary
        | PrimitiveType::FixedLenByteArray(_) => (None, None),
    }
}

fn group_element(
    name: &str,
    repetition: Option<Repetition>,
    num_children: usize,
    logical_type: Option<LogicalType>,
    converted_type: Option<ConvertedType>,
) -> SchemaElement {
    SchemaElement {
        type_: None,
        type_length: None,
        repetition_type: repetition.map(repetition_to_thrift),
        name: name.to_string(),
        num_children: Some(num_children as i32),
        converted_type,
        scale: None,
        precision: None,
        field_id: None,
        logical_type,
    }
}

fn push_elements(node: &SchemaNode, out: &mut Vec<SchemaElement>) {
    match node {
        SchemaNode::Primitive {
            name,
            primitive_type,
            repetition,
        } => {
            let physical = primitive_type.physical_type();
            let type_length = match physical {
                PhysicalType::FixedLenByteArray(len) => Some(len),
                _ => None,
            };
            let (scale, precision) = match primitive_type {
                PrimitiveType::Decimal(precision, scale) => {
                    (Some(*scale as i32), Some(*precision as i32))
                }
                _ => (None, None),
            };
            let (logical_type, converted_type) = annotations(*primitive_type);
            out.push(SchemaElement {
                type_: Some(physical.to_thrift()),
                type_length,
                repetition_type: Some(repetition_to_thrift(*repetition)),
                name: name.clone(),
                num_children: None,
                converted_type,
                scale,
                precision,
                field_id: None,
                logical_type,
            });
        }
        SchemaNode::Struct {
            name,
            repetition,
            fields,
        } => {
            out.push(group_element(name, Some(*repetition), fields.len(), None, None));
            for field in fields {
                push_elements(field, out);
            }
        }
        SchemaNode::List {
            name,
            repetition,
            item,
        } => {
            out.push(group_element(
                name,
                Some(*repetition),
                1,
                Some(LogicalType::LIST(ListType::new())),
                Some(ConvertedType::LIST),
            ));
            out.push(group_element(
                LIST_GROUP_NAME,
                Some(Repetition::Repeated),
                1,
                None,
                None,
            ));
            push_elements(item, out);
        }
        SchemaNode::Map {
            name,
            repetition,
            key,
            value,
        } => {
            out.push(group_element(
                name,
                Some(*repetition),
                1,
                Some(LogicalType::MAP(MapType::new())),
                Some(ConvertedType::MAP),
            ));
            out.push(group_element(
                MAP_GROUP_NAME,
                Some(Repetition::Repeated),
                2,
                None,
                None,
            ));
            push_elements(key, out);
            push_elements(value, out);
        }
    }
}

/// Flatten the schema tree depth-first into footer schema elements.
pub fn schema_to_elements(schema: &Schema) -> Vec<SchemaElement> {
    let mut out = Vec::new();
    let fields = schema.fields();
    out.push(group_element(
        schema.root.name(),
        None,
        fields.len(),
        None,
        None,
    ));
    for field in fields {
        push_elements(field, &mut out);
    }
    // Leaves come out in column order
    let leaves = out.iter_mut().filter(|e| e.num_children.is_none());
    for (element, column) in leaves.zip(schema.columns()) {
        let physical = column.physical_type();
        element.type_ = Some(physical.to_thrift());
        element.type_length = match physical {
            PhysicalType::FixedLenByteArray(len) => Some(len),
            _ => None,
        };
    }
    out
}

/// Rebuild the schema tree from footer schema elements.
///
/// Standard three-level LIST and MAP layouts become [`SchemaNode::List`] and
/// [`SchemaNode::Map`]; the legacy two-level list layouts are folded into a
/// list of required items, which yields the same levels. The rebuilt tree is
/// validated like any other schema, and leaves keep the physical type they
/// are stored as.
pub fn schema_from_elements(elements: &[SchemaElement]) -> Result<Schema> {
    let root = elements
        .first()
        .ok_or_else(|| ParquetError::invalid_file("footer has an empty schema"))?;
    let mut position = 1;
    let mut fields = Vec::new();
    let mut stored = Vec::new();
    for _ in 0..root.num_children.unwrap_or(0) {
        fields.push(parse_node(elements, &mut position, &mut stored)?);
    }
    if position != elements.len() {
        return Err(ParquetError::invalid_file(format!(
            "schema has {} elements, the tree covers {}",
            elements.len(),
            position
        )));
    }
    SchemaBuilder::new()
        .with_root(SchemaNode::Struct {
            name: root.name.clone(),
            repetition: Repetition::Required,
            fields,
        })
        .build()
        .and_then(|schema| schema.with_stored_types(&stored))
        .map_err(|e| match e {
            ParquetError::Schema(message) => {
                ParquetError::invalid_file(format!("footer schema: {}", message))
            }
            other => other,
        })
}

fn parse_node(
    elements: &[SchemaElement],
    position: &mut usize,
    stored: &mut Vec<PhysicalType>,
) -> Result<SchemaNode> {
    let element = elements
        .get(*position)
        .ok_or_else(|| ParquetError::invalid_file("schema element list ends early"))?;
    *position += 1;
    let name = element.name.clone();
    let repetition = repetition_from_thrift(element.repetition_type)?;

    let num_children = match (element.type_, element.num_children) {
        (Some(_), None) | (Some(_), Some(0)) => {
            let (primitive_type, physical) = primitive_type_of(element)?;
            stored.push(physical);
            return Ok(SchemaNode::Primitive {
                name,
                primitive_type,
                repetition,
            });
        }
        (_, children) => children.unwrap_or(0).max(0) as usize,
    };

    // Every child takes at least one element
    let mut children = Vec::with_capacity(num_children.min(elements.len() - *position));
    for _ in 0..num_children {
        children.push(parse_node(elements, position, stored)?);
    }

    let is_list = matches!(element.logical_type, Some(LogicalType::LIST(_)))
        || element.converted_type == Some(ConvertedType::LIST);
    let is_map = matches!(element.logical_type, Some(LogicalType::MAP(_)))
        || matches!(
            element.converted_type,
            Some(ConvertedType::MAP) | Some(ConvertedType::MAP_KEY_VALUE)
        );

    if is_list
        && repetition != Repetition::Repeated
        && children.len() == 1
        && children[0].repetition() == Repetition::Repeated
    {
        let repeated = children.remove(0);
        let item = match repeated {
            SchemaNode::Struct {
                name: group,
                mut fields,
                ..
            } if fields.len() == 1
                && fields[0].repetition() != Repetition::Repeated
                && group != "array"
                && group != format!("{}_tuple", name) =>
            {
                fields.remove(0)
            }
            other => with_repetition(other, Repetition::Required),
        };
        return Ok(SchemaNode::List {
            name,
            repetition,
            item: Box::new(item),
        });
    }

    if is_map && children.len() == 1 {
        if let SchemaNode::Struct {
            repetition: Repetition::Repeated,
            fields,
            ..
        } = &children[0]
        {
            let usable = repetition != Repetition::Repeated
                && fields.len() == 2
                && fields[0].repetition() == Repetition::Required
                && fields[1].repetition() != Repetition::Repeated
                && fields[0].name() != fields[1].name();
            if usable {
                let mut fields = fields.clone().into_iter();
                if let (Some(key), Some(value)) = (fields.next(), fields.next()) {
                    return Ok(SchemaNode::Map {
                        name,
                        repetition,
                        key: Box::new(key),
                        value: Box::new(value),
                    });
                }
            }
        }
    }

    Ok(SchemaNode::Struct {
        name,
        repetition,
        fields: children,
    })
}

fn with_repetition(node: SchemaNode, repetition: Repetition) -> SchemaNode {
    match node {
        SchemaNode::Struct { name, fields, .. } => SchemaNode::Struct {
            name,
            repetition,
            fields,
        },
        SchemaNode::List { name, item, .. } => SchemaNode::List {
            name,
            repetition,
            item,
        },
        SchemaNode::Map {
            name, key, value, ..
        } => SchemaNode::Map {
            name,
            repetition,
            key,
            value,
        },
        SchemaNode::Primitive {
            name,
            primitive_type,
            ..
        } => SchemaNode::Primitive {
            name,
            primitive_type,
            repetition,
        },
    }
}

/// Column type of a leaf element together with its stored physical type
fn primitive_type_of(element: &SchemaElement) -> Result<(PrimitiveType, PhysicalType)> {
    let type_ = element
        .type_
        .ok_or_else(|| ParquetError::internal("primitive element without a type"))?;
    let physical = PhysicalType::from_thrift(type_, element.type_length)?;

    let from_logical = match &element.logical_type {
        Some(LogicalType::STRING(_)) => Some(PrimitiveType::String),
        Some(LogicalType::ENUM(_)) => Some(PrimitiveType::Enum),
        Some(LogicalType::JSON(_)) => Some(PrimitiveType::Json),
        Some(LogicalType::UUID(_)) => Some(PrimitiveType::Uuid),
        Some(LogicalType::DATE(_)) => Some(PrimitiveType::Date),
        Some(LogicalType::TIME(t)) => Some(match t.unit {
            TimeUnit::MILLIS(_) => PrimitiveType::TimeMillis,
            TimeUnit::MICROS(_) => PrimitiveType::TimeMicros,
            TimeUnit::NANOS(_) => {
                return Err(ParquetError::conversion(format!(
                    "nanosecond time column '{}'",
                    element.name
                )))
            }
        }),
        Some(LogicalType::TIMESTAMP(t)) => Some(match t.unit {
            TimeUnit::MILLIS(_) => PrimitiveType::TimestampMillis,
            TimeUnit::MICROS(_) => PrimitiveType::TimestampMicros,
            TimeUnit::NANOS(_) => {
                return Err(ParquetError::conversion(format!(
                    "nanosecond timestamp column '{}'",
                    element.name
                )))
            }
        }),
        Some(LogicalType::DECIMAL(d)) => Some(decimal(d.precision, d.scale)?),
        _ => None,
    };

    let from_converted = || -> Result<Option<PrimitiveType>> {
        Ok(match element.converted_type {
            Some(ConvertedType::UTF8) => Some(PrimitiveType::String),
            Some(ConvertedType::ENUM) => Some(PrimitiveType::Enum),
            Some(ConvertedType::JSON) => Some(PrimitiveType::Json),
            Some(ConvertedType::DATE) => Some(PrimitiveType::Date),
            Some(ConvertedType::TIME_MILLIS) => Some(PrimitiveType::TimeMillis),
            Some(ConvertedType::TIME_MICROS) => Some(PrimitiveType::TimeMicros),
            Some(ConvertedType::TIMESTAMP_MILLIS) => Some(PrimitiveType::TimestampMillis),
            Some(ConvertedType::TIMESTAMP_MICROS) => Some(PrimitiveType::TimestampMicros),
            Some(ConvertedType::DECIMAL) => Some(decimal(
                element.precision.unwrap_or(0),
                element.scale.unwrap_or(0),
            )?),
            _ => None,
        })
    };

    let primitive = match from_logical {
        Some(primitive) => primitive,
        None => match from_converted()? {
            Some(primitive) => primitive,
            None => match physical {
                PhysicalType::Boolean => PrimitiveType::Boolean,
                PhysicalType::Int32 => PrimitiveType::Int32,
                PhysicalType::Int64 => PrimitiveType::Int64,
                PhysicalType::Float => PrimitiveType::Float32,
                PhysicalType::Double => PrimitiveType::Float64,
                PhysicalType::ByteArray => PrimitiveType::Binary,
                PhysicalType::FixedLenByteArray(len) => PrimitiveType::FixedLenByteArray(len),
            },
        },
    };

    if !primitive.accepts_storage(physical) {
        return Err(ParquetError::conversion(format!(
            "column '{}' stores {} as {:?}",
            element.name,
            primitive.type_name(),
            physical
        )));
    }
    Ok((primitive, physical))
}

fn decimal(precision: i32, scale: i32) -> Result<PrimitiveType> {
    let precision = u8::try_from(precision)
        .ok()
        .filter(|p| (1..=38).contains(p))
        .ok_or_else(|| ParquetError::conversion(format!("decimal precision {}", precision)))?;
    let scale = i8::try_from(scale)
        .map_err(|_| ParquetError::conversion(format!("decimal scale {}", scale)))?;
    Ok(PrimitiveType::Decimal(precision, scale))
}
