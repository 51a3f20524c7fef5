//! Files written here must be readable by the `parquet` crate, and files it
//! writes must be readable here.

use bytes::Bytes;
use indexmap::IndexMap;
use parquet::basic::Encoding as FormatEncoding;
use parquet::data_type::{
    BoolType, ByteArray, ByteArrayType, FixedLenByteArray, FixedLenByteArrayType, Int32Type, Int64Type,
};
use parquet::file::properties::{WriterProperties, WriterVersion};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::statistics::Statistics;
use parquet::file::writer::SerializedFileWriter;
use parquet::record::{Field, RowAccessor};
use parquet::schema::parser::parse_message_type;
use parquet_engine::*;
use std::sync::Arc;

mod test_helpers;
use test_helpers::*;

fn nested_schema() -> Schema {
    schema_of(vec![
        primitive("id", PrimitiveType::Int32, Repetition::Required),
        primitive("name", PrimitiveType::String, Repetition::Optional),
        SchemaNode::List {
            name: "tags".to_string(),
            repetition: Repetition::Optional,
            item: Box::new(primitive("element", PrimitiveType::Int64, Repetition::Optional)),
        },
        SchemaNode::Map {
            name: "attrs".to_string(),
            repetition: Repetition::Optional,
            key: Box::new(primitive("key", PrimitiveType::String, Repetition::Required)),
            value: Box::new(primitive("value", PrimitiveType::Int32, Repetition::Optional)),
        },
        SchemaNode::Struct {
            name: "point".to_string(),
            repetition: Repetition::Optional,
            fields: vec![
                primitive("x", PrimitiveType::Float64, Repetition::Required),
                primitive("y", PrimitiveType::Float64, Repetition::Required),
            ],
        },
        primitive("flag", PrimitiveType::Boolean, Repetition::Required),
    ])
}

fn nested_rows(count: i32) -> Vec<Vec<ParquetValue>> {
    (0..count)
        .map(|i| {
            let name = if i % 3 == 0 {
                ParquetValue::Null
            } else {
                ParquetValue::String(Arc::from(format!("name_{}", i % 10)))
            };
            let tags = match i % 4 {
                0 => ParquetValue::Null,
                1 => ParquetValue::List(vec![]),
                2 => ParquetValue::List(vec![ParquetValue::Int64(i as i64), ParquetValue::Null]),
                _ => ParquetValue::List((0..3).map(|j| ParquetValue::Int64(j)).collect()),
            };
            let attrs = if i % 5 == 0 {
                ParquetValue::Null
            } else {
                ParquetValue::Map(vec![
                    ("a".into(), ParquetValue::Int32(i)),
                    ("b".into(), ParquetValue::Null),
                ])
            };
            let point = if i % 2 == 0 {
                ParquetValue::Null
            } else {
                let mut fields = IndexMap::new();
                fields.insert(Arc::from("x"), ParquetValue::Float64(ordered_float::OrderedFloat(i as f64)));
                fields.insert(Arc::from("y"), ParquetValue::Float64(ordered_float::OrderedFloat(-i as f64)));
                ParquetValue::Record(fields)
            };
            vec![
                ParquetValue::Int32(i),
                name,
                tags,
                attrs,
                point,
                ParquetValue::Boolean(i % 3 == 1),
            ]
        })
        .collect()
}

#[test]
fn test_parquet_crate_reads_our_files() {
    init_test_tracing();
    let rows = nested_rows(500);

    for compression in [Compression::UNCOMPRESSED, Compression::SNAPPY] {
        let bytes = write_rows(
            &rows,
            nested_schema(),
            WriterBuilder::new()
                .with_compression(compression)
                .with_page_size(512)
                .with_row_group_size(200),
        );

        let reader = SerializedFileReader::new(bytes).unwrap();
        let metadata = reader.metadata();
        assert_eq!(metadata.file_metadata().num_rows(), 500);
        assert_eq!(metadata.num_row_groups(), 3);

        match metadata.row_group(0).column(0).statistics() {
            Some(Statistics::Int32(stats)) => {
                assert_eq!(stats.min_opt(), Some(&0));
                assert_eq!(stats.max_opt(), Some(&199));
                assert_eq!(stats.null_count_opt(), Some(0));
            }
            other => panic!("unexpected statistics {:?}", other),
        }

        let read: Vec<_> = reader
            .get_row_iter(None)
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(read.len(), rows.len());

        for (i, (row, expected)) in read.iter().zip(&rows).enumerate() {
            assert_eq!(row.get_int(0).unwrap(), i as i32);
            let fields: Vec<&Field> = row.get_column_iter().map(|(_, field)| field).collect();

            match (&expected[1], fields[1]) {
                (ParquetValue::Null, Field::Null) => {}
                (ParquetValue::String(s), Field::Str(actual)) => assert_eq!(actual.as_str(), s.as_ref()),
                other => panic!("row {} name mismatch: {:?}", i, other),
            }

            match (&expected[2], fields[2]) {
                (ParquetValue::Null, Field::Null) => {}
                (ParquetValue::List(items), Field::ListInternal(list)) => {
                    assert_eq!(list.elements().len(), items.len(), "row {}", i);
                    for (item, element) in items.iter().zip(list.elements()) {
                        match (item, element) {
                            (ParquetValue::Null, Field::Null) => {}
                            (ParquetValue::Int64(v), Field::Long(actual)) => assert_eq!(v, actual),
                            other => panic!("row {} tag mismatch: {:?}", i, other),
                        }
                    }
                }
                other => panic!("row {} tags mismatch: {:?}", i, other),
            }

            match (&expected[3], fields[3]) {
                (ParquetValue::Null, Field::Null) => {}
                (ParquetValue::Map(entries), Field::MapInternal(map)) => {
                    assert_eq!(map.entries().len(), entries.len());
                }
                other => panic!("row {} attrs mismatch: {:?}", i, other),
            }

            match (&expected[4], fields[4]) {
                (ParquetValue::Null, Field::Null) => {}
                (ParquetValue::Record(_), Field::Group(group)) => {
                    assert_eq!(group.get_double(0).unwrap(), i as f64);
                }
                other => panic!("row {} point mismatch: {:?}", i, other),
            }

            assert_eq!(row.get_bool(5).unwrap(), i % 3 == 1);
        }
    }
}

const FOREIGN_SCHEMA: &str = "
    message schema {
        required int32 id;
        optional binary name (STRING);
        optional group tags (LIST) {
            repeated group list {
                optional int64 element;
            }
        }
        required boolean flag;
    }
";

/// Write four rows with the `parquet` crate's own writer
fn write_foreign(props: WriterProperties) -> Bytes {
    let schema = Arc::new(parse_message_type(FOREIGN_SCHEMA).unwrap());
    let mut writer = SerializedFileWriter::new(Vec::new(), schema, Arc::new(props)).unwrap();
    let mut row_group = writer.next_row_group().unwrap();

    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<Int32Type>()
        .write_batch(&[1, 2, 3, 4], None, None)
        .unwrap();
    column.close().unwrap();

    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<ByteArrayType>()
        .write_batch(
            &[ByteArray::from("one"), ByteArray::from("three"), ByteArray::from("four")],
            Some(&[1, 0, 1, 1]),
            None,
        )
        .unwrap();
    column.close().unwrap();

    // [1, 2], null, [], [null, 5]
    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<Int64Type>()
        .write_batch(&[1, 2, 5], Some(&[3, 3, 0, 1, 2, 3]), Some(&[0, 1, 0, 0, 0, 1]))
        .unwrap();
    column.close().unwrap();

    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<BoolType>()
        .write_batch(&[true, false, false, true], None, None)
        .unwrap();
    column.close().unwrap();

    row_group.close().unwrap();
    Bytes::from(writer.into_inner().unwrap())
}

fn expected_foreign_rows() -> Vec<Vec<ParquetValue>> {
    vec![
        vec![
            ParquetValue::Int32(1),
            "one".into(),
            ParquetValue::List(vec![ParquetValue::Int64(1), ParquetValue::Int64(2)]),
            ParquetValue::Boolean(true),
        ],
        vec![
            ParquetValue::Int32(2),
            ParquetValue::Null,
            ParquetValue::Null,
            ParquetValue::Boolean(false),
        ],
        vec![
            ParquetValue::Int32(3),
            "three".into(),
            ParquetValue::List(vec![]),
            ParquetValue::Boolean(false),
        ],
        vec![
            ParquetValue::Int32(4),
            "four".into(),
            ParquetValue::List(vec![ParquetValue::Null, ParquetValue::Int64(5)]),
            ParquetValue::Boolean(true),
        ],
    ]
}

#[test]
fn test_reads_parquet_crate_v1_dictionary_pages() {
    let bytes = write_foreign(
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_1_0)
            .set_compression(Compression::SNAPPY)
            .build(),
    );

    let reader = Reader::new(bytes).unwrap();
    let expected_schema = schema_of(vec![
        primitive("id", PrimitiveType::Int32, Repetition::Required),
        primitive("name", PrimitiveType::String, Repetition::Optional),
        SchemaNode::List {
            name: "tags".to_string(),
            repetition: Repetition::Optional,
            item: Box::new(primitive("element", PrimitiveType::Int64, Repetition::Optional)),
        },
        primitive("flag", PrimitiveType::Boolean, Repetition::Required),
    ]);
    assert_eq!(reader.schema().fields(), expected_schema.fields());
    assert!(reader.metadata().row_groups[0].columns[0]
        .dictionary_page_offset
        .is_some());

    let rows: Vec<_> = reader.read_rows().collect::<Result<_>>().unwrap();
    assert_eq!(rows, expected_foreign_rows());
}

#[test]
fn test_reads_parquet_crate_v2_pages() {
    // PLAIN values in compressed v2 pages
    let plain = write_foreign(
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_dictionary_enabled(false)
            .set_encoding(FormatEncoding::PLAIN)
            .set_compression(Compression::ZSTD(Default::default()))
            .build(),
    );
    assert_eq!(read_all(plain).unwrap(), expected_foreign_rows());

    // Dictionary indices and RLE booleans in v2 pages
    let dictionary = write_foreign(
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_compression(Compression::UNCOMPRESSED)
            .build(),
    );
    let reader = Reader::new(dictionary).unwrap();
    let flag = &reader.metadata().row_groups[0].columns[3];
    assert!(flag.encodings.contains(&encoding::Encoding::Rle));
    assert_eq!(
        reader.read_rows().collect::<Result<Vec<_>>>().unwrap(),
        expected_foreign_rows()
    );
}

#[test]
fn test_unsupported_value_encoding_is_reported() {
    // Without a dictionary, v2 ints fall back to DELTA_BINARY_PACKED
    let bytes = write_foreign(
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_dictionary_enabled(false)
            .build(),
    );
    let reader = Reader::new(bytes).unwrap();
    let error = reader.read_rows().next().unwrap().unwrap_err();
    assert!(matches!(error, ParquetError::UnsupportedEncoding(_)), "{:?}", error);
}

#[test]
fn test_reads_decimals_in_any_storage() {
    let schema = Arc::new(
        parse_message_type(
            "
    message schema {
        required fixed_len_byte_array(3) price (DECIMAL(5,2));
        optional int64 fee (DECIMAL(9,2));
    }
",
        )
        .unwrap(),
    );
    let mut writer = SerializedFileWriter::new(Vec::new(), schema, Default::default()).unwrap();
    let mut row_group = writer.next_row_group().unwrap();

    let mut column = row_group.next_column().unwrap().unwrap();
    let prices: Vec<FixedLenByteArray> = [[0x00, 0x30, 0x39], [0xFF, 0xFF, 0xFF], [0x01, 0x86, 0x9F]]
        .iter()
        .map(|b| FixedLenByteArray::from(ByteArray::from(b.to_vec())))
        .collect();
    column
        .typed::<FixedLenByteArrayType>()
        .write_batch(&prices, None, None)
        .unwrap();
    column.close().unwrap();

    let mut column = row_group.next_column().unwrap().unwrap();
    column
        .typed::<Int64Type>()
        .write_batch(&[150, -999_999_999], Some(&[1, 0, 1]), None)
        .unwrap();
    column.close().unwrap();

    row_group.close().unwrap();
    let bytes = Bytes::from(writer.into_inner().unwrap());

    let reader = Reader::new(bytes).unwrap();
    let expected_schema = schema_of(vec![
        primitive("price", PrimitiveType::Decimal(5, 2), Repetition::Required),
        primitive("fee", PrimitiveType::Decimal(9, 2), Repetition::Optional),
    ]);
    assert_eq!(reader.schema().fields(), expected_schema.fields());
    let physical: Vec<PhysicalType> = reader.schema().columns().iter().map(|c| c.physical_type()).collect();
    assert_eq!(physical, vec![PhysicalType::FixedLenByteArray(3), PhysicalType::Int64]);

    let price = reader.metadata().row_groups[0].columns[0].statistics.as_ref().unwrap();
    assert_eq!(price.min, Some(PhysicalValue::FixedLenByteArray(Bytes::from_static(&[0xFF, 0xFF, 0xFF]))));
    assert_eq!(price.max, Some(PhysicalValue::FixedLenByteArray(Bytes::from_static(&[0x01, 0x86, 0x9F]))));

    let rows: Vec<_> = reader.read_rows().collect::<Result<_>>().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![ParquetValue::Decimal128(12345, 2), ParquetValue::Decimal128(150, 2)],
            vec![ParquetValue::Decimal128(-1, 2), ParquetValue::Null],
            vec![ParquetValue::Decimal128(99999, 2), ParquetValue::Decimal128(-999_999_999, 2)],
        ]
    );
}
