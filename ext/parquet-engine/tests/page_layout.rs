use indexmap::IndexMap;
use parquet::format::{PageEncodingStats, PageType};
use parquet_engine::encoding::Encoding;
use parquet_engine::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

mod test_helpers;
use test_helpers::*;

fn int_schema() -> Schema {
    schema_of(vec![primitive("n", PrimitiveType::Int32, Repetition::Required)])
}

fn sequential_rows(count: i32) -> Vec<Vec<ParquetValue>> {
    (1..=count).map(|i| vec![ParquetValue::Int32(i)]).collect()
}

#[test]
fn test_sequential_ints_fill_four_pages() {
    init_test_tracing();
    let options = WriterOptions {
        compression: Compression::UNCOMPRESSED,
        page_size: 1024,
        ..WriterOptions::default()
    };

    // 256 plain ints fill a 1024 byte page exactly
    let mut row_group = RowGroupWriter::new(&int_schema(), &options);
    for row in sequential_rows(1024) {
        row_group.add_row(&row).unwrap();
    }
    let encoded = row_group.encode().unwrap();
    let pages = &encoded.columns()[0].pages;
    assert!(pages.dictionary_page.is_none());
    assert_eq!(pages.data_pages.len(), 4);
    for page in &pages.data_pages {
        assert_eq!(page.num_values, 256);
        assert_eq!(page.uncompressed_size, 1024);
        assert_eq!(page.encoding, Encoding::Plain);
    }

    // Same file through the public writer
    let bytes = write_rows(
        &sequential_rows(1024),
        int_schema(),
        WriterBuilder::new()
            .with_compression(Compression::UNCOMPRESSED)
            .with_page_size(1024),
    );
    let reader = Reader::new(bytes.clone()).unwrap();
    let chunk = &reader.metadata().row_groups[0].columns[0];
    assert_eq!(
        chunk.encoding_stats,
        vec![PageEncodingStats::new(
            PageType::DATA_PAGE,
            parquet::format::Encoding::PLAIN,
            4
        )]
    );
    assert_eq!(chunk.num_values, 1024);

    let stats = chunk.statistics.as_ref().unwrap();
    assert_eq!(stats.min, Some(PhysicalValue::Int32(1)));
    assert_eq!(stats.max, Some(PhysicalValue::Int32(1024)));
    assert_eq!(stats.null_count, 0);
    assert_eq!(stats.distinct_count, Some(1024));

    assert_eq!(read_all(bytes).unwrap(), sequential_rows(1024));
}

#[test]
fn test_list_of_structs_with_null_rows() {
    init_test_tracing();
    let schema = schema_of(vec![
        primitive("id", PrimitiveType::Int32, Repetition::Required),
        SchemaNode::List {
            name: "items".to_string(),
            repetition: Repetition::Optional,
            item: Box::new(SchemaNode::Struct {
                name: "element".to_string(),
                repetition: Repetition::Required,
                fields: vec![
                    primitive("name", PrimitiveType::String, Repetition::Required),
                    primitive("score", PrimitiveType::Int32, Repetition::Optional),
                ],
            }),
        },
    ]);

    let rows: Vec<Vec<ParquetValue>> = (0..200)
        .map(|i| {
            let items = if i % 2 == 1 {
                ParquetValue::Null
            } else {
                ParquetValue::List(
                    (0..(i % 5))
                        .map(|j| {
                            let mut fields = IndexMap::new();
                            fields.insert(
                                Arc::from("name"),
                                ParquetValue::String(Arc::from(format!("item_{}_{}", i, j))),
                            );
                            fields.insert(
                                Arc::from("score"),
                                if j == 1 {
                                    ParquetValue::Null
                                } else {
                                    ParquetValue::Int32(i * 10 + j)
                                },
                            );
                            ParquetValue::Record(fields)
                        })
                        .collect(),
                )
            };
            vec![ParquetValue::Int32(i), items]
        })
        .collect();

    // Small pages spread every chunk over many of them
    let bytes = write_rows(&rows, schema, WriterBuilder::new().with_page_size(256));
    let read = read_all(bytes).unwrap();
    assert_eq!(read.len(), rows.len());
    for (i, (expected, actual)) in rows.iter().zip(&read).enumerate() {
        if i % 2 == 1 {
            assert_eq!(actual[1], ParquetValue::Null, "Row {} should be null", i);
        }
        assert_eq!(expected, actual, "Row {} mismatch", i);
    }
}

#[test]
fn test_page_count_tracks_threshold() {
    let schema = schema_of(vec![primitive("s", PrimitiveType::String, Repetition::Optional)]);
    let page_size = 4096;
    let options = WriterOptions {
        compression: Compression::UNCOMPRESSED,
        page_size,
        dictionary_enabled: false,
        ..WriterOptions::default()
    };

    let mut row_group = RowGroupWriter::new(&schema, &options);
    for i in 0..5000 {
        let value = if i % 10 == 0 {
            ParquetValue::Null
        } else {
            ParquetValue::String(Arc::from(format!("value-{:06}", i)))
        };
        row_group.add_row(&[value]).unwrap();
    }
    let encoded = row_group.encode().unwrap();
    let pages = &encoded.columns()[0].pages.data_pages;

    let total: usize = pages.iter().map(|p| p.uncompressed_size).sum();
    let expected = total.div_ceil(page_size);
    assert!(
        pages.len() >= expected && pages.len() <= expected + 1,
        "{} pages for {} bytes",
        pages.len(),
        total
    );
    assert!(pages.iter().all(|p| p.uncompressed_size <= page_size));
    assert_eq!(pages.iter().map(|p| p.num_values).sum::<usize>(), 5000);
}

#[test]
fn test_dictionary_fallback_by_cardinality() {
    let schema = schema_of(vec![
        primitive("low", PrimitiveType::String, Repetition::Required),
        primitive("high", PrimitiveType::String, Repetition::Required),
        primitive("flag", PrimitiveType::Boolean, Repetition::Required),
    ]);
    let rows: Vec<Vec<ParquetValue>> = (0..2000)
        .map(|i| {
            vec![
                ParquetValue::String(Arc::from(["alpha", "beta", "gamma", "delta"][i % 4])),
                ParquetValue::String(Arc::from(format!("unique-{}", i))),
                ParquetValue::Boolean(i % 3 == 0),
            ]
        })
        .collect();

    let bytes = write_rows(&rows, schema, WriterBuilder::new());
    let reader = Reader::new(bytes.clone()).unwrap();
    let columns = &reader.metadata().row_groups[0].columns;

    let low = &columns[0];
    assert!(low.dictionary_page_offset.is_some());
    assert!(low.encodings.contains(&Encoding::RleDictionary));
    assert_eq!(low.statistics.as_ref().unwrap().distinct_count, Some(4));

    let high = &columns[1];
    assert!(high.dictionary_page_offset.is_none());
    assert!(!high.encodings.iter().any(|e| e.is_dictionary()));

    // Booleans are never dictionary encoded
    assert!(columns[2].dictionary_page_offset.is_none());

    assert_eq!(read_all(bytes).unwrap(), rows);
}

#[test]
fn test_dictionary_fraction_is_configurable() {
    let schema = schema_of(vec![primitive("n", PrimitiveType::Int64, Repetition::Required)]);
    // 300 distinct values over 1000 rows
    let rows: Vec<Vec<ParquetValue>> = (0..1000).map(|i| vec![ParquetValue::Int64(i % 300)]).collect();

    let default = Reader::new(write_rows(&rows, schema.clone(), WriterBuilder::new())).unwrap();
    assert!(default.metadata().row_groups[0].columns[0]
        .dictionary_page_offset
        .is_some());

    let strict = Reader::new(write_rows(
        &rows,
        schema,
        WriterBuilder::new().with_dictionary_size_fraction(0.1),
    ))
    .unwrap();
    assert!(strict.metadata().row_groups[0].columns[0]
        .dictionary_page_offset
        .is_none());
    assert_eq!(strict.read_rows().collect::<Result<Vec<_>>>().unwrap(), rows);
}

#[test]
fn test_footer_statistics_bound_values() {
    let schema = schema_of(vec![
        primitive("n", PrimitiveType::Int64, Repetition::Optional),
        primitive("f", PrimitiveType::Float64, Repetition::Optional),
        primitive("s", PrimitiveType::String, Repetition::Optional),
    ]);
    let mut rng = StdRng::seed_from_u64(7);
    let rows: Vec<Vec<ParquetValue>> = (0..3000)
        .map(|_| {
            if rng.random_bool(0.2) {
                return vec![ParquetValue::Null, ParquetValue::Null, ParquetValue::Null];
            }
            let n: i64 = rng.random_range(-1_000_000..1_000_000);
            vec![
                ParquetValue::Int64(n),
                ParquetValue::Float64(ordered_float::OrderedFloat(n as f64 / 3.0)),
                ParquetValue::String(Arc::from(format!("{:x}", n.unsigned_abs()))),
            ]
        })
        .collect();
    let nulls = rows.iter().filter(|r| r[0].is_null()).count() as u64;

    let bytes = write_rows(&rows, schema, WriterBuilder::new().with_row_group_size(1000));
    let reader = Reader::new(bytes).unwrap();

    for (group_index, group) in reader.metadata().row_groups.iter().enumerate() {
        let slice = &rows[group_index * 1000..(group_index + 1) * 1000];
        let stats = group.columns[0].statistics.as_ref().unwrap();
        let (Some(PhysicalValue::Int64(min)), Some(PhysicalValue::Int64(max))) = (&stats.min, &stats.max) else {
            panic!("missing int statistics");
        };
        for row in slice {
            if let ParquetValue::Int64(n) = row[0] {
                assert!(*min <= n && n <= *max);
            }
        }
        assert!(slice.iter().any(|r| r[0] == ParquetValue::Int64(*min)));
        assert!(slice.iter().any(|r| r[0] == ParquetValue::Int64(*max)));
    }

    let total_nulls: u64 = reader
        .metadata()
        .row_groups
        .iter()
        .map(|g| g.columns[2].statistics.as_ref().unwrap().null_count)
        .sum();
    assert_eq!(total_nulls, nulls);
}

#[test]
fn test_row_group_holds_one_open_page_per_leaf() {
    let schema = schema_of(vec![
        primitive("n", PrimitiveType::Int64, Repetition::Required),
        primitive("s", PrimitiveType::String, Repetition::Optional),
    ]);
    let page_size = 2048;
    let options = WriterOptions {
        compression: Compression::UNCOMPRESSED,
        page_size,
        ..WriterOptions::default()
    };

    let mut row_group = RowGroupWriter::new(&schema, &options);
    let mut peak = 0;
    for i in 0..20_000i64 {
        let s = (i % 3 != 0).then(|| ParquetValue::String(Arc::from(format!("row-{}", i))));
        row_group
            .add_row(&[ParquetValue::Int64(i), s.unwrap_or(ParquetValue::Null)])
            .unwrap();
        peak = peak.max(row_group.buffered_triples());
    }
    // Never more than a page of 8 byte ints plus a page of strings
    assert!(peak <= page_size / 8 + page_size / 4, "peak of {} triples", peak);

    let encoded = row_group.encode().unwrap();
    for chunk in encoded.columns() {
        assert!(chunk.pages.data_pages.len() > 10);
        assert_eq!(chunk.num_values, 20_000);
    }
}

#[test]
fn test_mixed_dictionary_and_plain_chunk_reads_back() {
    let schema = schema_of(vec![primitive("s", PrimitiveType::String, Repetition::Required)]);
    let rows: Vec<Vec<ParquetValue>> = (0..4000)
        .map(|i| ["north", "south", "east", "west"][i % 4].to_string())
        .chain((0..500).map(|i| format!("unique-{:04}", i)))
        .map(|s| vec![ParquetValue::String(Arc::from(s))])
        .collect();

    let bytes = write_rows(
        &rows,
        schema,
        WriterBuilder::new()
            .with_compression(Compression::UNCOMPRESSED)
            .with_page_size(256),
    );
    let reader = Reader::new(bytes.clone()).unwrap();
    let chunk = &reader.metadata().row_groups[0].columns[0];
    assert!(chunk.dictionary_page_offset.is_some());
    assert!(chunk.encodings.contains(&Encoding::RleDictionary));
    assert!(chunk.encodings.contains(&Encoding::Plain));
    assert_eq!(chunk.statistics.as_ref().unwrap().distinct_count, Some(504));

    assert_eq!(read_all(bytes).unwrap(), rows);
}
