#![allow(dead_code)]

use bytes::Bytes;
use parquet_engine::*;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Route engine logs to the test output, filtered by `RUST_LOG`
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn primitive(name: &str, primitive_type: PrimitiveType, repetition: Repetition) -> SchemaNode {
    SchemaNode::Primitive {
        name: name.to_string(),
        primitive_type,
        repetition,
    }
}

/// Build a schema from top-level fields
pub fn schema_of(fields: Vec<SchemaNode>) -> Schema {
    SchemaBuilder::new()
        .with_root(SchemaNode::Struct {
            name: "root".to_string(),
            repetition: Repetition::Required,
            fields,
        })
        .build()
        .unwrap()
}

/// Create a test schema with common field types
pub fn create_test_schema() -> Schema {
    schema_of(vec![
        primitive("id", PrimitiveType::Int32, Repetition::Required),
        primitive("name", PrimitiveType::String, Repetition::Optional),
        primitive("value", PrimitiveType::Float64, Repetition::Optional),
        primitive("active", PrimitiveType::Boolean, Repetition::Required),
    ])
}

/// Generate test rows with sequential data
pub fn generate_test_rows(count: usize) -> Vec<Vec<ParquetValue>> {
    (0..count)
        .map(|i| {
            vec![
                ParquetValue::Int32(i as i32),
                if i % 7 == 3 {
                    ParquetValue::Null
                } else {
                    ParquetValue::String(Arc::from(format!("name_{}", i)))
                },
                ParquetValue::Float64(ordered_float::OrderedFloat(i as f64 * 1.5)),
                ParquetValue::Boolean(i % 2 == 0),
            ]
        })
        .collect()
}

/// Write rows into an in-memory file
pub fn write_rows(rows: &[Vec<ParquetValue>], schema: Schema, builder: WriterBuilder) -> Bytes {
    let mut buffer = Vec::new();
    {
        let mut writer = builder.build(&mut buffer, schema).unwrap();
        writer.write_rows(rows.to_vec()).unwrap();
        writer.close().unwrap();
    }
    Bytes::from(buffer)
}

/// Read every row of an in-memory file
pub fn read_all(bytes: Bytes) -> Result<Vec<Vec<ParquetValue>>> {
    let reader = Reader::new(bytes)?;
    let rows = reader.read_rows().collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

/// Perform a roundtrip test and verify data integrity
pub fn test_roundtrip(
    rows: Vec<Vec<ParquetValue>>,
    schema: Schema,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    test_roundtrip_with_options(rows, schema, WriterBuilder::new())
}

/// Perform a roundtrip test through a file on disk with custom writer options
pub fn test_roundtrip_with_options(
    rows: Vec<Vec<ParquetValue>>,
    schema: Schema,
    builder: WriterBuilder,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    use tempfile::NamedTempFile;

    init_test_tracing();
    let temp_file = NamedTempFile::new()?;

    // Write
    {
        let file = std::fs::File::create(temp_file.path())?;
        let mut writer = builder.build(std::io::BufWriter::new(file), schema.clone())?;
        writer.write_rows(rows.clone())?;
        writer.close()?;
    }

    // Read back
    let reader = Reader::open(temp_file.path())?;
    assert_eq!(reader.schema(), &schema, "Schema mismatch");
    assert_eq!(reader.num_rows(), rows.len() as u64);

    let read_rows: Vec<Vec<ParquetValue>> = reader.read_rows().collect::<Result<Vec<_>>>()?;

    // Verify
    assert_eq!(rows.len(), read_rows.len(), "Row count mismatch");

    for (i, (original, read)) in rows.iter().zip(read_rows.iter()).enumerate() {
        assert_eq!(original, read, "Row {} mismatch", i);
    }

    Ok(())
}
