use parquet::basic::{BrotliLevel, GzipLevel, ZstdLevel};
use parquet_engine::*;
use std::sync::Arc;

mod test_helpers;
use test_helpers::*;

fn all_codecs() -> Vec<(&'static str, Compression)> {
    vec![
        ("UNCOMPRESSED", Compression::UNCOMPRESSED),
        ("SNAPPY", Compression::SNAPPY),
        ("GZIP", Compression::GZIP(GzipLevel::default())),
        ("BROTLI", Compression::BROTLI(BrotliLevel::default())),
        ("LZ4", Compression::LZ4),
        ("LZ4_RAW", Compression::LZ4_RAW),
        ("ZSTD", Compression::ZSTD(ZstdLevel::default())),
    ]
}

#[test]
fn test_roundtrip_with_every_codec() {
    let schema = create_test_schema();
    let rows = generate_test_rows(500);

    for (name, compression) in all_codecs() {
        let bytes = write_rows(
            &rows,
            schema.clone(),
            WriterBuilder::new()
                .with_compression(compression)
                .with_page_size(2048),
        );
        let reader = Reader::new(bytes.clone()).unwrap();
        for chunk in &reader.metadata().row_groups[0].columns {
            assert_eq!(chunk.codec, compression, "{} codec not recorded", name);
        }
        assert_eq!(read_all(bytes).unwrap(), rows, "{} roundtrip failed", name);
    }
}

#[test]
fn test_compression_effectiveness() {
    let schema = schema_of(vec![
        primitive("repetitive", PrimitiveType::String, Repetition::Required),
        primitive("sequential", PrimitiveType::Int64, Repetition::Required),
    ]);
    let rows: Vec<Vec<ParquetValue>> = (0..2000)
        .map(|i| {
            vec![
                ParquetValue::String(Arc::from(format!("{}{}", "A".repeat(100), i))),
                ParquetValue::Int64(i as i64),
            ]
        })
        .collect();

    let size_with = |compression| {
        write_rows(
            &rows,
            schema.clone(),
            WriterBuilder::new()
                .with_compression(compression)
                .with_dictionary_enabled(false),
        )
        .len()
    };

    let uncompressed = size_with(Compression::UNCOMPRESSED);
    for (name, compression) in all_codecs().into_iter().skip(1) {
        let compressed = size_with(compression);
        assert!(
            compressed < uncompressed,
            "{}: {} bytes, uncompressed {}",
            name,
            compressed,
            uncompressed
        );
    }
}

#[test]
fn test_codec_identity_edge_cases() {
    let large: Vec<u8> = (0..2 * 1024 * 1024u32).map(|i| (i % 97) as u8).collect();
    for (name, compression) in all_codecs() {
        for input in [&b""[..], &b"x"[..], &large[..]] {
            let compressed = compression::compress(compression, input).unwrap();
            let restored = compression::decompress(compression, &compressed, input.len()).unwrap();
            assert_eq!(restored, input, "{} failed for {} bytes", name, input.len());
        }
    }
}

#[test]
fn test_unsupported_codec_fails_before_writing() {
    let mut buffer = Vec::new();
    {
        let result = WriterBuilder::new()
            .with_compression(Compression::LZO)
            .build(&mut buffer, create_test_schema());
        assert!(matches!(result, Err(ParquetError::UnsupportedCodec(_))));
    }
    assert!(buffer.is_empty());
}

#[test]
fn test_codec_names() {
    assert_eq!(compression::parse_codec("snappy").unwrap(), Compression::SNAPPY);
    assert!(compression::parse_codec("zstd(3)").is_ok());
    assert!(compression::parse_codec("nope").is_err());
}
