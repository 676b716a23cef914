mod common;

use common::{
    pack_records, read_trailer, records_for_format, xyz_intensity, xyz_intensity_layout,
};
use std::io::Cursor;

use pointzip::{
    compress_records, decompress_records, open_for_reading, open_for_writing, ChunkSize,
    ChunkTable, ChunkedReader, ChunkedWriter, PointFormat, PointZipError, StreamConfig,
    TableLocation,
};

fn chunk_table_of(stream: &[u8]) -> ChunkTable {
    let (count, offset) = read_trailer(stream);
    let mut src = &stream[offset as usize..];
    ChunkTable::read_from(&mut src, count as usize).unwrap()
}

fn scenario_config() -> StreamConfig {
    StreamConfig::builder(xyz_intensity_layout())
        .with_fixed_chunk_size(2)
        .build()
        .unwrap()
}

fn scenario_records() -> Vec<u8> {
    [
        xyz_intensity(0, 0, 0, 0),
        xyz_intensity(1, 1, 1, 10),
        xyz_intensity(2, 1, 0, 5),
    ]
    .concat()
}

#[test]
fn test_second_chunk_decodes_alone() {
    let compressed = compress_records(&scenario_records(), scenario_config()).unwrap();

    let table = chunk_table_of(&compressed);
    assert_eq!(table.len(), 2);
    assert_eq!(table[0].record_count, 2);
    assert_eq!(table[1].record_count, 1);

    let mut reader = ChunkedReader::new(&compressed, scenario_config()).unwrap();
    assert_eq!(reader.read_chunk(1).unwrap(), xyz_intensity(2, 1, 0, 5));
    assert_eq!(reader.read_chunk(0).unwrap(), scenario_records()[..28].to_vec());
}

#[test]
fn test_truncated_chunk_is_reported() {
    let mut compressed = compress_records(&scenario_records(), scenario_config()).unwrap();
    let (_, table_offset) = read_trailer(&compressed);
    compressed.remove(table_offset as usize - 1);

    let mut reader = ChunkedReader::new(&compressed, scenario_config()).unwrap();
    let mut record = vec![0u8; 14];
    reader.decompress_one(&mut record).unwrap();
    assert_eq!(record, xyz_intensity(0, 0, 0, 0));
    reader.decompress_one(&mut record).unwrap();
    assert_eq!(record, xyz_intensity(1, 1, 1, 10));
    assert!(matches!(
        reader.decompress_one(&mut record),
        Err(PointZipError::TruncatedInput { chunk: 1 })
    ));

    // a chunk that is not affected still decodes
    assert_eq!(reader.read_chunk(0).unwrap(), scenario_records()[..28].to_vec());
}

#[test]
fn test_truncated_stream_of_many_chunks() {
    let format = PointFormat::new(7).unwrap();
    let records = pack_records(&format, &records_for_format(&format, 250));
    let config = StreamConfig::builder(format)
        .with_fixed_chunk_size(100)
        .build()
        .unwrap();
    let mut compressed = compress_records(&records, config.clone()).unwrap();
    let (_, table_offset) = read_trailer(&compressed);
    compressed.remove(table_offset as usize - 1);

    let mut reader = ChunkedReader::new(&compressed, config).unwrap();
    let record_size = format.record_size();
    assert_eq!(
        reader.read_chunk(1).unwrap(),
        records[100 * record_size..200 * record_size].to_vec()
    );
    assert!(matches!(
        reader.read_chunk(2),
        Err(PointZipError::TruncatedInput { chunk: 2 })
    ));
}

#[test]
fn test_corrupt_tables() {
    let compressed = compress_records(&scenario_records(), scenario_config()).unwrap();

    // trailer only
    assert!(matches!(
        ChunkedReader::new(&compressed[..5], scenario_config()),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));

    // more chunks than the stream can hold
    let mut too_many = compressed.clone();
    let len = too_many.len();
    too_many[len - 12..len - 8].copy_from_slice(&1_000u32.to_le_bytes());
    assert!(matches!(
        ChunkedReader::new(&too_many, scenario_config()),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));

    // byte lengths that do not add up to the table offset
    let mut wrong_length = compressed.clone();
    let (_, table_offset) = read_trailer(&compressed);
    let entry = table_offset as usize;
    wrong_length[entry] = wrong_length[entry].wrapping_add(1);
    assert!(matches!(
        ChunkedReader::new(&wrong_length, scenario_config()),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));

    // record counts that do not match the chunk size
    let config = StreamConfig::builder(xyz_intensity_layout())
        .with_fixed_chunk_size(3)
        .build()
        .unwrap();
    assert!(matches!(
        ChunkedReader::new(&compressed, config),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));
}

fn variable_stream_of_format_0(count: u32) -> (Vec<u8>, StreamConfig) {
    let format = PointFormat::new(0).unwrap();
    let records = pack_records(&format, &records_for_format(&format, count));
    let config = StreamConfig::builder(format)
        .with_variable_chunk_size()
        .build()
        .unwrap();
    (compress_records(&records, config.clone()).unwrap(), config)
}

#[test]
fn test_record_count_larger_than_the_chunk() {
    let (mut compressed, config) = variable_stream_of_format_0(3);
    let (count, table_offset) = read_trailer(&compressed);
    assert_eq!(count, 1);
    let record_count = table_offset as usize + 4;
    compressed[record_count..record_count + 4].copy_from_slice(&u32::MAX.to_le_bytes());

    assert!(matches!(
        decompress_records(&compressed, config.clone()),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));
    let mut reader = ChunkedReader::new(&compressed, config).unwrap();
    assert!(matches!(
        reader.read_chunk(0),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));

    let mut reader = open_for_reading(&compressed, 0).unwrap();
    assert_eq!(reader.record_count(), u64::from(u32::MAX));
    let error = loop {
        match reader.read_record() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("the chunk does not hold that many records"),
            Err(error) => break error,
        }
    };
    assert!(matches!(error, PointZipError::ChunkTableCorrupt(_)));
}

#[test]
fn test_chunk_too_short_for_a_raw_record() {
    let (mut compressed, config) = variable_stream_of_format_0(3);
    let (_, table_offset) = read_trailer(&compressed);
    let table_offset = table_offset as usize;
    // move all the chunk bytes but 10 to a second chunk
    let byte_length = compressed[table_offset] as u32
        | (compressed[table_offset + 1] as u32) << 8
        | (compressed[table_offset + 2] as u32) << 16
        | (compressed[table_offset + 3] as u32) << 24;
    let mut table = Vec::new();
    table.extend_from_slice(&10u32.to_le_bytes());
    table.extend_from_slice(&1u32.to_le_bytes());
    table.extend_from_slice(&(byte_length - 10).to_le_bytes());
    table.extend_from_slice(&2u32.to_le_bytes());
    compressed.truncate(table_offset);
    compressed.extend_from_slice(&table);
    compressed.extend_from_slice(&2u32.to_le_bytes());
    compressed.extend_from_slice(&(table_offset as u64).to_le_bytes());

    assert!(matches!(
        ChunkedReader::new(&compressed, config),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));
    assert!(matches!(
        open_for_reading(&compressed, 0),
        Err(PointZipError::ChunkTableCorrupt(_))
    ));
}

#[test]
fn test_empty_layouts_are_rejected() {
    let empty = || pointzip::RecordLayoutBuilder::new().build();
    assert!(matches!(
        StreamConfig::builder(empty()).build(),
        Err(PointZipError::EmptyRecordLayout)
    ));
    assert!(matches!(
        ChunkedWriter::new(Cursor::new(Vec::new()), StreamConfig::new(empty())),
        Err(PointZipError::EmptyRecordLayout)
    ));
    assert!(matches!(
        ChunkedReader::new(&[0u8; 12], StreamConfig::new(empty())),
        Err(PointZipError::EmptyRecordLayout)
    ));
}

#[test]
fn test_single_record() {
    let records = xyz_intensity(-7, 8, 9, 65_535);
    let compressed = compress_records(&records, scenario_config()).unwrap();
    let table = chunk_table_of(&compressed);
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].record_count, 1);
    assert_eq!(
        decompress_records(&compressed, scenario_config()).unwrap(),
        records
    );
}

#[test]
fn test_exactly_chunk_size_records() {
    let records = scenario_records()[..28].to_vec();
    let compressed = compress_records(&records, scenario_config()).unwrap();
    let table = chunk_table_of(&compressed);
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].record_count, 2);
    assert_eq!(
        decompress_records(&compressed, scenario_config()).unwrap(),
        records
    );
}

#[test]
fn test_no_records() {
    let compressed = compress_records(&[], scenario_config()).unwrap();
    // only the trailer
    assert_eq!(compressed.len(), 12);
    assert_eq!(read_trailer(&compressed), (0, 0));

    let mut reader = ChunkedReader::new(&compressed, scenario_config()).unwrap();
    assert_eq!(reader.num_chunks(), 0);
    assert_eq!(reader.num_records(), 0);
    let mut record = vec![0u8; 14];
    assert!(matches!(
        reader.decompress_one(&mut record),
        Err(PointZipError::EndOfStream)
    ));
    assert!(matches!(
        reader.seek_chunk(0),
        Err(PointZipError::ChunkIndexOutOfBounds { index: 0, count: 0 })
    ));

    let writer = open_for_writing(6, 10).unwrap();
    let compressed = writer.close_and_finalize().unwrap();
    let mut reader = open_for_reading(&compressed, 6).unwrap();
    assert_eq!(reader.read_record().unwrap(), None);
}

#[test]
fn test_chunk_independence() {
    let format = PointFormat::with_extra_bytes(10, 3).unwrap();
    let records = pack_records(&format, &records_for_format(&format, 350));
    let record_size = format.record_size();
    let config = StreamConfig::builder(format)
        .with_fixed_chunk_size(100)
        .build()
        .unwrap();
    let compressed = compress_records(&records, config.clone()).unwrap();

    // each chunk is the stream of its own records
    let table = chunk_table_of(&compressed);
    let offsets = table.offsets(0);
    for (i, entry) in table.iter().enumerate() {
        let start = offsets[i] as usize;
        let chunk_bytes = &compressed[start..start + entry.byte_length as usize];
        let chunk_records = &records[i * 100 * record_size..][..entry.record_count as usize * record_size];
        let alone = compress_records(chunk_records, config.clone()).unwrap();
        assert_eq!(&alone[..chunk_bytes.len()], chunk_bytes, "chunk {}", i);
    }

    // and decodes in any order
    let mut reader = ChunkedReader::new(&compressed, config).unwrap();
    for &i in &[3usize, 0, 2, 1, 3] {
        let expected = &records[i * 100 * record_size..][..table[i].record_count as usize * record_size];
        assert_eq!(reader.read_chunk(i).unwrap(), expected);
    }
}

#[test]
fn test_monotonic_chunk_table() {
    let format = PointFormat::new(1).unwrap();
    let records = pack_records(&format, &records_for_format(&format, 1_234));
    for &location in &[TableLocation::Trailer, TableLocation::HeaderSlot] {
        let config = StreamConfig::builder(format)
            .with_fixed_chunk_size(100)
            .with_table_location(location)
            .build()
            .unwrap();
        let compressed = compress_records(&records, config).unwrap();
        let (count, table_offset) = read_trailer(&compressed);
        assert_eq!(count, 13);

        let data_start = if location == TableLocation::HeaderSlot { 8 } else { 0 };
        let table = chunk_table_of(&compressed);
        let offsets = table.offsets(data_start);
        assert_eq!(offsets[0], data_start);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        let last = table.len() - 1;
        assert_eq!(offsets[last] + u64::from(table[last].byte_length), table_offset);
        assert_eq!(table.num_records(), 1_234);
        assert_eq!(table[last].record_count, 34);
    }
}

#[test]
fn test_identical_input_identical_output() {
    let format = PointFormat::new(8).unwrap();
    let records = pack_records(&format, &records_for_format(&format, 500));
    let config = StreamConfig::builder(format)
        .with_fixed_chunk_size(64)
        .with_context_carry(true)
        .build()
        .unwrap();
    let first = compress_records(&records, config.clone()).unwrap();
    let second = compress_records(&records, config.clone()).unwrap();
    assert_eq!(first, second);

    // closing twice does not write anything more
    let mut writer = ChunkedWriter::new(Cursor::new(Vec::new()), config).unwrap();
    writer.compress_many(&records).unwrap();
    writer.done().unwrap();
    writer.done().unwrap();
    assert_eq!(writer.into_inner().into_inner(), first);
}

#[test]
fn test_header_slot_is_patched() {
    let config = StreamConfig::builder(xyz_intensity_layout())
        .with_fixed_chunk_size(2)
        .with_table_location(TableLocation::HeaderSlot)
        .build()
        .unwrap();

    // the stream does not have to start at the beginning of the output
    let mut output = Cursor::new(vec![0xAAu8; 5]);
    output.set_position(5);
    let mut writer = ChunkedWriter::new(&mut output, config.clone()).unwrap();
    writer.compress_many(&scenario_records()).unwrap();
    writer.done().unwrap();
    drop(writer);

    let bytes = output.into_inner();
    assert_eq!(&bytes[..5], &[0xAA; 5]);
    let stream = &bytes[5..];
    let mut slot = [0u8; 8];
    slot.copy_from_slice(&stream[..8]);
    let (_, table_offset) = read_trailer(stream);
    assert_eq!(u64::from_le_bytes(slot), table_offset);

    assert_eq!(decompress_records(stream, config).unwrap(), scenario_records());
}

#[test]
fn test_context_carry_and_seek() {
    let format = PointFormat::new(6).unwrap();
    let records = pack_records(&format, &records_for_format(&format, 1_000));
    let record_size = format.record_size();
    let carried = StreamConfig::builder(format)
        .with_fixed_chunk_size(100)
        .with_context_carry(true)
        .build()
        .unwrap();
    let independent = StreamConfig::builder(format)
        .with_fixed_chunk_size(100)
        .build()
        .unwrap();

    let compressed = compress_records(&records, carried.clone()).unwrap();
    let without_carry = compress_records(&records, independent).unwrap();
    assert_ne!(compressed, without_carry);
    assert_eq!(decompress_records(&compressed, carried.clone()).unwrap(), records);

    // only the first chunk starts with a raw record
    let table = chunk_table_of(&compressed);
    assert_eq!(table.len(), 10);
    assert_eq!(&compressed[..record_size], &records[..record_size]);

    let mut reader = ChunkedReader::new(&compressed, carried).unwrap();
    for &i in &[7usize, 2, 2, 9, 0, 5] {
        let expected = &records[i * 100 * record_size..(i + 1) * 100 * record_size];
        assert_eq!(reader.read_chunk(i).unwrap(), expected, "chunk {}", i);
    }

    // seeking in the middle of a chunk goes back to its start
    reader.seek_chunk(4).unwrap();
    let mut record = vec![0u8; record_size];
    reader.decompress_one(&mut record).unwrap();
    reader.decompress_one(&mut record).unwrap();
    reader.seek_chunk(4).unwrap();
    assert_eq!(reader.records_left(), 600);
    reader.decompress_one(&mut record).unwrap();
    assert_eq!(record, &records[400 * record_size..401 * record_size]);
}

#[test]
fn test_variable_size_chunks() {
    let format = PointFormat::new(3).unwrap();
    let record_size = format.record_size();
    let records = pack_records(&format, &records_for_format(&format, 36));
    let chunk_sizes = [1usize, 2, 3, 4, 5, 6, 5, 4, 3, 2, 1];
    let mut chunks = Vec::new();
    let mut start = 0;
    for size in &chunk_sizes {
        chunks.push(&records[start..start + size * record_size]);
        start += size * record_size;
    }

    let config = StreamConfig::builder(format)
        .with_variable_chunk_size()
        .build()
        .unwrap();
    assert_eq!(config.chunk_size(), ChunkSize::Variable);
    let mut writer = ChunkedWriter::new(Cursor::new(Vec::new()), config.clone()).unwrap();
    writer.compress_chunks(&chunks).unwrap();
    writer.done().unwrap();
    let compressed = writer.into_inner().into_inner();

    let table = chunk_table_of(&compressed);
    let counts: Vec<usize> = table.iter().map(|e| e.record_count as usize).collect();
    assert_eq!(counts, chunk_sizes);

    let mut reader = ChunkedReader::new(&compressed, config).unwrap();
    assert_eq!(reader.read_chunk(5).unwrap(), chunks[5]);
    assert_eq!(reader.read_chunk(10).unwrap(), chunks[10]);
    reader.seek_chunk(0).unwrap();
    let mut all = vec![0u8; records.len()];
    reader.decompress_many(&mut all).unwrap();
    assert_eq!(all, records);

    // the engine reader takes the record counts from the table
    let mut reader = open_for_reading(&compressed, 3).unwrap();
    reader.seek_chunk(10).unwrap();
    let last = reader.read_record().unwrap().unwrap();
    assert_eq!(last, records_for_format(&format, 36).remove(35));
}

#[test]
fn test_invalid_chunk_size() {
    assert!(matches!(
        StreamConfig::builder(xyz_intensity_layout())
            .with_fixed_chunk_size(0)
            .build(),
        Err(PointZipError::InvalidChunkSize(0))
    ));
    assert!(matches!(
        open_for_writing(0, 0),
        Err(PointZipError::InvalidChunkSize(0))
    ));
}

#[test]
fn test_descriptor_round_trip() {
    let config = StreamConfig::builder(PointFormat::with_extra_bytes(9, 2).unwrap())
        .with_fixed_chunk_size(1_000)
        .with_context_carry(true)
        .with_table_location(TableLocation::HeaderSlot)
        .build()
        .unwrap();
    let mut descriptor = Vec::new();
    config.write_to(&mut descriptor).unwrap();
    let read_back = StreamConfig::from_buffer(&descriptor).unwrap();
    assert_eq!(read_back, config);
}
