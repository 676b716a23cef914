#![allow(dead_code)]

use pointzip::{
    IntegerWidth, PointFormat, PointRecord, Predictor, RecordLayout, RecordLayoutBuilder, Rgb,
    WavePacket,
};

/// A record of the point format, whose fields change with `i`
/// like the ones of a flight line would
pub fn record_for_format(format: &PointFormat, i: u32) -> PointRecord {
    let mut record = PointRecord {
        x: 1_000 + (i as i32) * 13 + (i % 7) as i32,
        y: -2_000 + (i as i32) * 3 - (i % 5) as i32,
        z: 300 + ((i * 31) % 97) as i32,
        intensity: ((i * 211) % 4096) as u16,
        edge_of_flight_line: i % 100 == 99,
        scan_direction_flag: (i / 50) % 2 == 1,
        user_data: (i % 3) as u8,
        point_source_id: 7 + (i / 250) as u16,
        ..Default::default()
    };

    if format.is_extended() {
        record.number_of_returns = 1 + (i % 15) as u8;
        record.return_number = 1 + (i % u32::from(record.number_of_returns)) as u8;
        record.classification = ((i * 3) % 256) as u8;
        record.classification_flags = (i % 16) as u8;
        record.scanner_channel = ((i / 64) % 4) as u8;
        record.scan_angle = ((i * 37) % 30_001) as i16 - 15_000;
    } else {
        record.number_of_returns = 1 + (i % 7) as u8;
        record.return_number = 1 + (i % u32::from(record.number_of_returns)) as u8;
        record.classification = ((i * 3) % 32) as u8;
        record.classification_flags = ((i / 3) % 8) as u8;
        record.scan_angle = ((i * 7) % 181) as i16 - 90;
    }

    if format.is_extended() || format.has_gps_time() {
        // regular pulses with a jump between lines
        let line_start = if i >= 200 { 5_000.0 } else { 0.0 };
        record.gps_time = Some(123_456.0 + line_start + f64::from(i) * 0.000_25);
    }
    if format.has_color() {
        record.color = Some(Rgb {
            red: ((i * 256) % 65_536) as u16,
            green: ((i * 97) % 65_536) as u16,
            blue: if i % 10 == 0 { 0 } else { 4_096 },
        });
    }
    if format.has_nir() {
        record.nir = Some(((i * 17) % 65_536) as u16);
    }
    if format.has_wave_packet() {
        record.wave_packet = Some(WavePacket {
            descriptor_index: (i % 3) as u8,
            offset: 1_024 + u64::from(i) * 60,
            size: 60,
            return_point: i as f32 * 0.5,
            dx: 0.25,
            dy: -0.5,
            dz: if i % 4 == 0 { 1.0 } else { 0.75 },
        });
    }
    record.extra_bytes = (0..format.num_extra_bytes())
        .map(|b| (i as u16).wrapping_mul(b + 1) as u8)
        .collect();
    record
}

pub fn records_for_format(format: &PointFormat, count: u32) -> Vec<PointRecord> {
    (0..count).map(|i| record_for_format(format, i)).collect()
}

/// Packs the records one after the other
pub fn pack_records(format: &PointFormat, records: &[PointRecord]) -> Vec<u8> {
    let record_size = format.record_size();
    let mut packed = vec![0u8; record_size * records.len()];
    for (record, out) in records.iter().zip(packed.chunks_exact_mut(record_size)) {
        record.pack_into(format, out).unwrap();
    }
    packed
}

/// `{x: i32, y: i32, z: i32, intensity: u16}`
pub fn xyz_intensity_layout() -> RecordLayout {
    RecordLayoutBuilder::new()
        .add_integer(IntegerWidth::I32, Predictor::Linear)
        .add_integer(IntegerWidth::I32, Predictor::Linear)
        .add_integer(IntegerWidth::I32, Predictor::Linear)
        .add_integer(IntegerWidth::U16, Predictor::Previous)
        .build()
}

pub fn xyz_intensity(x: i32, y: i32, z: i32, intensity: u16) -> Vec<u8> {
    let mut record = Vec::with_capacity(14);
    record.extend_from_slice(&x.to_le_bytes());
    record.extend_from_slice(&y.to_le_bytes());
    record.extend_from_slice(&z.to_le_bytes());
    record.extend_from_slice(&intensity.to_le_bytes());
    record
}

/// Reads the trailer: number of chunks and offset of the chunk table
pub fn read_trailer(stream: &[u8]) -> (u32, u64) {
    let trailer = &stream[stream.len() - 12..];
    let mut count = [0u8; 4];
    count.copy_from_slice(&trailer[..4]);
    let mut offset = [0u8; 8];
    offset.copy_from_slice(&trailer[4..]);
    (u32::from_le_bytes(count), u64::from_le_bytes(offset))
}
