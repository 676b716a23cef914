#[macro_use]
extern crate criterion;
extern crate pointzip;

use criterion::{Criterion, Throughput};

use pointzip::record::SequentialPointRecordCompressor;
use pointzip::{
    compress_records, decompress_records, PointFormat, PointRecord, RecordLayout, Rgb,
    StreamConfig,
};
use std::io::Cursor;

const NUM_RECORDS: u32 = 20_000;

struct RawPointsData {
    point_size: usize,
    points_data: Vec<u8>,
}

impl RawPointsData {
    fn cycling_iterator(&self) -> std::iter::Cycle<std::slice::ChunksExact<u8>> {
        self.points_data.chunks_exact(self.point_size).cycle()
    }
}

fn make_raw_points_data(format: PointFormat) -> RawPointsData {
    let point_size = format.record_size();
    let mut points_data = vec![0u8; point_size * NUM_RECORDS as usize];
    for (i, out) in points_data.chunks_exact_mut(point_size).enumerate() {
        let i = i as u32;
        let record = PointRecord {
            x: (i * 17 + i % 5) as i32,
            y: (i * 3) as i32 - 1_000,
            z: ((i * 31) % 500) as i32,
            intensity: ((i * 101) % 2_048) as u16,
            return_number: 1 + (i % 2) as u8,
            number_of_returns: 2,
            classification: 2,
            scan_angle: ((i / 10) % 60) as i16 - 30,
            point_source_id: 1,
            gps_time: if format.is_extended() || format.has_gps_time() {
                Some(5_000.0 + f64::from(i) * 1e-5)
            } else {
                None
            },
            color: if format.has_color() {
                Some(Rgb {
                    red: (i % 256) as u16 * 256,
                    green: 30_000,
                    blue: ((i * 7) % 65_536) as u16,
                })
            } else {
                None
            },
            nir: if format.has_nir() { Some(12) } else { None },
            ..Default::default()
        };
        record.pack_into(&format, out).unwrap();
    }
    RawPointsData {
        point_size,
        points_data,
    }
}

fn record_compression_benchmark(c: &mut Criterion, point_format_id: u8) {
    let format = PointFormat::new(point_format_id).unwrap();
    let raw_points_data = make_raw_points_data(format);

    let mut record_compressor = SequentialPointRecordCompressor::new(Cursor::new(Vec::<u8>::new()));
    record_compressor.set_fields_from(&RecordLayout::from(format));

    c.bench_function(
        &format!("point_{}_record_compression", point_format_id),
        move |b| {
            let mut raw_pts_iter = raw_points_data.cycling_iterator();
            b.iter(|| record_compressor.compress_next(raw_pts_iter.next().unwrap()));
        },
    );
}

fn point_1_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, 1);
}

fn point_3_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, 3);
}

fn point_6_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, 6);
}

fn point_8_record_compression_benchmark(c: &mut Criterion) {
    record_compression_benchmark(c, 8);
}

fn stream_benchmark(c: &mut Criterion) {
    let format = PointFormat::new(3).unwrap();
    let raw_points_data = make_raw_points_data(format);
    let config = StreamConfig::builder(format)
        .with_fixed_chunk_size(5_000)
        .build()
        .unwrap();
    let compressed = compress_records(&raw_points_data.points_data, config.clone()).unwrap();

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(raw_points_data.points_data.len() as u64));
    group.bench_function("compress", |b| {
        b.iter(|| compress_records(&raw_points_data.points_data, config.clone()).unwrap())
    });
    group.bench_function("decompress", |b| {
        b.iter(|| decompress_records(&compressed, config.clone()).unwrap())
    });
    group.finish();
}

criterion_group!(
    point_formats,
    point_1_record_compression_benchmark,
    point_3_record_compression_benchmark,
    point_6_record_compression_benchmark,
    point_8_record_compression_benchmark
);
criterion_group!(streams, stream_benchmark);
criterion_main!(point_formats, streams);
