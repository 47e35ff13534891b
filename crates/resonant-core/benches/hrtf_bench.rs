use criterion::{criterion_group, criterion_main, Criterion};
use resonant_core::hrtf::HrtfData;
use std::hint::black_box;

fn synthetic_dataset_bytes() -> Vec<u8> {
    let elev_count: u32 = 2;
    let azimuth_counts = [4u32, 4u32];
    let hrir_length: u32 = 8;
    let mut buf = Vec::new();
    buf.extend_from_slice(&0x4852_5446u32.to_le_bytes());
    buf.extend_from_slice(&44100u32.to_le_bytes());
    buf.extend_from_slice(&hrir_length.to_le_bytes());
    buf.extend_from_slice(&elev_count.to_le_bytes());
    buf.extend_from_slice(&(-40i32).to_le_bytes());
    buf.extend_from_slice(&(90i32).to_le_bytes());
    for count in azimuth_counts {
        buf.extend_from_slice(&count.to_le_bytes());
    }
    for elev in 0..elev_count {
        for az in 0..azimuth_counts[elev as usize] {
            for tap in 0..hrir_length {
                let v = ((elev * 100 + az * 10 + tap) as f32) * 0.001;
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    buf
}

fn bench_coefficient_synthesis(c: &mut Criterion) {
    let bytes = synthetic_dataset_bytes();
    let data = HrtfData::load_from_buffer(&bytes, 44100).unwrap();
    let mut left = vec![0.0f32; data.hrir_length()];
    let mut right = vec![0.0f32; data.hrir_length()];

    c.bench_function("hrtf_compute_coefficients_stereo", |b| {
        b.iter(|| data.compute_coefficients_stereo(black_box(10.0), black_box(37.0), &mut left, &mut right, false));
    });
}

criterion_group!(benches, bench_coefficient_synthesis);
criterion_main!(benches);
