/// Benchmarks for aggregation pipeline construction and result shaping.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fetcher::pipelines;
use fetcher::segmentation;

fn criterion_benchmark(c: &mut Criterion) {
    for count in [1, 100, 10000] {
        let patients: Vec<String> = (0..count).map(|i| format!("TCGA-{:02}-{:04}", i % 100, i)).collect();
        c.bench_function(&format!("mri_scans({})", count), |b| {
            b.iter(|| pipelines::mri_scans(black_box(&patients), true))
        });
        c.bench_function(&format!("omics({})", count), |b| {
            b.iter(|| pipelines::omics(black_box(&patients)))
        });
        c.bench_function(&format!("patient_ages({})", count), |b| {
            b.iter(|| pipelines::patient_ages(black_box(&patients)))
        });
    }

    // One segmented box of 40 slices of 128 x 128 pixels, placed in a 64 x 512 x 512 volume.
    let mut bytes = Vec::new();
    for value in [100u16, 227, 200, 327, 10, 49] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend((0..40 * 128 * 128).map(|i| (i % 3 == 0) as u8));
    c.bench_function("segmentation_mask(64x512x512)", |b| {
        b.iter(|| {
            let map = segmentation::parse_first_map(black_box(&bytes)).unwrap();
            segmentation::build_mask(&map, 64, (512, 512)).unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
