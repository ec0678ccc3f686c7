/// Benchmarks for slice rendering and segmentation overlays.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fetcher::clahe;
use fetcher::render;
use ndarray::Array2;

fn criterion_benchmark(c: &mut Criterion) {
    for size in [64, 256, 512] {
        let slice = Array2::from_shape_fn((size, size), |(y, x)| ((x * 31 + y * 17) % 4096) as f32);
        let image = render::stretch(slice.view());
        let mask = Array2::from_shape_fn((size, size), |(y, x)| {
            if y > size / 4 && y < size / 2 && x > size / 3 {
                255
            } else {
                0
            }
        });

        c.bench_function(&format!("stretch({})", size), |b| {
            b.iter(|| render::stretch(black_box(slice.view())))
        });
        for tile_size in [8, clahe::TILE_SIZE, 64] {
            c.bench_function(&format!("clahe({}, tile {})", size, tile_size), |b| {
                b.iter(|| {
                    clahe::equalize_adapthist(black_box(image.view()), tile_size, clahe::CLIP_LIMIT)
                })
            });
        }
        c.bench_function(&format!("overlay({})", size), |b| {
            b.iter(|| render::overlay(black_box(image.view()), black_box(mask.view()), 0.6))
        });
        let rendered = render::render_slice(slice.view());
        c.bench_function(&format!("encode_gray_png({})", size), |b| {
            b.iter(|| render::encode_gray_png(black_box(&rendered)))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
