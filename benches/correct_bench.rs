// Criterion benchmarks for the perspective correction pipeline on synthetic
// images of a few sizes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use true_plane::{correct, CorrectionConfig, PixelBuffer, Region};

fn synthetic(width: u32, height: u32) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, 3, |x, y, px| {
        px.copy_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
    })
    .expect("valid synthetic image")
}

/// Full pipeline on a skewed quadrilateral covering most of the frame, the
/// typical shape of a hand-held document photo.
fn bench_correct_quad(c: &mut Criterion) {
    let config = CorrectionConfig::default();
    for (w, h) in [(320u32, 240u32), (1280, 960)] {
        let image = synthetic(w, h);
        let (fw, fh) = (w as f64, h as f64);
        let region = Region::quad([
            (fw * 0.10, fh * 0.08),
            (fw * 0.92, fh * 0.12),
            (fw * 0.88, fh * 0.95),
            (fw * 0.05, fh * 0.90),
        ]);

        c.bench_function(&format!("correct_quad ({}x{})", w, h), |b| {
            b.iter(|| black_box(correct(black_box(&image), &region, &config)));
        });
    }
}

/// Full-frame rectangle: the solver returns the identity and the cost is
/// pure resampling.
fn bench_correct_identity(c: &mut Criterion) {
    let image = synthetic(640, 480);
    let region = Region::full(image.bounds());
    let config = CorrectionConfig::default();

    c.bench_function("correct_identity (640x480)", |b| {
        b.iter(|| black_box(correct(black_box(&image), &region, &config)));
    });
}

criterion_group!(benches, bench_correct_quad, bench_correct_identity);
criterion_main!(benches);
