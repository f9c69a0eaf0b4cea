use bgcompose::{
    compose_bytes,
    compositor::{blur_background, build_shadow, resize_subject},
    services::test_utils::{cutout_png, solid_png},
    ComposeParameters, ImageCodec, ImageSide,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};

const BACKGROUND_SIZES: [(u32, u32); 3] = [(640, 480), (1280, 720), (1920, 1080)];

fn bench_compose_pipeline(c: &mut Criterion) {
    let subject = cutout_png(600, 900);
    let mut group = c.benchmark_group("compose_bytes");
    group.sample_size(20);

    for &(width, height) in &BACKGROUND_SIZES {
        let background = solid_png(width, height, [120, 140, 160, 255]);
        let params = ComposeParameters::default();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &background,
            |b, background| {
                b.iter(|| compose_bytes(black_box(background), black_box(&subject), &params));
            },
        );
    }
    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let subject = ImageCodec::decode_rgba(&cutout_png(600, 900), ImageSide::Subject)
        .expect("fixture decodes");
    let background = RgbaImage::from_pixel(1280, 720, Rgba([90, 90, 90, 255]));

    c.bench_function("blur_background_1.5", |b| {
        b.iter(|| blur_background(black_box(background.clone()), 1.5));
    });

    c.bench_function("resize_subject_lanczos", |b| {
        b.iter(|| resize_subject(black_box(&subject), (384, 576)));
    });

    let resized = resize_subject(&subject, (384, 576));
    c.bench_function("build_shadow_blur_20", |b| {
        b.iter(|| build_shadow(black_box(&resized), 20.0));
    });
}

criterion_group!(benches, bench_compose_pipeline, bench_stages);
criterion_main!(benches);
