use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qrcodec::{ECLevel, QRBuilder, QRReader, Version};

const PAYLOAD: &[u8] = b"https://example.com/some/fairly/long/path?with=query&and=params";

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for v in [2usize, 10, 40] {
        group.bench_function(format!("v{v}-Q"), |b| {
            b.iter(|| {
                QRBuilder::new(black_box(PAYLOAD))
                    .version(Version::new(v))
                    .ec_level(ECLevel::Q)
                    .build()
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for v in [2usize, 10] {
        let qr = QRBuilder::new(PAYLOAD)
            .version(Version::new(v))
            .ec_level(ECLevel::Q)
            .build()
            .unwrap();
        let img = qr.render(4);
        group.bench_function(format!("v{v}-Q"), |b| {
            b.iter(|| QRReader::detect_gray(black_box(&img)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
