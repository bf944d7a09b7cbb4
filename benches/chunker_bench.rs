use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hoard::{Chunker, ChunkerParams};

fn bench_chunker(c: &mut Criterion) {
    let mut data = vec![0u8; 4 * 1024 * 1024];
    let mut state: u32 = 7;
    for b in data.iter_mut() {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        *b = (state >> 16) as u8;
    }

    c.bench_function("chunker_scan_4mb", |b| {
        b.iter(|| {
            let mut chunker = Chunker::new(ChunkerParams::default());
            let mut boundaries = 0usize;
            for &byte in black_box(&data) {
                chunker.update(byte);
                if chunker.is_marker() {
                    boundaries += 1;
                }
            }
            black_box(boundaries)
        })
    });

    c.bench_function("codec_encode_4mb", |b| {
        b.iter(|| hoard::codec::encode(black_box(6), black_box(&data)))
    });
}

criterion_group!(benches, bench_chunker);
criterion_main!(benches);
