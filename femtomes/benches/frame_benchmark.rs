use criterion::{criterion_group, criterion_main, Criterion};
use femtomes::{encode_frame, handle_frame, FrameDecoder, GpsPosition, Px4Gps};
use rand::RngExt;
use std::hint::black_box;

const FRAMES: usize = 1_000;

/// PX4GPS frames separated by up to 32 bytes of line noise
fn stream() -> Vec<u8> {
    let mut rng = rand::rng();
    let mut data = Vec::new();
    for i in 0..FRAMES {
        let mut payload = vec![0u8; Px4Gps::PAYLOAD_LEN];
        payload[8..12].copy_from_slice(&(i as i32).to_le_bytes());
        data.extend(encode_frame(femtomes::FEMTO_MSG_ID_PX4GPS, &payload).unwrap());

        let noise: usize = rng.random_range(0..32);
        for _ in 0..noise {
            // no 0xaa, noise never opens a frame
            data.push(rng.random_range(0..0xaa));
        }
    }
    data
}

fn decode_all(data: &[u8]) -> usize {
    let mut decoder = FrameDecoder::new();
    let mut position = GpsPosition::default();
    let mut count = 0;
    for byte in data {
        if decoder.consume_byte(*byte).is_some() {
            count += handle_frame(decoder.frame(), &mut position, 0);
        }
    }
    count
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let data = stream();
    assert_eq!(decode_all(&data), FRAMES);

    c.bench_function("decode_px4gps_stream", |b| {
        b.iter(|| decode_all(black_box(&data)))
    });

    let frame = &data[..28 + Px4Gps::PAYLOAD_LEN + 4];
    c.bench_function("decode_single_frame", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            frame
                .iter()
                .filter_map(|b| decoder.consume_byte(*b))
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
