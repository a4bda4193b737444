use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use bpekit::{Encoding, Token, TokenId, Vocab};

static PATTERN: &str = r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

fn init_encoding() -> Encoding {
    let mut vocab = (0..=u8::MAX).map(|b| Token::from((vec![b], b as TokenId))).collect::<Vocab>();
    let merges: &[&[u8]] = &[
        b"he", b"ll", b"llo", b"hello", b" w", b"or", b"ld", b" wor", b" world", b"  ", b"    ",
        b"th", b"the", b" th", b" the", b"in", b"ing", b"er", b"an", b"and", b" a", b" and",
    ];
    vocab.extend(
        merges.iter().enumerate().map(|(i, bytes)| Token::from((bytes.to_vec(), 256 + i as u32))),
    );
    Encoding::new("bench", PATTERN, vocab, vec![], None).unwrap()
}

fn input_text() -> String {
    "hello world and the thing in the world keeps going ".repeat(64)
}

fn bench_encode(b: &mut Criterion) {
    let encoding = init_encoding();
    let short = "hello world";
    let long = input_text();
    let repetitive = "a".repeat(4096);
    b.bench_function("encode: short", |b| {
        b.iter(|| encoding.encode_ordinary(black_box(short)))
    });
    b.bench_function("encode: long", |b| {
        b.iter(|| encoding.encode_ordinary(black_box(&long)))
    });
    b.bench_function("encode: repetitive", |b| {
        b.iter(|| encoding.encode_ordinary(black_box(&repetitive)))
    });
}

fn bench_decode(b: &mut Criterion) {
    let encoding = init_encoding();
    let tokens = encoding.encode_ordinary(&input_text());
    b.bench_function("decode: long", |b| {
        b.iter(|| encoding.decode_bytes(black_box(&tokens)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
