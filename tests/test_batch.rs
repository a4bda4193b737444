//! Tests for the parallel batch entry points.

#![cfg(feature = "parallel")]

use bpekit::{AllowedSpecial, DecodePolicy, DisallowedSpecial, EncodeError};

mod util;
use util::*;

fn texts() -> Vec<String> {
    (0..64)
        .map(|i| format!("hello world {i} héllo {}", "a".repeat(i * 7 % 23)))
        .collect()
}

#[test]
fn test_batch_matches_sequential() {
    init_env();
    let encoding = small_encoding();
    let texts = texts();
    let sequential =
        texts.iter().map(|text| encoding.encode_ordinary(text)).collect::<Vec<_>>();
    for num_threads in [None, Some(1), Some(4)] {
        assert_eq!(encoding.encode_ordinary_batch(&texts, num_threads), sequential);
    }
    let batch = encoding
        .encode_batch(&texts, &AllowedSpecial::All, &DisallowedSpecial::default(), None)
        .unwrap();
    assert_eq!(batch, sequential);
}

#[test]
fn test_batch_error_propagates() {
    init_env();
    let encoding = small_encoding();
    let mut texts = texts();
    texts[37] = "boom <|endoftext|>".into();
    let error = encoding
        .encode_batch(&texts, &AllowedSpecial::default(), &DisallowedSpecial::default(), Some(4))
        .unwrap_err();
    assert!(matches!(error, EncodeError::DisallowedSpecial { offset: 5, .. }));
}

#[test]
fn test_decode_batch_roundtrip() {
    init_env();
    let encoding = small_encoding();
    let texts = texts();
    let batch = encoding.encode_ordinary_batch(&texts, None);
    let decoded = encoding.decode_batch(&batch, DecodePolicy::Strict, None).unwrap();
    assert_eq!(decoded, texts);
    let bytes = encoding.decode_bytes_batch(&batch, Some(2)).unwrap();
    assert_eq!(bytes[0], texts[0].as_bytes());
}
