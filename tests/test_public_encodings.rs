//! End-to-end tests against the public vocabularies.
//!
//! These download the rank files through the cached loader on first run;
//! execute with `cargo test -- --ignored` when network access is available.
//! `TIKTOKEN_MAX_EXAMPLES` bounds the exhaustive sweeps.

use bpekit::{encoding_for_model, get_encoding, AllowedSpecial, DisallowedSpecial};

mod util;
use util::init_env;

fn max_examples() -> usize {
    std::env::var("TIKTOKEN_MAX_EXAMPLES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(100)
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_gpt2_simple() {
    init_env();
    let enc = get_encoding("gpt2").unwrap();
    assert_eq!(enc.encode_ordinary("hello world"), [31373, 995]);
    assert_eq!(enc.decode(&[31373, 995]).unwrap(), "hello world");
    assert_eq!(
        enc.encode("hello <|endoftext|>", &AllowedSpecial::All, &DisallowedSpecial::default())
            .unwrap(),
        [31373, 220, 50256]
    );
    assert_eq!(enc.eot_token(), Some(50256));
    assert_eq!(enc.n_vocab(), 50257);
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_gpt2_repeated() {
    init_env();
    let enc = get_encoding("gpt2").unwrap();
    assert_eq!(enc.encode_ordinary("0"), [15]);
    assert_eq!(enc.encode_ordinary("00"), [405]);
    assert_eq!(enc.encode_ordinary("000"), [830]);
    assert_eq!(enc.encode_ordinary("0000"), [2388]);
    assert_eq!(enc.encode_ordinary("00000"), [20483]);
    assert_eq!(enc.encode_ordinary("000000"), [10535]);
    assert_eq!(enc.encode_ordinary("0000000"), [24598]);
    assert_eq!(enc.encode_ordinary("00000000"), [8269]);
    assert_eq!(enc.encode_ordinary("000000000"), [10535, 830]);
    assert_eq!(enc.encode_ordinary("0000000000000000"), [25645]);
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_cl100k_simple() {
    init_env();
    let enc = get_encoding("cl100k_base").unwrap();
    assert_eq!(enc.encode_ordinary("hello world"), [15339, 1917]);
    assert_eq!(enc.decode(&[15339, 1917]).unwrap(), "hello world");
    assert_eq!(
        enc.encode("hello <|endoftext|>", &AllowedSpecial::All, &DisallowedSpecial::default())
            .unwrap(),
        [15339, 220, 100257]
    );
    assert_eq!(enc.encode_ordinary(""), Vec::<u32>::new());
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_cl100k_splits() {
    init_env();
    let enc = get_encoding("cl100k_base").unwrap();
    assert_eq!(enc.encode_ordinary("rer"), [38149]);
    assert_eq!(enc.encode_ordinary("'rer"), [2351, 81]);
    assert_eq!(enc.encode_ordinary("today\n "), [31213, 198, 220]);
    assert_eq!(enc.encode_ordinary("today\n \n"), [31213, 27907]);
    assert_eq!(enc.encode_ordinary("today\n  \n"), [31213, 14211]);
    assert_eq!(enc.encode_ordinary(" \u{85}0"), [220, 126, 227, 15]);
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_cl100k_encode_bytes() {
    init_env();
    let enc = get_encoding("cl100k_base").unwrap();
    assert_eq!(enc.encode_bytes(b" \xec\x8b\xa4\xed"), [62085]);
    // Lone surrogates cannot occur in a str; their replacement form encodes
    // like the replacement character.
    assert_eq!(
        enc.encode_ordinary("\u{fffd}"),
        enc.encode_bytes("\u{fffd}".as_bytes())
    );
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_offsets() {
    init_env();
    let enc = get_encoding("cl100k_base").unwrap();

    let prompt = "hello world";
    let (text, offsets) = enc.decode_with_offsets(&enc.encode_ordinary(prompt)).unwrap();
    assert_eq!(text, prompt);
    assert_eq!(offsets, [0, 5]);

    let prompt = "hello world<|endoftext|> green cow";
    let tokens =
        enc.encode(prompt, &AllowedSpecial::All, &DisallowedSpecial::default()).unwrap();
    let (text, offsets) = enc.decode_with_offsets(&tokens).unwrap();
    assert_eq!(text, prompt);
    assert_eq!(offsets, [0, 5, 11, 24, 30]);

    let prompt = "我非常渴望与人工智能一起工作";
    let (text, offsets) = enc.decode_with_offsets(&enc.encode_ordinary(prompt)).unwrap();
    assert_eq!(text, prompt);
    assert_eq!(offsets, [0, 1, 2, 3, 3, 4, 4, 5, 6, 7, 8, 8, 9, 10, 11, 12, 13]);
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_catastrophically_repetitive() {
    init_env();
    for name in ["r50k_base", "cl100k_base"] {
        let enc = get_encoding(name).unwrap();
        for c in ["^", "0", "a", "'s", " ", "\n"] {
            let big_value = c.repeat(10_000);
            assert_eq!(enc.decode(&enc.encode_ordinary(&big_value)).unwrap(), big_value);
        }
    }
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_single_token_identity() {
    init_env();
    for name in ["gpt2", "cl100k_base"] {
        let enc = get_encoding(name).unwrap();
        let limit = (100 * max_examples()).min(enc.max_token_value() as usize - 1);
        for token in 0..limit as u32 {
            let bytes = enc.decode_single_token_bytes(token).unwrap().to_vec();
            assert_eq!(enc.encode_single_token(&bytes).unwrap(), token);
        }
    }
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_unstable_completions() {
    init_env();
    let enc = get_encoding("cl100k_base").unwrap();
    for prompt in ["hello wo", "my na", "1234 5"] {
        let full = enc.encode_ordinary(prompt);
        let (stable, completions) = enc
            .encode_with_unstable(prompt, &AllowedSpecial::default(), &DisallowedSpecial::default())
            .unwrap();
        assert_eq!(&full[..stable.len()], &stable[..]);
        assert!(!completions.is_empty());
        let unstable = enc.decode_bytes(&full[stable.len()..]).unwrap();
        for completion in &completions {
            let decoded = enc.decode_bytes(completion).unwrap();
            assert!(
                decoded.starts_with(&unstable) || unstable.starts_with(&decoded),
                "completion {completion:?} diverges from {unstable:?}"
            );
        }
    }
}

#[test]
#[ignore = "downloads the public rank files"]
fn test_model_resolution() {
    init_env();
    assert_eq!(encoding_for_model("gpt2").unwrap().name(), "gpt2");
    assert_eq!(encoding_for_model("gpt-3.5-turbo-0301").unwrap().name(), "cl100k_base");
    assert_eq!(encoding_for_model("gpt-4").unwrap().name(), "cl100k_base");
}
