#![allow(dead_code)]

use std::sync::Once;

use bpekit::{Encoding, SpecialToken, SpecialVocab, Token, TokenId, Vocab};

static INIT_ENV: Once = Once::new();

pub fn init_env() {
    INIT_ENV.call_once(|| {
        simple_logger::SimpleLogger::new()
            .with_level(log::Level::Info.to_level_filter())
            .env()
            .init()
            .unwrap();
    });
}

/// The split pattern shared by the GPT-2 family.
pub const PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

pub const ENDOFTEXT_ID: TokenId = 1000;
pub const ENDOFPROMPT_ID: TokenId = 1001;

/// Every single byte, with its value as its rank.
pub fn byte_vocab() -> Vocab {
    (0..=u8::MAX).map(|b| Token::from((vec![b], b as TokenId))).collect()
}

/// A byte-complete vocabulary with a handful of merges around
/// "hello world", ranked in creation order.
pub fn small_vocab() -> Vocab {
    let mut vocab = byte_vocab();
    let merges: &[&[u8]] = &[
        b"he",       // 256
        b"ll",       // 257
        b"llo",      // 258
        b"hello",    // 259
        b" w",       // 260
        b"or",       // 261
        b"ld",       // 262
        b" wor",     // 263
        b" world",   // 264
        b"\xc3\xa9", // 265, "e" with acute accent
        b"  ",       // 266
    ];
    vocab.extend(
        merges.iter().enumerate().map(|(i, bytes)| Token::from((bytes.to_vec(), 256 + i as u32))),
    );
    vocab
}

pub fn small_specials() -> SpecialVocab {
    vec![
        SpecialToken::from(("<|endoftext|>", ENDOFTEXT_ID)),
        SpecialToken::from(("<|endofprompt|>", ENDOFPROMPT_ID)),
    ]
}

pub fn small_encoding() -> Encoding {
    Encoding::new("small", PATTERN, small_vocab(), small_specials(), None).unwrap()
}
