//! Tests for the unstable suffix enumeration over a synthetic vocabulary.

use bpekit::{AllowedSpecial, DisallowedSpecial, EncodeError};

mod util;
use util::*;

#[test]
fn test_stable_prefix_and_completions() {
    init_env();
    let encoding = small_encoding();
    let (stable, completions) = encoding
        .encode_with_unstable("hel", &AllowedSpecial::default(), &DisallowedSpecial::default())
        .unwrap();
    // The whole text is a single piece, so nothing is stable yet.
    assert_eq!(stable, Vec::<u32>::new());
    assert!(!completions.is_empty());
    // A full "hello" is one possible continuation.
    assert!(completions.contains(&vec![259]));
    // As is stopping after "hel" itself.
    assert!(completions.contains(&vec![256, 108]));
    for completion in &completions {
        let decoded = encoding.decode_bytes(completion).unwrap();
        assert!(decoded.starts_with(b"hel"), "completion {completion:?} decodes to {decoded:?}");
    }
}

#[test]
fn test_stable_across_pieces() {
    init_env();
    let encoding = small_encoding();
    let (stable, completions) = encoding
        .encode_with_unstable(
            "hello world",
            &AllowedSpecial::default(),
            &DisallowedSpecial::default(),
        )
        .unwrap();
    // Only the last piece is unstable.
    assert_eq!(stable, [259]);
    assert!(completions.contains(&vec![264]));
    for completion in &completions {
        let decoded = encoding.decode_bytes(completion).unwrap();
        assert!(decoded.starts_with(b" world") || b" world".starts_with(&decoded));
    }
}

#[test]
fn test_trailing_special_is_stable() {
    init_env();
    let encoding = small_encoding();
    let (stable, completions) = encoding
        .encode_with_unstable(
            "hello <|endoftext|>",
            &AllowedSpecial::All,
            &DisallowedSpecial::default(),
        )
        .unwrap();
    assert_eq!(stable, [259, 32, ENDOFTEXT_ID]);
    assert!(completions.is_empty());
}

#[test]
fn test_empty_input() {
    init_env();
    let encoding = small_encoding();
    let (stable, completions) = encoding
        .encode_with_unstable("", &AllowedSpecial::default(), &DisallowedSpecial::default())
        .unwrap();
    assert_eq!(stable, Vec::<u32>::new());
    assert!(completions.is_empty());
}

#[test]
fn test_disallowed_raises() {
    init_env();
    let encoding = small_encoding();
    let error = encoding
        .encode_with_unstable(
            "hel <|endofprompt|>",
            &AllowedSpecial::default(),
            &DisallowedSpecial::default(),
        )
        .unwrap_err();
    assert!(matches!(error, EncodeError::DisallowedSpecial { offset: 4, .. }));
}

#[test]
fn test_whitespace_suffix() {
    init_env();
    let encoding = small_encoding();
    // Two trailing spaces merge to one token, but more whitespace could
    // still extend them.
    let (stable, completions) = encoding
        .encode_with_unstable("hello  ", &AllowedSpecial::default(), &DisallowedSpecial::default())
        .unwrap();
    assert_eq!(stable, [259]);
    assert!(completions.contains(&vec![266]));
    // The whitespace fix also offers the two spaces tokenized on their own.
    assert!(completions.contains(&vec![32, 32]));
}
