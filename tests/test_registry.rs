//! Tests for the process-wide encoding registry.

use std::sync::Arc;

use bpekit::load::LoadError;
use bpekit::registry::RegistryError;
use bpekit::{get_encoding, list_encoding_names, register_encoding, Definition};

mod util;
use util::*;

fn tiny() -> Result<Definition, LoadError> {
    Ok(Definition {
        name:             "tiny-test".into(),
        pattern:          PATTERN.into(),
        vocab:            small_vocab(),
        specials:         small_specials(),
        explicit_n_vocab: None,
    })
}

#[test]
fn test_register_and_get() {
    init_env();
    register_encoding("tiny-test", tiny).unwrap();
    let first = get_encoding("tiny-test").unwrap();
    assert_eq!(first.name(), "tiny-test");
    assert_eq!(first.encode_ordinary("hello world"), [259, 264]);

    // Construction is memoized: the same instance is returned.
    let second = get_encoding("tiny-test").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_duplicate_registration_fails() {
    init_env();
    register_encoding("tiny-duplicate", tiny).unwrap();
    let error = register_encoding("tiny-duplicate", tiny).unwrap_err();
    assert!(matches!(error, RegistryError::DuplicateEncoding(name) if name == "tiny-duplicate"));
    let error = register_encoding("cl100k_base", tiny).unwrap_err();
    assert!(matches!(error, RegistryError::DuplicateEncoding(_)));
}

#[test]
fn test_unknown_encoding() {
    init_env();
    let error = get_encoding("no-such-encoding").unwrap_err();
    assert!(matches!(error, RegistryError::UnknownEncoding(name) if name == "no-such-encoding"));
}

#[test]
fn test_list_contains_builtins() {
    init_env();
    let names = list_encoding_names();
    for name in ["gpt2", "r50k_base", "p50k_base", "p50k_edit", "cl100k_base", "o200k_base"] {
        assert!(names.iter().any(|n| n == name), "missing {name}");
    }
}
