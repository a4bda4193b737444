//! The public OpenAI encodings.
//!
//! Each constructor fetches its rank data through the cached loader and
//! returns the construction arguments. Constructed engines are memoized by
//! the registry, not here.

use crate::load::{load_data_gym_ranks, load_tiktoken_ranks, read_file_cached, LoadError};
use crate::registry::EncodingConstructor;
use crate::{Definition, SpecialVocab, ENDOFTEXT};

const FIM_PREFIX: &str = "<|fim_prefix|>";
const FIM_MIDDLE: &str = "<|fim_middle|>";
const FIM_SUFFIX: &str = "<|fim_suffix|>";
const ENDOFPROMPT: &str = "<|endofprompt|>";

const ENCODINGS_HOST: &str = "https://openaipublic.blob.core.windows.net";

const VOCAB_BPE_HASH: &str = "1ce1664773c50f3e0cc8842619a93edc4624525b728b188a9e0be33b7726adc5";
const ENCODER_JSON_HASH: &str = "196139668be63f3b5d6574427317ae82f612a97c5d1cdaf36ed2256dbf636783";
const R50K_BASE_HASH: &str = "306cd27f03c1a714eca7108e03d66b7dc042abe8c258b44c199a7ed9838dd930";
const P50K_BASE_HASH: &str = "94b5ca7dff4d00767bc256fdd1b27e5b17361d7b8a5f968547f9f23eb70d2069";
const CL100K_BASE_HASH: &str = "223921b76ee99bde995b7ff738513eef100fb51d18c93597a113bcffe865b2a7";
const O200K_BASE_HASH: &str = "446a9538cb6c348e3516120d7c08b09f57c36495e2acfffe59a5bf8b0cfb1a2d";

// The pattern in the original GPT-2 release used explicit character classes;
// this is the equivalent form shared by the 50k family.
const R50K_PATTERN: &str = r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";
const CL100K_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";
const O200K_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n/]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// The built-in encodings, registered on first registry access.
pub(crate) fn builtins() -> [(&'static str, EncodingConstructor); 6] {
    [
        ("gpt2", gpt2),
        ("r50k_base", r50k_base),
        ("p50k_base", p50k_base),
        ("p50k_edit", p50k_edit),
        ("cl100k_base", cl100k_base),
        ("o200k_base", o200k_base),
    ]
}

fn gpt2() -> Result<Definition, LoadError> {
    let vocab_bpe = read_file_cached(
        &format!("{ENCODINGS_HOST}/gpt-2/encodings/main/vocab.bpe"),
        Some(VOCAB_BPE_HASH),
    )?;
    let encoder_json = read_file_cached(
        &format!("{ENCODINGS_HOST}/gpt-2/encodings/main/encoder.json"),
        Some(ENCODER_JSON_HASH),
    )?;
    Ok(Definition {
        name:             "gpt2".into(),
        pattern:          R50K_PATTERN.into(),
        vocab:            load_data_gym_ranks(&vocab_bpe, &encoder_json)?,
        specials:         SpecialVocab::from([(ENDOFTEXT, 50256).into()]),
        explicit_n_vocab: Some(50257),
    })
}

fn r50k_base() -> Result<Definition, LoadError> {
    let data =
        read_file_cached(&format!("{ENCODINGS_HOST}/encodings/r50k_base.tiktoken"), Some(R50K_BASE_HASH))?;
    Ok(Definition {
        name:             "r50k_base".into(),
        pattern:          R50K_PATTERN.into(),
        vocab:            load_tiktoken_ranks(&data)?,
        specials:         SpecialVocab::from([(ENDOFTEXT, 50256).into()]),
        explicit_n_vocab: Some(50257),
    })
}

fn p50k_base() -> Result<Definition, LoadError> {
    let data =
        read_file_cached(&format!("{ENCODINGS_HOST}/encodings/p50k_base.tiktoken"), Some(P50K_BASE_HASH))?;
    Ok(Definition {
        name:             "p50k_base".into(),
        pattern:          R50K_PATTERN.into(),
        vocab:            load_tiktoken_ranks(&data)?,
        specials:         SpecialVocab::from([(ENDOFTEXT, 50256).into()]),
        explicit_n_vocab: Some(50281),
    })
}

fn p50k_edit() -> Result<Definition, LoadError> {
    let data =
        read_file_cached(&format!("{ENCODINGS_HOST}/encodings/p50k_base.tiktoken"), Some(P50K_BASE_HASH))?;
    Ok(Definition {
        name:             "p50k_edit".into(),
        pattern:          R50K_PATTERN.into(),
        vocab:            load_tiktoken_ranks(&data)?,
        specials:         SpecialVocab::from([
            (ENDOFTEXT, 50256).into(),
            (FIM_PREFIX, 50281).into(),
            (FIM_MIDDLE, 50282).into(),
            (FIM_SUFFIX, 50283).into(),
        ]),
        explicit_n_vocab: None,
    })
}

fn cl100k_base() -> Result<Definition, LoadError> {
    let data = read_file_cached(
        &format!("{ENCODINGS_HOST}/encodings/cl100k_base.tiktoken"),
        Some(CL100K_BASE_HASH),
    )?;
    Ok(Definition {
        name:             "cl100k_base".into(),
        pattern:          CL100K_PATTERN.into(),
        vocab:            load_tiktoken_ranks(&data)?,
        specials:         SpecialVocab::from([
            (ENDOFTEXT, 100257).into(),
            (FIM_PREFIX, 100258).into(),
            (FIM_MIDDLE, 100259).into(),
            (FIM_SUFFIX, 100260).into(),
            (ENDOFPROMPT, 100276).into(),
        ]),
        explicit_n_vocab: None,
    })
}

fn o200k_base() -> Result<Definition, LoadError> {
    let data = read_file_cached(
        &format!("{ENCODINGS_HOST}/encodings/o200k_base.tiktoken"),
        Some(O200K_BASE_HASH),
    )?;
    Ok(Definition {
        name:             "o200k_base".into(),
        pattern:          O200K_PATTERN.into(),
        vocab:            load_tiktoken_ranks(&data)?,
        specials:         SpecialVocab::from([
            (ENDOFTEXT, 199999).into(),
            (ENDOFPROMPT, 200018).into(),
        ]),
        explicit_n_vocab: None,
    })
}
