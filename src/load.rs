//! Vocabulary loaders for the tiktoken rank file format and the legacy
//! GPT-2 vocabulary format, with content-hash verified disk caching.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{alphabet, engine, Engine};
use bstr::ByteSlice;
use hashbrown::HashMap;
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::vocab::{Token, TokenBytes, TokenId, Vocab};

static BASE64: engine::GeneralPurpose =
    engine::GeneralPurpose::new(&alphabet::STANDARD, engine::general_purpose::PAD);

/// Environment variable selecting the cache directory.
pub const CACHE_DIR_ENV: &str = "TIKTOKEN_CACHE_DIR";
/// Fallback environment variable selecting the cache directory.
pub const CACHE_DIR_FALLBACK_ENV: &str = "DATA_GYM_CACHE_DIR";

/// Errors encountered while loading vocabulary data.
#[non_exhaustive]
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum LoadError {
    /// Reading or writing a file failed.
    #[error("{uri}: {source}")]
    Io {
        uri:    String,
        #[source]
        source: std::io::Error,
    },
    /// Fetching a uri failed.
    #[cfg(feature = "download")]
    #[error("{uri}: {source}")]
    Http {
        uri:    String,
        #[source]
        source: reqwest::Error,
    },
    /// Fetching a uri requires the `download` feature.
    #[error("downloads are disabled, cannot fetch {0}")]
    DownloadsDisabled(String),
    /// The data failed content-hash verification.
    #[error("hash mismatch for data from {uri}: expected {expected}, got {actual}")]
    HashMismatch {
        uri:      String,
        expected: String,
        actual:   String,
    },
    /// The data is invalid. See the error message for more information.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// A line contains invalid base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    /// A line contains an invalid number.
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    /// A rank occurs more than once.
    #[error("duplicate rank {0}")]
    DuplicateRank(TokenId),
    /// The merge list does not match the encoder table.
    #[error("the merge list does not match the encoder table")]
    EncoderMismatch,
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Reads the contents of a `http(s)` uri or a filesystem path.
pub fn read_file(uri: &str) -> Result<Vec<u8>, LoadError> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        #[cfg(feature = "download")]
        {
            let fail = |source| LoadError::Http {
                uri: uri.into(),
                source,
            };
            let response = reqwest::blocking::get(uri)
                .and_then(reqwest::blocking::Response::error_for_status)
                .map_err(fail)?;
            return Ok(response.bytes().map_err(fail)?.to_vec());
        }
        #[cfg(not(feature = "download"))]
        return Err(LoadError::DownloadsDisabled(uri.into()));
    }
    fs::read(uri).map_err(|source| LoadError::Io {
        uri: uri.into(),
        source,
    })
}

/// Reads the contents of a uri through the disk cache.
///
/// The cache directory is taken from `TIKTOKEN_CACHE_DIR`, falling back to
/// `DATA_GYM_CACHE_DIR` and then a system-temp default; an empty value
/// disables caching. Cached data is verified against `expected_hash` when one
/// is given; a stale entry is deleted and fetched again. Fetched data failing
/// verification is a [`LoadError::HashMismatch`].
pub fn read_file_cached(uri: &str, expected_hash: Option<&str>) -> Result<Vec<u8>, LoadError> {
    let (cache_dir, user_specified) = cache_dir();
    let Some(cache_dir) = cache_dir else {
        return read_file(uri);
    };
    let path = cache_dir.join(sha256_hex(uri.as_bytes()));
    if let Ok(data) = fs::read(&path) {
        match expected_hash {
            Some(expected) if sha256_hex(&data) != expected => {
                debug!("cached copy of {uri} failed verification, fetching again");
                let _ = fs::remove_file(&path);
            }
            _ => return Ok(data),
        }
    }
    let contents = read_file(uri)?;
    if let Some(expected) = expected_hash {
        let actual = sha256_hex(&contents);
        if actual != expected {
            return Err(LoadError::HashMismatch {
                uri: uri.into(),
                expected: expected.into(),
                actual,
            });
        }
    }
    if let Err(source) = write_cache(&cache_dir, &path, &contents) {
        if user_specified {
            return Err(LoadError::Io {
                uri: path.display().to_string(),
                source,
            });
        }
        warn!("failed to write the cache entry for {uri}: {source}");
    }
    Ok(contents)
}

/// Returns the cache directory and whether the user selected it.
/// `None` disables caching.
fn cache_dir() -> (Option<PathBuf>, bool) {
    for variable in [CACHE_DIR_ENV, CACHE_DIR_FALLBACK_ENV] {
        if let Ok(value) = std::env::var(variable) {
            let directory = (!value.is_empty()).then(|| PathBuf::from(value));
            return (directory, true);
        }
    }
    (Some(std::env::temp_dir().join("data-gym-cache")), false)
}

/// Writes a cache entry through a temporary file and an atomic rename.
fn write_cache(cache_dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    static UNIQUE: AtomicU64 = AtomicU64::new(0);
    fs::create_dir_all(cache_dir)?;
    let tmp = path.with_extension(format!(
        "{}.{}.tmp",
        std::process::id(),
        UNIQUE.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Parses vocabulary data in the tiktoken rank file format.
///
/// Every non-empty line is a base64-encoded byte sequence, a space, and a
/// decimal rank. Lines may be in any order; a duplicate rank is a corruption
/// error.
pub fn load_tiktoken_ranks(data: &[u8]) -> Result<Vocab, LoadError> {
    let lines = data
        .split(|u| *u == b'\n')
        .map(|l| l.trim_with(|u| u == '\r'))
        .filter(|l| !l.is_empty());

    let mut seen = hashbrown::HashSet::new();
    let mut vocab = Vocab::with_capacity(data.len() / 10);
    for (i, line) in lines.enumerate() {
        let (l, r) = line
            .split_once_str(" ")
            .ok_or_else(|| LoadError::InvalidData(format!("wrong format in line {i}")))?;
        let bytes = BASE64
            .decode(l)
            .map_err(|e| LoadError::InvalidBase64(format!("line {i}: {e}")))?;
        let id = r
            .as_bstr()
            .to_str()
            .map_err(|e| LoadError::InvalidData(format!("invalid utf-8 in line {i}: {e}")))?
            .parse::<TokenId>()
            .map_err(|e| LoadError::InvalidNumber(format!("line {i}: {e}")))?;
        if !seen.insert(id) {
            return Err(LoadError::DuplicateRank(id));
        }
        vocab.push(Token::from((bytes, id)));
    }
    Ok(vocab)
}

/// Serializes a vocabulary into the tiktoken rank file format, ordered by rank.
pub fn dump_tiktoken_ranks(vocab: &Vocab) -> Vec<u8> {
    let mut vocab = vocab.iter().collect::<Vec<_>>();
    vocab.sort_unstable();
    let mut data = Vec::with_capacity(vocab.len() * 16);
    for token in vocab {
        data.extend(BASE64.encode(&token.bytes).into_bytes());
        data.push(b' ');
        data.extend(token.id.to_string().into_bytes());
        data.push(b'\n');
    }
    data
}

/// The GPT-2 character permutation: printable non-space latin-1 characters
/// map to their own byte value, everything else to `0x100` onwards.
fn data_gym_byte_decoder() -> HashMap<char, u8> {
    let mut decoder = HashMap::with_capacity(256);
    let mut printable = [false; 256];
    for c in ('!'..='~').chain('¡'..='¬').chain('®'..='ÿ') {
        decoder.insert(c, c as u8);
        printable[c as usize] = true;
    }
    let mut fill = 0u32;
    for byte in 0..=u8::MAX {
        if !printable[byte as usize] {
            decoder.insert(char::from_u32(0x100 + fill).unwrap(), byte);
            fill += 1;
        }
    }
    decoder
}

/// The single-byte tokens of the GPT-2 vocabulary in rank order:
/// printable characters first, the remapped remainder after.
fn data_gym_rank_to_byte() -> Vec<u8> {
    let mut bytes = ('!'..='~')
        .chain('¡'..='¬')
        .chain('®'..='ÿ')
        .map(|c| c as u8)
        .collect::<Vec<_>>();
    let printable = bytes.iter().copied().collect::<hashbrown::HashSet<_>>();
    bytes.extend((0..=u8::MAX).filter(|byte| !printable.contains(byte)));
    debug_assert_eq!(bytes.len(), 256);
    bytes
}

/// Converts the legacy GPT-2 vocabulary format into rank order.
///
/// `vocab_bpe` lists the merges by priority after a version header line;
/// ranks continue from the fixed 256-entry base alphabet. `encoder_json`
/// maps encoded piece strings to ids and must agree with the constructed
/// table, since the merge algorithm assumes ranks are ordered like merge
/// priorities.
pub fn load_data_gym_ranks(vocab_bpe: &[u8], encoder_json: &[u8]) -> Result<Vocab, LoadError> {
    let decoder = data_gym_byte_decoder();
    let decode = |value: &str| -> Result<TokenBytes, LoadError> {
        value
            .chars()
            .map(|c| {
                decoder.get(&c).copied().ok_or_else(|| {
                    LoadError::InvalidData(format!("unmapped character {c:?} in merge data"))
                })
            })
            .collect()
    };

    let mut vocab = data_gym_rank_to_byte()
        .into_iter()
        .enumerate()
        .map(|(id, byte)| Token::from((vec![byte], id as TokenId)))
        .collect::<Vocab>();

    let merges = vocab_bpe
        .to_str()
        .map_err(|e| LoadError::InvalidData(format!("invalid utf-8 in merge data: {e}")))?
        .lines()
        .skip(1)
        .filter(|line| !line.is_empty());
    for (i, line) in merges.enumerate() {
        let (first, second) = line
            .split_once(' ')
            .ok_or_else(|| LoadError::InvalidData(format!("wrong format in merge {i}")))?;
        let mut bytes = decode(first)?;
        bytes.extend(decode(second)?);
        vocab.push(Token::from((bytes, 256 + i as TokenId)));
    }

    // The encoder table must match the merge list entry for entry.
    let encoder: std::collections::HashMap<String, TokenId> = serde_json::from_slice(encoder_json)
        .map_err(|e| LoadError::InvalidData(format!("invalid encoder table: {e}")))?;
    let mut expected = HashMap::with_capacity(encoder.len());
    for (key, id) in &encoder {
        if key == "<|endoftext|>" || key == "<|startoftext|>" {
            continue;
        }
        expected.insert(decode(key)?, *id);
    }
    let constructed =
        vocab.iter().map(|token| (token.bytes.clone(), token.id)).collect::<HashMap<_, _>>();
    if constructed != expected {
        return Err(LoadError::EncoderMismatch);
    }

    Ok(vocab)
}
