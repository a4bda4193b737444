//! **Byte-level BPE tokenizer for language models.**
//!
//! Supports the `tiktoken` rank file format and the legacy GPT-2 vocabulary
//! format. Usable in native and `no_std` environments.
//!
//! # Overview
//!
//! Bpekit maps text to token ids and back using a fixed vocabulary that
//! assigns every byte sequence a unique integer rank. Encoding splits the
//! input with a pre-tokenization pattern and greedily merges each piece
//! bottom-up, always taking the adjacent pair with the lowest rank.
//!
//! See [`Encoding`] for the main entry point and additional information.
//!
//! # Examples
//!
//! ### Loading a registered encoding
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let encoding = bpekit::get_encoding("cl100k_base")?;
//! let tokens = encoding.encode_ordinary("hello world");
//! assert_eq!(encoding.decode(&tokens)?, "hello world");
//! # Ok(())
//! # }
//! ```
//!
//! ### Resolving an encoding from a model name
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let encoding = bpekit::encoding_for_model("gpt-4")?;
//! assert_eq!(encoding.name(), "cl100k_base");
//! # Ok(())
//! # }
//! ```
//!
//! ### Encoding with special tokens
//! ```no_run
//! use bpekit::{AllowedSpecial, DisallowedSpecial};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let encoding = bpekit::get_encoding("cl100k_base")?;
//! let tokens =
//!     encoding.encode("hello <|endoftext|>", &AllowedSpecial::All, &DisallowedSpecial::default())?;
//! assert_eq!(tokens.last(), encoding.eot_token().as_ref());
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo features
//!
//! ### Default features
//!
//! - `std`: Enables standard library features, including the vocabulary
//!   loaders, the encoding registry and the model table.
//! - `serialization`: Enables `serde` implementations for [`Definition`],
//!   [`Token`] and [`SpecialToken`].
//! - `download`: Enables fetching rank files over http(s).
//! - `parallel`: Enables the batch encoding and decoding entry points backed
//!   by a shared worker pool.
//!
//! ### Optional features
//!
//! - `regex-perf`: Enables additional regex performance optimizations.
//!   Increases binary size.

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

mod decoder;
mod definition;
mod encoder;
mod regex;
mod unstable;
mod vocab;

#[cfg(feature = "parallel")]
mod batch;
#[cfg(feature = "std")]
pub mod load;
#[cfg(feature = "std")]
pub mod model;
#[cfg(feature = "std")]
mod presets;
#[cfg(feature = "std")]
pub mod registry;

use alloc::string::String;
use alloc::vec::Vec;

/// Hash set type used in the public interfaces.
pub use hashbrown::HashSet;

pub use crate::decoder::{DecodeError, DecodePolicy};
pub use crate::definition::Definition;
pub use crate::encoder::{EncodeError, TokenError};
pub use crate::regex::{Regex, RegexError};
pub use crate::vocab::{SpecialToken, SpecialVocab, Token, TokenBytes, TokenId, Vocab};

#[cfg(feature = "std")]
pub use crate::model::encoding_for_model;
#[cfg(feature = "std")]
pub use crate::registry::{get_encoding, list_encoding_names, register_encoding};

use crate::encoder::PartBuffer;
use crate::vocab::{RankTable, SpecialTable};

/// Name of the end-of-text special token.
pub const ENDOFTEXT: &str = "<|endoftext|>";

/// Errors encountered during initialization.
#[non_exhaustive]
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum InitializationError {
    /// The vocabulary must contain every single byte.
    #[cfg_attr(feature = "std", error("vocabulary is missing the single byte {0:#04x}"))]
    MissingByte(u8),
    /// The vocabulary and the special tokens must not contain duplicate entries.
    #[cfg_attr(feature = "std", error("duplicate piece in vocabulary"))]
    DuplicatePiece,
    /// Ranks must be unique within the vocabulary and within the special tokens.
    #[cfg_attr(feature = "std", error("duplicate rank {0}"))]
    DuplicateRank(TokenId),
    /// Special token ranks must be disjoint from the vocabulary ranks.
    #[cfg_attr(
        feature = "std",
        error("special token rank {0} collides with a vocabulary rank")
    )]
    SpecialRankOverlap(TokenId),
    /// The declared vocabulary size must match the actual number of entries.
    #[cfg_attr(
        feature = "std",
        error("declared vocabulary size {expected} does not match {actual} entries")
    )]
    VocabSizeMismatch {
        expected: usize,
        actual:   usize,
    },
    /// The split pattern failed to compile.
    #[cfg_attr(feature = "std", error("invalid regex: {0}"))]
    InvalidRegex(RegexError),
}
impl From<RegexError> for InitializationError {
    fn from(e: RegexError) -> Self {
        Self::InvalidRegex(e)
    }
}

/// The set of special tokens recognized and encoded with their ids.
///
/// Special tokens outside the set are tokenized as ordinary text
/// unless they are disallowed.
#[derive(Debug, Clone)]
pub enum AllowedSpecial<'a> {
    /// Every special token of the encoding is recognized.
    All,
    /// Only the listed special tokens are recognized.
    Set(HashSet<&'a str>),
}
impl Default for AllowedSpecial<'_> {
    /// No special tokens are recognized.
    fn default() -> Self {
        Self::Set(HashSet::new())
    }
}
impl<'a> FromIterator<&'a str> for AllowedSpecial<'a> {
    fn from_iter<I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        Self::Set(names.into_iter().collect())
    }
}

/// The set of special tokens whose occurrence in the input is an error.
#[derive(Debug, Clone, Default)]
pub enum DisallowedSpecial<'a> {
    /// Every special token that is not allowed is an error.
    #[default]
    All,
    /// Only the listed special tokens are an error.
    Set(HashSet<&'a str>),
}
impl<'a> FromIterator<&'a str> for DisallowedSpecial<'a> {
    fn from_iter<I: IntoIterator<Item = &'a str>>(names: I) -> Self {
        Self::Set(names.into_iter().collect())
    }
}

/// Byte-level BPE encoding.
///
/// Immutable once constructed and freely shareable between threads.
/// All operations are reentrant; the only interior state are lazily
/// built lookup caches.
#[derive(Debug)]
pub struct Encoding {
    pub(crate) name:    String,
    pub(crate) pattern: Regex,

    pub(crate) ranks:    RankTable,
    pub(crate) specials: SpecialTable,

    pub(crate) max_token_value:  TokenId,
    pub(crate) explicit_n_vocab: Option<TokenId>,
}

impl Encoding {
    /// Creates an encoding from the given vocabulary, special tokens and split pattern.
    ///
    /// Returns an error if the pattern fails to compile, the vocabulary is missing
    /// a single byte or contains duplicates, special ranks collide with the
    /// vocabulary, or the declared size does not match.
    #[inline(never)]
    pub fn new(
        name: impl Into<String>, pattern: &str, vocab: impl Into<Vocab>,
        specials: impl Into<SpecialVocab>, explicit_n_vocab: Option<TokenId>,
    ) -> Result<Self, InitializationError> {
        let name = name.into();
        let pattern = Regex::new(pattern)?;
        let ranks = RankTable::new(vocab.into())?;
        let specials = SpecialTable::new(specials.into())?;
        for (_, id) in specials.iter() {
            if ranks.contains(id) {
                return Err(InitializationError::SpecialRankOverlap(id));
            }
        }
        let max_token_value = ranks
            .max_id()
            .into_iter()
            .chain(specials.max_id())
            .max()
            .unwrap_or_default();
        if let Some(explicit) = explicit_n_vocab {
            let declared = explicit as usize;
            let actual = ranks.len() + specials.len();
            if actual != declared || max_token_value != explicit - 1 {
                return Err(InitializationError::VocabSizeMismatch {
                    expected: declared,
                    actual,
                });
            }
        }
        Ok(Self {
            name,
            pattern,
            ranks,
            specials,
            max_token_value,
            explicit_n_vocab,
        })
    }

    /// The name of the encoding.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pre-tokenization split pattern.
    #[inline(always)]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The total vocabulary size, including special tokens.
    ///
    /// Equals `max_token_value() + 1` for contiguous vocabularies.
    #[inline(always)]
    pub fn n_vocab(&self) -> usize {
        self.max_token_value as usize + 1
    }

    /// The largest token id in the vocabulary or the special tokens.
    #[inline(always)]
    pub fn max_token_value(&self) -> TokenId {
        self.max_token_value
    }

    /// The id of the `<|endoftext|>` token, if the encoding defines one.
    #[inline(always)]
    pub fn eot_token(&self) -> Option<TokenId> {
        self.specials.rank_of(ENDOFTEXT)
    }

    /// The special tokens of the encoding.
    #[inline(always)]
    pub fn special_tokens(&self) -> impl Iterator<Item = (&str, TokenId)> {
        self.specials.iter()
    }

    /// The byte sequences of the mergeable vocabulary, in ascending byte order.
    #[inline(always)]
    pub fn token_byte_values(&self) -> &[TokenBytes] {
        self.ranks.sorted_token_bytes()
    }

    /// Encodes the given text into a sequence of tokens, ignoring special tokens.
    ///
    /// Special token literals in the input are tokenized as ordinary text.
    #[inline(never)]
    pub fn encode_ordinary(&self, text: &str) -> Vec<TokenId> {
        let mut buffer = PartBuffer::with_capacity(encoder::ENCODE_BUFFER_SIZE);
        let mut result = Vec::with_capacity(text.len() / 3);
        self.encode_ordinary_into(text, &mut buffer, &mut result);
        result
    }

    /// Encodes the given text into a sequence of tokens.
    ///
    /// Special tokens in `allowed` are encoded with their ids. A special token
    /// in `disallowed` occurring anywhere in the input fails with
    /// [`EncodeError::DisallowedSpecial`], whether or not it is also allowed.
    #[inline(never)]
    pub fn encode(
        &self, text: &str, allowed: &AllowedSpecial, disallowed: &DisallowedSpecial,
    ) -> Result<Vec<TokenId>, EncodeError> {
        let allowed = self.allowed_set(allowed);
        self.check_disallowed(text, &allowed, disallowed)?;
        Ok(self.encode_with_specials(text, &allowed).0)
    }

    /// Encodes the given bytes into a sequence of tokens, ignoring special tokens.
    ///
    /// The valid utf-8 prefix is encoded through the split pattern; trailing
    /// bytes that do not form valid utf-8 are merged together with the last
    /// unstable piece. This is the entry point for input that cannot be
    /// represented as a string, such as partial multi-byte sequences produced
    /// by byte-level sampling.
    #[inline(never)]
    pub fn encode_bytes(&self, bytes: &[u8]) -> Vec<TokenId> {
        match core::str::from_utf8(bytes) {
            Ok(text) => self.encode_ordinary(text),
            Err(error) => {
                let valid = error.valid_up_to();
                // The prefix was just validated.
                let text = unsafe { core::str::from_utf8_unchecked(&bytes[..valid]) };
                let (tokens, last_piece_token_len) =
                    self.encode_with_specials(text, &HashSet::new());
                let (mut tokens, last_piece_token_len) =
                    self.increase_last_piece_token_len(tokens, last_piece_token_len);
                if !tokens.is_empty() && last_piece_token_len > 0 {
                    // Merge the unstable piece together with the invalid tail,
                    // since the tail could complete it.
                    let mut unstable_bytes =
                        self.decode_known(&tokens[tokens.len() - last_piece_token_len..]);
                    unstable_bytes.extend_from_slice(&bytes[valid..]);
                    tokens.truncate(tokens.len() - last_piece_token_len);
                    tokens.extend(encoder::encode_piece_tokens(&self.ranks, &unstable_bytes));
                }
                tokens
            }
        }
    }

    /// Encodes a single token from its byte sequence.
    ///
    /// Tries the vocabulary first and the special tokens second.
    /// Returns an error if neither contains the bytes.
    #[inline(never)]
    pub fn encode_single_token(&self, piece: &[u8]) -> Result<TokenId, TokenError> {
        if let Some(token) = self.ranks.rank_of(piece) {
            return Ok(token);
        }
        if let Ok(name) = core::str::from_utf8(piece) {
            if let Some(token) = self.specials.rank_of(name) {
                return Ok(token);
            }
        }
        Err(TokenError::InvalidTokenBytes(piece.into()))
    }

    /// Encodes a single piece without merging.
    ///
    /// Returns the piece's rank if the vocabulary contains it directly,
    /// and the ranks of its individual bytes otherwise.
    #[inline(never)]
    pub fn encode_single_piece(&self, piece: &[u8]) -> Vec<TokenId> {
        if let Some(token) = self.ranks.rank_of(piece) {
            return alloc::vec![token];
        }
        piece
            .iter()
            .map(|&byte| {
                // Single bytes are validated at construction.
                self.ranks.rank_of(&[byte]).expect("every single byte has a rank")
            })
            .collect()
    }

    /// Encodes the pieces of the given text, appending to `result`.
    ///
    /// Returns the number of tokens produced for the last piece.
    #[inline(never)]
    pub(crate) fn encode_ordinary_into(
        &self, text: &str, buffer: &mut PartBuffer, result: &mut Vec<TokenId>,
    ) -> usize {
        let mut last_piece_token_len = 0;
        for (start, end) in self.pattern.find_iter(text) {
            let piece = &text.as_bytes()[start..end];
            if let Some(token) = self.ranks.rank_of(piece) {
                last_piece_token_len = 1;
                result.push(token);
                continue;
            }
            let before = result.len();
            encoder::encode_piece(&self.ranks, piece, buffer, result);
            last_piece_token_len = result.len() - before;
        }
        last_piece_token_len
    }

    /// Encodes the given text, splitting around the allowed special tokens.
    ///
    /// Returns the tokens and the number of tokens produced for the last
    /// piece, which is needed for determining unstable tokens: merges never
    /// cross pre-tokenization splits, so everything before the last piece is
    /// final.
    #[inline(never)]
    pub(crate) fn encode_with_specials(
        &self, text: &str, allowed: &HashSet<&str>,
    ) -> (Vec<TokenId>, usize) {
        let mut buffer = PartBuffer::with_capacity(encoder::ENCODE_BUFFER_SIZE);
        let mut result = Vec::with_capacity(text.len() / 3);
        let splitter = self.specials.splitter().filter(|_| !allowed.is_empty());
        let mut start = 0;
        let mut last_piece_token_len = 0;
        loop {
            let mut next_special = None;
            if let Some(splitter) = splitter {
                // Find the next allowed special token, if any.
                let mut start_find = start;
                while let Some((s, e)) = splitter.find_from_pos(text, start_find) {
                    if allowed.contains(&text[s..e]) {
                        next_special = Some((s, e));
                        break;
                    }
                    start_find = s + 1;
                }
            }
            let end = next_special.map_or(text.len(), |(s, _)| s);
            last_piece_token_len =
                self.encode_ordinary_into(&text[start..end], &mut buffer, &mut result);
            match next_special {
                Some((s, e)) => {
                    // The splitter only matches special token names.
                    let token = self
                        .specials
                        .rank_of(&text[s..e])
                        .expect("special splitter matches only special tokens");
                    result.push(token);
                    start = e;
                    last_piece_token_len = 0;
                }
                None => break,
            }
        }
        (result, last_piece_token_len)
    }

    /// Resolves the allowed policy into the set of recognized special names.
    #[inline(always)]
    pub(crate) fn allowed_set<'r>(&'r self, allowed: &'r AllowedSpecial<'r>) -> HashSet<&'r str> {
        match allowed {
            AllowedSpecial::All => self.specials.names().collect(),
            AllowedSpecial::Set(set) => set.clone(),
        }
    }

    /// Fails if a disallowed special token occurs anywhere in the text.
    #[inline(never)]
    pub(crate) fn check_disallowed<'r>(
        &'r self, text: &str, allowed: &HashSet<&'r str>, disallowed: &'r DisallowedSpecial<'r>,
    ) -> Result<(), EncodeError> {
        let disallowed = match disallowed {
            DisallowedSpecial::All => {
                self.specials.names().filter(|name| !allowed.contains(name)).collect()
            }
            DisallowedSpecial::Set(set) => set.clone(),
        };
        if disallowed.is_empty() {
            return Ok(());
        }
        let Some(splitter) = self.specials.splitter() else {
            return Ok(());
        };
        let mut pos = 0;
        while let Some((start, end)) = splitter.find_from_pos(text, pos) {
            let name = &text[start..end];
            if disallowed.contains(name) {
                return Err(EncodeError::DisallowedSpecial {
                    name:   name.into(),
                    offset: start,
                });
            }
            pos = start + 1;
        }
        Ok(())
    }
}
