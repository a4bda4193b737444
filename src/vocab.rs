//! Token types and the bidirectional rank tables.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt::{Debug, Display};

use bstr::ByteSlice;
use derive_more::{AsRef, Deref, Index};
use hashbrown::HashMap;
use once_cell::race::OnceBox;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::regex::{self, Regex};
use crate::InitializationError;

/// Numeric identifier of a token. Doubles as the merge rank:
/// lower values merge first.
pub type TokenId = u32;
/// Byte sequence of a token.
pub type TokenBytes = Vec<u8>;

/// A mergeable token: a byte sequence and its rank.
#[derive(Clone, AsRef, Deref, Index)]
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
pub struct Token {
    pub id:    TokenId,
    #[as_ref]
    #[deref]
    #[index]
    pub bytes: TokenBytes,
}
impl Display for Token {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_tuple("Token").field(&self.id).field(&self.bytes.as_bstr()).finish()
    }
}
impl Debug for Token {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("bytes", &self.bytes.as_bstr())
            .finish()
    }
}
impl PartialEq for Token {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.bytes == other.bytes
    }
}
impl Eq for Token {}
impl PartialOrd for Token {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Token {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
impl Borrow<[u8]> for Token {
    #[inline(always)]
    fn borrow(&self) -> &[u8] {
        &self.bytes
    }
}
impl From<(TokenBytes, TokenId)> for Token {
    #[inline(always)]
    fn from(value: (TokenBytes, TokenId)) -> Token {
        Token {
            id:    value.1,
            bytes: value.0,
        }
    }
}
impl From<Token> for (TokenBytes, TokenId) {
    #[inline(always)]
    fn from(value: Token) -> (TokenBytes, TokenId) {
        (value.bytes, value.id)
    }
}

/// A special token: a literal string and its rank.
///
/// Special tokens are matched literally in the input, never through the
/// pre-tokenization pattern, and their ranks are disjoint from the vocabulary.
#[derive(Clone)]
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
pub struct SpecialToken {
    pub id:   TokenId,
    pub name: String,
}
impl Display for SpecialToken {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_tuple("SpecialToken").field(&self.id).field(&self.name).finish()
    }
}
impl Debug for SpecialToken {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("SpecialToken")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
impl PartialEq for SpecialToken {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}
impl Eq for SpecialToken {}
impl From<(String, TokenId)> for SpecialToken {
    #[inline(always)]
    fn from(value: (String, TokenId)) -> SpecialToken {
        SpecialToken {
            id:   value.1,
            name: value.0,
        }
    }
}
impl From<(&str, TokenId)> for SpecialToken {
    #[inline(always)]
    fn from(value: (&str, TokenId)) -> SpecialToken {
        SpecialToken {
            id:   value.1,
            name: value.0.into(),
        }
    }
}

/// List of mergeable tokens. Loader output and construction input.
pub type Vocab = Vec<Token>;
/// List of special tokens. Loader output and construction input.
pub type SpecialVocab = Vec<SpecialToken>;

pub(crate) type EncoderMap = HashMap<TokenBytes, TokenId>;
pub(crate) type DecoderMap = HashMap<TokenId, TokenBytes>;

/// Bidirectional rank table over the mergeable vocabulary.
///
/// Both directions are materialized once at construction. The sorted byte
/// table used for prefix enumeration is built lazily on first use of the
/// unstable encoding path.
pub(crate) struct RankTable {
    encoder: EncoderMap,
    decoder: DecoderMap,
    sorted:  OnceBox<Vec<TokenBytes>>,
}
impl RankTable {
    #[inline(never)]
    pub fn new(vocab: Vocab) -> Result<Self, InitializationError> {
        let mut encoder = EncoderMap::with_capacity(vocab.len());
        let mut decoder = DecoderMap::with_capacity(vocab.len());
        for token in vocab {
            if decoder.insert(token.id, token.bytes.clone()).is_some() {
                return Err(InitializationError::DuplicateRank(token.id));
            }
            if encoder.insert(token.bytes, token.id).is_some() {
                return Err(InitializationError::DuplicatePiece);
            }
        }
        for byte in 0..=u8::MAX {
            if !encoder.contains_key(&[byte][..]) {
                return Err(InitializationError::MissingByte(byte));
            }
        }
        Ok(Self {
            encoder,
            decoder,
            sorted: OnceBox::new(),
        })
    }

    #[inline(always)]
    pub fn rank_of(&self, bytes: &[u8]) -> Option<TokenId> {
        self.encoder.get(bytes).copied()
    }

    #[inline(always)]
    pub fn bytes_of(&self, id: TokenId) -> Option<&TokenBytes> {
        self.decoder.get(&id)
    }

    #[inline(always)]
    pub fn contains(&self, id: TokenId) -> bool {
        self.decoder.contains_key(&id)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    #[inline(always)]
    pub fn max_id(&self) -> Option<TokenId> {
        self.decoder.keys().max().copied()
    }

    #[inline(always)]
    pub fn iter(&self) -> impl Iterator<Item = (&TokenBytes, TokenId)> {
        self.encoder.iter().map(|(bytes, id)| (bytes, *id))
    }

    /// Returns the token byte sequences in ascending byte order.
    #[inline(never)]
    pub fn sorted_token_bytes(&self) -> &[TokenBytes] {
        self.sorted.get_or_init(|| {
            let mut sorted = self.encoder.keys().cloned().collect::<Vec<_>>();
            sorted.sort_unstable();
            alloc::boxed::Box::new(sorted)
        })
    }
}
impl Debug for RankTable {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("RankTable")
            .field("encoder", &format!("EncoderMap({})", self.encoder.len()))
            .field("decoder", &format!("DecoderMap({})", self.decoder.len()))
            .finish()
    }
}

/// Rank table over the special tokens, with the compiled literal alternation.
pub(crate) struct SpecialTable {
    encoder:  HashMap<String, TokenId>,
    decoder:  DecoderMap,
    splitter: Option<Regex>,
}
impl SpecialTable {
    #[inline(never)]
    pub fn new(specials: SpecialVocab) -> Result<Self, InitializationError> {
        let mut encoder = HashMap::with_capacity(specials.len());
        let mut decoder = DecoderMap::with_capacity(specials.len());
        for special in specials {
            if decoder.insert(special.id, special.name.clone().into_bytes()).is_some() {
                return Err(InitializationError::DuplicateRank(special.id));
            }
            if encoder.insert(special.name, special.id).is_some() {
                return Err(InitializationError::DuplicatePiece);
            }
        }
        // Longer literals first, so overlapping alternatives prefer the longest match.
        let splitter = if encoder.is_empty() {
            None
        } else {
            let mut names = encoder.keys().collect::<Vec<_>>();
            names.sort_unstable_by_key(|name| core::cmp::Reverse(name.len()));
            let pattern =
                names.iter().map(|name| regex::escape(name)).collect::<Vec<_>>().join("|");
            Some(Regex::new(&pattern)?)
        };
        Ok(Self {
            encoder,
            decoder,
            splitter,
        })
    }

    #[inline(always)]
    pub fn rank_of(&self, name: &str) -> Option<TokenId> {
        self.encoder.get(name).copied()
    }

    #[inline(always)]
    pub fn bytes_of(&self, id: TokenId) -> Option<&TokenBytes> {
        self.decoder.get(&id)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    #[inline(always)]
    pub fn max_id(&self) -> Option<TokenId> {
        self.decoder.keys().max().copied()
    }

    #[inline(always)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.encoder.keys().map(String::as_str)
    }

    #[inline(always)]
    pub fn iter(&self) -> impl Iterator<Item = (&str, TokenId)> {
        self.encoder.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// The alternation matching any special token literally,
    /// or `None` when there are no special tokens.
    #[inline(always)]
    pub fn splitter(&self) -> Option<&Regex> {
        self.splitter.as_ref()
    }
}
impl Debug for SpecialTable {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("SpecialTable")
            .field("encoder", &format!("SpecialEncoderMap({})", self.encoder.len()))
            .field("decoder", &format!("SpecialDecoderMap({})", self.decoder.len()))
            .field("splitter", &self.splitter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_vocab() -> Vocab {
        (0..=u8::MAX).map(|b| Token::from((alloc::vec![b], b as TokenId))).collect()
    }

    #[test]
    fn test_missing_byte() {
        let mut vocab = byte_vocab();
        vocab.retain(|token| token.bytes != alloc::vec![0x41]);
        let result = RankTable::new(vocab);
        assert!(matches!(result, Err(InitializationError::MissingByte(0x41))));
    }

    #[test]
    fn test_duplicate_rank() {
        let mut vocab = byte_vocab();
        vocab.push(Token::from((b"aa".to_vec(), 0)));
        let result = RankTable::new(vocab);
        assert!(matches!(result, Err(InitializationError::DuplicateRank(0))));
    }

    #[test]
    fn test_duplicate_piece() {
        let mut vocab = byte_vocab();
        vocab.push(Token::from((alloc::vec![0x00], 256)));
        let result = RankTable::new(vocab);
        assert!(matches!(result, Err(InitializationError::DuplicatePiece)));
    }

    #[test]
    fn test_sorted_token_bytes() {
        let table = RankTable::new(byte_vocab()).unwrap();
        let sorted = table.sorted_token_bytes();
        assert_eq!(sorted.len(), 256);
        assert!(sorted.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_special_splitter_prefers_longest() {
        let table = SpecialTable::new(alloc::vec![
            SpecialToken::from(("<|end|>", 1000)),
            SpecialToken::from(("<|end|>more", 1001)),
        ])
        .unwrap();
        let splitter = table.splitter().unwrap();
        let found = splitter.find_from_pos("a<|end|>more", 0).unwrap();
        assert_eq!(&"a<|end|>more"[found.0..found.1], "<|end|>more");
    }
}
