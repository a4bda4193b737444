//! Piece encoder for the tokenizer.

use alloc::string::String;
use alloc::vec::Vec;

mod bytepair;

pub(crate) use bytepair::*;

/// Errors encountered during encoding.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum EncodeError {
    /// The input contains a special token literal that is not allowed.
    #[cfg_attr(
        feature = "std",
        error("disallowed special token {name:?} at byte offset {offset}")
    )]
    DisallowedSpecial {
        /// The literal that was found.
        name:   String,
        /// Byte offset of the first occurrence.
        offset: usize,
    },
}

/// Errors encountered during single-token lookups.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum TokenError {
    /// No token with the given byte sequence exists in the vocabulary or the special tokens.
    #[cfg_attr(feature = "std", error("invalid token bytes {0:?}"))]
    InvalidTokenBytes(Vec<u8>),
    /// No token with the given id exists in the vocabulary or the special tokens.
    #[cfg_attr(feature = "std", error("invalid token id {0}"))]
    InvalidTokenId(crate::TokenId),
}
